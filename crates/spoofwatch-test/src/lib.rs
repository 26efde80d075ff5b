//! Helpers for driving the spoofwatch binaries from integration tests

use std::process::Output;

pub use assert_cmd::Command;

/// Write `contents` to a fresh temporary file and hand it back
pub fn tempfile<S: AsRef<str>>(contents: S) -> eyre::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    std::io::Write::write_all(&mut file, contents.as_ref().as_bytes())?;
    Ok(file)
}

pub trait CommandExt {
    /// Like [Command::output], but echoes stdout/stderr through the libtest
    /// capture machinery so failed tests show what the tool printed
    fn captured_output(&mut self) -> std::io::Result<Output>;
}

impl CommandExt for Command {
    fn captured_output(&mut self) -> std::io::Result<Output> {
        let output = self.output()?;
        print!("{}", String::from_utf8_lossy(&output.stdout));
        eprint!("{}", String::from_utf8_lossy(&output.stderr));
        Ok(output)
    }
}

/// A [Command] for one of this workspace's tool binaries, with trace logging
/// switched on.
///
/// Relies on the `CARGO_BIN_EXE_<name>` variables cargo provides to
/// integration tests living in the same crate as the binary.
///
/// # Example
/// ```ignore
/// use spoofwatch_test::{CommandExt, tool};
///
/// let output = tool!("spoofscan")
///     .arg("--help")
///     .captured_output()
///     .unwrap();
/// assert!(output.status.success());
/// ```
#[macro_export]
macro_rules! tool {
    ($name:literal) => {{
        let mut cmd = $crate::Command::new(env!(concat!("CARGO_BIN_EXE_", $name)));
        cmd.arg("--log-level=TRACE");
        cmd
    }};
}
