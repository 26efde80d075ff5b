//! Replay of recorded sentence logs
//!
//! One entry per line: `YYYY-MM-DD HH:MM:SS.f <device_id> <sentence>`, the
//! format [crate::detect::Recorder] writes. Lines that do not match are
//! silently skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use chrono::NaiveDateTime;
use eyre::WrapErr;
use regex::Regex;

use crate::detect::Handler;

pub struct LogSource {
    path: PathBuf,
}

impl LogSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn run<H: Handler>(&self, handler: &mut H) -> eyre::Result<()> {
        let file = File::open(&self.path)
            .wrap_err_with(|| format!("Failed to open sentence log {:?}", self.path))?;
        let line_format =
            Regex::new(r"^([0-9-]+ +[0-9:.]+) +([A-Za-z0-9._/:-]+) +(.+?)\s*$").expect("static regex");
        for line in BufReader::new(file).lines() {
            let line = line.wrap_err("Failed to read log line")?;
            let Some(captures) = line_format.captures(&line) else {
                tracing::trace!("Skipping unparseable log line {line:?}");
                continue;
            };
            let Ok(time) = NaiveDateTime::parse_from_str(&captures[1], "%Y-%m-%d %H:%M:%S%.f")
            else {
                tracing::trace!("Skipping log line with bad timestamp {line:?}");
                continue;
            };
            handler.handle(&captures[2], time.and_utc(), &captures[3]);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::source::tests::Collector;

    #[test]
    fn test_replays_matching_lines() {
        let file = spoofwatch_test::tempfile(
            "2018-10-15 21:49:50.1 10.0.0.1 $GPVTG,263.92,T,,M,36.590,N,67.764,K,A*3C\r\n\
             this line is noise\n\
             2018-10-15 21:49:51 PORT2 TEST\n",
        )
        .unwrap();
        let mut collector = Collector::default();
        LogSource::new(file.path()).run(&mut collector).unwrap();

        assert_eq!(collector.events.len(), 2);
        let (device_id, time, sentence) = &collector.events[0];
        assert_eq!(device_id, "10.0.0.1");
        assert_eq!(
            *time,
            Utc.with_ymd_and_hms(2018, 10, 15, 21, 49, 50).unwrap()
                + chrono::Duration::milliseconds(100)
        );
        assert_eq!(sentence, "$GPVTG,263.92,T,,M,36.590,N,67.764,K,A*3C");
        assert_eq!(collector.events[1].0, "PORT2");
        assert_eq!(collector.events[1].2, "TEST");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let mut collector = Collector::default();
        assert!(LogSource::new("/no/such/capture.log").run(&mut collector).is_err());
    }
}
