use spoofwatch_test::{CommandExt, tool};

#[test]
fn test_requires_a_source() {
    let output = tool!("spoofwatch")
        .arg("--record=out.log")
        .captured_output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Nothing to listen to"), "{stderr}");
}

#[test]
fn test_requires_config_unless_recording() {
    let output = tool!("spoofwatch")
        .arg("--udp=127.0.0.1:0")
        .captured_output()
        .unwrap();
    // Clap rejects the invocation before anything starts listening
    assert!(!output.status.success());
}
