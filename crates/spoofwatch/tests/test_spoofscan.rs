use spoofwatch_test::{CommandExt, tool};

const CONFIG: &str = r#"{
    "device_ids": ["10.0.0.1"],
    "methods": ["PhysicalSpeedLimitMethod"],
    "options": {"max_speed": 50}
}"#;

const BASELINE: &str =
    "2018-08-18 16:48:24.0 10.0.0.1 $GPRMC,164824.00,A,5049.65778,N,00722.80053,E,36.793,265.08,180818,,,A*50";
const SPEEDING: &str =
    "2018-08-18 16:48:25.0 10.0.0.1 $GPRMC,164825.00,A,5049.65778,N,00722.80053,E,55.000,265.08,180818,,,A*59";
const CRUISING: &str =
    "2018-08-18 16:48:25.0 10.0.0.1 $GPRMC,164825.00,A,5049.65778,N,00722.80053,E,36.900,265.08,180818,,,A*55";

#[test]
fn test_speeding_capture_alerts() {
    let config = spoofwatch_test::tempfile(CONFIG).unwrap();
    let capture = spoofwatch_test::tempfile(format!("{BASELINE}\n{SPEEDING}\n")).unwrap();

    let output = tool!("spoofscan")
        .arg("--config")
        .arg(config.path())
        .arg("--format=log")
        .arg(capture.path())
        .captured_output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1);
    let alert = stdout.lines().next().unwrap();
    assert!(alert.contains("10.0.0.1"), "{alert}");
    assert!(alert.contains("physical-speed-limit"), "{alert}");
    assert!(alert.contains("1.000"), "{alert}");
    assert!(alert.contains("55.000"), "{alert}");
}

#[test]
fn test_clean_capture_is_silent() {
    let config = spoofwatch_test::tempfile(CONFIG).unwrap();
    let capture = spoofwatch_test::tempfile(format!("{BASELINE}\n{CRUISING}\n")).unwrap();

    let output = tool!("spoofscan")
        .arg("--config")
        .arg(config.path())
        .arg("--format=log")
        .arg(capture.path())
        .captured_output()
        .unwrap();

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_calibration_parameters_are_printed() {
    let config = spoofwatch_test::tempfile(CONFIG).unwrap();
    let capture = spoofwatch_test::tempfile(format!("{BASELINE}\n{CRUISING}\n")).unwrap();

    let output = tool!("spoofscan")
        .arg("--config")
        .arg(config.path())
        .arg("--format=log")
        .arg("--calibrate")
        .arg(capture.path())
        .captured_output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("physical-speed-limit"), "{stdout}");
    assert!(stdout.contains("max_speed"), "{stdout}");
    assert!(stdout.contains("36.9"), "{stdout}");
}

#[test]
fn test_orbit_positions_against_bundled_catalog() {
    let catalog = concat!(env!("CARGO_MANIFEST_DIR"), "/resources/gps.tle");
    let config = spoofwatch_test::tempfile(format!(
        r#"{{
            "device_ids": ["10.0.0.1"],
            "methods": ["OrbitPositionsMethod"],
            "options": {{
                "min_elevation": 5,
                "allowed_azimuth_deviation": 180,
                "allowed_elevation_deviation": 180,
                "tle_catalog": "{catalog}"
            }}
        }}"#
    ))
    .unwrap();
    // A fix to place the observer, then two sky snapshots of catalog satellite
    // 18: the first establishes the baseline, the second gets evaluated
    let capture = spoofwatch_test::tempfile(format!(
        "2018-08-18 16:48:24.0 10.0.0.1 {GGA}\n\
         2018-08-18 16:48:25.0 10.0.0.1 $GPGSV,1,1,01,18,00,100,40*44\n\
         2018-08-18 16:48:26.0 10.0.0.1 $GPGSV,1,1,01,18,01,100,40*45\n",
        GGA = "$GPGGA,164824.00,5049.65778,N,00722.80053,E,1,11,1.32,101.7,M,46.8,M,,*56",
    ))
    .unwrap();

    let output = tool!("spoofscan")
        .arg("--config")
        .arg(config.path())
        .arg("--format=log")
        .arg(capture.path())
        .captured_output()
        .unwrap();

    assert!(output.status.success());
    // The reported elevation sits below the configured minimum while the
    // deviation allowances are impossible to exceed, so the one evaluated
    // snapshot must alert with indicator 1
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 1, "{stdout}");
    let alert = stdout.lines().next().unwrap();
    assert!(alert.contains("orbit-positions"), "{alert}");
    assert!(alert.contains("1.000"), "{alert}");
}

#[test]
fn test_dataset_scoring() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("spoofed.log"), format!("{BASELINE}\n{SPEEDING}\n")).unwrap();
    std::fs::write(dir.path().join("clean.log"), format!("{BASELINE}\n{CRUISING}\n")).unwrap();
    let index = r#"[
        {"filename": "spoofed.log", "label": "spoofed"},
        {"filename": "clean.log", "label": "unspoofed"}
    ]"#;
    let index_path = dir.path().join("dataset.json");
    std::fs::write(&index_path, index).unwrap();
    let config = spoofwatch_test::tempfile(CONFIG).unwrap();

    let output = tool!("spoofscan")
        .arg("--config")
        .arg(config.path())
        .arg("--format=log")
        .arg("--dataset")
        .arg(&index_path)
        .captured_output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("precision: 1.000"), "{stdout}");
    assert!(stdout.contains("recall: 1.000"), "{stdout}");
    assert!(stdout.contains("f1: 1.000"), "{stdout}");
}

#[test]
fn test_missing_config_fails() {
    let capture = spoofwatch_test::tempfile(format!("{BASELINE}\n")).unwrap();
    let output = tool!("spoofscan")
        .arg("--config=/no/such/config.json")
        .arg(capture.path())
        .captured_output()
        .unwrap();
    assert!(!output.status.success());
}
