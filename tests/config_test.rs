use std::io::Write;

use numclient::{AppError, ClientConfig};

#[test]
fn partial_file_keeps_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        r#"
[network]
host = "10.0.0.7"
port = 9001

[timing]
stop_grace_ms = 250
"#
    )
    .unwrap();

    let config = ClientConfig::set_up_config(file.path()).unwrap();
    assert_eq!(config.network.address(), "10.0.0.7:9001");
    assert_eq!(config.network.max_frame_size, 1024);
    assert_eq!(config.timing.stop_grace_ms, 250);
    assert_eq!(config.timing.number_interval_ms, 1500);
    assert_eq!(config.log.dir, "logs");
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = ClientConfig::set_up_config(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, ClientConfig::default());
}

#[test]
fn invalid_values_are_rejected() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[timing]\nnumber_interval_ms = 0").unwrap();
    assert!(matches!(
        ClientConfig::set_up_config(file.path()),
        Err(AppError::InvalidValue(_))
    ));
}
