use ax_domain::config::Config;

#[test]
fn default_host_is_localhost() {
    let config = Config::default();
    assert_eq!(config.server.host, "127.0.0.1");
}

#[test]
fn explicit_host_parses() {
    let toml_str = r#"
[server]
host = "0.0.0.0"
port = 8089
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.host, "0.0.0.0");
}

#[test]
fn default_ipc_socket_path() {
    let config = Config::default();
    assert_eq!(config.ipc.socket_path, std::path::PathBuf::from("data/ax.sock"));
}

#[test]
fn default_taint_thresholds_are_ordered() {
    let config = Config::default();
    assert!(config.taint.paranoid_threshold < config.taint.balanced_threshold);
    assert!(config.taint.balanced_threshold < config.taint.yolo_threshold);
}
