//! Configuration loading tests

use std::time::Duration;
use tandem::config::Config;
use tempfile::tempdir;

#[test]
fn test_missing_file_gives_defaults() {
    let dir = tempdir().unwrap();
    let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();

    assert_eq!(config.server.listen_addr.port(), 5001);
    assert_eq!(config.server.ws_path_prefix, "/ws/game/");
    assert_eq!(config.server.identity_cookie, "guest_id");
    assert_eq!(config.server.outbound_queue_capacity, 16);
    assert_eq!(config.store.channel_prefix, "game:");
    assert_eq!(config.store.session_ttl(), Duration::from_secs(86_400));
    assert_eq!(config.session.default_time_control, "5|3");
}

#[test]
fn test_partial_file_keeps_other_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[server]
listen_addr = "127.0.0.1:9000"
outbound_queue_capacity = 4

[store]
session_ttl_secs = 60
"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.server.listen_addr.to_string(), "127.0.0.1:9000");
    assert_eq!(config.server.outbound_queue_capacity, 4);
    assert_eq!(config.server.identity_cookie, "guest_id");
    assert_eq!(config.store.session_ttl(), Duration::from_secs(60));
    assert_eq!(config.store.channel_prefix, "game:");
}

#[test]
fn test_invalid_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[server\nlisten_addr = 5").unwrap();

    assert!(Config::load_from(&path).is_err());
}
