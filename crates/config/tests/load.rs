use app_config::AppConfig;
use std::time::Duration;

#[test]
fn test_load_default_config() {
    let cfg = AppConfig::load().unwrap();
    assert_eq!(cfg.db_port, 5432);
    assert_eq!(cfg.http_port, 8080);
    assert_eq!(cfg.assistant_timeout, Duration::from_secs(25));
    // No key configured by default; the assistant must degrade, not crash.
    assert!(cfg.assistant_api_key.is_empty());
}
