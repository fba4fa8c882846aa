use super::*;

// =============================================================================
// parse_bool
// =============================================================================

#[test]
fn parse_bool_accepts_truthy_forms() {
    for raw in ["1", "true", "YES", " on "] {
        assert_eq!(parse_bool(raw), Some(true), "{raw}");
    }
}

#[test]
fn parse_bool_accepts_falsy_forms() {
    for raw in ["0", "false", "No", "off"] {
        assert_eq!(parse_bool(raw), Some(false), "{raw}");
    }
}

#[test]
fn parse_bool_rejects_garbage() {
    assert_eq!(parse_bool("maybe"), None);
    assert_eq!(parse_bool(""), None);
}

// =============================================================================
// GatewayConfig
// =============================================================================

#[test]
fn new_appends_trailing_slash() {
    let config = GatewayConfig::new(Url::parse("https://api.example.com/gateway").unwrap());
    assert_eq!(config.base.as_str(), "https://api.example.com/gateway/");
}

#[test]
fn new_keeps_existing_trailing_slash() {
    let config = GatewayConfig::new(Url::parse("https://api.example.com/").unwrap());
    assert_eq!(config.base.as_str(), "https://api.example.com/");
}

#[test]
fn cookie_secure_follows_scheme() {
    assert!(GatewayConfig::new(Url::parse("https://api.example.com").unwrap()).cookie_secure);
    assert!(!GatewayConfig::new(Url::parse("http://localhost:5000").unwrap()).cookie_secure);
}

#[test]
fn base_join_preserves_path_prefix() {
    let config = GatewayConfig::new(Url::parse("https://api.example.com/gateway").unwrap());
    let joined = config.base.join("users/me").unwrap();
    assert_eq!(joined.as_str(), "https://api.example.com/gateway/users/me");
}
