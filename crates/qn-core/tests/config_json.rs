use qn_core::config::DEFAULT_INTEGRATION_HORIZON;
use qn_core::{QnError, SystemConfiguration};

#[test]
fn deserializes_canonical_keys() {
    let json = r#"{
        "arrival_rate": 10.0,
        "service_rate": 5.0,
        "number_of_servers": 4,
        "client_counts": [1, 2, 3],
        "integration_horizon": 60.0
    }"#;

    let cfg: SystemConfiguration = serde_json::from_str(json).unwrap();
    assert_eq!(cfg.arrival_rate, 10.0);
    assert_eq!(cfg.service_rate, 5.0);
    assert_eq!(cfg.number_of_servers, 4);
    assert_eq!(cfg.client_counts, vec![1, 2, 3]);
    assert_eq!(cfg.integration_horizon, 60.0);
    cfg.validate().unwrap();
}

#[test]
fn accepts_legacy_rate_keys_and_defaults_horizon() {
    let json = r#"{
        "lambda_rate": 1.5,
        "mu_rate": 0.5,
        "number_of_servers": 1,
        "client_counts": [10]
    }"#;

    let cfg: SystemConfiguration = serde_json::from_str(json).unwrap();
    assert_eq!(cfg.arrival_rate, 1.5);
    assert_eq!(cfg.service_rate, 0.5);
    assert_eq!(cfg.integration_horizon, DEFAULT_INTEGRATION_HORIZON);
}

#[test]
fn invalid_document_fails_validation_not_parsing() {
    let json = r#"{
        "arrival_rate": 1.0,
        "service_rate": 1.0,
        "number_of_servers": 0,
        "client_counts": [1]
    }"#;

    let cfg: SystemConfiguration = serde_json::from_str(json).unwrap();
    assert!(matches!(
        cfg.validate(),
        Err(QnError::InvalidParameter { .. })
    ));
}

#[test]
fn roundtrip_preserves_configuration() {
    let cfg = SystemConfiguration::with_client_range(2.0, 3.0, 2, 1..=4).with_integration_horizon(120.0);
    let text = serde_json::to_string(&cfg).unwrap();
    let back: SystemConfiguration = serde_json::from_str(&text).unwrap();
    assert_eq!(cfg, back);
}
