use serial_test::serial;
use temp_env::with_vars;

use super::*;

#[test]
fn default_config_should_initialize_with_hardcoded_values() {
    let config = GatewayConfig::default();

    assert_eq!(config.server.address, "0.0.0.0:57400");
    assert_eq!(config.server.max_subscriptions, 64);
    assert_eq!(config.server.max_unary_rpc, 64);
    assert!(!config.server.enable_metrics);
    assert!(!config.server.tls_requested());
    assert!(config.targets.is_empty());
}

#[test]
#[serial]
fn new_should_merge_environment_overrides() {
    with_vars(
        vec![
            ("GNMI_GATEWAY__SERVER__MAX_UNARY_RPC", Some("7")),
            ("GNMI_GATEWAY__SERVER__SKIP_VERIFY", Some("true")),
        ],
        || {
            let config = GatewayConfig::new().unwrap();

            assert_eq!(config.server.max_unary_rpc, 7);
            assert!(config.server.skip_verify);
            assert!(config.server.tls_requested());
        },
    );
}

#[test]
#[serial]
fn config_file_should_populate_targets_with_backfilled_names() {
    let temp_dir = tempfile::tempdir().unwrap();
    let config_path = temp_dir.path().join("gateway.toml");

    std::fs::write(
        &config_path,
        r#"
        [server]
        address = "127.0.0.1:57401"

        [targets."r1"]
        address = "1.1.1.1:57400"

        [targets."r2"]
        address = "2.2.2.2:57400"
        name = "edge-2"
        "#,
    )
    .unwrap();

    with_vars(
        vec![("CONFIG_PATH", Some(config_path.to_str().unwrap()))],
        || {
            let config = GatewayConfig::new().unwrap();

            assert_eq!(config.server.address, "127.0.0.1:57401");
            assert_eq!(config.targets.len(), 2);
            assert_eq!(config.targets["r1"].name, "r1");
            assert_eq!(config.targets["r1"].timeout_in_secs, 10);
            assert_eq!(config.targets["r2"].name, "edge-2");
        },
    );
}

#[test]
fn validation_should_reject_lone_cert_file() {
    let mut config = GatewayConfig::default();
    config.server.cert_file = "/tmp/server.pem".into();

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_target_without_address() {
    let mut config = GatewayConfig::default();
    config.targets.insert(
        "r1".into(),
        TargetConfig {
            name: "r1".into(),
            address: String::new(),
            username: None,
            password: None,
            insecure: None,
            skip_verify: None,
            timeout_in_secs: 10,
            tls_ca: None,
            tls_cert: None,
            tls_key: None,
            outputs: vec![],
            subscriptions: vec![],
        },
    );

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_unknown_subscription_mode() {
    let mut config = GatewayConfig::default();
    config.subscriptions.insert(
        "sub1".into(),
        SubscriptionConfig {
            name: "sub1".into(),
            paths: vec!["/a/b".into()],
            mode: "continuous".into(),
            stream_mode: None,
            sample_interval_in_secs: None,
            heartbeat_interval_in_secs: None,
            encoding: None,
        },
    );

    assert!(config.validate().is_err());
}

#[test]
fn target_host_should_strip_port() {
    let target = TargetConfig {
        name: "r1".into(),
        address: "1.1.1.1:57400".into(),
        username: None,
        password: None,
        insecure: None,
        skip_verify: None,
        timeout_in_secs: 10,
        tls_ca: None,
        tls_cert: None,
        tls_key: None,
        outputs: vec![],
        subscriptions: vec![],
    };

    assert_eq!(target.host(), "1.1.1.1");
}
