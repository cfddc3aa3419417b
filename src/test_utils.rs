//! Shared builders for unit tests.

use std::collections::BTreeMap;

use crate::config::GatewayConfig;
use crate::config::TargetConfig;
use crate::proto::gnmi::typed_value::Value;
use crate::proto::gnmi::Notification;
use crate::proto::gnmi::Path;
use crate::proto::gnmi::PathElem;
use crate::proto::gnmi::TypedValue;
use crate::proto::gnmi::Update;

pub(crate) fn make_path(segments: &[&str]) -> Path {
    Path {
        origin: String::new(),
        target: String::new(),
        elem: segments
            .iter()
            .map(|s| PathElem {
                name: s.to_string(),
                key: BTreeMap::new(),
            })
            .collect(),
    }
}

pub(crate) fn int_value(value: i64) -> TypedValue {
    TypedValue {
        value: Some(Value::IntVal(value)),
    }
}

pub(crate) fn int_update(segments: &[&str], value: i64) -> Update {
    Update {
        path: Some(make_path(segments)),
        val: Some(int_value(value)),
        duplicates: 0,
    }
}

pub(crate) fn int_notification(timestamp: i64, segments: &[&str], value: i64) -> Notification {
    Notification {
        timestamp,
        prefix: None,
        update: vec![int_update(segments, value)],
        delete: vec![],
    }
}

pub(crate) fn int_from_update(update: &Update) -> i64 {
    match update.val.as_ref().and_then(|v| v.value.as_ref()) {
        Some(Value::IntVal(v)) => *v,
        other => panic!("expected int value, got {other:?}"),
    }
}

pub(crate) fn target_config(name: &str, address: &str) -> TargetConfig {
    TargetConfig {
        name: name.to_string(),
        address: address.to_string(),
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
    }
}

pub(crate) fn config_with_targets(targets: &[(&str, &str)]) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    for (name, address) in targets {
        config
            .targets
            .insert(name.to_string(), target_config(name, address));
    }
    config
}
