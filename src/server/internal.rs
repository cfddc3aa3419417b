//! Self-describing path namespace.
//!
//! Get requests whose paths carry the reserved `gnmic` origin are answered
//! from the gateway's own configuration instead of being fanned out south.
//! Recognized top-level elements are `targets` and `subscriptions`, each
//! optionally narrowed with a `name=<x>` key.

use std::collections::BTreeMap;

use crate::config::SubscriptionConfig;
use crate::config::TargetConfig;
use crate::constants::INTERNAL_ORIGIN;
use crate::proto::gnmi::typed_value::Value;
use crate::proto::gnmi::Encoding;
use crate::proto::gnmi::GetRequest;
use crate::proto::gnmi::GetResponse;
use crate::proto::gnmi::Notification;
use crate::proto::gnmi::Path;
use crate::proto::gnmi::PathElem;
use crate::proto::gnmi::ScalarArray;
use crate::proto::gnmi::TypedValue;
use crate::proto::gnmi::Update;
use crate::utils::path::path_elems;
use crate::utils::time::now_nanos;
use crate::Error;
use crate::Result;

use super::Gateway;

impl Gateway {
    /// Serves a Get request addressed entirely to the `gnmic` origin.
    pub(crate) fn internal_get(&self, request: &GetRequest) -> Result<GetResponse> {
        let config = self.config.read();
        let encoding = request.encoding();
        let mut notifications = Vec::with_capacity(request.path.len());

        for path in &request.path {
            for elem in &path_elems(request.prefix.as_ref(), path) {
                match elem.name.as_str() {
                    "targets" => {
                        if let Some(wanted) = elem.key.get("name") {
                            if let Some(tc) =
                                config.targets.values().find(|tc| &tc.name == wanted)
                            {
                                notifications
                                    .extend(target_config_to_notification(tc, encoding));
                            }
                        } else if elem.key.is_empty() {
                            for tc in config.targets.values() {
                                notifications
                                    .extend(target_config_to_notification(tc, encoding));
                            }
                        }
                    }
                    "subscriptions" => {
                        if let Some(wanted) = elem.key.get("name") {
                            if let Some(sc) =
                                config.subscriptions.values().find(|sc| &sc.name == wanted)
                            {
                                notifications
                                    .extend(subscription_config_to_notification(sc, encoding));
                            }
                        } else if elem.key.is_empty() {
                            for sc in config.subscriptions.values() {
                                notifications
                                    .extend(subscription_config_to_notification(sc, encoding));
                            }
                        }
                    }
                    other => {
                        return Err(Error::InvalidRequest(format!(
                            "unknown path element {other:?}"
                        )))
                    }
                }
            }
        }

        Ok(GetResponse {
            notification: notifications,
        })
    }
}

fn internal_keyed_path(elem_name: &str, name: &str) -> Path {
    Path {
        origin: INTERNAL_ORIGIN.to_string(),
        elem: vec![PathElem {
            name: elem_name.to_string(),
            key: BTreeMap::from([("name".to_string(), name.to_string())]),
        }],
        target: String::new(),
    }
}

fn attribute_path(name: &str) -> Path {
    Path {
        elem: vec![PathElem {
            name: name.to_string(),
            key: BTreeMap::new(),
        }],
        ..Default::default()
    }
}

fn scalar_value(value: String, encoding: Encoding) -> TypedValue {
    let value = match encoding {
        Encoding::Bytes => Value::BytesVal(value.into_bytes()),
        _ => Value::AsciiVal(value),
    };
    TypedValue { value: Some(value) }
}

fn scalar_update(name: &str, value: String, encoding: Encoding) -> Update {
    Update {
        path: Some(attribute_path(name)),
        val: Some(scalar_value(value, encoding)),
        duplicates: 0,
    }
}

fn leaflist_update(name: &str, values: &[String], encoding: Encoding) -> Update {
    let element = values
        .iter()
        .map(|v| scalar_value(v.clone(), encoding))
        .collect();
    Update {
        path: Some(attribute_path(name)),
        val: Some(TypedValue {
            value: Some(Value::LeaflistVal(ScalarArray { element })),
        }),
        duplicates: 0,
    }
}

/// Renders one target configuration in the requested encoding. Unsupported
/// encodings produce no notification.
pub(crate) fn target_config_to_notification(
    tc: &TargetConfig,
    encoding: Encoding,
) -> Option<Notification> {
    match encoding {
        Encoding::Json | Encoding::JsonIetf => {
            let json = serde_json::to_vec(tc).ok()?;
            Some(Notification {
                timestamp: now_nanos(),
                prefix: None,
                update: vec![Update {
                    path: Some(internal_keyed_path("target", &tc.name)),
                    val: Some(TypedValue {
                        value: Some(Value::JsonVal(json)),
                    }),
                    duplicates: 0,
                }],
                delete: vec![],
            })
        }
        Encoding::Bytes | Encoding::Ascii => {
            let mut updates = vec![scalar_update("address", tc.address.clone(), encoding)];
            if let Some(username) = &tc.username {
                updates.push(scalar_update("username", username.clone(), encoding));
            }
            if let Some(insecure) = tc.insecure {
                updates.push(scalar_update("insecure", insecure.to_string(), encoding));
            }
            if let Some(skip_verify) = tc.skip_verify {
                updates.push(scalar_update("skip-verify", skip_verify.to_string(), encoding));
            }
            updates.push(scalar_update(
                "timeout",
                format!("{}s", tc.timeout_in_secs),
                encoding,
            ));
            for (attr, value) in [
                ("tls-ca", &tc.tls_ca),
                ("tls-cert", &tc.tls_cert),
                ("tls-key", &tc.tls_key),
            ] {
                if let Some(value) = value {
                    if value != "NA" {
                        updates.push(scalar_update(attr, value.clone(), encoding));
                    }
                }
            }
            if !tc.outputs.is_empty() {
                updates.push(leaflist_update("outputs", &tc.outputs, encoding));
            }
            if !tc.subscriptions.is_empty() {
                updates.push(leaflist_update("subscriptions", &tc.subscriptions, encoding));
            }
            Some(Notification {
                timestamp: now_nanos(),
                prefix: Some(internal_keyed_path("target", &tc.name)),
                update: updates,
                delete: vec![],
            })
        }
        Encoding::Proto => None,
    }
}

/// Renders one subscription profile. Only the JSON encodings are supported;
/// anything else produces no notification.
pub(crate) fn subscription_config_to_notification(
    sc: &SubscriptionConfig,
    encoding: Encoding,
) -> Option<Notification> {
    match encoding {
        Encoding::Json | Encoding::JsonIetf => {
            let json = serde_json::to_vec(sc).ok()?;
            Some(Notification {
                timestamp: now_nanos(),
                prefix: None,
                update: vec![Update {
                    path: Some(internal_keyed_path("subscriptions", &sc.name)),
                    val: Some(TypedValue {
                        value: Some(Value::JsonVal(json)),
                    }),
                    duplicates: 0,
                }],
                delete: vec![],
            })
        }
        _ => None,
    }
}
