use std::collections::BTreeMap;

use super::path::*;
use crate::proto::gnmi::Path;
use crate::proto::gnmi::PathElem;

fn elem(name: &str) -> PathElem {
    PathElem {
        name: name.to_string(),
        key: BTreeMap::new(),
    }
}

fn keyed_elem(name: &str, keys: &[(&str, &str)]) -> PathElem {
    PathElem {
        name: name.to_string(),
        key: keys
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    }
}

#[test]
fn elem_strings_should_append_key_values_in_key_order() {
    let elems = vec![
        keyed_elem("interface", &[("name", "eth0")]),
        elem("state"),
        keyed_elem("counter", &[("z", "2"), ("a", "1")]),
    ];

    assert_eq!(
        elem_strings(&elems),
        vec!["interface", "eth0", "state", "counter", "1", "2"]
    );
}

#[test]
fn to_strings_should_prepend_target_when_requested() {
    let path = Path {
        origin: String::new(),
        elem: vec![elem("a"), elem("b")],
        target: "r1".to_string(),
    };

    assert_eq!(to_strings(Some(&path), true), vec!["r1", "a", "b"]);
    assert_eq!(to_strings(Some(&path), false), vec!["a", "b"]);
    assert_eq!(to_strings(None, true), vec![String::new()]);
}

#[test]
fn complete_path_should_join_prefix_and_path() {
    let prefix = Path {
        elem: vec![elem("a")],
        ..Default::default()
    };
    let path = Path {
        elem: vec![elem("b"), elem("c")],
        ..Default::default()
    };

    assert_eq!(
        complete_path(Some(&prefix), Some(&path)),
        vec!["a", "b", "c"]
    );
    assert_eq!(complete_path(None, Some(&path)), vec!["b", "c"]);
}

#[test]
fn get_host_should_strip_ports() {
    assert_eq!(get_host("1.1.1.1:57400"), "1.1.1.1");
    assert_eq!(get_host("router1"), "router1");
    assert_eq!(get_host("router1:57400"), "router1");
    assert_eq!(get_host("[2001:db8::1]:57400"), "2001:db8::1");
    assert_eq!(get_host("2001:db8::1"), "2001:db8::1");
}
