//! Path rendering helpers shared by the cache, the match index and the
//! subscription engine.
//!
//! A wire path is rendered to string segments the same way everywhere: each
//! element contributes its name followed by its key values in key order, so
//! `interface[name=eth0]/state` becomes `["interface", "eth0", "state"]`.

use crate::proto::gnmi::Path;
use crate::proto::gnmi::PathElem;

/// Renders a slice of path elements to match/cache segments.
pub(crate) fn elem_strings(elems: &[PathElem]) -> Vec<String> {
    let mut out = Vec::with_capacity(elems.len());
    for elem in elems {
        out.push(elem.name.clone());
        for value in elem.key.values() {
            out.push(value.clone());
        }
    }
    out
}

/// Renders a path to segments, optionally prefixed with its target tag.
pub(crate) fn to_strings(path: Option<&Path>, include_target: bool) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(p) = path {
        if include_target {
            out.push(p.target.clone());
        }
        out.extend(elem_strings(&p.elem));
    } else if include_target {
        out.push(String::new());
    }
    out
}

/// Full cache path for a subscription item: prefix segments followed by the
/// item path segments, target excluded.
pub(crate) fn complete_path(prefix: Option<&Path>, path: Option<&Path>) -> Vec<String> {
    let mut out = to_strings(prefix, false);
    out.extend(to_strings(path, false));
    out
}

/// Concatenated prefix and path elements, for requests resolved structurally
/// rather than through the string-segment index.
pub(crate) fn path_elems(prefix: Option<&Path>, path: &Path) -> Vec<PathElem> {
    let mut out = Vec::new();
    if let Some(p) = prefix {
        out.extend(p.elem.iter().cloned());
    }
    out.extend(path.elem.iter().cloned());
    out
}

/// Strips the port from a target address. Accepts `host:port`,
/// `[v6-host]:port` and bare hosts.
pub(crate) fn get_host(address: &str) -> &str {
    if let Some(rest) = address.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(address);
    }
    match address.rsplit_once(':') {
        // a second colon means an unbracketed IPv6 literal, leave it whole
        Some((host, _)) if !host.contains(':') => host,
        _ => address,
    }
}
