//! Symbolic target selection.
//!
//! A target token is either empty / `"*"` (all configured targets) or a
//! comma-separated list of host tokens, each matched against the configured
//! addresses with their ports stripped. The matched subset is cloned under
//! the shared config lock and the lock is released before any south-side
//! dialling.

use std::collections::BTreeMap;

use crate::config::TargetConfig;
use crate::Error;
use crate::Result;

use super::Gateway;

impl Gateway {
    /// Resolves a symbolic target token to the configurations it names.
    pub(crate) fn select_targets(&self, spec: &str) -> Result<BTreeMap<String, TargetConfig>> {
        let config = self.config.read();

        if spec.is_empty() || spec == "*" {
            if config.targets.is_empty() {
                return Err(Error::TargetNotFound(spec.to_string()));
            }
            return Ok(config.targets.clone());
        }

        let mut selected = BTreeMap::new();
        'tokens: for token in spec.split(',') {
            for (name, target) in config.targets.iter() {
                if target.host() == token {
                    selected.insert(name.clone(), target.clone());
                    continue 'tokens;
                }
            }
            return Err(Error::TargetNotFound(token.to_string()));
        }
        Ok(selected)
    }
}
