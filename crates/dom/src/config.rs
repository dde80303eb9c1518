//! Engine configuration, loadable from TOML.
//!
//! ```toml
//! allowed_nodes = ["menu", "menuitem"]
//! event_handlers = true
//! href_components = false
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Element allow-list; empty accepts every element.
    pub allowed_nodes: Vec<String>,
    /// Installs the `on*` attribute rewrite to `callCompoHandler`.
    pub event_handlers: bool,
    /// Installs the scheme-less `href` rewrite to `compo://`.
    pub href_components: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            allowed_nodes: Vec::new(),
            event_handlers: true,
            href_components: true,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&source)
    }
}
