use crate::plugin::{Capabilities, SitePlugin};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where a module came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleOrigin {
    /// Loaded from a `module.toml` in this directory
    Discovered(PathBuf),

    /// Registered programmatically
    Builtin,
}

/// A loaded site module: metadata plus the plugin that implements it
///
/// Descriptors are immutable for the duration of a run and cheap to clone.
#[derive(Clone)]
pub struct ModuleDescriptor {
    pub name: String,
    pub display_name: String,
    pub base_url: String,
    pub base_domain: String,
    pub capabilities: Capabilities,
    pub origin: ModuleOrigin,
    plugin: Arc<dyn SitePlugin>,
}

impl ModuleDescriptor {
    /// Snapshots a plugin's metadata under the given module name
    pub fn new(name: impl Into<String>, plugin: Arc<dyn SitePlugin>, origin: ModuleOrigin) -> Self {
        Self {
            name: name.into(),
            display_name: plugin.display_name().to_string(),
            base_url: plugin.base_url().to_string(),
            base_domain: plugin.base_domain().to_string(),
            capabilities: plugin.capabilities(),
            origin,
            plugin,
        }
    }

    pub fn plugin(&self) -> &Arc<dyn SitePlugin> {
        &self.plugin
    }

    /// Validation messages for this module, one per missing item
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.base_url.trim().is_empty() {
            problems.push("Missing base-url".to_string());
        }
        if self.base_domain.trim().is_empty() {
            problems.push("Missing base-domain".to_string());
        }
        for capability in self.capabilities.missing() {
            problems.push(format!("Missing capability: {capability}"));
        }
        problems
    }

    pub fn is_valid(&self) -> bool {
        self.problems().is_empty()
    }
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("name", &self.name)
            .field("display_name", &self.display_name)
            .field("base_url", &self.base_url)
            .field("base_domain", &self.base_domain)
            .field("capabilities", &self.capabilities)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}
