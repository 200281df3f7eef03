//! Module registry
//!
//! Site modules live in subdirectories of a module root, one directory per source:
//!
//! ```text
//! modules/
//!   www_caixin_com/module.toml
//!   www_zaobao_com/module.toml
//! ```
//!
//! The directory name is the module name. Compiled-in plugins can be registered next to the
//! discovered ones.

mod descriptor;

pub use descriptor::{ModuleDescriptor, ModuleOrigin};

use crate::plugin::{ModuleManifest, SelectorPlugin, SitePlugin, MANIFEST_FILE};
use crate::RegistryError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A module candidate that could not be loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadFailure {
    pub name: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of the registry contents
#[derive(Debug, Clone, Default)]
pub struct ModuleStatistics {
    pub total: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Validation messages of each invalid module
    pub errors: BTreeMap<String, Vec<String>>,
    pub load_failures: Vec<LoadFailure>,
}

/// Discovers, validates and hands out site modules
pub struct ModuleRegistry {
    root: PathBuf,
    user_agent: String,
    modules: BTreeMap<String, ModuleDescriptor>,
    failures: Vec<LoadFailure>,
}

impl ModuleRegistry {
    /// Creates an empty registry scanning `root`
    ///
    /// `user_agent` is handed to every plugin loaded from a manifest.
    pub fn new(root: impl Into<PathBuf>, user_agent: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            user_agent: user_agent.into(),
            modules: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registers a compiled-in plugin under its own name, replacing any module of that name
    pub fn register(&mut self, plugin: Arc<dyn SitePlugin>) {
        let name = plugin.name().to_string();
        tracing::debug!("Registered built-in module {}", name);
        self.modules
            .insert(name.clone(), ModuleDescriptor::new(name, plugin, ModuleOrigin::Builtin));
    }

    /// Scans the module root and returns every known module
    ///
    /// Each call re-scans from scratch: discovered entries are replaced by name and load
    /// failures are recorded anew. A failing candidate never stops the scan.
    pub fn discover(&mut self) -> Vec<ModuleDescriptor> {
        self.failures.clear();
        self.modules
            .retain(|_, module| module.origin == ModuleOrigin::Builtin);

        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() == std::io::ErrorKind::NotFound {
                    let missing = RegistryError::MissingDirectory(self.root.display().to_string());
                    tracing::warn!("{}", missing);
                } else {
                    tracing::warn!("Failed to read module directory {}: {}", self.root.display(), e);
                }
                return self.list();
            }
        };

        let mut candidates: Vec<(String, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_dir())
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?.to_string();
                if name.starts_with('_') || name.starts_with('.') {
                    return None;
                }
                Some((name, path))
            })
            .filter(|(_, path)| path.join(MANIFEST_FILE).is_file())
            .collect();
        candidates.sort();

        for (name, path) in candidates {
            match self.load_module(&name, &path) {
                Ok(descriptor) => {
                    tracing::debug!("Discovered module {} at {}", name, path.display());
                    self.modules.insert(name, descriptor);
                }
                Err(e) => {
                    tracing::warn!("Failed to load module {}: {}", name, e);
                    self.failures.push(LoadFailure {
                        name,
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Discovered {} modules ({} load failures)",
            self.modules.len(),
            self.failures.len()
        );

        self.list()
    }

    fn load_module(&self, name: &str, dir: &Path) -> Result<ModuleDescriptor, RegistryError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let content = std::fs::read_to_string(&manifest_path).map_err(|source| RegistryError::Io {
            path: manifest_path.display().to_string(),
            source,
        })?;
        let manifest =
            ModuleManifest::from_toml(&content).map_err(|source| RegistryError::Manifest {
                path: manifest_path.display().to_string(),
                source,
            })?;
        let plugin = SelectorPlugin::from_manifest(name, &manifest, &self.user_agent).map_err(
            |source| RegistryError::Plugin {
                name: name.to_string(),
                source,
            },
        )?;

        Ok(ModuleDescriptor::new(
            name,
            Arc::new(plugin),
            ModuleOrigin::Discovered(dir.to_path_buf()),
        ))
    }

    /// Checks one module; unknown names are invalid with a single message
    pub fn validate(&self, name: &str) -> (bool, Vec<String>) {
        match self.modules.get(name) {
            Some(module) => {
                let problems = module.problems();
                (problems.is_empty(), problems)
            }
            None => (
                false,
                vec![RegistryError::UnknownModule(name.to_string()).to_string()],
            ),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.modules.get(name)
    }

    /// All known modules, valid or not, ordered by name
    pub fn list(&self) -> Vec<ModuleDescriptor> {
        self.modules.values().cloned().collect()
    }

    pub fn valid_modules(&self) -> Vec<ModuleDescriptor> {
        self.modules
            .values()
            .filter(|module| module.is_valid())
            .cloned()
            .collect()
    }

    pub fn load_failures(&self) -> &[LoadFailure] {
        &self.failures
    }

    pub fn statistics(&self) -> ModuleStatistics {
        let errors: BTreeMap<String, Vec<String>> = self
            .modules
            .values()
            .filter_map(|module| {
                let problems = module.problems();
                (!problems.is_empty()).then(|| (module.name.clone(), problems))
            })
            .collect();

        ModuleStatistics {
            total: self.modules.len(),
            valid: self.modules.len() - errors.len(),
            invalid: errors.len(),
            errors,
            load_failures: self.failures.clone(),
        }
    }

    /// Fetches a module's base URL once and reports the outcome
    ///
    /// Uses the blocking fetch; call it outside of an async context.
    pub fn test_connectivity(&self, name: &str, timeout: Duration) -> (bool, String) {
        let Some(module) = self.modules.get(name) else {
            return (false, RegistryError::UnknownModule(name.to_string()).to_string());
        };
        if module.base_url.trim().is_empty() {
            return (false, "Missing base-url".to_string());
        }

        match module.plugin().fetch(&module.base_url, timeout) {
            Ok(Some(body)) => (
                true,
                format!("Fetched {} bytes from {}", body.len(), module.base_url),
            ),
            Ok(None) => (false, format!("Empty response from {}", module.base_url)),
            Err(e) => (false, e.to_string()),
        }
    }
}
