//! Reading runnable scripts out of a project's `package.json`.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{RunnerError, RunnerResult};

pub const MANIFEST_FILE: &str = "package.json";
const UNKNOWN_PROJECT: &str = "unknown";

/// A single runnable script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptEntry {
    pub name: String,
    pub command: String,
    pub description: Option<String>,
}

/// Scripts of one project, in manifest order with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scripts {
    entries: Vec<ScriptEntry>,
}

impl Scripts {
    /// Builds a script set, letting a later duplicate name replace the earlier one.
    pub fn new(entries: impl IntoIterator<Item = ScriptEntry>) -> Self {
        let mut scripts = Self::default();
        for entry in entries {
            match scripts.entries.iter_mut().find(|e| e.name == entry.name) {
                Some(existing) => *existing = entry,
                None => scripts.entries.push(entry),
            }
        }
        scripts
    }

    pub fn get(&self, name: &str) -> Option<&ScriptEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the runner needs from a manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    /// The `name` field, when the manifest declares one.
    pub name: Option<String>,
    pub version: String,
    pub scripts: Scripts,
    /// Raw `workspaces` field, consumed by workspace detection.
    pub workspaces: Option<Value>,
}

impl Manifest {
    pub fn project_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_PROJECT)
    }
}

/// Source of project manifests.
pub trait ManifestSource {
    fn load(&self, directory: &Path) -> RunnerResult<Manifest>;
}

/// Reads `package.json` files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageJsonSource;

impl ManifestSource for PackageJsonSource {
    fn load(&self, directory: &Path) -> RunnerResult<Manifest> {
        let path = directory.join(MANIFEST_FILE);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(RunnerError::ManifestNotFound {
                    path: directory.to_path_buf(),
                })
            }
            Err(err) => return Err(err.into()),
        };
        parse_manifest(&raw).map_err(|source| RunnerError::ManifestMalformed { path, source })
    }
}

#[derive(Debug, Deserialize)]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    scripts: Map<String, Value>,
    #[serde(rename = "scriptsDescriptions")]
    scripts_descriptions: Option<Map<String, Value>>,
    #[serde(rename = "scripts-info")]
    scripts_info: Option<Map<String, Value>>,
    workspaces: Option<Value>,
}

/// Parses manifest text. Non-string script values are skipped.
pub fn parse_manifest(raw: &str) -> Result<Manifest, serde_json::Error> {
    let pkg: PackageJson = serde_json::from_str(raw)?;
    let descriptions: HashMap<String, String> = pkg
        .scripts_descriptions
        .or(pkg.scripts_info)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(name, value)| value.as_str().map(|text| (name, text.to_string())))
        .collect();
    let scripts = Scripts::new(pkg.scripts.into_iter().filter_map(|(name, value)| {
        let command = value.as_str()?.to_string();
        let description = descriptions.get(&name).cloned();
        Some(ScriptEntry {
            name,
            command,
            description,
        })
    }));
    Ok(Manifest {
        name: pkg.name,
        version: pkg.version.unwrap_or_else(|| "0.0.0".to_string()),
        scripts,
        workspaces: pkg.workspaces,
    })
}
