//! Monorepo detection and workspace discovery.
//!
//! Supports npm/yarn `workspaces`, `pnpm-workspace.yaml` and `lerna.json`.
//! Pattern expansion only understands the forms those tools use in practice:
//! `dir/*`, `dir/**` and exact paths.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::manifest::{ManifestSource, Scripts, MANIFEST_FILE};

const DEFAULT_PATTERN: &str = "packages/*";
const RECURSIVE_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceKind {
    Workspaces,
    Pnpm,
    Lerna,
}

/// How a monorepo declares its packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceConfig {
    pub kind: WorkspaceKind,
    pub patterns: Vec<String>,
    pub root: PathBuf,
}

/// One discovered sub-project.
#[derive(Debug, Clone)]
pub struct WorkspaceDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub relative_path: String,
    pub scripts: Scripts,
}

pub trait WorkspaceLocator {
    /// Returns `None` when `directory` is not a monorepo root.
    fn detect(&self, directory: &Path) -> Option<WorkspaceConfig>;
    /// Lists workspaces matched by `config`, sorted by name.
    fn find(&self, config: &WorkspaceConfig) -> Vec<WorkspaceDescriptor>;
}

/// Filesystem-backed locator reading manifests through a [`ManifestSource`].
#[derive(Debug, Clone)]
pub struct FsWorkspaceLocator<M> {
    manifests: M,
}

impl<M: ManifestSource> FsWorkspaceLocator<M> {
    pub fn new(manifests: M) -> Self {
        Self { manifests }
    }
}

#[derive(Debug, Deserialize)]
struct LernaJson {
    packages: Option<Vec<String>>,
}

impl<M: ManifestSource> WorkspaceLocator for FsWorkspaceLocator<M> {
    fn detect(&self, directory: &Path) -> Option<WorkspaceConfig> {
        let manifest = self.manifests.load(directory).ok()?;

        if let Some(field) = &manifest.workspaces {
            return Some(WorkspaceConfig {
                kind: WorkspaceKind::Workspaces,
                patterns: workspace_patterns(field),
                root: directory.to_path_buf(),
            });
        }

        let pnpm = directory.join("pnpm-workspace.yaml");
        if let Ok(raw) = std::fs::read_to_string(&pnpm) {
            return Some(WorkspaceConfig {
                kind: WorkspaceKind::Pnpm,
                patterns: parse_pnpm_packages(&raw),
                root: directory.to_path_buf(),
            });
        }

        let lerna = directory.join("lerna.json");
        if let Ok(raw) = std::fs::read_to_string(&lerna) {
            let parsed: LernaJson = match serde_json::from_str(&raw) {
                Ok(parsed) => parsed,
                Err(err) => {
                    debug!(path = %lerna.display(), error = %err, "ignoring unreadable lerna.json");
                    return None;
                }
            };
            return Some(WorkspaceConfig {
                kind: WorkspaceKind::Lerna,
                patterns: parsed
                    .packages
                    .unwrap_or_else(|| vec![DEFAULT_PATTERN.to_string()]),
                root: directory.to_path_buf(),
            });
        }

        None
    }

    fn find(&self, config: &WorkspaceConfig) -> Vec<WorkspaceDescriptor> {
        let mut workspaces: Vec<WorkspaceDescriptor> = Vec::new();
        for pattern in &config.patterns {
            for dir in expand_pattern(pattern, &config.root) {
                if workspaces.iter().any(|ws| ws.path == dir) {
                    continue;
                }
                if !dir.join(MANIFEST_FILE).is_file() {
                    continue;
                }
                match self.manifests.load(&dir) {
                    Ok(manifest) => {
                        let name = manifest.name.unwrap_or_else(|| dir_name(&dir));
                        workspaces.push(WorkspaceDescriptor {
                            name,
                            relative_path: relative_path(&dir, &config.root),
                            path: dir,
                            scripts: manifest.scripts,
                        });
                    }
                    Err(err) => debug!(path = %dir.display(), error = %err, "skipping workspace"),
                }
            }
        }
        workspaces.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        workspaces
    }
}

fn workspace_patterns(field: &Value) -> Vec<String> {
    let list: &[Value] = match field {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("packages") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };
    list.iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

/// Extracts the `packages:` list from `pnpm-workspace.yaml`.
fn parse_pnpm_packages(raw: &str) -> Vec<String> {
    let mut packages = Vec::new();
    let mut in_packages = false;
    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed == "packages:" {
            in_packages = true;
            continue;
        }
        if !in_packages {
            continue;
        }
        if let Some(item) = trimmed.strip_prefix('-') {
            let item = item.trim().trim_matches(|c| c == '\'' || c == '"');
            if !item.is_empty() {
                packages.push(item.to_string());
            }
        } else if !trimmed.is_empty() && !line.starts_with(' ') && !trimmed.starts_with('#') {
            break;
        }
    }
    if packages.is_empty() {
        packages.push(DEFAULT_PATTERN.to_string());
    }
    packages
}

fn expand_pattern(pattern: &str, root: &Path) -> Vec<PathBuf> {
    if let Some(base) = pattern.strip_suffix("/**") {
        return find_recursive(&root.join(base));
    }
    if let Some(base) = pattern.strip_suffix("/*") {
        let base = root.join(base);
        let Ok(entries) = std::fs::read_dir(&base) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|entry| entry.path())
            .collect();
        dirs.sort();
        return dirs;
    }
    let exact = root.join(pattern);
    if exact.exists() {
        vec![exact]
    } else {
        Vec::new()
    }
}

fn find_recursive(base: &Path) -> Vec<PathBuf> {
    if !base.is_dir() {
        return Vec::new();
    }
    let walker = WalkBuilder::new(base)
        .max_depth(Some(RECURSIVE_DEPTH))
        .hidden(true)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .ignore(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| entry.file_name() != OsStr::new("node_modules"))
        .build();
    walker
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.depth() > 0)
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.into_path())
        .filter(|path| path.join(MANIFEST_FILE).is_file())
        .collect()
}

fn relative_path(dir: &Path, root: &Path) -> String {
    dir.strip_prefix(root)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|_| dir.display().to_string())
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}
