//! Snapshot building from installed-software sources.
//!
//! The builder never touches the registry itself. It reads raw entries from
//! one or more [`SoftwareEnumerator`] sources, module names from a
//! [`ModuleLister`] and the owner name from an [`Environment`].
//!
//! # Sources
//!
//! On Windows the uninstall information lives under several keys, each of
//! which is usually exported and fed in as its own source:
//! - `HKCR\Installer\Products` (packed 32-digit product GUIDs)
//! - `HKLM\...\CurrentVersion\Uninstall`
//! - `HKCU\...\CurrentVersion\Uninstall`
//! - `HKLM\...\Wow6432Node\...\CurrentVersion\Uninstall`
//!
//! A failing source is logged and skipped; the others and the module listing
//! still go into the snapshot.

use crate::canonical::{canonicalize, guid_from, strip_non_ascii, version_from};
use crate::error::{IplError, Result};
use crate::{AddMode, Ipl, ProgramRecord};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One registry key as reported by an enumerator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    #[serde(rename = "RegistryName")]
    pub registry_name: String,
    #[serde(rename = "Values", default)]
    pub values: BTreeMap<String, String>,
}

impl RawEntry {
    pub fn new(registry_name: impl Into<String>) -> Self {
        Self {
            registry_name: registry_name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    fn value(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|value| strip_non_ascii(value))
    }
}

/// File extensions of importable modules
const MODULE_EXTENSIONS: [&str; 4] = ["py", "pyc", "pyd", "so"];

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first == '_' || first.is_alphabetic())
        && chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Source of raw installed-software entries
pub trait SoftwareEnumerator {
    fn enumerate(&self) -> anyhow::Result<Vec<RawEntry>>;
}

/// Source of top-level importable module names
pub trait ModuleLister {
    fn list_modules(&self) -> Vec<String>;
}

/// Host facts needed to label a snapshot
pub trait Environment {
    fn host_name(&self) -> String;
}

/// Reads entries from a JSON array such as an exported registry dump.
#[derive(Debug, Clone)]
pub struct JsonFileEnumerator {
    path: PathBuf,
}

impl JsonFileEnumerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SoftwareEnumerator for JsonFileEnumerator {
    fn enumerate(&self) -> anyhow::Result<Vec<RawEntry>> {
        let content = fs::read_to_string(&self.path)
            .context(format!("Failed to read entries file: {:?}", self.path))?;
        let entries = serde_json::from_str(&content)
            .context(format!("Malformed entries file: {:?}", self.path))?;
        Ok(entries)
    }
}

/// Fixed entries, mostly for tests and fixtures.
#[derive(Debug, Clone, Default)]
pub struct StaticEnumerator(pub Vec<RawEntry>);

impl SoftwareEnumerator for StaticEnumerator {
    fn enumerate(&self) -> anyhow::Result<Vec<RawEntry>> {
        Ok(self.0.clone())
    }
}

/// Lists the top-level importable names found in a set of search
/// directories. A file counts when it has a module extension (`json.py`,
/// `zlib.cp27.pyd`) and a directory when its name is an identifier
/// (`json/`). Names are cut at the first `.`; anything that is not an
/// identifier, bytecode caches and packaging metadata are skipped.
#[derive(Debug, Clone, Default)]
pub struct DirectoryModuleLister {
    roots: Vec<PathBuf>,
}

impl DirectoryModuleLister {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    fn scan_root(root: &Path) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        let entries =
            fs::read_dir(root).context(format!("Failed to read module directory: {:?}", root))?;

        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.starts_with('.')
                || file_name == "__pycache__"
                || file_name.ends_with(".dist-info")
                || file_name.ends_with(".egg-info")
            {
                continue;
            }

            let importable = if path.is_dir() {
                is_identifier(&file_name)
            } else {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| MODULE_EXTENSIONS.contains(&ext))
            };
            if !importable {
                continue;
            }

            let stem = file_name.split('.').next().unwrap_or_default();
            if is_identifier(stem) {
                names.push(stem.to_string());
            }
        }

        Ok(names)
    }
}

impl ModuleLister for DirectoryModuleLister {
    fn list_modules(&self) -> Vec<String> {
        let mut modules = BTreeSet::new();
        for root in &self.roots {
            // Skip directories that don't exist
            if !root.exists() {
                continue;
            }
            match Self::scan_root(root) {
                Ok(names) => modules.extend(names),
                Err(e) => warn!("Failed to scan module directory {:?}: {:#}", root, e),
            }
        }
        modules.into_iter().collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct StaticModuleLister(pub Vec<String>);

impl ModuleLister for StaticModuleLister {
    fn list_modules(&self) -> Vec<String> {
        self.0.clone()
    }
}

/// Host name from `COMPUTERNAME`, then `HOSTNAME`, else `localhost`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl Environment for ProcessEnvironment {
    fn host_name(&self) -> String {
        std::env::var("COMPUTERNAME")
            .or_else(|_| std::env::var("HOSTNAME"))
            .unwrap_or_else(|_| String::from("localhost"))
    }
}

#[derive(Debug, Clone)]
pub struct FixedEnvironment(pub String);

impl Environment for FixedEnvironment {
    fn host_name(&self) -> String {
        self.0.clone()
    }
}

/// Turn one raw entry into a program record.
pub fn record_from_entry(entry: &RawEntry) -> ProgramRecord {
    let guid = guid_from(&entry.registry_name);

    let usable = |key: &str| entry.value(key).filter(|value| !value.trim().is_empty());
    let named = match &guid {
        Some(_) => usable("DisplayName").or_else(|| usable("ProductName")),
        None => usable("DisplayName"),
    };

    // Names that strip down to nothing fall back to the key, then the GUID
    let raw_name = named.unwrap_or_else(|| {
        let has_name_value = entry.values.contains_key("DisplayName")
            || entry.values.contains_key("ProductName");
        let key_name = strip_non_ascii(&entry.registry_name);
        if guid.is_some() && !has_name_value {
            String::from("Not Found")
        } else if !key_name.trim().is_empty() {
            key_name
        } else {
            guid.clone()
                .filter(|guid| !guid.is_empty())
                .unwrap_or_else(|| String::from("Not Found"))
        }
    });

    let version = entry
        .value("DisplayVersion")
        .or_else(|| version_from(&raw_name));

    ProgramRecord {
        name: canonicalize(&raw_name),
        version,
        date: entry.value("InstallDate").unwrap_or_default(),
        location: entry.value("InstallLocation").unwrap_or_default(),
        guid: guid.unwrap_or_default(),
        ..ProgramRecord::default()
    }
}

/// Builds an [`Ipl`] from the live system.
pub struct SnapshotBuilder {
    environment: Box<dyn Environment>,
    sources: Vec<Box<dyn SoftwareEnumerator>>,
    modules: Option<Box<dyn ModuleLister>>,
}

impl SnapshotBuilder {
    pub fn new(environment: impl Environment + 'static) -> Self {
        Self {
            environment: Box::new(environment),
            sources: Vec::new(),
            modules: None,
        }
    }

    /// Add a software source. Sources are read in the order added, so
    /// earlier sources win name collisions.
    pub fn source(mut self, source: impl SoftwareEnumerator + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn modules(mut self, lister: impl ModuleLister + 'static) -> Self {
        self.modules = Some(Box::new(lister));
        self
    }

    fn collect(&self, entries: Vec<RawEntry>, ipl: &mut Ipl) {
        for entry in entries {
            let record = record_from_entry(&entry);
            if ipl.has_program(&record.name) {
                debug!(
                    "Skipping duplicate program {:?} from key {:?}",
                    record.name, entry.registry_name
                );
                continue;
            }
            let name = record.name.clone();
            if !ipl.add_program(record, AddMode::Keep) {
                debug!(
                    "Rejected program {:?} from key {:?}",
                    name, entry.registry_name
                );
            }
        }
    }

    /// All program records, failing on the first source that cannot be read.
    pub fn programs(&self) -> Result<Vec<ProgramRecord>> {
        let mut ipl = Ipl::new(String::new());
        for source in &self.sources {
            let entries = source
                .enumerate()
                .map_err(|e| IplError::Enumeration(format!("{e:#}")))?;
            self.collect(entries, &mut ipl);
        }
        Ok(ipl.programs().to_vec())
    }

    /// Build the snapshot. Unreadable sources are logged and contribute no
    /// programs.
    pub fn build(&self) -> Ipl {
        let mut ipl = Ipl::new(self.environment.host_name());

        for source in &self.sources {
            match source.enumerate() {
                Ok(entries) => self.collect(entries, &mut ipl),
                Err(e) => warn!("Failed to retrieve installed programs: {:#}", e),
            }
        }

        let modules = self
            .modules
            .as_ref()
            .map(|lister| lister.list_modules())
            .unwrap_or_default();
        debug!("Listed {} modules", modules.len());

        Ipl::from_parts(ipl.name().to_string(), ipl.programs().to_vec(), modules)
    }
}
