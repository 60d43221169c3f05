//! IPL Store Library
//!
//! Snapshots of what is installed on a machine: the programs reported by the
//! uninstall registry and the importable modules available to a runtime.
//!
//! # Core Features Implemented
//!
//! ## Canonical Names (`canonical` module)
//! - `canonicalize()` - Strip versions, editions and architecture notes from display names
//! - `version_from()` - Recover a version number embedded in a display name
//! - `guid_from()` - Detect and normalize GUID-shaped registry keys
//!
//! ## Installed Program Lists (`ipl` module)
//! - `Ipl` - Programs unique by case-insensitive name plus a sorted module set
//! - Lookup: `get_names()`, `contains()`, `get_program()` (closest match)
//! - Mutation: `add_program()`, `remove_program()`, `add_modules()`, `remove_module()`, `clear()`
//! - Set algebra: `union()`, `difference()`, equality
//!
//! ## Snapshot Building (`registry` module)
//! - `SnapshotBuilder` - Build an `Ipl` from enumerator, module lister and environment collaborators
//! - `JsonFileEnumerator`, `DirectoryModuleLister`, `ProcessEnvironment` - Stock collaborators
//!
//! ## Persistence (`store` module)
//! - `SnapshotStore` - Append-only SQLite history keyed by snapshot date

pub mod canonical;
pub mod error;
pub mod ipl;
pub mod matcher;
pub mod program;
pub mod registry;
pub mod store;

pub use error::{IplError, Result};
pub use ipl::{AddMode, Ipl};
pub use matcher::MatchOptions;
pub use program::{NameFilter, ProgramRecord, RecordData, SilentInstall};
pub use registry::{RawEntry, SnapshotBuilder};
pub use store::{SnapshotInfo, SnapshotStore};
