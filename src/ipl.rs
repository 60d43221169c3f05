//! The Installed Program List aggregate.
//!
//! An [`Ipl`] owns a list of [`ProgramRecord`]s, unique by case-insensitive
//! name and kept sorted by it, plus a sorted set of module names. Every
//! successful mutation bumps the `modified` timestamp.

use crate::error::Result;
use crate::matcher::{closest_bounded, MatchOptions};
use crate::program::{NameFilter, ProgramRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// UTC time with microseconds. Fixed width and free of DST jumps, so string
/// order is time order.
pub fn timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.6fZ")
        .to_string()
}

/// How [`Ipl::add_program`] treats a record whose name is already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddMode {
    /// The existing record wins
    #[default]
    Keep,
    /// The new record takes the place of the existing one
    Replace,
    /// Empty fields of the existing record are filled from the new one
    Update,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "StoredIpl")]
pub struct Ipl {
    name: String,
    date: String,
    modified: String,
    programs: Vec<ProgramRecord>,
    modules: BTreeSet<String>,
}

/// Wire shape of an [`Ipl`]. Decoded programs go back through
/// [`Ipl::from_parts`] so a hand-edited or foreign blob still ends up sorted
/// and unique.
#[derive(Deserialize)]
struct StoredIpl {
    name: String,
    date: String,
    modified: String,
    programs: Vec<ProgramRecord>,
    modules: BTreeSet<String>,
}

impl From<StoredIpl> for Ipl {
    fn from(stored: StoredIpl) -> Self {
        let mut ipl = Ipl::from_parts(stored.name, stored.programs, stored.modules);
        ipl.date = stored.date;
        ipl.modified = stored.modified;
        ipl
    }
}

impl Ipl {
    /// Empty IPL owned by `name` (usually the host name).
    pub fn new(name: impl Into<String>) -> Self {
        let date = timestamp();
        Self {
            name: name.into(),
            modified: date.clone(),
            date,
            programs: Vec::new(),
            modules: BTreeSet::new(),
        }
    }

    /// IPL seeded with explicit collections. When names collide the first
    /// record wins.
    pub fn from_parts<P, M, S>(name: impl Into<String>, programs: P, modules: M) -> Self
    where
        P: IntoIterator<Item = ProgramRecord>,
        M: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ipl = Self::new(name);
        for record in programs {
            ipl.add_program(record, AddMode::Keep);
        }
        ipl.modules.extend(modules.into_iter().map(Into::into));
        ipl.modified = ipl.date.clone();
        ipl
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creation time
    pub fn date(&self) -> &str {
        &self.date
    }

    /// Time of the last successful mutation
    pub fn modified(&self) -> &str {
        &self.modified
    }

    pub fn programs(&self) -> &[ProgramRecord] {
        &self.programs
    }

    pub fn modules(&self) -> &BTreeSet<String> {
        &self.modules
    }

    /// Number of programs
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    fn touch(&mut self) {
        self.modified = timestamp();
    }

    /// Index of the program named `name` (case-insensitive), or where it
    /// would be inserted.
    fn position(&self, name: &str) -> std::result::Result<usize, usize> {
        let key = name.to_lowercase();
        self.programs.binary_search_by(|record| record.key().cmp(&key))
    }

    pub(crate) fn has_program(&self, name: &str) -> bool {
        self.position(name).is_ok()
    }

    /// Program names in case-insensitive ascending order.
    pub fn get_names(&self, filter: NameFilter) -> Vec<String> {
        self.programs
            .iter()
            .filter(|record| filter.matches(record))
            .map(|record| record.name.clone())
            .collect()
    }

    /// True if `term` occurs (case-insensitively) in any program or module name.
    pub fn contains(&self, term: &str) -> bool {
        let term = term.to_lowercase();
        self.programs
            .iter()
            .any(|record| record.name.to_lowercase().contains(&term))
            || self
                .modules
                .iter()
                .any(|module| module.to_lowercase().contains(&term))
    }

    /// Exact module lookup.
    pub fn has_module(&self, name: &str) -> bool {
        self.modules.contains(name)
    }

    /// Program whose name is closest to `approx_name`, using the default
    /// cutoff schedule.
    pub fn get_program(&self, approx_name: &str) -> Result<Option<&ProgramRecord>> {
        self.get_program_with(approx_name, MatchOptions::default())
    }

    /// Like [`Ipl::get_program`] with an explicit cutoff schedule. Returns
    /// `Ok(None)` when the IPL holds no programs.
    pub fn get_program_with(
        &self,
        approx_name: &str,
        options: MatchOptions,
    ) -> Result<Option<&ProgramRecord>> {
        if self.programs.is_empty() {
            return Ok(None);
        }
        let keys: Vec<String> = self.programs.iter().map(ProgramRecord::key).collect();
        let hit = closest_bounded(&approx_name.to_lowercase(), &keys, options)?;
        Ok(self.programs.iter().find(|record| record.key() == hit))
    }

    /// Add `record`, resolving a name collision according to `mode`.
    /// Returns whether the name is present afterwards.
    pub fn add_program(&mut self, record: ProgramRecord, mode: AddMode) -> bool {
        if record.name.is_empty() {
            return false;
        }

        match self.position(&record.name) {
            Err(index) => {
                self.programs.insert(index, record);
                self.touch();
            }
            Ok(index) => match mode {
                AddMode::Keep => {}
                AddMode::Replace => {
                    self.programs[index] = record;
                    self.touch();
                }
                AddMode::Update => {
                    self.programs[index].fill_missing(&record);
                    self.touch();
                }
            },
        }

        true
    }

    /// Remove the program named `name` (case-insensitive). Returns whether
    /// the name is absent afterwards.
    pub fn remove_program(&mut self, name: &str) -> bool {
        if let Ok(index) = self.position(name) {
            self.programs.remove(index);
            self.touch();
        }
        !self.has_program(name)
    }

    pub fn add_module(&mut self, name: impl Into<String>) -> bool {
        self.add_modules(std::iter::once(name))
    }

    /// Insert each module name not already present. Returns whether every
    /// given name is now in the module set.
    pub fn add_modules<I, S>(&mut self, names: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut inserted = false;
        for name in &names {
            inserted |= self.modules.insert(name.clone());
        }
        if inserted {
            self.touch();
        }
        names.iter().all(|name| self.modules.contains(name))
    }

    /// Returns whether `name` is absent afterwards.
    pub fn remove_module(&mut self, name: &str) -> bool {
        if self.modules.remove(name) {
            self.touch();
        }
        !self.modules.contains(name)
    }

    /// Drop all programs and modules.
    pub fn clear(&mut self) -> &mut Self {
        self.programs.clear();
        self.modules.clear();
        self.touch();
        self
    }

    /// All of self's entries plus those of `other` whose names are not
    /// already present. Self wins on collisions.
    pub fn union(&self, other: &Ipl) -> Ipl {
        let mut merged = Ipl::new(self.name.clone());
        merged.programs = self.programs.clone();
        merged.modules = self.modules.clone();
        for record in &other.programs {
            if let Err(index) = merged.position(&record.name) {
                merged.programs.insert(index, record.clone());
            }
        }
        merged.modules.extend(other.modules.iter().cloned());
        merged
    }

    /// Self's programs that do not appear verbatim in `other`, and self's
    /// modules not named in `other`.
    pub fn difference(&self, other: &Ipl) -> Ipl {
        let mut diff = Ipl::new(self.name.clone());
        diff.programs = self
            .programs
            .iter()
            .filter(|record| !other.programs.contains(record))
            .cloned()
            .collect();
        diff.modules = self.modules.difference(&other.modules).cloned().collect();
        diff
    }
}

/// Two IPLs are equal when their programs and modules are; owner and
/// timestamps are ignored.
impl PartialEq for Ipl {
    fn eq(&self, other: &Self) -> bool {
        self.programs == other.programs && self.modules == other.modules
    }
}

impl fmt::Display for Ipl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "IPL for {} with {} programs installed.",
            self.name,
            self.programs.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IplError;
    use crate::program::SilentInstall;
    use std::thread::sleep;
    use std::time::Duration;

    fn sample() -> Ipl {
        Ipl::from_parts(
            "HOST",
            ["joseph", "joe", "joel"].into_iter().map(ProgramRecord::new),
            ["os", "re"],
        )
    }

    #[test]
    fn test_add_program_to_empty() {
        let mut ipl = Ipl::new("HOST");
        assert!(ipl.add_program(ProgramRecord::new("Test Program"), AddMode::Keep));
        assert!(ipl.contains("Test Program"));
        assert_eq!(ipl.get_names(NameFilter::All), vec!["Test Program"]);
    }

    #[test]
    fn test_add_program_keeps_existing() {
        let mut ipl = Ipl::new("HOST");
        let mut first = ProgramRecord::new("Foo");
        first.category = "Tools".to_string();
        ipl.add_program(first, AddMode::Keep);

        let mut second = ProgramRecord::new("FOO");
        second.category = "Games".to_string();
        assert!(ipl.add_program(second, AddMode::Keep));

        assert_eq!(ipl.len(), 1);
        assert_eq!(ipl.programs()[0].name, "Foo");
        assert_eq!(ipl.programs()[0].category, "Tools");
    }

    #[test]
    fn test_add_program_replace() {
        let mut ipl = Ipl::new("HOST");
        ipl.add_program(ProgramRecord::new("Foo"), AddMode::Keep);
        let mut newer = ProgramRecord::new("Foo");
        newer.version = Some("2.0".to_string());
        assert!(ipl.add_program(newer.clone(), AddMode::Replace));
        assert_eq!(ipl.programs(), &[newer]);
    }

    #[test]
    fn test_add_program_update_fills_blanks() {
        let mut ipl = Ipl::new("HOST");
        let mut old = ProgramRecord::new("Foo");
        old.location = r"C:\Foo".to_string();
        ipl.add_program(old, AddMode::Keep);

        let mut new = ProgramRecord::new("Foo");
        new.location = r"D:\Foo".to_string();
        new.silent_install = Some(SilentInstall::Wpi);
        ipl.add_program(new, AddMode::Update);

        let record = &ipl.programs()[0];
        assert_eq!(record.location, r"C:\Foo");
        assert_eq!(record.silent_install, Some(SilentInstall::Wpi));
    }

    #[test]
    fn test_add_program_rejects_empty_name() {
        let mut ipl = Ipl::new("HOST");
        assert!(!ipl.add_program(ProgramRecord::default(), AddMode::Keep));
        assert!(ipl.is_empty());
    }

    #[test]
    fn test_names_sorted_case_insensitively() {
        let ipl = Ipl::from_parts(
            "HOST",
            ["beta", "Alpha", "gamma", "Delta"].into_iter().map(ProgramRecord::new),
            Vec::<String>::new(),
        );
        assert_eq!(ipl.get_names(NameFilter::All), vec!["Alpha", "beta", "Delta", "gamma"]);
    }

    #[test]
    fn test_get_names_filtered() {
        let mut ipl = Ipl::new("HOST");
        let mut ninite = ProgramRecord::new("Chrome");
        ninite.silent_install = Some(SilentInstall::Ninite);
        ipl.add_program(ninite, AddMode::Keep);
        ipl.add_program(ProgramRecord::new("Photoshop"), AddMode::Keep);

        assert_eq!(ipl.get_names(NameFilter::Ninite), vec!["Chrome"]);
        assert_eq!(ipl.get_names(NameFilter::Manual), vec!["Photoshop"]);
    }

    #[test]
    fn test_remove_program() {
        let mut ipl = Ipl::new("HOST");
        ipl.add_program(ProgramRecord::new("Test"), AddMode::Keep);
        assert!(ipl.contains("Test"));
        assert!(ipl.remove_program("test"));
        assert!(!ipl.contains("Test"));
        assert!(ipl.remove_program("missing"));
    }

    #[test]
    fn test_add_modules_sorted_and_idempotent() {
        let mut ipl = Ipl::from_parts("HOST", Vec::<ProgramRecord>::new(), ["a"]);
        assert!(ipl.add_modules(["b", "c"]));
        assert!(ipl.add_module("a"));
        assert!(ipl.add_module("b"));
        let modules: Vec<&str> = ipl.modules().iter().map(String::as_str).collect();
        assert_eq!(modules, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_remove_module() {
        let mut ipl = Ipl::new("HOST");
        ipl.add_module("a");
        assert!(ipl.has_module("a"));
        assert!(ipl.remove_module("a"));
        assert!(!ipl.has_module("a"));
    }

    #[test]
    fn test_contains_checks_modules() {
        let ipl = sample();
        assert!(ipl.contains("OS"));
        assert!(ipl.contains("JOS"));
        assert!(!ipl.contains("python"));
    }

    #[test]
    fn test_get_program_closest() {
        let ipl = sample();
        assert_eq!(ipl.get_program("jo").unwrap().unwrap().name, "joe");
        assert_eq!(ipl.get_program("JOS").unwrap().unwrap().name, "joseph");
    }

    #[test]
    fn test_get_program_empty_and_ambiguous() {
        assert!(Ipl::new("HOST").get_program("jo").unwrap().is_none());
        let err = sample().get_program("zzzz").unwrap_err();
        assert!(matches!(err, IplError::AmbiguousMatch { .. }));
    }

    #[test]
    fn test_mutations_bump_modified() {
        let mut ipl = Ipl::new("HOST");
        let created = ipl.modified().to_string();
        sleep(Duration::from_millis(2));
        ipl.add_module("a");
        let after_add = ipl.modified().to_string();
        assert!(after_add > created);

        sleep(Duration::from_millis(2));
        ipl.add_module("a");
        assert_eq!(ipl.modified(), after_add);

        sleep(Duration::from_millis(2));
        ipl.clear();
        assert!(ipl.modified() > after_add.as_str());
        assert_eq!(ipl.date(), created);
    }

    #[test]
    fn test_clear_chains() {
        let mut ipl = sample();
        assert_eq!(ipl.clear().len(), 0);
        assert!(ipl.modules().is_empty());
    }

    #[test]
    fn test_union_self_wins() {
        let mut a = Ipl::new("A");
        let mut mine = ProgramRecord::new("Foo");
        mine.version = Some("1".to_string());
        a.add_program(mine.clone(), AddMode::Keep);
        a.add_module("x");

        let mut b = Ipl::new("B");
        let mut theirs = ProgramRecord::new("foo");
        theirs.version = Some("2".to_string());
        b.add_program(theirs, AddMode::Keep);
        b.add_program(ProgramRecord::new("Bar"), AddMode::Keep);
        b.add_module("y");

        let merged = a.union(&b);
        assert_eq!(merged.name(), "A");
        assert_eq!(merged.get_names(NameFilter::All), vec!["Bar", "Foo"]);
        assert_eq!(merged.programs()[1], mine);
        assert!(merged.has_module("x") && merged.has_module("y"));
    }

    #[test]
    fn test_union_with_self_is_identity() {
        let a = sample();
        assert_eq!(a.union(&a), a);
    }

    #[test]
    fn test_difference_is_structural_for_programs() {
        let a = sample();
        let mut b = sample();
        let mut changed = ProgramRecord::new("joe");
        changed.version = Some("1.0".to_string());
        b.add_program(changed, AddMode::Replace);
        b.remove_module("re");

        let diff = a.difference(&b);
        assert_eq!(diff.get_names(NameFilter::All), vec!["joe"]);
        assert_eq!(diff.modules().iter().map(String::as_str).collect::<Vec<_>>(), vec!["re"]);

        let restored = b.union(&a.difference(&b));
        for record in a.programs() {
            assert!(restored.contains(&record.name));
        }
    }

    #[test]
    fn test_equality_ignores_timestamps() {
        let a = Ipl::new("A");
        sleep(Duration::from_millis(2));
        let b = Ipl::new("B");
        assert_eq!(a, b);
        assert_ne!(a, sample());
    }

    #[test]
    fn test_timestamp_is_fixed_width_utc() {
        let stamp = timestamp();
        assert_eq!(stamp.len(), "2026-01-01T00:00:00.000000Z".len());
        assert!(stamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
    }

    #[test]
    fn test_decoding_restores_order_and_uniqueness() {
        let ipl = sample();
        let mut value = serde_json::to_value(&ipl).unwrap();
        let programs = value["programs"].as_array_mut().unwrap();
        programs.reverse();
        let duplicate = programs[0].clone();
        programs.push(duplicate);

        let decoded: Ipl = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, ipl);
        assert_eq!(decoded.date(), ipl.date());
        assert_eq!(decoded.modified(), ipl.modified());

        let mut decoded = decoded;
        assert_eq!(decoded.get_program("joseph").unwrap().unwrap().name, "joseph");
        assert!(decoded.remove_program("joe"));
        assert_eq!(decoded.get_names(NameFilter::All), vec!["joel", "joseph"]);
    }

    #[test]
    fn test_display() {
        assert_eq!(sample().to_string(), "IPL for HOST with 3 programs installed.");
    }
}
