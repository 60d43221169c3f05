use serde::{Deserialize, Serialize};

/// Unattended installer that can reinstall a program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SilentInstall {
    Wpi,
    Ninite,
    Other,
}

/// Auxiliary payload attached to a program record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordData {
    #[default]
    None,
    Text(String),
    Bytes(Vec<u8>),
}

impl RecordData {
    /// True when there is no payload worth keeping.
    pub fn is_empty(&self) -> bool {
        match self {
            RecordData::None => true,
            RecordData::Text(text) => text.is_empty(),
            RecordData::Bytes(bytes) => bytes.is_empty(),
        }
    }
}

/// One installed application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub category: String,
    pub optional: bool,
    pub silent_install: Option<SilentInstall>,
    pub silent_install_tag: String,
    pub backup_required: bool,
    pub name: String,
    /// `None` when the version is unknown, `Some("")` when explicitly blank.
    pub version: Option<String>,
    pub date: String,
    pub location: String,
    #[serde(rename = "GUID")]
    pub guid: String,
    pub data: RecordData,
}

impl ProgramRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Key used for uniqueness and ordering inside an IPL.
    pub(crate) fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Copy every field of `other` into `self` where `self` holds an empty value.
    pub fn fill_missing(&mut self, other: &ProgramRecord) {
        if self.category.is_empty() {
            self.category = other.category.clone();
        }
        if !self.optional {
            self.optional = other.optional;
        }
        if self.silent_install.is_none() {
            self.silent_install = other.silent_install;
        }
        if self.silent_install_tag.is_empty() {
            self.silent_install_tag = other.silent_install_tag.clone();
        }
        if !self.backup_required {
            self.backup_required = other.backup_required;
        }
        if self.name.is_empty() {
            self.name = other.name.clone();
        }
        if self.version.as_deref().map_or(true, str::is_empty) {
            self.version = other.version.clone();
        }
        if self.date.is_empty() {
            self.date = other.date.clone();
        }
        if self.location.is_empty() {
            self.location = other.location.clone();
        }
        if self.guid.is_empty() {
            self.guid = other.guid.clone();
        }
        if self.data.is_empty() {
            self.data = other.data.clone();
        }
    }
}

/// Subset of programs returned by [`crate::Ipl::get_names`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NameFilter {
    #[default]
    All,
    /// Programs without a silent installer
    Manual,
    /// Programs with any silent installer
    Silent,
    Ninite,
    /// Programs carrying a silent install tag
    Tagged,
}

impl NameFilter {
    pub fn matches(&self, record: &ProgramRecord) -> bool {
        match self {
            NameFilter::All => true,
            NameFilter::Manual => record.silent_install.is_none(),
            NameFilter::Silent => record.silent_install.is_some(),
            NameFilter::Ninite => record.silent_install == Some(SilentInstall::Ninite),
            NameFilter::Tagged => !record.silent_install_tag.is_empty(),
        }
    }
}
