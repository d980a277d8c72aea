use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const IDENTIFIER_LEN: usize = 5;
pub const NAME_SEPARATOR: char = '_';
pub const PARTIAL_PREFIX: &str = ".partial-";
/// NAME_MAX on common filesystems, in bytes.
pub const MAX_DISK_NAME_LEN: usize = 255;
pub const MAX_ORIGINAL_NAME_LEN: usize = MAX_DISK_NAME_LEN - IDENTIFIER_LEN - 1;

/// A stored upload. Everything about it lives in its on-disk name:
/// `<identifier>_<original_name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub identifier: String,
    pub original_name: String,
}

impl StoredFile {
    pub fn new(identifier: String, original_name: String) -> Self {
        Self {
            identifier,
            original_name,
        }
    }

    /// Fresh record for `original_name` with a newly generated identifier.
    pub fn generate(original_name: &str) -> Self {
        Self::new(generate_identifier(), original_name.to_string())
    }

    pub fn disk_name(&self) -> String {
        format!("{}{}{}", self.identifier, NAME_SEPARATOR, self.original_name)
    }

    /// Splits a directory entry name at the first separator.
    ///
    /// Returns `None` for partial uploads and for names without a separator.
    pub fn from_disk_name(disk_name: &str) -> Option<Self> {
        if disk_name.starts_with(PARTIAL_PREFIX) {
            return None;
        }

        let (identifier, original_name) = disk_name.split_once(NAME_SEPARATOR)?;
        Some(Self::new(identifier.to_string(), original_name.to_string()))
    }

    /// Path of this record relative to `base`, e.g. `http://host:8080`.
    pub fn url(&self, base: &str) -> String {
        format!(
            "{}/file/{}/{}",
            base.trim_end_matches('/'),
            urlencoding::encode(&self.identifier),
            urlencoding::encode(&self.original_name)
        )
    }

    /// Whether this pair can name an entry directly inside the storage root.
    pub fn is_addressable(&self) -> bool {
        !self.identifier.is_empty()
            && !self.identifier.contains(NAME_SEPARATOR)
            && !self.identifier.starts_with('.')
            && is_flat_name(&self.original_name)
            && self.disk_name().len() <= MAX_DISK_NAME_LEN
    }
}

pub fn generate_identifier() -> String {
    Uuid::new_v4().to_string()[..IDENTIFIER_LEN].to_string()
}

pub fn partial_name() -> String {
    format!("{}{}", PARTIAL_PREFIX, Uuid::new_v4())
}

/// Upload names must leave room for the identifier prefix.
pub fn is_valid_original_name(name: &str) -> bool {
    is_flat_name(name) && name.len() <= MAX_ORIGINAL_NAME_LEN
}

fn is_flat_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
