use serde::{Deserialize, Serialize};

use crate::domain::models::file::StoredFile;

/// `{url, name}` as returned by upload and listing.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FileResponse {
    pub url: String,
    pub name: String,
}

impl FileResponse {
    pub fn new(file: &StoredFile, base_url: &str) -> Self {
        Self {
            url: file.url(base_url),
            name: file.original_name.clone(),
        }
    }
}
