use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

static EMBEDDED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"const json = '(.*?)'").expect("embedded listing pattern is valid")
});

#[derive(Debug, Error)]
pub enum ListingParseError {
    #[error("listing page has no embedded json")]
    MissingEmbeddedJson,
    #[error("embedded listing json is malformed: {0}")]
    MalformedJson(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One node of the remote tree as reported by a listing page.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Path relative to the listing root, always starting with `/`.
    pub uri: String,
    pub name: String,
    #[serde(rename = "isDirectory")]
    pub is_directory: bool,
}

impl RemoteEntry {
    pub fn kind(&self) -> EntryKind {
        if self.is_directory {
            EntryKind::Directory
        } else {
            EntryKind::File
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListingPayload {
    #[serde(rename = "fileList")]
    file_list: Vec<RemoteEntry>,
}

/// Extracts the directory entries embedded in a listing page.
///
/// The device renders the listing as `const json = '<payload>'` inside an
/// inline script; the first line carrying that assignment wins.
pub fn parse_listing(html: &str) -> Result<Vec<RemoteEntry>, ListingParseError> {
    let raw = html
        .lines()
        .find_map(|line| EMBEDDED_JSON.captures(line))
        .and_then(|captures| captures.get(1))
        .ok_or(ListingParseError::MissingEmbeddedJson)?;
    let payload: ListingPayload = serde_json::from_str(raw.as_str())?;
    Ok(payload.file_list)
}
