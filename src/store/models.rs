use crate::db::ResultRow;
use uuid::Uuid;

/// One persisted `SimpleTags` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProfile {
    pub uuid: Uuid,
    pub name: Option<String>,
    pub tag: Option<String>,
    pub tag_prefix: Option<String>,
}

impl StoredProfile {
    /// Extract a row. Rows whose key is not a valid UUID are skipped.
    pub fn from_row(row: &ResultRow) -> Option<Self> {
        let uuid = row.get("uuid").and_then(|s| Uuid::parse_str(s).ok())?;
        Some(Self {
            uuid,
            name: row.get("name").map(str::to_string),
            tag: row.get("tag").map(str::to_string),
            tag_prefix: row.get("tagPrefix").map(str::to_string),
        })
    }
}
