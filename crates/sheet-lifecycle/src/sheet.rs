//! Sheet records held by the manager

use std::sync::Arc;

use chrono::{DateTime, Utc};
use form_actions_core::{AttachedAction, SheetInspection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller-facing description of a registered sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetSummary {
    pub id: Uuid,
    pub original_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub size_bytes: usize,
    pub page_count: u32,
    pub field_count: usize,
    pub action_count: usize,
    pub helper_installed: bool,
}

/// Immutable view of a sheet at one point in time.
///
/// Readers clone the `Arc` and never observe a buffer mid-edit; an attach
/// builds a whole new snapshot and swaps it in.
#[derive(Debug)]
pub(crate) struct Snapshot {
    pub bytes: Arc<Vec<u8>>,
    pub actions: Arc<Vec<AttachedAction>>,
    pub inspection: SheetInspection,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(bytes: Vec<u8>, actions: Vec<AttachedAction>, inspection: SheetInspection) -> Self {
        Self {
            bytes: Arc::new(bytes),
            actions: Arc::new(actions),
            inspection,
            updated_at: Utc::now(),
        }
    }

    /// The snapshot that follows a successful attach.
    pub fn with_action(&self, bytes: Vec<u8>, action: AttachedAction, inspection: SheetInspection) -> Self {
        let mut actions = Vec::with_capacity(self.actions.len() + 1);
        actions.extend(self.actions.iter().cloned());
        actions.push(action);
        Self::new(bytes, actions, inspection)
    }
}

pub(crate) fn summarize(id: Uuid, original_name: &str, created_at: DateTime<Utc>, snapshot: &Snapshot) -> SheetSummary {
    SheetSummary {
        id,
        original_name: original_name.to_string(),
        created_at,
        updated_at: snapshot.updated_at,
        size_bytes: snapshot.bytes.len(),
        page_count: snapshot.inspection.page_count,
        field_count: snapshot.inspection.field_count,
        action_count: snapshot.actions.len(),
        helper_installed: snapshot.inspection.helper_installed,
    }
}

/// Accepts `name.pdf` style upload names; rejects empty names and paths.
pub(crate) fn valid_file_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty()
        && !trimmed.contains(['/', '\\'])
        && trimmed != ".pdf"
        && trimmed.to_ascii_lowercase().ends_with(".pdf")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        assert!(valid_file_name("Character Sheet.pdf"));
        assert!(valid_file_name("sheet.PDF"));
        assert!(!valid_file_name(""));
        assert!(!valid_file_name(".pdf"));
        assert!(!valid_file_name("sheet.txt"));
        assert!(!valid_file_name("../sheet.pdf"));
        assert!(!valid_file_name("dir\\sheet.pdf"));
    }
}
