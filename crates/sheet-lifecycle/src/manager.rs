//! Sheet Lifecycle Manager
//!
//! Tracks every uploaded sheet with its current bytes and the log of actions
//! attached through this manager. Edits to one sheet run one at a time under
//! that sheet's writer lock; reads work from the last published snapshot and
//! never wait on an edit in progress.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use form_actions_core::{
    attach_action, extract_fields, extract_fields_with_geometry, inspect, list_attached_actions,
    ActionRecipe, AttachedAction, DocumentAction, EngineOptions, FormField,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::SheetError;
use crate::sheet::{summarize, valid_file_name, SheetSummary, Snapshot};
use crate::storage::{FsSheetStorage, SheetStorage};

struct SheetSlot {
    original_name: String,
    created_at: DateTime<Utc>,
    /// Held for the whole read-edit-persist-publish sequence of an attach.
    writer: Mutex<()>,
    current: RwLock<Arc<Snapshot>>,
}

impl SheetSlot {
    async fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&*self.current.read().await)
    }
}

pub struct SheetManager {
    storage: Arc<dyn SheetStorage>,
    options: EngineOptions,
    sheets: RwLock<HashMap<Uuid, Arc<SheetSlot>>>,
}

impl SheetManager {
    pub fn new(storage: Arc<dyn SheetStorage>) -> Self {
        Self::with_options(storage, EngineOptions::default())
    }

    pub fn with_options(storage: Arc<dyn SheetStorage>, options: EngineOptions) -> Self {
        Self {
            storage,
            options,
            sheets: RwLock::new(HashMap::new()),
        }
    }

    /// Manager over `<data_dir>/<uuid>.pdf` files.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(Arc::new(FsSheetStorage::new(config)))
    }

    pub fn storage(&self) -> &Arc<dyn SheetStorage> {
        &self.storage
    }

    async fn slot(&self, id: Uuid) -> Result<Arc<SheetSlot>, SheetError> {
        self.sheets
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SheetError::NotFound(id))
    }

    /// Validate, persist and register a new sheet.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(&self, original_name: &str, bytes: Vec<u8>) -> Result<SheetSummary, SheetError> {
        if !valid_file_name(original_name) {
            return Err(SheetError::InvalidFileName);
        }
        let inspection = inspect(&bytes)?;
        let actions = recognized_actions(&bytes)?;

        let id = Uuid::new_v4();
        self.storage.save(id, &bytes).await?;
        let summary = self
            .register(id, original_name.trim().to_string(), Snapshot::new(bytes, actions, inspection))
            .await;
        info!(sheet = %id, fields = summary.field_count, "sheet uploaded");
        Ok(summary)
    }

    /// Register a sheet that is already in storage, rebuilding its action log
    /// from the calculations found in the document.
    #[instrument(skip(self), fields(sheet = %id))]
    pub async fn restore(&self, id: Uuid) -> Result<SheetSummary, SheetError> {
        if let Ok(existing) = self.summary(id).await {
            return Ok(existing);
        }
        let bytes = self.storage.load(id).await?;
        let inspection = inspect(&bytes)?;
        let actions = recognized_actions(&bytes)?;
        let summary = self
            .register(id, format!("{}.pdf", id), Snapshot::new(bytes, actions, inspection))
            .await;
        info!(actions = summary.action_count, "sheet restored");
        Ok(summary)
    }

    async fn register(&self, id: Uuid, original_name: String, snapshot: Snapshot) -> SheetSummary {
        let created_at = Utc::now();
        let summary = summarize(id, &original_name, created_at, &snapshot);
        let slot = Arc::new(SheetSlot {
            original_name,
            created_at,
            writer: Mutex::new(()),
            current: RwLock::new(Arc::new(snapshot)),
        });
        self.sheets.write().await.entry(id).or_insert(slot);
        summary
    }

    #[instrument(skip(self), fields(sheet = %id))]
    pub async fn fields(&self, id: Uuid) -> Result<Vec<FormField>, SheetError> {
        let snapshot = self.slot(id).await?.snapshot().await;
        Ok(extract_fields(&snapshot.bytes)?)
    }

    #[instrument(skip(self), fields(sheet = %id))]
    pub async fn fields_with_geometry(&self, id: Uuid) -> Result<Vec<FormField>, SheetError> {
        let snapshot = self.slot(id).await?.snapshot().await;
        Ok(extract_fields_with_geometry(&snapshot.bytes)?)
    }

    /// Resolve and install `recipe`, persist the result, then publish it.
    ///
    /// The log entry and the new buffer become visible together, and only
    /// after the edit and the storage write both succeeded.
    #[instrument(skip(self, recipe), fields(sheet = %id, kind = %recipe.kind(), target = ?recipe.target_field()))]
    pub async fn attach(&self, id: Uuid, recipe: &ActionRecipe) -> Result<AttachedAction, SheetError> {
        let slot = self.slot(id).await?;
        let _writer = slot.writer.lock().await;
        // Deleted while this call waited for the writer lock.
        if !self.sheets.read().await.contains_key(&id) {
            return Err(SheetError::NotFound(id));
        }

        let current = slot.snapshot().await;
        let resolved = form_actions_core::resolve(recipe)?;
        let bytes = form_actions_core::attach_resolved(&current.bytes, &resolved, &self.options)?;
        let inspection = inspect(&bytes)?;

        if let Err(e) = self.storage.save(id, &bytes).await {
            warn!(error = %e, "persisting attached action failed; keeping previous buffer");
            return Err(e);
        }

        let action = resolved.record;
        let next = current.with_action(bytes, action.clone(), inspection);
        *slot.current.write().await = Arc::new(next);
        info!(actions = current.actions.len() + 1, "action attached");
        Ok(action)
    }

    /// Attached actions in the order they were applied.
    #[instrument(skip(self), fields(sheet = %id))]
    pub async fn list_actions(&self, id: Uuid) -> Result<Vec<AttachedAction>, SheetError> {
        let snapshot = self.slot(id).await?.snapshot().await;
        Ok(snapshot.actions.as_ref().clone())
    }

    /// Calculations currently stored in the document itself.
    #[instrument(skip(self), fields(sheet = %id))]
    pub async fn document_actions(&self, id: Uuid) -> Result<Vec<DocumentAction>, SheetError> {
        let snapshot = self.slot(id).await?.snapshot().await;
        Ok(list_attached_actions(&snapshot.bytes)?)
    }

    /// Current document bytes, verbatim.
    #[instrument(skip(self), fields(sheet = %id))]
    pub async fn export(&self, id: Uuid) -> Result<Vec<u8>, SheetError> {
        let snapshot = self.slot(id).await?.snapshot().await;
        Ok(snapshot.bytes.as_ref().clone())
    }

    pub async fn summary(&self, id: Uuid) -> Result<SheetSummary, SheetError> {
        let slot = self.slot(id).await?;
        let snapshot = slot.snapshot().await;
        Ok(summarize(id, &slot.original_name, slot.created_at, &snapshot))
    }

    /// Every registered sheet, oldest first.
    pub async fn list(&self) -> Vec<SheetSummary> {
        let slots: Vec<(Uuid, Arc<SheetSlot>)> = self
            .sheets
            .read()
            .await
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect();

        let mut summaries = Vec::with_capacity(slots.len());
        for (id, slot) in slots {
            let snapshot = slot.snapshot().await;
            summaries.push(summarize(id, &slot.original_name, slot.created_at, &snapshot));
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        summaries
    }

    /// Remove the sheet from storage, then unregister it.
    #[instrument(skip(self), fields(sheet = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<(), SheetError> {
        let slot = self.slot(id).await?;
        let _writer = slot.writer.lock().await;
        if !self.sheets.read().await.contains_key(&id) {
            return Err(SheetError::NotFound(id));
        }
        // Unregister only once the stored file is gone.
        match self.storage.delete(id).await {
            Ok(()) | Err(SheetError::NotFound(_)) => {}
            Err(e) => {
                warn!(error = %e, "deleting stored sheet failed; keeping it registered");
                return Err(e);
            }
        }
        self.sheets.write().await.remove(&id);
        info!("sheet deleted");
        Ok(())
    }
}

/// Actions already present in the document that this library recognizes.
fn recognized_actions(bytes: &[u8]) -> Result<Vec<AttachedAction>, SheetError> {
    Ok(list_attached_actions(bytes)?
        .into_iter()
        .filter_map(|action| match action {
            DocumentAction::Recognized { action } => Some(action),
            DocumentAction::Unknown { .. } => None,
        })
        .collect())
}
