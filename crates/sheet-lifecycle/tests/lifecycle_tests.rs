//! Sheet lifecycle tests against in-memory and filesystem storage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use form_actions_core::{
    sample_character_sheet, ActionError, ActionKind, ActionRecipe, DocumentAction, Role,
};
use pretty_assertions::assert_eq;
use sheet_lifecycle::{
    FsSheetStorage, MemorySheetStorage, SheetError, SheetManager, SheetStorage, StorageConfig,
};
use uuid::Uuid;

const ABILITIES: [&str; 6] = ["STR", "DEX", "CON", "INT", "WIS", "CHA"];

fn memory_manager() -> SheetManager {
    SheetManager::new(Arc::new(MemorySheetStorage::new()))
}

/// Memory storage whose writes can be switched off.
#[derive(Default)]
struct FlakyStorage {
    inner: MemorySheetStorage,
    failing: AtomicBool,
}

#[async_trait]
impl SheetStorage for FlakyStorage {
    async fn save(&self, id: Uuid, bytes: &[u8]) -> Result<(), SheetError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SheetError::Storage(std::io::Error::other("disk full")));
        }
        self.inner.save(id, bytes).await
    }

    async fn load(&self, id: Uuid) -> Result<Vec<u8>, SheetError> {
        self.inner.load(id).await
    }

    async fn delete(&self, id: Uuid) -> Result<(), SheetError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SheetError::Storage(std::io::Error::other("read-only volume")));
        }
        self.inner.delete(id).await
    }

    async fn list(&self) -> Result<Vec<Uuid>, SheetError> {
        self.inner.list().await
    }
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_registers_and_persists() {
    let storage = Arc::new(MemorySheetStorage::new());
    let manager = SheetManager::new(storage.clone());
    let bytes = sample_character_sheet().unwrap();

    let summary = manager.upload("Character Sheet.pdf", bytes.clone()).await.unwrap();
    assert_eq!(summary.original_name, "Character Sheet.pdf");
    assert_eq!(summary.size_bytes, bytes.len());
    assert_eq!(summary.page_count, 1);
    assert_eq!(summary.field_count, 28);
    assert_eq!(summary.action_count, 0);
    assert!(!summary.helper_installed);

    assert_eq!(storage.load(summary.id).await.unwrap(), bytes);
    assert_eq!(manager.list().await, vec![summary]);
}

#[tokio::test]
async fn test_upload_rejects_bad_input() {
    let manager = memory_manager();
    let bytes = sample_character_sheet().unwrap();

    assert!(matches!(
        manager.upload("sheet.docx", bytes).await,
        Err(SheetError::InvalidFileName)
    ));
    assert!(matches!(
        manager.upload("sheet.pdf", b"plain text".to_vec()).await,
        Err(SheetError::Action(ActionError::MalformedDocument(_)))
    ));
    assert!(manager.list().await.is_empty());
}

// ============================================================================
// Attach / list / export
// ============================================================================

#[tokio::test]
async fn test_attach_logs_and_exports() {
    let manager = memory_manager();
    let id = manager
        .upload("sheet.pdf", sample_character_sheet().unwrap())
        .await
        .unwrap()
        .id;

    let ability = ActionRecipe::ability_modifier("STR", "STRmod");
    let save = ActionRecipe::saving_throw("STRmod", "STR Save Prof", "ProfBonus", "ST STR");
    let first = manager.attach(id, &ability).await.unwrap();
    let second = manager.attach(id, &save).await.unwrap();
    assert_eq!(first.recipe(), ability);
    assert_eq!(second.kind, ActionKind::SavingThrowModifier);

    assert_eq!(manager.list_actions(id).await.unwrap(), vec![first, second]);

    let exported = manager.export(id).await.unwrap();
    let in_document = form_actions_core::list_attached_actions(&exported).unwrap();
    assert_eq!(in_document, manager.document_actions(id).await.unwrap());
    assert_eq!(in_document.len(), 2);

    let summary = manager.summary(id).await.unwrap();
    assert_eq!(summary.action_count, 2);
    assert!(summary.helper_installed);
    assert_eq!(summary.size_bytes, exported.len());
}

#[tokio::test]
async fn test_failed_attach_changes_nothing() {
    let manager = memory_manager();
    let id = manager
        .upload("sheet.pdf", sample_character_sheet().unwrap())
        .await
        .unwrap()
        .id;
    let before = manager.export(id).await.unwrap();

    let missing_field = ActionRecipe::ability_modifier("STR", "Strength Mod");
    assert!(matches!(
        manager.attach(id, &missing_field).await,
        Err(SheetError::Action(ActionError::FieldNotFound(_)))
    ));
    let missing_role = ActionRecipe::ability_modifier("", "STRmod");
    assert!(matches!(
        manager.attach(id, &missing_role).await,
        Err(SheetError::Action(ActionError::MissingRequiredRole {
            role: Role::ScoreField,
            ..
        }))
    ));

    assert_eq!(manager.export(id).await.unwrap(), before);
    assert!(manager.list_actions(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_storage_failure_keeps_previous_buffer() {
    let storage = Arc::new(FlakyStorage::default());
    let manager = SheetManager::new(storage.clone());
    let id = manager
        .upload("sheet.pdf", sample_character_sheet().unwrap())
        .await
        .unwrap()
        .id;
    let before = manager.export(id).await.unwrap();

    storage.failing.store(true, Ordering::SeqCst);
    let recipe = ActionRecipe::ability_modifier("STR", "STRmod");
    assert!(matches!(manager.attach(id, &recipe).await, Err(SheetError::Storage(_))));
    assert_eq!(manager.export(id).await.unwrap(), before);
    assert!(manager.list_actions(id).await.unwrap().is_empty());

    storage.failing.store(false, Ordering::SeqCst);
    manager.attach(id, &recipe).await.unwrap();
    assert_eq!(manager.list_actions(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_attaches_are_serialized() {
    let manager = Arc::new(memory_manager());
    let id = manager
        .upload("sheet.pdf", sample_character_sheet().unwrap())
        .await
        .unwrap()
        .id;

    let tasks: Vec<_> = ABILITIES
        .iter()
        .map(|ability| {
            let manager = Arc::clone(&manager);
            let recipe = ActionRecipe::ability_modifier(ability, &format!("{}mod", ability));
            tokio::spawn(async move { manager.attach(id, &recipe).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(manager.list_actions(id).await.unwrap().len(), ABILITIES.len());
    let mut targets: Vec<String> = manager
        .document_actions(id)
        .await
        .unwrap()
        .iter()
        .map(|action| {
            assert!(matches!(action, DocumentAction::Recognized { .. }));
            action.field_name().to_string()
        })
        .collect();
    targets.sort();
    let mut expected: Vec<String> = ABILITIES.iter().map(|a| format!("{}mod", a)).collect();
    expected.sort();
    assert_eq!(targets, expected);
}

#[tokio::test]
async fn test_sheets_are_independent() {
    let manager = memory_manager();
    let a = manager.upload("a.pdf", sample_character_sheet().unwrap()).await.unwrap().id;
    let b = manager.upload("b.pdf", sample_character_sheet().unwrap()).await.unwrap().id;

    manager
        .attach(a, &ActionRecipe::ability_modifier("DEX", "DEXmod"))
        .await
        .unwrap();
    assert_eq!(manager.list_actions(a).await.unwrap().len(), 1);
    assert!(manager.list_actions(b).await.unwrap().is_empty());
    assert_eq!(manager.list().await.len(), 2);
}

// ============================================================================
// Delete / restore
// ============================================================================

#[tokio::test]
async fn test_delete_unregisters_and_removes() {
    let storage = Arc::new(MemorySheetStorage::new());
    let manager = SheetManager::new(storage.clone());
    let id = manager
        .upload("sheet.pdf", sample_character_sheet().unwrap())
        .await
        .unwrap()
        .id;

    manager.delete(id).await.unwrap();
    assert!(matches!(manager.export(id).await, Err(SheetError::NotFound(missing)) if missing == id));
    assert!(matches!(
        manager
            .attach(id, &ActionRecipe::ability_modifier("STR", "STRmod"))
            .await,
        Err(SheetError::NotFound(_))
    ));
    assert!(storage.list().await.unwrap().is_empty());
    assert!(matches!(manager.delete(id).await, Err(SheetError::NotFound(_))));
}

#[tokio::test]
async fn test_failed_storage_delete_keeps_sheet_registered() {
    let storage = Arc::new(FlakyStorage::default());
    let manager = SheetManager::new(storage.clone());
    let id = manager
        .upload("sheet.pdf", sample_character_sheet().unwrap())
        .await
        .unwrap()
        .id;

    storage.failing.store(true, Ordering::SeqCst);
    assert!(matches!(manager.delete(id).await, Err(SheetError::Storage(_))));
    assert!(manager.summary(id).await.is_ok());
    assert_eq!(storage.list().await.unwrap(), vec![id]);

    storage.failing.store(false, Ordering::SeqCst);
    manager.delete(id).await.unwrap();
    assert!(matches!(manager.summary(id).await, Err(SheetError::NotFound(_))));
    assert!(storage.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_from_disk_rebuilds_log() {
    let dir = tempfile::tempdir().unwrap();
    let config = StorageConfig::new(dir.path());

    let id = {
        let manager = SheetManager::from_config(&config);
        let id = manager
            .upload("sheet.pdf", sample_character_sheet().unwrap())
            .await
            .unwrap()
            .id;
        manager
            .attach(id, &ActionRecipe::skill("STRmod", "Athletics Prof", "ProfBonus", "Athletics"))
            .await
            .unwrap();
        id
    };

    let storage = FsSheetStorage::new(&config);
    assert_eq!(storage.list().await.unwrap(), vec![id]);

    let manager = SheetManager::new(Arc::new(storage));
    assert!(matches!(manager.summary(id).await, Err(SheetError::NotFound(_))));
    let summary = manager.restore(id).await.unwrap();
    assert_eq!(summary.action_count, 1);
    assert!(summary.helper_installed);

    let actions = manager.list_actions(id).await.unwrap();
    assert_eq!(actions[0].kind, ActionKind::SkillModifier);
    assert_eq!(actions[0].target_field_name, "Athletics");

    assert!(matches!(
        manager.restore(Uuid::new_v4()).await,
        Err(SheetError::NotFound(_))
    ));
}
