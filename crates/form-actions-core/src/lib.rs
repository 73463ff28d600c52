//! PDF Form Action Engine
//!
//! Reads an AcroForm's field catalog and installs calculation actions that
//! call the shared helper script, leaving every other object untouched.
//!
//! Entry points:
//! - [`extract_fields`] / [`extract_fields_with_geometry`]: the field catalog
//! - [`attach_action`]: install a recipe and return the new document bytes
//! - [`list_attached_actions`]: re-read installed calculations from the PDF
//! - [`inspect`]: validate a sheet before accepting it

pub mod builder;
pub mod coords;
mod document;
mod editor;
pub mod error;
pub mod fields;
mod names;
mod objects;
pub mod options;
pub mod recipe;
pub mod recognize;
pub mod resolver;
mod writer;

use calc_scripts::HELPERS_JS_NAME;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

pub use builder::{sample_character_sheet, SheetBuilder};
pub use coords::ViewportRect;
pub use error::ActionError;
pub use fields::{FieldGeometry, FieldKind, FormField};
pub use options::{EngineOptions, SaveMode};
pub use recipe::{ActionKind, ActionRecipe, AttachedAction, Role, RoleMapping};
pub use recognize::DocumentAction;
pub use resolver::{resolve, ResolvedAction};

use document::SheetDocument;

/// Summary of a sheet that passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetInspection {
    pub version: String,
    pub page_count: u32,
    pub field_count: usize,
    pub helper_installed: bool,
}

fn collect_fields(bytes: &[u8], with_geometry: bool) -> Result<Vec<FormField>, ActionError> {
    let sheet = SheetDocument::load(bytes)?;
    reject_encrypted(&sheet)?;
    let acroform = sheet.acroform()?;
    let entries = fields::walk(&sheet.doc, sheet.dict(&acroform)?)?;

    let pages = with_geometry.then(|| fields::PageIndex::build(&sheet.doc));
    Ok(entries
        .iter()
        .map(|entry| FormField {
            name: entry.name.clone(),
            kind: entry.kind,
            geometry: pages
                .as_ref()
                .and_then(|pages| fields::geometry(&sheet.doc, entry, pages)),
        })
        .collect())
}

/// Every terminal field, in document order.
pub fn extract_fields(bytes: &[u8]) -> Result<Vec<FormField>, ActionError> {
    collect_fields(bytes, false)
}

/// Like [`extract_fields`], with the page and rectangle of each field's first widget.
pub fn extract_fields_with_geometry(bytes: &[u8]) -> Result<Vec<FormField>, ActionError> {
    collect_fields(bytes, true)
}

/// Install `recipe` and return the complete new document.
///
/// On any error the caller's bytes are untouched and nothing partial is returned.
pub fn attach_action(
    bytes: &[u8],
    recipe: &ActionRecipe,
    options: &EngineOptions,
) -> Result<Vec<u8>, ActionError> {
    attach_resolved(bytes, &resolve(recipe)?, options)
}

/// [`attach_action`] for an already resolved recipe.
pub fn attach_resolved(
    bytes: &[u8],
    resolved: &ResolvedAction,
    options: &EngineOptions,
) -> Result<Vec<u8>, ActionError> {
    let mut sheet = SheetDocument::load(bytes)?;
    validate(&sheet)?;

    let acroform = sheet.acroform()?;
    let entries = fields::walk(&sheet.doc, sheet.dict(&acroform)?)?;
    let field_id = match fields::find(&entries, &resolved.target_field) {
        Some(entry) => entry.id,
        None => {
            error!(field = %resolved.target_field, "target field not found");
            return Err(ActionError::FieldNotFound(resolved.target_field.clone()));
        }
    };

    let helper = editor::ensure_helper_script(&mut sheet)?;
    editor::install_calculation(&mut sheet, field_id, &resolved.script)?;
    editor::register_calculation_order(&mut sheet, &acroform, field_id)?;
    if options.need_appearances {
        editor::set_need_appearances(&mut sheet, &acroform)?;
    }
    debug!(?helper, changed = sheet.dirty().len(), "edit staged");

    let out = writer::serialize(sheet, options.save_mode)?;
    info!(
        kind = %resolved.kind,
        field = %resolved.target_field,
        bytes = out.len(),
        "attached calculation action"
    );
    Ok(out)
}

/// Calculation actions currently in the document, in field order.
///
/// Scripts this library did not produce are reported as
/// [`DocumentAction::Unknown`] rather than skipped.
pub fn list_attached_actions(bytes: &[u8]) -> Result<Vec<DocumentAction>, ActionError> {
    let sheet = SheetDocument::load(bytes)?;
    reject_encrypted(&sheet)?;
    let acroform = sheet.acroform()?;
    let entries = fields::walk(&sheet.doc, sheet.dict(&acroform)?)?;

    let mut actions = Vec::new();
    for entry in &entries {
        let Some(slot) = editor::calculation_script(&sheet, entry.id) else {
            continue;
        };
        let recognized = slot
            .script
            .as_deref()
            .and_then(|script| recognize::recognize(&entry.name, script));
        actions.push(match recognized {
            Some(action) => DocumentAction::Recognized { action },
            None => DocumentAction::Unknown {
                field_name: entry.name.clone(),
                script: slot.script,
            },
        });
    }
    Ok(actions)
}

/// Check that a sheet can be edited and summarize it.
pub fn inspect(bytes: &[u8]) -> Result<SheetInspection, ActionError> {
    let sheet = SheetDocument::load(bytes)?;
    validate(&sheet)?;

    let acroform = sheet.acroform()?;
    let entries = fields::walk(&sheet.doc, sheet.dict(&acroform)?)?;
    Ok(SheetInspection {
        version: sheet.doc.version.clone(),
        page_count: sheet.doc.get_pages().len() as u32,
        field_count: entries.len(),
        helper_installed: helper_installed(&sheet)?,
    })
}

fn helper_installed(sheet: &SheetDocument<'_>) -> Result<bool, ActionError> {
    let catalog = sheet.catalog()?;
    let Some(root) = sheet
        .child(&catalog, b"Names")
        .and_then(|names_loc| sheet.child(&names_loc, b"JavaScript"))
    else {
        return Ok(false);
    };
    Ok(names::find(sheet, &root, HELPERS_JS_NAME)?.is_some())
}

/// Strings in an encrypted file are ciphertext; nothing can be read from it.
fn reject_encrypted(sheet: &SheetDocument<'_>) -> Result<(), ActionError> {
    if sheet.doc.trailer.has(b"Encrypt") {
        return Err(ActionError::UnsupportedDocument("document is encrypted".into()));
    }
    Ok(())
}

/// Reject documents this engine must not edit: encrypted, XFA-based, or
/// locked by a DocMDP signature.
fn validate(sheet: &SheetDocument<'_>) -> Result<(), ActionError> {
    reject_encrypted(sheet)?;
    let catalog = sheet.catalog()?;
    sheet.dict(&catalog)?;

    let acroform = sheet.acroform()?;
    let form = sheet.dict(&acroform)?;
    if sheet.array(&acroform, b"Fields").is_none() {
        return Err(ActionError::MalformedDocument("AcroForm has no Fields array".into()));
    }
    if form.has(b"XFA") {
        return Err(ActionError::UnsupportedDocument("XFA forms are not supported".into()));
    }
    if let Some(perms) = sheet.child(&catalog, b"Perms") {
        if sheet.dict(&perms)?.has(b"DocMDP") {
            return Err(ActionError::UnsupportedDocument(
                "document is locked by a certification signature".into(),
            ));
        }
    }
    Ok(())
}
