//! PDF Object Graph Editor.
//!
//! Every step here runs against a [`SheetDocument`] and only records changes;
//! nothing reaches the caller until [`crate::writer::serialize`] has built the
//! complete output.

use calc_scripts::{HELPERS_JS_NAME, HELPER_SCRIPT};
use lopdf::{Dictionary, Object, ObjectId, StringFormat};
use tracing::{debug, info};

use crate::document::{DictLoc, SheetDocument};
use crate::error::ActionError;
use crate::names;
use crate::objects;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HelperStatus {
    Present,
    Installed,
    Refreshed,
}

fn javascript_action(script: Object) -> Dictionary {
    let mut action = Dictionary::new();
    action.set("S", Object::Name(b"JavaScript".to_vec()));
    action.set("JS", script);
    action
}

fn helper_source() -> Object {
    Object::String(HELPER_SCRIPT.as_bytes().to_vec(), StringFormat::Literal)
}

/// Make sure `Catalog/Names/JavaScript` holds exactly one up-to-date `HelpersJS` entry.
pub(crate) fn ensure_helper_script(sheet: &mut SheetDocument<'_>) -> Result<HelperStatus, ActionError> {
    let catalog = sheet.catalog()?;

    // Read-only probe first so an installed helper leaves the document untouched.
    let existing = match sheet.child(&catalog, b"Names") {
        Some(names_loc) => match sheet.child(&names_loc, b"JavaScript") {
            Some(root) => names::find(sheet, &root, HELPERS_JS_NAME)?,
            None => None,
        },
        None => None,
    };

    if let Some(hit) = existing {
        return refresh_helper(sheet, hit);
    }

    let names_loc = sheet.child_or_insert(&catalog, b"Names")?;
    let root = sheet.child_or_insert(&names_loc, b"JavaScript")?;
    let action_id = sheet.add_object(javascript_action(helper_source()));
    names::insert(sheet, &root, HELPERS_JS_NAME, Object::Reference(action_id))?;
    info!(action = action_id.0, "installed helper script");
    Ok(HelperStatus::Installed)
}

fn refresh_helper(sheet: &mut SheetDocument<'_>, hit: names::NameHit) -> Result<HelperStatus, ActionError> {
    let current = objects::dict(&sheet.doc, &hit.value)
        .and_then(|action| action.get(b"JS").ok())
        .and_then(|js| objects::script_text(&sheet.doc, js));
    if current.as_deref() == Some(HELPER_SCRIPT) {
        debug!("helper script already present");
        return Ok(HelperStatus::Present);
    }

    let in_place = match hit.value {
        Object::Reference(id) if matches!(sheet.doc.get_object(id), Ok(Object::Dictionary(_))) => Some(id),
        _ => None,
    };
    match in_place {
        Some(id) => {
            if let Object::Dictionary(action) = sheet.object_mut(id)? {
                action.set("S", Object::Name(b"JavaScript".to_vec()));
                action.set("JS", helper_source());
            }
        }
        None => {
            let replacement = sheet.add_object(javascript_action(helper_source()));
            let pairs = sheet.array_mut(&hit.leaf, b"Names")?;
            match pairs.get_mut(hit.index + 1) {
                Some(slot) => *slot = Object::Reference(replacement),
                None => pairs.push(Object::Reference(replacement)),
            }
        }
    }
    info!("refreshed stale helper script");
    Ok(HelperStatus::Refreshed)
}

/// Point the field's `AA/C` at a freshly allocated JavaScript action.
///
/// An indirect `AA` dictionary may be shared with other fields, so it is copied
/// into the field before `C` is replaced.
pub(crate) fn install_calculation(
    sheet: &mut SheetDocument<'_>,
    field_id: ObjectId,
    script: &str,
) -> Result<ObjectId, ActionError> {
    let field = DictLoc::object(field_id);

    let shared_aa = match sheet.dict(&field)?.get(b"AA") {
        Ok(Object::Reference(aa_id)) => Some(*aa_id),
        _ => None,
    };
    let mut additional_actions = match shared_aa {
        Some(aa_id) => objects::dict(&sheet.doc, &Object::Reference(aa_id))
            .cloned()
            .unwrap_or_else(Dictionary::new),
        None => match sheet.dict(&field)?.get(b"AA") {
            Ok(Object::Dictionary(aa)) => aa.clone(),
            _ => Dictionary::new(),
        },
    };

    let action_id = sheet.add_object(javascript_action(objects::encode_text(script)));
    additional_actions.set("C", Object::Reference(action_id));
    sheet
        .dict_mut(&field)?
        .set("AA", Object::Dictionary(additional_actions));

    debug!(field = field_id.0, action = action_id.0, "installed calculation action");
    Ok(action_id)
}

/// Append the field to the AcroForm's `CO` array unless it is already listed.
pub(crate) fn register_calculation_order(
    sheet: &mut SheetDocument<'_>,
    acroform: &DictLoc,
    field_id: ObjectId,
) -> Result<bool, ActionError> {
    let listed = sheet
        .array(acroform, b"CO")
        .is_some_and(|order| order.iter().any(|entry| matches!(entry, Object::Reference(id) if *id == field_id)));
    if listed {
        return Ok(false);
    }
    sheet.array_mut(acroform, b"CO")?.push(Object::Reference(field_id));
    Ok(true)
}

/// Set `NeedAppearances true` unless it already is.
pub(crate) fn set_need_appearances(sheet: &mut SheetDocument<'_>, acroform: &DictLoc) -> Result<(), ActionError> {
    if matches!(sheet.dict(acroform)?.get(b"NeedAppearances"), Ok(Object::Boolean(true))) {
        return Ok(());
    }
    sheet
        .dict_mut(acroform)?
        .set("NeedAppearances", Object::Boolean(true));
    Ok(())
}

/// Calculation script stored under a field's `AA/C`, if any.
pub(crate) fn calculation_script(sheet: &SheetDocument<'_>, field_id: ObjectId) -> Option<CalculationSlot> {
    let doc = &sheet.doc;
    let field = doc.get_object(field_id).ok().and_then(|o| objects::dict(doc, o))?;
    let aa = objects::dict_entry(doc, field, b"AA")?;
    let action = objects::dict_entry(doc, aa, b"C")?;
    let is_javascript = action
        .get(b"S")
        .ok()
        .and_then(|s| objects::name(doc, s))
        .is_some_and(|s| s == b"JavaScript");
    if !is_javascript {
        return Some(CalculationSlot { script: None });
    }
    let script = action.get(b"JS").ok().and_then(|js| objects::script_text(doc, js));
    Some(CalculationSlot { script })
}

/// Contents of an `AA/C` entry; `script` is `None` for non-JavaScript actions.
pub(crate) struct CalculationSlot {
    pub script: Option<String>,
}
