//! Maps calculation scripts back onto the recipe that produced them.

use calc_scripts::{MODIFIER_FROM_SCORE, SAVE_FROM_FIELDS, SKILL_FROM_FIELDS};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::recipe::{ActionKind, AttachedAction, Role, RoleMapping};

lazy_static! {
    static ref CALL: Regex =
        Regex::new(r#"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)\s*;?\s*$"#).unwrap();
    static ref ARGUMENT: Regex =
        Regex::new(r#"\s*("(?:[^"\\]|\\.)*"|undefined)\s*(?:,|$)"#).unwrap();
}

/// An entry found under some field's `AA/C`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DocumentAction {
    #[serde(rename_all = "camelCase")]
    Recognized { action: AttachedAction },
    /// A calculation this library did not write; `script` is `None` for
    /// non-JavaScript actions.
    #[serde(rename_all = "camelCase")]
    Unknown {
        field_name: String,
        script: Option<String>,
    },
}

impl DocumentAction {
    pub fn field_name(&self) -> &str {
        match self {
            DocumentAction::Recognized { action } => &action.target_field_name,
            DocumentAction::Unknown { field_name, .. } => field_name,
        }
    }
}

/// Split an argument list into string literals (`Some`) and `undefined` (`None`).
fn arguments(list: &str) -> Option<Vec<Option<String>>> {
    if list.trim().is_empty() {
        return Some(Vec::new());
    }
    let mut args = Vec::new();
    let mut consumed = 0;
    for caps in ARGUMENT.captures_iter(list) {
        let whole = caps.get(0)?;
        if whole.start() != consumed {
            return None;
        }
        consumed = whole.end();
        let literal = caps.get(1)?.as_str();
        if literal == "undefined" {
            args.push(None);
        } else {
            args.push(Some(serde_json::from_str::<String>(literal).ok()?));
        }
    }
    (consumed == list.len()).then_some(args)
}

/// Recognize `script` as installed on `target_field`.
pub fn recognize(target_field: &str, script: &str) -> Option<AttachedAction> {
    let caps = CALL.captures(script)?;
    let function = caps.get(1)?.as_str();
    let args = arguments(caps.get(2)?.as_str())?;

    let (kind, roles): (ActionKind, &[Role]) = if function == MODIFIER_FROM_SCORE {
        (ActionKind::AbilityModifier, &[Role::ScoreField])
    } else if function == SAVE_FROM_FIELDS {
        (
            ActionKind::SavingThrowModifier,
            &[
                Role::AbilityModifierField,
                Role::ProficiencyField,
                Role::ProficiencyBonusField,
            ],
        )
    } else if function == SKILL_FROM_FIELDS {
        (
            ActionKind::SkillModifier,
            &[
                Role::AbilityModifierField,
                Role::ProficiencyField,
                Role::ExpertiseField,
                Role::HalfProficiencyField,
                Role::ProficiencyBonusField,
            ],
        )
    } else {
        return None;
    };

    if args.len() != roles.len() {
        return None;
    }

    let mut mapping = RoleMapping::new();
    for (role, arg) in roles.iter().zip(args) {
        match arg {
            Some(field) => mapping.insert(*role, field),
            None if kind.required_roles().contains(role) => return None,
            None => {}
        }
    }
    mapping.insert(kind.target_role(), target_field);

    Some(AttachedAction {
        kind,
        target_field_name: target_field.to_string(),
        mapping,
    })
}
