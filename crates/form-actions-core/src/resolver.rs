//! Action Recipe Resolver: turns a recipe into one line of JavaScript.

use calc_scripts::{MODIFIER_FROM_SCORE, SAVE_FROM_FIELDS, SKILL_FROM_FIELDS};

use crate::error::ActionError;
use crate::recipe::{ActionKind, ActionRecipe, AttachedAction, Role};

/// A validated recipe ready to be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAction {
    pub kind: ActionKind,
    pub target_field: String,
    pub script: String,
    pub record: AttachedAction,
}

/// Validate `recipe` and build its calculation script.
///
/// Optional roles that are not mapped are emitted as `undefined` so the
/// helper's positional signature never shifts.
pub fn resolve(recipe: &ActionRecipe) -> Result<ResolvedAction, ActionError> {
    let kind = recipe.kind();
    let mapping = recipe.mapping();

    for role in kind.required_roles() {
        if mapping.get(*role).is_none() {
            return Err(ActionError::MissingRequiredRole { kind, role: *role });
        }
    }

    let arg = |role: Role| -> Result<String, ActionError> {
        match mapping.get(role) {
            Some(name) => js_string(name),
            None => Ok("undefined".to_string()),
        }
    };

    let script = match kind {
        ActionKind::AbilityModifier => {
            format!("{}({});", MODIFIER_FROM_SCORE, arg(Role::ScoreField)?)
        }
        ActionKind::SavingThrowModifier => format!(
            "{}({}, {}, {});",
            SAVE_FROM_FIELDS,
            arg(Role::AbilityModifierField)?,
            arg(Role::ProficiencyField)?,
            arg(Role::ProficiencyBonusField)?,
        ),
        ActionKind::SkillModifier => format!(
            "{}({}, {}, {}, {}, {});",
            SKILL_FROM_FIELDS,
            arg(Role::AbilityModifierField)?,
            arg(Role::ProficiencyField)?,
            arg(Role::ExpertiseField)?,
            arg(Role::HalfProficiencyField)?,
            arg(Role::ProficiencyBonusField)?,
        ),
    };

    let target_field = mapping
        .get(kind.target_role())
        .map(str::to_string)
        .ok_or(ActionError::MissingRequiredRole {
            kind,
            role: kind.target_role(),
        })?;

    Ok(ResolvedAction {
        kind,
        record: AttachedAction {
            kind,
            target_field_name: target_field.clone(),
            mapping: mapping.restricted_to(kind),
        },
        target_field,
        script,
    })
}

/// JavaScript string literal for a field name.
pub(crate) fn js_string(value: &str) -> Result<String, ActionError> {
    serde_json::to_string(value).map_err(|e| ActionError::SerializationFailed(e.to_string()))
}
