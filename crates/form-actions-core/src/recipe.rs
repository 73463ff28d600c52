//! Calculation recipes and the roles their field mappings fill.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    AbilityModifier,
    SkillModifier,
    SavingThrowModifier,
}

impl ActionKind {
    pub const ALL: [ActionKind; 3] = [
        ActionKind::AbilityModifier,
        ActionKind::SkillModifier,
        ActionKind::SavingThrowModifier,
    ];

    /// Roles that must map to a non-empty field name, in the order they are checked.
    pub fn required_roles(self) -> &'static [Role] {
        match self {
            ActionKind::AbilityModifier => &[Role::ScoreField, Role::ModifierField],
            ActionKind::SkillModifier | ActionKind::SavingThrowModifier => &[
                Role::AbilityModifierField,
                Role::ProficiencyField,
                Role::ProficiencyBonusField,
                Role::TargetField,
            ],
        }
    }

    pub fn optional_roles(self) -> &'static [Role] {
        match self {
            ActionKind::SkillModifier => &[Role::ExpertiseField, Role::HalfProficiencyField],
            ActionKind::AbilityModifier | ActionKind::SavingThrowModifier => &[],
        }
    }

    /// The role naming the field that receives the calculation action.
    pub fn target_role(self) -> Role {
        match self {
            ActionKind::AbilityModifier => Role::ModifierField,
            ActionKind::SkillModifier | ActionKind::SavingThrowModifier => Role::TargetField,
        }
    }

    pub fn accepts(self, role: Role) -> bool {
        self.required_roles().contains(&role) || self.optional_roles().contains(&role)
    }

    fn as_str(self) -> &'static str {
        match self {
            ActionKind::AbilityModifier => "AbilityModifier",
            ActionKind::SkillModifier => "SkillModifier",
            ActionKind::SavingThrowModifier => "SavingThrowModifier",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s.chars().filter(|c| *c != '-' && *c != '_').collect();
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| format!("unknown action kind: {}", s))
    }
}

/// A logical slot in a recipe that a form field fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    ScoreField,
    ModifierField,
    AbilityModifierField,
    ProficiencyField,
    ProficiencyBonusField,
    TargetField,
    ExpertiseField,
    HalfProficiencyField,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::ScoreField,
        Role::ModifierField,
        Role::AbilityModifierField,
        Role::ProficiencyField,
        Role::ProficiencyBonusField,
        Role::TargetField,
        Role::ExpertiseField,
        Role::HalfProficiencyField,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::ScoreField => "scoreField",
            Role::ModifierField => "modifierField",
            Role::AbilityModifierField => "abilityModifierField",
            Role::ProficiencyField => "proficiencyField",
            Role::ProficiencyBonusField => "proficiencyBonusField",
            Role::TargetField => "targetField",
            Role::ExpertiseField => "expertiseField",
            Role::HalfProficiencyField => "halfProficiencyField",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown role: {}", s))
    }
}

/// Role to field-name mapping. Blank names count as unmapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleMapping(BTreeMap<Role, String>);

impl RoleMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, role: Role, field: impl Into<String>) -> Self {
        self.insert(role, field);
        self
    }

    pub fn insert(&mut self, role: Role, field: impl Into<String>) {
        self.0.insert(role, field.into());
    }

    pub fn get(&self, role: Role) -> Option<&str> {
        self.0
            .get(&role)
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Role, &str)> {
        self.0.iter().map(|(role, name)| (*role, name.as_str()))
    }

    /// Keeps only the mapped roles `kind` understands.
    pub fn restricted_to(&self, kind: ActionKind) -> RoleMapping {
        RoleMapping(
            self.0
                .iter()
                .filter(|(role, name)| kind.accepts(**role) && !name.trim().is_empty())
                .map(|(role, name)| (*role, name.clone()))
                .collect(),
        )
    }
}

impl FromIterator<(Role, String)> for RoleMapping {
    fn from_iter<I: IntoIterator<Item = (Role, String)>>(iter: I) -> Self {
        RoleMapping(iter.into_iter().collect())
    }
}

/// One of the fixed calculation recipes with its field mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "mapping")]
pub enum ActionRecipe {
    AbilityModifier(RoleMapping),
    SkillModifier(RoleMapping),
    SavingThrowModifier(RoleMapping),
}

impl ActionRecipe {
    pub fn new(kind: ActionKind, mapping: RoleMapping) -> Self {
        match kind {
            ActionKind::AbilityModifier => ActionRecipe::AbilityModifier(mapping),
            ActionKind::SkillModifier => ActionRecipe::SkillModifier(mapping),
            ActionKind::SavingThrowModifier => ActionRecipe::SavingThrowModifier(mapping),
        }
    }

    pub fn ability_modifier(score_field: &str, modifier_field: &str) -> Self {
        ActionRecipe::AbilityModifier(
            RoleMapping::new()
                .with(Role::ScoreField, score_field)
                .with(Role::ModifierField, modifier_field),
        )
    }

    pub fn saving_throw(
        ability_modifier_field: &str,
        proficiency_field: &str,
        proficiency_bonus_field: &str,
        target_field: &str,
    ) -> Self {
        ActionRecipe::SavingThrowModifier(
            RoleMapping::new()
                .with(Role::AbilityModifierField, ability_modifier_field)
                .with(Role::ProficiencyField, proficiency_field)
                .with(Role::ProficiencyBonusField, proficiency_bonus_field)
                .with(Role::TargetField, target_field),
        )
    }

    pub fn skill(
        ability_modifier_field: &str,
        proficiency_field: &str,
        proficiency_bonus_field: &str,
        target_field: &str,
    ) -> Self {
        ActionRecipe::SkillModifier(
            RoleMapping::new()
                .with(Role::AbilityModifierField, ability_modifier_field)
                .with(Role::ProficiencyField, proficiency_field)
                .with(Role::ProficiencyBonusField, proficiency_bonus_field)
                .with(Role::TargetField, target_field),
        )
    }

    pub fn with_role(mut self, role: Role, field: &str) -> Self {
        self.mapping_mut().insert(role, field);
        self
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            ActionRecipe::AbilityModifier(_) => ActionKind::AbilityModifier,
            ActionRecipe::SkillModifier(_) => ActionKind::SkillModifier,
            ActionRecipe::SavingThrowModifier(_) => ActionKind::SavingThrowModifier,
        }
    }

    pub fn mapping(&self) -> &RoleMapping {
        match self {
            ActionRecipe::AbilityModifier(m)
            | ActionRecipe::SkillModifier(m)
            | ActionRecipe::SavingThrowModifier(m) => m,
        }
    }

    fn mapping_mut(&mut self) -> &mut RoleMapping {
        match self {
            ActionRecipe::AbilityModifier(m)
            | ActionRecipe::SkillModifier(m)
            | ActionRecipe::SavingThrowModifier(m) => m,
        }
    }

    /// Name of the field the action is installed on, if mapped.
    pub fn target_field(&self) -> Option<&str> {
        self.mapping().get(self.kind().target_role())
    }
}

/// Record of one installed recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedAction {
    pub kind: ActionKind,
    pub target_field_name: String,
    pub mapping: RoleMapping,
}

impl AttachedAction {
    pub fn recipe(&self) -> ActionRecipe {
        ActionRecipe::new(self.kind, self.mapping.clone())
    }
}
