//! Calculation Script Library
//!
//! The fixed catalogue of character sheet recipes. Each recipe exists twice:
//! as a pure Rust function (used for testing and previews) and as JavaScript
//! inside [`HELPER_SCRIPT`], which is installed once per document and invoked
//! by per-field calculation actions.

use std::collections::HashMap;

/// Name of the document-level JavaScript entry holding [`HELPER_SCRIPT`].
pub const HELPERS_JS_NAME: &str = "HelpersJS";

/// Canonical helper source, embedded byte-for-byte into every document.
pub const HELPER_SCRIPT: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/js/dnd_helpers.js"));

/// `calculateModifierFromScore(scoreField)`
pub const MODIFIER_FROM_SCORE: &str = "calculateModifierFromScore";

/// `calculateSaveFromFields(abilityModField, proficientField, proficiencyBonusField)`
pub const SAVE_FROM_FIELDS: &str = "calculateSaveFromFields";

/// `calculateSkillFromFields(abilityModField, proficientField, expertiseField, halfProfField, proficiencyBonusField)`
pub const SKILL_FROM_FIELDS: &str = "calculateSkillFromFields";

/// Ability modifier from an ability score: `floor((score - 10) / 2)`.
pub fn ability_modifier(score: f64) -> i64 {
    ((score - 10.0) / 2.0).floor() as i64
}

/// Proficiency multiplier. Precedence is expertise > proficient > half > none.
pub fn proficiency_multiplier(proficient: bool, expertise: bool, half: bool) -> f64 {
    if expertise {
        2.0
    } else if proficient {
        1.0
    } else if half {
        0.5
    } else {
        0.0
    }
}

/// Skill total, floored toward negative infinity.
pub fn skill_total(ability_mod: f64, prof_mult: f64, prof_bonus: f64, misc: f64) -> i64 {
    (ability_mod + prof_mult * prof_bonus + misc).floor() as i64
}

/// Saving throw total, floored toward negative infinity.
pub fn save_total(ability_mod: f64, proficient: bool, prof_bonus: f64, misc: f64) -> i64 {
    let bonus = if proficient { prof_bonus } else { 0.0 };
    (ability_mod + bonus + misc).floor() as i64
}

/// A form field value as the viewer hands it to a calculation script.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    Absent,
    Text(&'a str),
    Number(f64),
}

impl FieldValue<'_> {
    /// Numeric coercion: missing or non-numeric values become 0.
    pub fn number(&self) -> f64 {
        match self {
            FieldValue::Absent => 0.0,
            FieldValue::Number(n) if n.is_finite() => *n,
            FieldValue::Number(_) => 0.0,
            FieldValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return 0.0;
                }
                match trimmed.parse::<f64>() {
                    Ok(n) if n.is_finite() => n,
                    _ => 0.0,
                }
            }
        }
    }

    /// Checkbox coercion: `"Off"`, `0`, `""` and absent are false.
    pub fn flag(&self) -> bool {
        match self {
            FieldValue::Absent => false,
            FieldValue::Number(n) => *n != 0.0,
            FieldValue::Text(s) => !s.is_empty() && *s != "Off",
        }
    }
}

/// Read access to the current values of a form, keyed by field name.
pub trait FieldSource {
    fn value(&self, name: &str) -> FieldValue<'_>;
}

impl FieldSource for HashMap<String, String> {
    fn value(&self, name: &str) -> FieldValue<'_> {
        match self.get(name) {
            Some(v) => FieldValue::Text(v.as_str()),
            None => FieldValue::Absent,
        }
    }
}

fn lookup<'a, S: FieldSource>(source: &'a S, name: Option<&str>) -> FieldValue<'a> {
    match name {
        Some(name) if !name.is_empty() => source.value(name),
        _ => FieldValue::Absent,
    }
}

/// Rust counterpart of `calculateModifierFromScore`.
pub fn modifier_from_score<S: FieldSource>(source: &S, score_field: &str) -> i64 {
    ability_modifier(lookup(source, Some(score_field)).number())
}

/// Rust counterpart of `calculateSaveFromFields`.
pub fn save_from_fields<S: FieldSource>(
    source: &S,
    ability_mod_field: &str,
    proficient_field: &str,
    proficiency_bonus_field: &str,
) -> i64 {
    save_total(
        lookup(source, Some(ability_mod_field)).number(),
        lookup(source, Some(proficient_field)).flag(),
        lookup(source, Some(proficiency_bonus_field)).number(),
        0.0,
    )
}

/// Rust counterpart of `calculateSkillFromFields`.
pub fn skill_from_fields<S: FieldSource>(
    source: &S,
    ability_mod_field: &str,
    proficient_field: &str,
    expertise_field: Option<&str>,
    half_prof_field: Option<&str>,
    proficiency_bonus_field: &str,
) -> i64 {
    let mult = proficiency_multiplier(
        lookup(source, Some(proficient_field)).flag(),
        lookup(source, expertise_field).flag(),
        lookup(source, half_prof_field).flag(),
    );
    skill_total(
        lookup(source, Some(ability_mod_field)).number(),
        mult,
        lookup(source, Some(proficiency_bonus_field)).number(),
        0.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_ability_modifier() {
        assert_eq!(ability_modifier(10.0), 0);
        assert_eq!(ability_modifier(8.0), -1);
        assert_eq!(ability_modifier(20.0), 5);
        assert_eq!(ability_modifier(1.0), -5);
        assert_eq!(ability_modifier(3.0), -4);
        assert_eq!(ability_modifier(30.0), 10);
    }

    #[test]
    fn test_proficiency_multiplier_precedence() {
        assert_eq!(proficiency_multiplier(false, false, false), 0.0);
        assert_eq!(proficiency_multiplier(false, false, true), 0.5);
        assert_eq!(proficiency_multiplier(true, false, false), 1.0);
        assert_eq!(proficiency_multiplier(false, true, false), 2.0);
        assert_eq!(proficiency_multiplier(true, false, true), 1.0);
        assert_eq!(proficiency_multiplier(false, true, true), 2.0);
        assert_eq!(proficiency_multiplier(true, true, true), 2.0);
    }

    #[test]
    fn test_skill_total_floors() {
        assert_eq!(skill_total(3.0, 0.5, 3.0, 0.0), 4);
        assert_eq!(skill_total(-2.0, 1.0, 2.0, 0.0), 0);
        assert_eq!(skill_total(-2.0, 0.5, 3.0, 0.0), -1);
    }

    #[test]
    fn test_skill_total_negative_half_floors_down() {
        assert_eq!(skill_total(-1.0, 0.5, 1.0, 0.0), -1);
    }

    #[test]
    fn test_save_total() {
        assert_eq!(save_total(3.0, true, 2.0, 0.0), 5);
        assert_eq!(save_total(-1.0, false, 2.0, 0.0), -1);
        assert_eq!(save_total(-1.0, true, 2.0, 1.0), 2);
    }

    #[test]
    fn test_number_coercion() {
        assert_eq!(FieldValue::Absent.number(), 0.0);
        assert_eq!(FieldValue::Text("").number(), 0.0);
        assert_eq!(FieldValue::Text("abc").number(), 0.0);
        assert_eq!(FieldValue::Text(" 14 ").number(), 14.0);
        assert_eq!(FieldValue::Number(-3.0).number(), -3.0);
        assert_eq!(FieldValue::Number(f64::NAN).number(), 0.0);
    }

    #[test]
    fn test_flag_coercion() {
        assert!(!FieldValue::Absent.flag());
        assert!(!FieldValue::Text("Off").flag());
        assert!(!FieldValue::Text("").flag());
        assert!(!FieldValue::Number(0.0).flag());
        assert!(FieldValue::Text("Yes").flag());
        assert!(FieldValue::Number(1.0).flag());
    }

    #[test]
    fn test_field_recipes_from_values() {
        let mut values = HashMap::new();
        values.insert("STR".to_string(), "15".to_string());
        values.insert("STRmod".to_string(), "2".to_string());
        values.insert("Check Box 26".to_string(), "Yes".to_string());
        values.insert("Expertise".to_string(), "Off".to_string());
        values.insert("ProfBonus".to_string(), "3".to_string());

        assert_eq!(modifier_from_score(&values, "STR"), 2);
        assert_eq!(save_from_fields(&values, "STRmod", "Check Box 26", "ProfBonus"), 5);
        assert_eq!(
            skill_from_fields(&values, "STRmod", "Check Box 26", Some("Expertise"), None, "ProfBonus"),
            5
        );
        assert_eq!(modifier_from_score(&values, "missing"), -5);
    }

    #[test]
    fn test_helper_script_defines_call_shapes() {
        for name in [MODIFIER_FROM_SCORE, SAVE_FROM_FIELDS, SKILL_FROM_FIELDS] {
            assert!(
                HELPER_SCRIPT.contains(&format!("function {}(", name)),
                "helper script should define {}",
                name
            );
        }
        assert!(HELPER_SCRIPT.contains("function getProficiencyMultiplier("));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: raising a score by two raises the modifier by exactly one
        #[test]
        fn ability_modifier_steps_every_two_points(score in -50i64..100) {
            let score = score as f64;
            prop_assert_eq!(ability_modifier(score + 2.0), ability_modifier(score) + 1);
        }

        /// Property: expertise always yields the double multiplier
        #[test]
        fn expertise_always_wins(proficient in any::<bool>(), half in any::<bool>()) {
            prop_assert_eq!(proficiency_multiplier(proficient, true, half), 2.0);
        }

        /// Property: the skill total never exceeds the unfloored sum
        #[test]
        fn skill_total_is_floor(
            ability_mod in -5i64..10,
            prof_bonus in 0i64..7,
            half in any::<bool>(),
        ) {
            let mult = if half { 0.5 } else { 1.0 };
            let raw = ability_mod as f64 + mult * prof_bonus as f64;
            let total = skill_total(ability_mod as f64, mult, prof_bonus as f64, 0.0);
            prop_assert!(total as f64 <= raw);
            prop_assert!(raw - (total as f64) < 1.0);
        }

        /// Property: a non-proficient save is just the ability modifier
        #[test]
        fn save_without_proficiency_is_modifier(ability_mod in -10i64..10, prof_bonus in 0i64..7) {
            prop_assert_eq!(save_total(ability_mod as f64, false, prof_bonus as f64, 0.0), ability_mod);
        }
    }
}
