//! Property-based tests for form-actions-core
//!
//! Exercises recipe resolution, script recognition and the attach/list cycle
//! with generated field names.

use form_actions_core::coords::pdf_rect_to_viewport;
use form_actions_core::recognize::recognize;
use form_actions_core::{
    attach_action, list_attached_actions, resolve, ActionKind, ActionRecipe, DocumentAction,
    EngineOptions, Role, SheetBuilder,
};
use proptest::prelude::*;

// ============================================================
// Strategies
// ============================================================

/// Field names as authors type them: letters, digits, spaces.
fn plain_field_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 ]{0,15}"
}

/// Anything printable, quotes and backslashes included.
fn any_field_name() -> impl Strategy<Value = String> {
    "\\PC{1,16}".prop_filter("blank names are unmapped", |name| !name.trim().is_empty())
}

fn any_recipe() -> impl Strategy<Value = ActionRecipe> {
    (
        0usize..3,
        any_field_name(),
        any_field_name(),
        any_field_name(),
        any_field_name(),
        proptest::option::of(any_field_name()),
        proptest::option::of(any_field_name()),
    )
        .prop_map(|(kind, a, b, c, target, expertise, half)| match kind {
            0 => ActionRecipe::ability_modifier(&a, &target),
            1 => ActionRecipe::saving_throw(&a, &b, &c, &target),
            _ => {
                let mut recipe = ActionRecipe::skill(&a, &b, &c, &target);
                if let Some(expertise) = expertise {
                    recipe = recipe.with_role(Role::ExpertiseField, &expertise);
                }
                if let Some(half) = half {
                    recipe = recipe.with_role(Role::HalfProficiencyField, &half);
                }
                recipe
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // ============================================================
    // Script Generation Tests
    // ============================================================

    #[test]
    fn resolved_scripts_are_single_calls(recipe in any_recipe()) {
        let resolved = resolve(&recipe).unwrap();
        prop_assert!(resolved.script.ends_with(");"));
        prop_assert!(!resolved.script.contains('\n'));
        prop_assert_eq!(resolved.kind, recipe.kind());
    }

    #[test]
    fn resolved_scripts_are_recognized(recipe in any_recipe()) {
        let resolved = resolve(&recipe).unwrap();
        let recognized = recognize(&resolved.target_field, &resolved.script);
        prop_assert_eq!(recognized, Some(resolved.record.clone()));
    }

    #[test]
    fn blank_required_roles_are_rejected(target in plain_field_name(), blank in "[ ]{0,3}") {
        let recipe = ActionRecipe::ability_modifier(&blank, &target);
        prop_assert!(resolve(&recipe).is_err());
    }

    // ============================================================
    // Coordinate Tests
    // ============================================================

    #[test]
    fn viewport_scales_linearly(
        x in 0.0f64..500.0,
        y in 0.0f64..700.0,
        w in 1.0f64..100.0,
        h in 1.0f64..100.0,
        scale in 0.25f64..4.0
    ) {
        let media_box = [0.0, 0.0, 612.0, 792.0];
        let unit = pdf_rect_to_viewport([x, y, x + w, y + h], media_box, 1.0);
        let scaled = pdf_rect_to_viewport([x, y, x + w, y + h], media_box, scale);
        prop_assert!((scaled.width - unit.width * scale).abs() < 1e-6);
        prop_assert!((scaled.top - unit.top * scale).abs() < 1e-6);
        prop_assert!(unit.width > 0.0 && unit.height > 0.0);
    }

    #[test]
    fn bottom_edge_maps_below_top_edge(
        x in 0.0f64..500.0,
        y in 0.0f64..700.0,
        h in 1.0f64..90.0,
        scale in 0.25f64..4.0
    ) {
        let media_box = [0.0, 0.0, 612.0, 792.0];
        let view = pdf_rect_to_viewport([x, y, x + 10.0, y + h], media_box, scale);
        prop_assert!((view.top + view.height - (792.0 - y) * scale).abs() < 1e-6);
        prop_assert!(view.top >= 0.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    // ============================================================
    // Attach / List Tests
    // ============================================================

    #[test]
    fn attached_recipes_list_back(
        score in any_field_name(),
        target in plain_field_name()
    ) {
        let bytes = SheetBuilder::new()
            .text(&target, 0, [100.0, 700.0, 150.0, 730.0])
            .build()
            .unwrap();
        let recipe = ActionRecipe::ability_modifier(&score, &target);
        let out = attach_action(&bytes, &recipe, &EngineOptions::default()).unwrap();

        prop_assert!(out.starts_with(&bytes));
        let actions = list_attached_actions(&out).unwrap();
        prop_assert_eq!(actions.len(), 1);
        match &actions[0] {
            DocumentAction::Recognized { action } => {
                prop_assert_eq!(action.kind, ActionKind::AbilityModifier);
                prop_assert_eq!(action.mapping.get(Role::ScoreField), Some(score.as_str()));
            }
            other => prop_assert!(false, "not recognized: {:?}", other),
        }
    }

    #[test]
    fn repeated_attaches_keep_one_action_per_field(
        scores in proptest::collection::vec(plain_field_name(), 1..4)
    ) {
        let mut bytes = SheetBuilder::new()
            .text("Target", 0, [100.0, 700.0, 150.0, 730.0])
            .build()
            .unwrap();
        for score in &scores {
            let recipe = ActionRecipe::ability_modifier(score, "Target");
            bytes = attach_action(&bytes, &recipe, &EngineOptions::default()).unwrap();
        }
        let actions = list_attached_actions(&bytes).unwrap();
        prop_assert_eq!(actions.len(), 1);
        let last = scores.last().unwrap();
        match &actions[0] {
            DocumentAction::Recognized { action } => {
                prop_assert_eq!(action.mapping.get(Role::ScoreField), Some(last.as_str()));
            }
            other => prop_assert!(false, "not recognized: {:?}", other),
        }
    }
}
