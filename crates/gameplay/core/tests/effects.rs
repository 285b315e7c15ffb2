use std::sync::Arc;

use gameplay_core::{
    AbilitySystemComponent, AbilitySystemContext, ApplyOutcome, AttributeHandle, EffectLibrary,
    EntityId, GameplayEffectDef, GameplayTag, MagnitudeFormula, ModOp, NetRole,
    NumericAttributeSet, PredictionKey, StackingRules, TagContainer, TagRequirements,
};

fn health() -> AttributeHandle {
    AttributeHandle::new("Vitals", "Health")
}

fn power() -> AttributeHandle {
    AttributeHandle::new("Vitals", "Power")
}

fn hero(ctx: &Arc<AbilitySystemContext>, role: NetRole) -> AbilitySystemComponent {
    AbilitySystemComponent::new(Arc::clone(ctx), EntityId(7), role).with_attribute_set(
        NumericAttributeSet::new("Vitals")
            .with("Health", 100.0)
            .with("Power", 10.0)
            .with_bounds("Health", 0.0, 100.0),
    )
}

fn apply(asc: &mut AbilitySystemComponent, def: GameplayEffectDef) -> ApplyOutcome {
    let spec = asc.make_outgoing_spec_from(Arc::new(def), 1.0);
    asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE)
        .unwrap()
}

fn plain_context() -> Arc<AbilitySystemContext> {
    Arc::new(AbilitySystemContext::default())
}

#[test]
fn instant_damage_changes_base_without_a_handle() {
    let ctx = plain_context();
    let mut asc = hero(&ctx, NetRole::Authority);
    let hit = GameplayEffectDef::instant("Hit").with_modifier(
        health(),
        ModOp::Add,
        MagnitudeFormula::constant(-20.0),
    );

    let outcome = apply(&mut asc, hit);
    assert_eq!(outcome, ApplyOutcome::Executed);
    assert_eq!(outcome.handle(), None);
    assert_eq!(asc.get_numeric_attribute(&health()), 80.0);
    assert_eq!(asc.get_numeric_attribute_base(&health()), 80.0);
    assert!(asc.container().is_empty());
}

#[test]
fn periodic_effect_fires_once_per_period() {
    let ctx = plain_context();
    let mut asc = hero(&ctx, NetRole::Authority);
    let poison = GameplayEffectDef::timed("Poison", 10.0)
        .with_period(2.0)
        .with_modifier(health(), ModOp::Add, MagnitudeFormula::constant(-5.0));

    let handle = apply(&mut asc, poison).handle().unwrap();
    assert_eq!(asc.container().get(handle).unwrap().start_world_time(), 0.0);
    assert_eq!(asc.get_numeric_attribute(&health()), 100.0);

    let mut seen = Vec::new();
    for _ in 0..12 {
        asc.tick(1.0);
        seen.push(asc.get_numeric_attribute(&health()));
    }
    assert_eq!(
        seen,
        vec![100.0, 95.0, 95.0, 90.0, 90.0, 85.0, 85.0, 80.0, 80.0, 75.0, 75.0, 75.0]
    );
    assert!(!asc.container().is_effect_active(handle));
}

#[test]
fn periodic_effect_can_execute_on_application() {
    let ctx = plain_context();
    let mut asc = hero(&ctx, NetRole::Authority);
    let poison = GameplayEffectDef::timed("Poison", 4.0)
        .with_period(2.0)
        .executing_on_application()
        .with_modifier(health(), ModOp::Add, MagnitudeFormula::constant(-5.0));

    apply(&mut asc, poison);
    assert_eq!(asc.get_numeric_attribute(&health()), 95.0);
    asc.tick(4.0);
    assert_eq!(asc.get_numeric_attribute(&health()), 85.0);
}

#[test]
fn additive_mods_sum_before_multiplying() {
    let ctx = plain_context();
    let buff = |id: &str, op: ModOp, value: f32| {
        GameplayEffectDef::infinite(id).with_modifier(power(), op, MagnitudeFormula::constant(value))
    };

    let mut forward = hero(&ctx, NetRole::Authority);
    apply(&mut forward, buff("A", ModOp::Add, 5.0));
    apply(&mut forward, buff("B", ModOp::Add, 3.0));
    apply(&mut forward, buff("C", ModOp::Multiply, 2.0));

    let mut reverse = hero(&ctx, NetRole::Authority);
    apply(&mut reverse, buff("C", ModOp::Multiply, 2.0));
    apply(&mut reverse, buff("B", ModOp::Add, 3.0));
    apply(&mut reverse, buff("A", ModOp::Add, 5.0));

    assert_eq!(forward.get_numeric_attribute(&power()), 36.0);
    assert_eq!(reverse.get_numeric_attribute(&power()), 36.0);
}

#[test]
fn removal_restores_the_previous_value() {
    let ctx = plain_context();
    let mut asc = hero(&ctx, NetRole::Authority);
    let might = || {
        GameplayEffectDef::infinite("Might").with_modifier(
            power(),
            ModOp::Add,
            MagnitudeFormula::constant(10.0),
        )
    };

    let before = asc.get_numeric_attribute(&power());
    let first = apply(&mut asc, might()).handle().unwrap();
    let applied = asc.get_numeric_attribute(&power());
    assert_eq!(applied, 20.0);

    assert!(asc.remove_active_gameplay_effect(first, -1));
    assert!(!asc.remove_active_gameplay_effect(first, -1));
    assert_eq!(asc.get_numeric_attribute(&power()), before);

    let second = apply(&mut asc, might()).handle().unwrap();
    assert_ne!(first, second);
    assert_eq!(asc.get_numeric_attribute(&power()), applied);
}

#[test]
fn stack_count_stops_at_the_limit() {
    let ctx = plain_context();
    let mut asc = hero(&ctx, NetRole::Authority);
    let rage = || {
        GameplayEffectDef::timed("Rage", 5.0)
            .with_stacking(StackingRules::aggregate_by_target(3))
            .with_modifier(power(), ModOp::Add, MagnitudeFormula::constant(1.0))
    };

    let mut last = ApplyOutcome::Executed;
    for _ in 0..5 {
        last = apply(&mut asc, rage());
    }
    let handle = last.handle().unwrap();
    assert!(matches!(
        last,
        ApplyOutcome::Stacked {
            stack_count: 3,
            overflowed: true,
            ..
        }
    ));
    assert_eq!(asc.container().len(), 1);
    assert_eq!(asc.container().stack_count(handle), Some(3));
}

#[test]
fn inhibited_effect_wakes_when_its_tag_arrives() {
    let ctx = plain_context();
    let mut asc = hero(&ctx, NetRole::Authority);
    let active = GameplayTag::new("Buff.Active");
    let focus = GameplayEffectDef::infinite("Focus")
        .with_ongoing_requirements(TagRequirements::requiring(TagContainer::from_names([
            "Buff.Active",
        ])))
        .with_modifier(power(), ModOp::Add, MagnitudeFormula::constant(5.0));

    let handle = apply(&mut asc, focus).handle().unwrap();
    assert!(asc.container().is_effect_inhibited(handle));
    assert_eq!(asc.get_numeric_attribute(&power()), 10.0);

    asc.add_loose_gameplay_tag(&active);
    assert!(!asc.container().is_effect_inhibited(handle));
    assert_eq!(asc.get_numeric_attribute(&power()), 15.0);

    asc.remove_loose_gameplay_tag(&active);
    assert!(asc.container().is_effect_inhibited(handle));
    assert_eq!(asc.get_numeric_attribute(&power()), 10.0);
    assert_eq!(asc.container().len(), 1);
}

#[test]
fn rejected_prediction_rolls_back() {
    let haste = GameplayEffectDef::timed("Haste", 6.0).with_modifier(
        power(),
        ModOp::Add,
        MagnitudeFormula::constant(4.0),
    );
    let ctx = AbilitySystemContext::builder()
        .library(EffectLibrary::from_defs([haste]).unwrap())
        .build();
    let mut client = hero(&ctx, NetRole::Client);

    let key = client.next_prediction_key();
    let spec = client.make_outgoing_spec(&"Haste".into(), 1.0).unwrap();
    client.apply_gameplay_effect_spec_to_self(spec, key).unwrap();
    assert_eq!(client.get_numeric_attribute(&power()), 14.0);

    assert_eq!(client.on_prediction_key_rejected(key), 1);
    assert!(client.container().is_empty());
    assert_eq!(client.get_numeric_attribute(&power()), 10.0);
}
