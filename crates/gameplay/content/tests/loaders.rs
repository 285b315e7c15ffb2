#![cfg(feature = "loaders")]

use std::fs;
use std::sync::Arc;

use gameplay_content::ContentFactory;
use gameplay_core::{
    AbilitySystemComponent, AttributeHandle, EntityId, NetRole, PredictionKey, StackingType,
};
use tempfile::TempDir;

fn write(dir: &TempDir, file: &str, content: &str) {
    fs::write(dir.path().join(file), content).unwrap();
}

#[test]
fn directory_overrides_bundled_files() {
    let dir = TempDir::new().unwrap();
    write(&dir, "config.toml", "rng_seed = 42\n");
    write(
        &dir,
        "effects.ron",
        r#"[
            (
                id: "Sting",
                duration: Instant,
                modifiers: [(attribute: "Vitals.Health", op: Add, magnitude: ScalableFloat((value: -7.0)))],
            ),
        ]"#,
    );

    let factory = ContentFactory::new(dir.path());
    assert_eq!(factory.load_config().unwrap().rng_seed, 42);
    let library = factory.load_effects().unwrap();
    assert_eq!(library.len(), 1);

    // attributes.ron is absent and falls back to the bundled sets
    let sets = factory.load_attribute_sets().unwrap();
    assert_eq!(sets.len(), 1);
}

#[test]
fn broken_files_name_the_path() {
    let dir = TempDir::new().unwrap();
    write(&dir, "effects.ron", "[ (id: ");
    let error = ContentFactory::new(dir.path()).load_effects().unwrap_err();
    assert!(error.to_string().contains("effects.ron"));
}

#[test]
fn loaded_content_drives_a_component() {
    let factory = ContentFactory::bundled();
    let ctx = factory.build_context().unwrap();
    let mut asc = AbilitySystemComponent::new(Arc::clone(&ctx), EntityId(1), NetRole::Authority);
    for set in factory.load_attribute_sets().unwrap() {
        asc.add_attribute_set(Box::new(set));
    }
    let health = AttributeHandle::new("Vitals", "Health");
    let power = AttributeHandle::new("Vitals", "Power");

    let spec = asc.make_outgoing_spec(&"Poison".into(), 1.0).unwrap();
    asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE)
        .unwrap();
    asc.tick(10.0);
    assert_eq!(asc.get_numeric_attribute(&health), 75.0);

    let might = ctx.effect(&"Might".into()).unwrap();
    assert_eq!(might.stacking.stacking_type, StackingType::AggregateByTarget);
    for _ in 0..4 {
        let spec = asc.make_outgoing_spec(&"Might".into(), 1.0).unwrap();
        asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE)
            .unwrap();
    }
    // three stacks of +5, then the overflow multiplies by 1.5
    assert_eq!(asc.get_numeric_attribute(&power), 37.5);
}
