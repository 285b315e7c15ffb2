#![cfg(feature = "serde")]

use std::sync::Arc;

use gameplay_core::{
    AbilitySystemComponent, AbilitySystemContext, AttributeHandle, ContainerSnapshot,
    EffectLibrary, EntityId, GameplayEffectDef, GameplayTag, MagnitudeFormula, ModOp, NetRole,
    NumericAttributeSet, PredictionKey, TagContainer,
};

fn health() -> AttributeHandle {
    AttributeHandle::new("Vitals", "Health")
}

fn power() -> AttributeHandle {
    AttributeHandle::new("Vitals", "Power")
}

fn context() -> Arc<AbilitySystemContext> {
    let defs = [
        GameplayEffectDef::timed("Might", 5.0)
            .with_modifier(power(), ModOp::Add, MagnitudeFormula::constant(6.0))
            .with_granted_tags(TagContainer::from_names(["Status.Mighty"])),
        GameplayEffectDef::instant("Hit").with_modifier(
            health(),
            ModOp::Add,
            MagnitudeFormula::constant(-30.0),
        ),
        GameplayEffectDef::infinite("Guard").with_modifier(
            power(),
            ModOp::Multiply,
            MagnitudeFormula::constant(2.0),
        ),
    ];
    AbilitySystemContext::builder()
        .library(EffectLibrary::from_defs(defs).unwrap())
        .build()
}

fn peer(ctx: &Arc<AbilitySystemContext>, role: NetRole) -> AbilitySystemComponent {
    AbilitySystemComponent::new(Arc::clone(ctx), EntityId(3), role).with_attribute_set(
        NumericAttributeSet::new("Vitals")
            .with("Health", 100.0)
            .with("Power", 10.0),
    )
}

fn cast(asc: &mut AbilitySystemComponent, id: &str, key: PredictionKey) {
    let spec = asc.make_outgoing_spec(&id.into(), 1.0).unwrap();
    asc.apply_gameplay_effect_spec_to_self(spec, key).unwrap();
}

fn ship(server: &AbilitySystemComponent, client: &mut AbilitySystemComponent) -> ContainerSnapshot {
    let snapshot = server.snapshot();
    let bytes = snapshot.encode().unwrap();
    client.receive_replication_bytes(&bytes).unwrap();
    snapshot
}

#[test]
fn client_converges_on_server_state() {
    let ctx = context();
    let mut server = peer(&ctx, NetRole::Authority);
    let mut client = peer(&ctx, NetRole::Client);

    cast(&mut server, "Might", PredictionKey::NONE);
    cast(&mut server, "Hit", PredictionKey::NONE);
    cast(&mut server, "Guard", PredictionKey::NONE);
    server.add_loose_gameplay_tag(&GameplayTag::new("State.Ready"));
    ship(&server, &mut client);

    assert_eq!(client.container().len(), 2);
    assert_eq!(client.get_numeric_attribute(&health()), 70.0);
    assert_eq!(client.get_numeric_attribute(&power()), 32.0);
    assert!(client.has_matching_tag(&GameplayTag::new("Status.Mighty")));
    assert!(client.has_matching_tag(&GameplayTag::new("State.Ready")));

    server.tick(5.0);
    ship(&server, &mut client);
    assert_eq!(client.container().len(), 1);
    assert_eq!(client.get_numeric_attribute(&power()), 20.0);
    assert!(!client.has_matching_tag(&GameplayTag::new("Status.Mighty")));
}

#[test]
fn predicted_effect_is_replaced_not_doubled() {
    let ctx = context();
    let mut server = peer(&ctx, NetRole::Authority);
    let mut client = peer(&ctx, NetRole::Client);

    let key = client.next_prediction_key();
    cast(&mut client, "Might", key);
    assert_eq!(client.get_numeric_attribute(&power()), 16.0);

    cast(&mut server, "Might", key);
    let snapshot = ship(&server, &mut client);
    assert!(snapshot.caught_up_key.same_id(key));
    assert_eq!(client.container().len(), 1);
    assert!(client.container().iter().all(|effect| effect.is_replicated()));
    assert_eq!(client.get_numeric_attribute(&power()), 16.0);
}

#[test]
fn equal_state_hashes_equal() {
    let ctx = context();
    let mut left = peer(&ctx, NetRole::Authority);
    let mut right = peer(&ctx, NetRole::Authority);
    for asc in [&mut left, &mut right] {
        cast(asc, "Guard", PredictionKey::NONE);
        cast(asc, "Hit", PredictionKey::NONE);
        asc.tick(1.5);
    }

    let digest = left.snapshot().digest().unwrap();
    assert_eq!(hex::encode(digest), hex::encode(right.snapshot().digest().unwrap()));

    let decoded = ContainerSnapshot::decode(&left.snapshot().encode().unwrap()).unwrap();
    assert_eq!(decoded.digest().unwrap(), digest);

    cast(&mut right, "Might", PredictionKey::NONE);
    assert_ne!(right.snapshot().digest().unwrap(), digest);
}

#[test]
fn garbage_bytes_are_rejected() {
    let ctx = context();
    let mut client = peer(&ctx, NetRole::Client);
    assert!(client.receive_replication_bytes(&[0xff, 0x01]).is_err());
    assert!(client.container().is_empty());
}
