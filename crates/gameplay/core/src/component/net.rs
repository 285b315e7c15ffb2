use super::AbilitySystemComponent;
use crate::prediction::PredictionKey;
use crate::replication::{ContainerSnapshot, ReplicationDelta};

impl AbilitySystemComponent {
    /// Authoritative state for clients, including the highest prediction key
    /// applied here.
    pub fn snapshot(&self) -> ContainerSnapshot {
        self.container.snapshot(self.caught_up_key)
    }

    /// Applies a server snapshot and dispatches what it caused.
    pub fn receive_replication(&mut self, snapshot: &ContainerSnapshot) -> ReplicationDelta {
        let delta = self.container.receive_replication(snapshot);
        self.flush();
        delta
    }

    /// Decodes and applies a snapshot received over the wire.
    #[cfg(feature = "serde")]
    pub fn receive_replication_bytes(
        &mut self,
        bytes: &[u8],
    ) -> Result<ReplicationDelta, crate::replication::WireError> {
        let snapshot = ContainerSnapshot::decode(bytes)?;
        Ok(self.receive_replication(&snapshot))
    }

    /// The server has processed `key`; predictions made with it are replaced
    /// by replicated state.
    pub fn on_prediction_key_caught_up(&mut self, key: PredictionKey) -> usize {
        self.drop_predictions(key, "caught up")
    }

    /// The server refused `key`; predictions made with it are rolled back.
    pub fn on_prediction_key_rejected(&mut self, key: PredictionKey) -> usize {
        self.drop_predictions(key, "rejected")
    }

    fn drop_predictions(&mut self, key: PredictionKey, reason: &'static str) -> usize {
        if self.is_authority() || !key.is_valid_key() {
            return 0;
        }
        let removed = self.container.remove_predicted_effects(key);
        tracing::debug!(
            target: "gameplay::component",
            owner = %self.owner(),
            key = %key,
            reason,
            removed,
            "prediction key resolved"
        );
        self.flush();
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::NetRole;
    use super::super::test_support::*;
    use crate::aggregator::ModOp;
    use crate::context::AbilitySystemContext;
    use crate::effect::{EffectLibrary, GameplayEffectDef};
    use crate::magnitude::MagnitudeFormula;
    use crate::prediction::PredictionKey;

    fn context() -> Arc<AbilitySystemContext> {
        let haste = GameplayEffectDef::timed("Haste", 6.0).with_modifier(
            armor(),
            ModOp::Add,
            MagnitudeFormula::constant(4.0),
        );
        AbilitySystemContext::builder()
            .library(EffectLibrary::from_defs([haste]).unwrap())
            .build()
    }

    #[test]
    fn server_echoes_client_prediction() {
        let ctx = context();
        let mut server = component(&ctx, NetRole::Authority);
        let mut client = component(&ctx, NetRole::Client);
        client.receive_replication(&server.snapshot());

        let key = client.next_prediction_key();
        let spec = client.make_outgoing_spec(&"Haste".into(), 1.0).unwrap();
        client.apply_gameplay_effect_spec_to_self(spec, key).unwrap();
        assert_eq!(client.get_numeric_attribute(&armor()), 14.0);

        let spec = server.make_outgoing_spec(&"Haste".into(), 1.0).unwrap();
        server.apply_gameplay_effect_spec_to_self(spec, key).unwrap();
        let snapshot = server.snapshot();
        assert!(snapshot.caught_up_key.same_id(key));
        assert!(snapshot.effects[0].prediction_key.same_id(key));

        client.receive_replication(&snapshot);
        assert_eq!(client.container().len(), 1);
        assert!(client.container().iter().all(|effect| effect.is_replicated()));
        assert_eq!(client.get_numeric_attribute(&armor()), 14.0);
    }

    #[test]
    fn authority_ignores_key_resolution() {
        let ctx = context();
        let mut server = component(&ctx, NetRole::Authority);
        let spec = server.make_outgoing_spec(&"Haste".into(), 1.0).unwrap();
        server
            .apply_gameplay_effect_spec_to_self(spec, PredictionKey::local(1))
            .unwrap();
        assert_eq!(server.on_prediction_key_rejected(PredictionKey::local(1)), 0);
        assert_eq!(server.container().len(), 1);
    }
}
