use super::{ActiveEffectHandle, EffectDuration, GameplayEffectSpec};
use crate::aggregator::AggregatorId;
use crate::prediction::PredictionKey;
use crate::replication::ReplicationId;

/// Lifecycle of an active effect.
///
/// `Pending → Active → [Inhibited ⇄ Active] → PendingRemoval → (erased)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EffectState {
    /// Stored but inhibition not yet evaluated.
    Pending,
    Active,
    /// Ongoing tag requirements unmet; contributes nothing.
    Inhibited,
    /// Removal requested while the container was locked.
    PendingRemoval,
}

/// A duration or infinite effect stored in a container.
#[derive(Clone, Debug)]
pub struct ActiveGameplayEffect {
    pub(crate) handle: ActiveEffectHandle,
    pub(crate) spec: GameplayEffectSpec,
    pub(crate) start_world_time: f32,
    pub(crate) next_period_time: Option<f32>,
    /// Period boundaries are counted from this instant.
    pub(crate) period_anchor: f32,
    pub(crate) periods_elapsed: u64,
    pub(crate) prediction_key: PredictionKey,
    pub(crate) state: EffectState,
    /// Set on clients for effects received through replication.
    pub(crate) replication_id: Option<ReplicationId>,
    /// Live capture edges `(captured, modified)` owned by this effect.
    pub(crate) dependency_links: Vec<(AggregatorId, AggregatorId)>,
    /// OnActive has fired once; later activations only fire WhileActive.
    pub(crate) has_activated: bool,
}

impl ActiveGameplayEffect {
    pub(crate) fn new(
        handle: ActiveEffectHandle,
        spec: GameplayEffectSpec,
        start_world_time: f32,
        prediction_key: PredictionKey,
    ) -> Self {
        Self {
            handle,
            spec,
            start_world_time,
            next_period_time: None,
            period_anchor: start_world_time,
            periods_elapsed: 0,
            prediction_key,
            state: EffectState::Pending,
            replication_id: None,
            dependency_links: Vec::new(),
            has_activated: false,
        }
    }

    pub fn handle(&self) -> ActiveEffectHandle {
        self.handle
    }

    pub fn spec(&self) -> &GameplayEffectSpec {
        &self.spec
    }

    pub fn start_world_time(&self) -> f32 {
        self.start_world_time
    }

    pub fn state(&self) -> EffectState {
        self.state
    }

    pub fn is_inhibited(&self) -> bool {
        matches!(self.state, EffectState::Inhibited | EffectState::Pending)
    }

    pub fn is_pending_removal(&self) -> bool {
        self.state == EffectState::PendingRemoval
    }

    pub fn prediction_key(&self) -> PredictionKey {
        self.prediction_key
    }

    /// Predicted locally and not yet confirmed by the server.
    pub fn is_predicted(&self) -> bool {
        self.prediction_key.is_local_client_key()
    }

    pub fn is_replicated(&self) -> bool {
        self.replication_id.is_some()
    }

    pub fn stack_count(&self) -> u32 {
        self.spec.stack_count()
    }

    pub fn duration(&self) -> EffectDuration {
        self.spec.duration()
    }

    /// World time at which the effect expires; `None` when it never does.
    pub fn end_time(&self) -> Option<f32> {
        self.spec
            .duration()
            .seconds()
            .map(|seconds| self.start_world_time + seconds)
    }

    pub fn time_remaining(&self, now: f32) -> Option<f32> {
        self.end_time().map(|end| (end - now).max(0.0))
    }

    pub fn next_period_time(&self) -> Option<f32> {
        self.next_period_time
    }

    /// Schedules the first boundary one period after `now`.
    pub(crate) fn restart_period(&mut self, now: f32) {
        self.period_anchor = now;
        self.periods_elapsed = 0;
        self.next_period_time = self.period_boundary(1);
    }

    /// Steps past the boundary that just fired. Boundaries are computed as
    /// `anchor + k * period` in f64 so they keep moving even when one period
    /// is below the precision of an f32 world time.
    pub(crate) fn advance_period(&mut self) {
        self.periods_elapsed = self.periods_elapsed.saturating_add(1);
        self.next_period_time = self.period_boundary(self.periods_elapsed.saturating_add(1));
    }

    fn period_boundary(&self, index: u64) -> Option<f32> {
        let period = self.spec.period();
        if !(period > 0.0 && period.is_finite()) {
            return None;
        }
        let boundary = f64::from(self.period_anchor) + index as f64 * f64::from(period);
        Some(boundary as f32).filter(|time| time.is_finite())
    }

    /// Duration mods are live only while active and not periodic.
    pub(crate) fn contributes_modifiers(&self) -> bool {
        self.state == EffectState::Active && !self.spec.is_periodic()
    }

    /// Owned (granted and cue) tags count while the effect is active.
    pub(crate) fn grants_tags(&self) -> bool {
        self.state == EffectState::Active
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::effect::{EffectContext, GameplayEffectDef};

    #[test]
    fn timing_accessors() {
        let spec = GameplayEffectSpec::new(
            Arc::new(GameplayEffectDef::timed("GE_Slow", 4.0)),
            1.0,
            EffectContext::new(),
        );
        let effect = ActiveGameplayEffect::new(
            ActiveEffectHandle::from_parts(0, 1),
            spec,
            10.0,
            PredictionKey::NONE,
        );
        assert_eq!(effect.end_time(), Some(14.0));
        assert_eq!(effect.time_remaining(13.0), Some(1.0));
        assert_eq!(effect.time_remaining(20.0), Some(0.0));
        assert!(effect.is_inhibited());
        assert!(!effect.contributes_modifiers());
    }
}
