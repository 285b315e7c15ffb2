use std::cmp::Ordering;

use super::{ALL_STACKS, ActiveGameplayEffectsContainer};
use crate::effect::{ActiveEffectHandle, ActiveGameplayEffect, StackExpirationPolicy};

/// Periods fire before expiry when both fall on the same instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum TimerKind {
    Period,
    Expire,
}

#[derive(Clone, Copy, Debug)]
struct DueTimer {
    time: f32,
    kind: TimerKind,
    position: usize,
    handle: ActiveEffectHandle,
}

impl DueTimer {
    fn cmp_key(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.kind.cmp(&other.kind))
            .then(self.position.cmp(&other.position))
    }
}

impl ActiveGameplayEffectsContainer {
    /// Advances world time by `dt`, firing every period and expiry that falls
    /// inside the step in time order.
    pub fn advance_time(&mut self, dt: f32) {
        let target = self.world_time + if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.locked(|container| {
            while let Some(due) = container.next_due_timer(target) {
                container.world_time = container.world_time.max(due.time);
                match due.kind {
                    TimerKind::Period => container.fire_period(due.handle),
                    TimerKind::Expire => {
                        container.check_duration(due.handle);
                    }
                }
            }
            container.world_time = target;
        });
    }

    /// Clients only run timers for effects they own outright; replicated
    /// effects follow the server.
    fn runs_timers(&self, effect: &ActiveGameplayEffect) -> bool {
        self.is_authority || !effect.is_replicated()
    }

    fn next_due_timer(&self, target: f32) -> Option<DueTimer> {
        let mut best: Option<DueTimer> = None;
        let mut consider = |candidate: DueTimer| {
            if best.is_none_or(|current| candidate.cmp_key(&current) == Ordering::Less) {
                best = Some(candidate);
            }
        };
        for (position, &handle) in self.order.iter().enumerate() {
            let Some(effect) = self.effects.get(handle) else {
                continue;
            };
            if effect.is_pending_removal() || !self.runs_timers(effect) {
                continue;
            }
            if let Some(time) = effect.next_period_time.filter(|time| *time <= target) {
                consider(DueTimer {
                    time,
                    kind: TimerKind::Period,
                    position,
                    handle,
                });
            }
            if let Some(time) = effect.end_time().filter(|time| *time <= target) {
                consider(DueTimer {
                    time,
                    kind: TimerKind::Expire,
                    position,
                    handle,
                });
            }
        }
        best
    }

    fn fire_period(&mut self, handle: ActiveEffectHandle) {
        let Some(effect) = self.effects.get_mut(handle) else {
            return;
        };
        let Some(due) = effect.next_period_time else {
            return;
        };
        effect.advance_period();
        if effect.next_period_time.is_none_or(|next| next < due) {
            tracing::error!(
                target: "gameplay::container",
                owner = %self.owner,
                handle = %handle,
                due,
                period = effect.spec.period(),
                "period boundary stopped advancing, periodic execution halted"
            );
            effect.next_period_time = None;
        }
        self.execute_periodic_effect(handle);
    }

    /// Handles an effect whose duration ran out according to its stack
    /// expiration policy. Returns false when the effect has not expired.
    pub fn check_duration(&mut self, handle: ActiveEffectHandle) -> bool {
        let Some(effect) = self.effects.get(handle) else {
            return false;
        };
        let Some(end) = effect.end_time() else {
            return false;
        };
        if self.world_time < end || effect.is_pending_removal() {
            return false;
        }

        let count = effect.stack_count();
        match effect.spec.def().stacking.expiration {
            StackExpirationPolicy::RemoveSingleStackAndRefreshDuration if count > 1 => {
                self.restart_duration(handle);
                self.locked(|container| container.set_stack_count(handle, count - 1));
            }
            StackExpirationPolicy::RefreshDuration => self.restart_duration(handle),
            StackExpirationPolicy::ClearEntireStack
            | StackExpirationPolicy::RemoveSingleStackAndRefreshDuration => {
                self.remove_effect_internal(handle, ALL_STACKS, true, false);
            }
        }
        true
    }

    fn restart_duration(&mut self, handle: ActiveEffectHandle) {
        let now = self.world_time;
        if let Some(effect) = self.effects.get_mut(handle) {
            effect.start_world_time = now;
            tracing::debug!(
                target: "gameplay::container",
                owner = %self.owner,
                handle = %handle,
                "duration restarted"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::test_support::*;
    use crate::aggregator::ModOp;
    use crate::effect::{
        EffectContext, GameplayEffectDef, GameplayEffectSpec, StackExpirationPolicy,
        StackingRules,
    };
    use crate::magnitude::MagnitudeFormula;
    use crate::prediction::PredictionKey;

    fn spec(def: GameplayEffectDef) -> GameplayEffectSpec {
        GameplayEffectSpec::new(Arc::new(def), 1.0, EffectContext::default())
    }

    #[test]
    fn periodic_effect_fires_on_each_period_including_the_last() {
        let mut container = container();
        let bleed = GameplayEffectDef::timed("Bleed", 10.0)
            .with_period(2.0)
            .with_modifier(health(), ModOp::Add, MagnitudeFormula::constant(-5.0));
        container.apply_gameplay_effect_spec(spec(bleed), PredictionKey::NONE);

        container.advance_time(3.0);
        assert_eq!(container.get_numeric_attribute(&health()), 95.0);

        container.advance_time(7.0);
        assert_eq!(container.get_numeric_attribute(&health()), 75.0);
        assert_eq!(container.len(), 0);

        let removed = container.take_removed();
        assert_eq!(removed.len(), 1);
        assert!(removed[0].expired);
    }

    #[test]
    fn execute_on_application_adds_one_more_tick() {
        let mut container = container();
        let bleed = GameplayEffectDef::timed("Bleed", 4.0)
            .with_period(2.0)
            .executing_on_application()
            .with_modifier(health(), ModOp::Add, MagnitudeFormula::constant(-5.0));
        container.apply_gameplay_effect_spec(spec(bleed), PredictionKey::NONE);
        assert_eq!(container.get_numeric_attribute(&health()), 95.0);

        container.advance_time(10.0);
        assert_eq!(container.get_numeric_attribute(&health()), 85.0);
    }

    #[test]
    fn single_stack_expiration_refreshes() {
        let mut container = container();
        let mut rules = StackingRules::aggregate_by_target(3);
        rules.expiration = StackExpirationPolicy::RemoveSingleStackAndRefreshDuration;
        let def = Arc::new(
            GameplayEffectDef::timed("Shield", 5.0)
                .with_modifier(armor(), ModOp::Add, MagnitudeFormula::constant(2.0))
                .with_stacking(rules),
        );
        for _ in 0..2 {
            let spec = GameplayEffectSpec::new(Arc::clone(&def), 1.0, EffectContext::default());
            container.apply_gameplay_effect_spec(spec, PredictionKey::NONE);
        }
        assert_eq!(container.get_numeric_attribute(&armor()), 14.0);

        container.advance_time(5.0);
        assert_eq!(container.get_numeric_attribute(&armor()), 12.0);
        container.advance_time(5.0);
        assert_eq!(container.get_numeric_attribute(&armor()), 10.0);
        assert!(container.is_empty());
    }
    #[test]
    fn short_periods_keep_firing_late_in_the_world() {
        let mut container = container();
        container.advance_time(1.0e6);
        let drip = GameplayEffectDef::infinite("Drip")
            .with_period(0.03)
            .with_modifier(armor(), ModOp::Add, MagnitudeFormula::constant(1.0));
        container.apply_gameplay_effect_spec(spec(drip), PredictionKey::NONE);

        // 0.03 is below half an ulp of 1e6, so boundaries collapse onto
        // shared instants but still count up to the end of the step
        container.advance_time(1.0);
        let fired = container.get_numeric_attribute(&armor()) - 10.0;
        assert!((33.0..=34.0).contains(&fired), "fired {fired} times");
        assert_eq!(container.len(), 1);
        let effect = container.iter().next().unwrap();
        assert!(effect.next_period_time().unwrap() > container.world_time());
    }
}
