//! Owner-facing API over one effects container.
//!
//! The component decides *whether* something may happen (network role,
//! prediction keys, immunity, chance, tag requirements) and the container
//! decides *how*. Notifications produced by the container are dispatched
//! here, after the container has settled, so cue handlers and listeners
//! never observe a half-applied state.

mod apply;
mod attributes;
mod cues;
mod error;
mod listeners;
mod net;

pub use error::{ApplyRejection, AttributeError};
pub use listeners::{AttributeListener, ListenerId, RemovalListener};

use std::sync::Arc;

use crate::attribute::{AttributeHandle, AttributeSet};
use crate::commands::{EffectCommand, EffectCommands};
use crate::container::ActiveGameplayEffectsContainer;
use crate::context::AbilitySystemContext;
use crate::effect::{ActiveEffectHandle, ActiveEffectQuery, EntityId};
use crate::prediction::{PredictionKey, PredictionKeyGenerator};
use crate::tags::{GameplayTag, TagCountContainer};

use listeners::Listeners;

/// Which side of the connection this component simulates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NetRole {
    /// Server or standalone: owns the truth.
    Authority,
    /// Predicts locally and reconciles against snapshots.
    Client,
}

pub struct AbilitySystemComponent {
    ctx: Arc<AbilitySystemContext>,
    role: NetRole,
    container: ActiveGameplayEffectsContainer,
    keys: PredictionKeyGenerator,
    /// Applications attempted so far; part of every chance-roll seed.
    nonce: u64,
    /// Authority only: highest client key applied here.
    caught_up_key: PredictionKey,
    listeners: Listeners,
    commands: EffectCommands,
}

impl AbilitySystemComponent {
    pub fn new(ctx: Arc<AbilitySystemContext>, owner: EntityId, role: NetRole) -> Self {
        let container = ActiveGameplayEffectsContainer::new(
            Arc::clone(&ctx),
            owner,
            role == NetRole::Authority,
        );
        Self {
            ctx,
            role,
            container,
            keys: PredictionKeyGenerator::new(),
            nonce: 0,
            caught_up_key: PredictionKey::NONE,
            listeners: Listeners::default(),
            commands: EffectCommands::new(),
        }
    }

    pub fn with_attribute_set(mut self, set: impl AttributeSet + 'static) -> Self {
        self.add_attribute_set(Box::new(set));
        self
    }

    pub fn add_attribute_set(&mut self, set: Box<dyn AttributeSet>) {
        self.container.add_attribute_set(set);
        self.flush();
    }

    pub fn owner(&self) -> EntityId {
        self.container.owner()
    }

    pub fn role(&self) -> NetRole {
        self.role
    }

    pub fn is_authority(&self) -> bool {
        self.role == NetRole::Authority
    }

    pub fn context(&self) -> &Arc<AbilitySystemContext> {
        &self.ctx
    }

    /// Read access to the active effects and aggregators.
    pub fn container(&self) -> &ActiveGameplayEffectsContainer {
        &self.container
    }

    pub fn owned_tags(&self) -> &TagCountContainer {
        self.container.owned_tags()
    }

    pub fn has_matching_tag(&self, tag: &GameplayTag) -> bool {
        self.container.has_matching_tag(tag)
    }

    pub fn add_loose_gameplay_tag(&mut self, tag: &GameplayTag) {
        self.container.update_loose_tag(tag, 1);
        self.flush();
    }

    pub fn remove_loose_gameplay_tag(&mut self, tag: &GameplayTag) {
        self.container.update_loose_tag(tag, -1);
        self.flush();
    }

    /// Removes `stacks` stacks (negative removes all). False for unknown or
    /// stale handles.
    pub fn remove_active_gameplay_effect(&mut self, handle: ActiveEffectHandle, stacks: i32) -> bool {
        let removed = self.container.remove_active_gameplay_effect(handle, stacks);
        self.flush();
        removed
    }

    pub fn remove_active_effects(&mut self, query: &ActiveEffectQuery, stacks: i32) -> usize {
        let removed = self.container.remove_active_effects(query, stacks);
        self.flush();
        removed
    }

    /// Advances the owner's clock, firing periods and expiries.
    pub fn tick(&mut self, dt: f32) {
        self.container.advance_time(dt);
        self.flush();
    }

    pub fn next_prediction_key(&mut self) -> PredictionKey {
        self.keys.next_key()
    }

    pub fn on_attribute_changed(
        &mut self,
        attribute: AttributeHandle,
        listener: AttributeListener,
    ) -> ListenerId {
        self.listeners.add_attribute(attribute, listener)
    }

    pub fn remove_attribute_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove_attribute(id)
    }

    /// Registers a listener for the effect's removal. Returns false when the
    /// handle does not resolve to a live effect.
    pub fn on_effect_removed(&mut self, handle: ActiveEffectHandle, listener: RemovalListener) -> bool {
        if self.container.get(handle).is_none() {
            return false;
        }
        self.listeners.add_removal(handle, listener);
        true
    }

    /// Dispatches queued cues, removal and attribute notifications, then
    /// applies the commands callbacks queued, until nothing is left.
    /// Returns how many cue events were dispatched.
    pub fn flush(&mut self) -> usize {
        let max_rounds = self.ctx.config().max_settle_rounds;
        let mut rounds = 0;
        let mut dispatched = 0;
        while self.container.has_pending_notifications() || !self.commands.is_empty() {
            if rounds == max_rounds {
                tracing::error!(
                    target: "gameplay::component",
                    owner = %self.owner(),
                    rounds,
                    "notification loop did not converge, dropping queued commands"
                );
                self.commands.drain();
                break;
            }
            rounds += 1;

            let cues = self.container.take_pending_cues();
            for cue in &cues {
                self.ctx.cues().dispatch(cue, &mut self.commands);
            }
            dispatched += cues.len();

            for info in self.container.take_removed() {
                self.listeners.notify_removed(&info, &mut self.commands);
            }
            for change in self.container.take_attribute_changes() {
                self.listeners.notify_attribute(&change, &mut self.commands);
            }

            self.apply_commands();
        }
        dispatched
    }

    fn apply_commands(&mut self) {
        let commands = self.commands.drain();
        if commands.is_empty() {
            return;
        }
        tracing::trace!(
            target: "gameplay::component",
            owner = %self.owner(),
            count = commands.len(),
            "applying queued commands"
        );
        self.container.increment_lock();
        for command in commands {
            match command {
                EffectCommand::RemoveEffect { handle, stacks } => {
                    self.container.remove_active_gameplay_effect(handle, stacks);
                }
                EffectCommand::RemoveEffects { query, stacks } => {
                    self.container.remove_active_effects(&query, stacks);
                }
                EffectCommand::AddLooseTag(tag) => self.container.update_loose_tag(&tag, 1),
                EffectCommand::RemoveLooseTag(tag) => self.container.update_loose_tag(&tag, -1),
            }
        }
        self.container.decrement_lock();
    }
}

impl std::fmt::Debug for AbilitySystemComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbilitySystemComponent")
            .field("role", &self.role)
            .field("container", &self.container)
            .field("nonce", &self.nonce)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::attribute::NumericAttributeSet;

    pub(crate) fn health() -> AttributeHandle {
        AttributeHandle::new("Vitals", "Health")
    }

    pub(crate) fn armor() -> AttributeHandle {
        AttributeHandle::new("Vitals", "Armor")
    }

    pub(crate) fn vitals() -> NumericAttributeSet {
        NumericAttributeSet::new("Vitals")
            .with("Health", 100.0)
            .with("Armor", 10.0)
            .with_bounds("Health", 0.0, 100.0)
    }

    pub(crate) fn component(ctx: &Arc<AbilitySystemContext>, role: NetRole) -> AbilitySystemComponent {
        AbilitySystemComponent::new(Arc::clone(ctx), EntityId(1), role).with_attribute_set(vitals())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::test_support::*;
    use super::*;
    use crate::aggregator::ModOp;
    use crate::container::ALL_STACKS;
    use crate::effect::{EffectContext, GameplayEffectDef, GameplayEffectSpec};
    use crate::magnitude::MagnitudeFormula;
    use crate::tags::TagContainer;

    fn spec(def: GameplayEffectDef) -> GameplayEffectSpec {
        GameplayEffectSpec::new(Arc::new(def), 1.0, EffectContext::default())
    }

    #[test]
    fn listeners_see_changes_after_settle() {
        let ctx = Arc::new(AbilitySystemContext::default());
        let mut asc = component(&ctx, NetRole::Authority);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        asc.on_attribute_changed(
            armor(),
            Box::new(move |change, _| sink.lock().unwrap().push((change.old_value, change.new_value))),
        );

        let handle = asc
            .apply_gameplay_effect_spec_to_self(
                spec(GameplayEffectDef::infinite("Plate").with_modifier(
                    armor(),
                    ModOp::Add,
                    MagnitudeFormula::constant(5.0),
                )),
                PredictionKey::NONE,
            )
            .unwrap()
            .handle()
            .unwrap();
        asc.remove_active_gameplay_effect(handle, ALL_STACKS);

        assert_eq!(*seen.lock().unwrap(), vec![(10.0, 15.0), (15.0, 10.0)]);
    }

    #[test]
    fn removal_listener_commands_are_applied() {
        let ctx = Arc::new(AbilitySystemContext::default());
        let mut asc = component(&ctx, NetRole::Authority);
        let burning = GameplayTag::new("State.Burning");
        let def = GameplayEffectDef::timed("Burn", 2.0)
            .with_granted_tags(TagContainer::from_names(["State.Burning"]));
        let handle = asc
            .apply_gameplay_effect_spec_to_self(spec(def), PredictionKey::NONE)
            .unwrap()
            .handle()
            .unwrap();

        let scorched = GameplayTag::new("State.Scorched");
        let tag = scorched.clone();
        assert!(asc.on_effect_removed(
            handle,
            Box::new(move |info, commands| {
                assert!(info.expired);
                commands.add_loose_tag(tag);
            }),
        ));
        assert!(asc.has_matching_tag(&burning));

        asc.tick(2.5);
        assert!(!asc.has_matching_tag(&burning));
        assert!(asc.has_matching_tag(&scorched));
        assert!(!asc.on_effect_removed(handle, Box::new(|_, _| {})));
    }
}
