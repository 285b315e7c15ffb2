//! Gameplay cue dispatch.
//!
//! Cues are cosmetic notifications keyed by tag (`GameplayCue.Fire.Burning`).
//! The core never presents anything: it resolves handlers and hands them a
//! [`CueEvent`] plus [`CueParameters`].
//!
//! Handler lookup is by exact tag first, then by the nearest registered parent
//! tag, so `GameplayCue.Fire` can serve every fire cue without its own entry
//! per child.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::attribute::AttributeHandle;
use crate::commands::EffectCommands;
use crate::effect::{EffectContext, EffectDefId};
use crate::tags::{GameplayTag, TagContainer};

#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CueEvent {
    /// The effect became active for the first time (or a loose cue was added).
    OnActive,
    /// The effect is active; also sent on reactivation after inhibition.
    WhileActive,
    /// An instant or periodic execution happened.
    Executed,
    Removed,
}

/// Cue entry on an effect definition.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EffectCue {
    pub tags: TagContainer,
    #[cfg_attr(feature = "serde", serde(default))]
    pub min_level: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub max_level: f32,
    /// When set, the raw magnitude sent to handlers is this attribute's
    /// modifier magnitude instead of the effect level.
    #[cfg_attr(feature = "serde", serde(default))]
    pub magnitude_attribute: Option<AttributeHandle>,
}

impl EffectCue {
    pub fn new(tags: TagContainer) -> Self {
        Self {
            tags,
            min_level: 0.0,
            max_level: 0.0,
            magnitude_attribute: None,
        }
    }

    pub fn with_levels(mut self, min_level: f32, max_level: f32) -> Self {
        self.min_level = min_level;
        self.max_level = max_level;
        self
    }

    pub fn with_magnitude_attribute(mut self, attribute: AttributeHandle) -> Self {
        self.magnitude_attribute = Some(attribute);
        self
    }

    /// Maps `level` into `[0, 1]` over `[min_level, max_level]`. A degenerate
    /// range always yields 1.
    pub fn normalize_level(&self, level: f32) -> f32 {
        let range = self.max_level - self.min_level;
        if range.abs() <= f32::EPSILON {
            return 1.0;
        }
        ((level - self.min_level) / range).clamp(0.0, 1.0)
    }
}

/// What a handler learns about the event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CueParameters {
    pub normalized_magnitude: f32,
    pub raw_magnitude: f32,
    pub context: EffectContext,
    pub effect: Option<EffectDefId>,
    pub source_tags: TagContainer,
    pub level: f32,
    pub stack_count: u32,
}

impl CueParameters {
    pub fn with_magnitude(raw_magnitude: f32) -> Self {
        Self {
            normalized_magnitude: 1.0,
            raw_magnitude,
            stack_count: 1,
            ..Self::default()
        }
    }
}

/// Presentation side of a cue tag.
pub trait GameplayCueHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Handlers may queue effect removals or tag changes on `commands`; they
    /// are applied after the current dispatch finishes.
    fn handle_event(
        &self,
        tag: &GameplayTag,
        event: CueEvent,
        params: &CueParameters,
        commands: &mut EffectCommands,
    );
}

/// A cue event waiting to be dispatched.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingCue {
    pub tag: GameplayTag,
    pub event: CueEvent,
    pub params: CueParameters,
}

/// Tag → handler registry. Built once, then shared through the context.
#[derive(Clone, Default)]
pub struct CueManager {
    handlers: BTreeMap<GameplayTag, Vec<Arc<dyn GameplayCueHandler>>>,
}

impl CueManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `tag`. A tag may have several handlers; they
    /// run in registration order.
    pub fn register(&mut self, tag: GameplayTag, handler: Arc<dyn GameplayCueHandler>) {
        self.handlers.entry(tag).or_default().push(handler);
    }

    /// Handlers for `tag`: its own, or else those of the nearest registered
    /// parent.
    pub fn handlers_for(&self, tag: &GameplayTag) -> &[Arc<dyn GameplayCueHandler>] {
        std::iter::once(tag.clone())
            .chain(tag.parents())
            .find_map(|candidate| self.handlers.get(&candidate))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Sends one cue to its handlers; returns how many received it.
    pub fn dispatch(&self, cue: &PendingCue, commands: &mut EffectCommands) -> usize {
        let handlers = self.handlers_for(&cue.tag);
        if handlers.is_empty() {
            tracing::trace!(
                target: "gameplay::cue",
                tag = %cue.tag,
                event = %cue.event,
                "no cue handler"
            );
        }
        for handler in handlers {
            tracing::trace!(
                target: "gameplay::cue",
                tag = %cue.tag,
                event = %cue.event,
                handler = handler.name(),
                "dispatching cue"
            );
            handler.handle_event(&cue.tag, cue.event, &cue.params, commands);
        }
        handlers.len()
    }

    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for CueManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: BTreeMap<&GameplayTag, Vec<&str>> = self
            .handlers
            .iter()
            .map(|(tag, handlers)| (tag, handlers.iter().map(|h| h.name()).collect()))
            .collect();
        f.debug_struct("CueManager").field("handlers", &names).finish()
    }
}
