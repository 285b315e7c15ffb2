//! Deferred requests issued from callbacks.
//!
//! Cue handlers and listeners run while the component is dispatching and
//! cannot borrow it mutably. They push commands instead; the component drains
//! the buffer once the current dispatch has finished.

use crate::effect::{ActiveEffectHandle, ActiveEffectQuery};
use crate::tags::GameplayTag;

#[derive(Clone, Debug, PartialEq)]
pub enum EffectCommand {
    /// Remove `stacks` stacks (negative removes all).
    RemoveEffect {
        handle: ActiveEffectHandle,
        stacks: i32,
    },
    RemoveEffects {
        query: ActiveEffectQuery,
        stacks: i32,
    },
    AddLooseTag(GameplayTag),
    RemoveLooseTag(GameplayTag),
}

/// Command buffer handed to callbacks.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectCommands {
    commands: Vec<EffectCommand>,
}

impl EffectCommands {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove_effect(&mut self, handle: ActiveEffectHandle, stacks: i32) {
        self.commands
            .push(EffectCommand::RemoveEffect { handle, stacks });
    }

    pub fn remove_effects(&mut self, query: ActiveEffectQuery, stacks: i32) {
        self.commands
            .push(EffectCommand::RemoveEffects { query, stacks });
    }

    pub fn add_loose_tag(&mut self, tag: GameplayTag) {
        self.commands.push(EffectCommand::AddLooseTag(tag));
    }

    pub fn remove_loose_tag(&mut self, tag: GameplayTag) {
        self.commands.push(EffectCommand::RemoveLooseTag(tag));
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Takes every queued command in push order.
    pub fn drain(&mut self) -> Vec<EffectCommand> {
        std::mem::take(&mut self.commands)
    }
}
