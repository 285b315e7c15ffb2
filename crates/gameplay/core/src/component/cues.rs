use super::AbilitySystemComponent;
use crate::cue::{CueEvent, CueParameters, PendingCue};
use crate::tags::GameplayTag;

impl AbilitySystemComponent {
    /// Fires a one-shot cue not tied to any effect.
    pub fn execute_gameplay_cue(&mut self, tag: GameplayTag, params: CueParameters) {
        self.push_cue(tag, CueEvent::Executed, params);
        self.flush();
    }

    /// Starts a loose cue. Its tag is owned (as a loose tag) until the
    /// matching [`remove_gameplay_cue`](Self::remove_gameplay_cue).
    pub fn add_gameplay_cue(&mut self, tag: GameplayTag, params: CueParameters) {
        self.container.update_loose_tag(&tag, 1);
        self.push_cue(tag.clone(), CueEvent::OnActive, params.clone());
        self.push_cue(tag, CueEvent::WhileActive, params);
        self.flush();
    }

    /// Ends one loose cue. False when none was active for `tag`.
    pub fn remove_gameplay_cue(&mut self, tag: &GameplayTag) -> bool {
        if self.container.loose_tags.explicit_count(tag) == 0 {
            return false;
        }
        self.container.update_loose_tag(tag, -1);
        self.push_cue(tag.clone(), CueEvent::Removed, CueParameters::default());
        self.flush();
        true
    }

    /// True while a loose cue or an active effect's cue owns `tag`.
    pub fn is_gameplay_cue_active(&self, tag: &GameplayTag) -> bool {
        self.container.owned_tags().explicit_count(tag) > 0
    }

    fn push_cue(&mut self, tag: GameplayTag, event: CueEvent, params: CueParameters) {
        tracing::trace!(
            target: "gameplay::cue",
            owner = %self.owner(),
            tag = %tag,
            event = %event,
            "loose cue"
        );
        self.container
            .pending_cues
            .push(PendingCue { tag, event, params });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::super::NetRole;
    use super::super::test_support::*;
    use super::*;
    use crate::aggregator::ModOp;
    use crate::commands::EffectCommands;
    use crate::context::AbilitySystemContext;
    use crate::cue::{EffectCue, GameplayCueHandler};
    use crate::effect::GameplayEffectDef;
    use crate::magnitude::MagnitudeFormula;
    use crate::prediction::PredictionKey;
    use crate::tags::TagContainer;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, CueEvent)>>,
    }

    impl GameplayCueHandler for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn handle_event(
            &self,
            tag: &GameplayTag,
            event: CueEvent,
            _params: &CueParameters,
            _commands: &mut EffectCommands,
        ) {
            self.seen.lock().unwrap().push((tag.to_string(), event));
        }
    }

    fn recording_context() -> (Arc<AbilitySystemContext>, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let ctx = AbilitySystemContext::builder()
            .cue_handler(GameplayTag::new("GameplayCue"), recorder.clone())
            .build();
        (ctx, recorder)
    }

    #[test]
    fn loose_cue_lifecycle() {
        let (ctx, recorder) = recording_context();
        let mut asc = component(&ctx, NetRole::Authority);
        let aura = GameplayTag::new("GameplayCue.Aura");

        asc.add_gameplay_cue(aura.clone(), CueParameters::with_magnitude(1.0));
        assert!(asc.is_gameplay_cue_active(&aura));
        asc.execute_gameplay_cue(GameplayTag::new("GameplayCue.Spark"), CueParameters::default());
        assert!(asc.remove_gameplay_cue(&aura));
        assert!(!asc.remove_gameplay_cue(&aura));
        assert!(!asc.is_gameplay_cue_active(&aura));

        let seen = recorder.seen.lock().unwrap();
        let events: Vec<CueEvent> = seen.iter().map(|(_, event)| *event).collect();
        assert_eq!(
            events,
            vec![
                CueEvent::OnActive,
                CueEvent::WhileActive,
                CueEvent::Executed,
                CueEvent::Removed,
            ]
        );
    }

    #[test]
    fn effect_cues_follow_the_effect() {
        let (ctx, recorder) = recording_context();
        let mut asc = component(&ctx, NetRole::Authority);
        let def = GameplayEffectDef::timed("Burn", 1.0)
            .with_modifier(health(), ModOp::Add, MagnitudeFormula::constant(-5.0))
            .with_cue(EffectCue::new(TagContainer::from_names(["GameplayCue.Burn"])));
        let spec = asc.make_outgoing_spec_from(Arc::new(def), 1.0);
        asc.apply_gameplay_effect_spec_to_self(spec, PredictionKey::NONE)
            .unwrap();
        assert!(asc.is_gameplay_cue_active(&GameplayTag::new("GameplayCue.Burn")));

        asc.tick(1.0);
        assert!(!asc.is_gameplay_cue_active(&GameplayTag::new("GameplayCue.Burn")));
        let events: Vec<CueEvent> = recorder
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| *event)
            .collect();
        assert_eq!(
            events,
            vec![CueEvent::OnActive, CueEvent::WhileActive, CueEvent::Removed]
        );
    }
}
