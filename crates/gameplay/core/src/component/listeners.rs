use std::collections::BTreeMap;
use std::fmt;

use crate::attribute::AttributeHandle;
use crate::commands::EffectCommands;
use crate::container::{AttributeChange, RemovedEffectInfo};
use crate::effect::ActiveEffectHandle;

/// Called for every change of one attribute's current value.
pub type AttributeListener = Box<dyn FnMut(&AttributeChange, &mut EffectCommands) + Send>;

/// Called once when an effect leaves the container.
pub type RemovalListener = Box<dyn FnOnce(&RemovedEffectInfo, &mut EffectCommands) + Send>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u32);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u32,
    attribute: BTreeMap<AttributeHandle, Vec<(ListenerId, AttributeListener)>>,
    removal: BTreeMap<ActiveEffectHandle, Vec<RemovalListener>>,
}

impl Listeners {
    pub(crate) fn add_attribute(
        &mut self,
        attribute: AttributeHandle,
        listener: AttributeListener,
    ) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.attribute
            .entry(attribute)
            .or_default()
            .push((id, listener));
        id
    }

    pub(crate) fn remove_attribute(&mut self, id: ListenerId) -> bool {
        let mut found = false;
        self.attribute.retain(|_, listeners| {
            let before = listeners.len();
            listeners.retain(|(listener_id, _)| *listener_id != id);
            found |= listeners.len() != before;
            !listeners.is_empty()
        });
        found
    }

    pub(crate) fn add_removal(&mut self, handle: ActiveEffectHandle, listener: RemovalListener) {
        self.removal.entry(handle).or_default().push(listener);
    }

    pub(crate) fn notify_attribute(&mut self, change: &AttributeChange, commands: &mut EffectCommands) {
        if let Some(listeners) = self.attribute.get_mut(&change.attribute) {
            for (_, listener) in listeners.iter_mut() {
                listener(change, commands);
            }
        }
    }

    pub(crate) fn notify_removed(&mut self, info: &RemovedEffectInfo, commands: &mut EffectCommands) {
        for listener in self.removal.remove(&info.handle).unwrap_or_default() {
            listener(info, commands);
        }
    }

    pub(crate) fn attribute_listener_count(&self) -> usize {
        self.attribute.values().map(Vec::len).sum()
    }

    pub(crate) fn removal_listener_count(&self) -> usize {
        self.removal.values().map(Vec::len).sum()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("attribute", &self.attribute_listener_count())
            .field("removal", &self.removal_listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn change(attribute: &AttributeHandle, old_value: f32, new_value: f32) -> AttributeChange {
        AttributeChange {
            attribute: attribute.clone(),
            old_value,
            new_value,
        }
    }

    #[test]
    fn attribute_listener_can_be_removed() {
        let health = AttributeHandle::new("Vitals", "Health");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut listeners = Listeners::default();
        let sink = Arc::clone(&seen);
        let id = listeners.add_attribute(
            health.clone(),
            Box::new(move |change, _| sink.lock().unwrap().push(change.new_value)),
        );

        let mut commands = EffectCommands::new();
        listeners.notify_attribute(&change(&health, 100.0, 80.0), &mut commands);
        assert!(listeners.remove_attribute(id));
        assert!(!listeners.remove_attribute(id));
        listeners.notify_attribute(&change(&health, 80.0, 60.0), &mut commands);

        assert_eq!(*seen.lock().unwrap(), vec![80.0]);
        assert_eq!(listeners.attribute_listener_count(), 0);
    }

    #[test]
    fn removal_listener_fires_once() {
        let handle = ActiveEffectHandle::from_parts(0, 1);
        let mut listeners = Listeners::default();
        listeners.add_removal(
            handle,
            Box::new(|info, commands| commands.remove_effect(info.handle, 1)),
        );
        let info = RemovedEffectInfo {
            handle,
            effect: "Burn".into(),
            stack_count: 1,
            expired: true,
        };

        let mut commands = EffectCommands::new();
        listeners.notify_removed(&info, &mut commands);
        listeners.notify_removed(&info, &mut commands);
        assert_eq!(commands.len(), 1);
        assert_eq!(listeners.removal_listener_count(), 0);
    }
}
