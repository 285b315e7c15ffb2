use std::collections::{BTreeMap, BTreeSet};

use super::AggregatorId;
use crate::effect::ActiveEffectHandle;

/// Registering this edge would let an attribute depend on itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("attribute dependency {from} -> {to} would form a cycle")]
pub struct CycleError {
    pub from: AggregatorId,
    pub to: AggregatorId,
}

/// Attribute-to-attribute dependencies created by live (non-snapshot) captures.
///
/// An edge `from → to` means "a modifier on `to` reads `from`". The graph is
/// kept acyclic: [`link`](Self::link) refuses edges that would close a loop,
/// so change propagation always terminates.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<AggregatorId, BTreeMap<AggregatorId, u32>>,
    listeners: BTreeMap<AggregatorId, BTreeMap<ActiveEffectHandle, u32>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn would_create_cycle(&self, from: AggregatorId, to: AggregatorId) -> bool {
        from == to || self.reaches(to, from)
    }

    fn reaches(&self, start: AggregatorId, goal: AggregatorId) -> bool {
        let mut visited = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if node == goal {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(next) = self.edges.get(&node) {
                stack.extend(next.keys().copied());
            }
        }
        false
    }

    /// Adds `from → to` on behalf of `handle`.
    pub fn link(
        &mut self,
        from: AggregatorId,
        to: AggregatorId,
        handle: ActiveEffectHandle,
    ) -> Result<(), CycleError> {
        if self.would_create_cycle(from, to) {
            return Err(CycleError { from, to });
        }
        *self.edges.entry(from).or_default().entry(to).or_insert(0) += 1;
        *self
            .listeners
            .entry(from)
            .or_default()
            .entry(handle)
            .or_insert(0) += 1;
        Ok(())
    }

    /// Drops one reference to `from → to` held by `handle`.
    pub fn unlink(&mut self, from: AggregatorId, to: AggregatorId, handle: ActiveEffectHandle) {
        if let Some(targets) = self.edges.get_mut(&from) {
            if let Some(count) = targets.get_mut(&to) {
                *count -= 1;
                if *count == 0 {
                    targets.remove(&to);
                }
            }
            if targets.is_empty() {
                self.edges.remove(&from);
            }
        }
        if let Some(handles) = self.listeners.get_mut(&from) {
            if let Some(count) = handles.get_mut(&handle) {
                *count -= 1;
                if *count == 0 {
                    handles.remove(&handle);
                }
            }
            if handles.is_empty() {
                self.listeners.remove(&from);
            }
        }
    }

    /// Effects holding live captures of `id`, in handle order.
    pub fn dependents(&self, id: AggregatorId) -> Vec<ActiveEffectHandle> {
        self.listeners
            .get(&id)
            .map(|handles| handles.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }
}
