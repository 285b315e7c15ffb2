use std::fmt;

/// Generation-checked reference to an active effect inside one container.
///
/// A handle whose slot has since been reused carries an old generation and
/// simply fails to resolve.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActiveEffectHandle {
    slot: u32,
    generation: u32,
}

impl ActiveEffectHandle {
    /// Never resolves. Generation 0 is never handed out.
    pub const INVALID: Self = Self {
        slot: u32::MAX,
        generation: 0,
    };

    pub const fn from_parts(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    pub const fn is_valid(&self) -> bool {
        self.generation != 0
    }

    pub const fn slot(&self) -> u32 {
        self.slot
    }

    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Packs the handle into one integer (used as the replication id).
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.slot as u64
    }

    pub const fn from_bits(bits: u64) -> Self {
        Self {
            slot: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl Default for ActiveEffectHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for ActiveEffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "#{}v{}", self.slot, self.generation)
        } else {
            f.write_str("#invalid")
        }
    }
}

impl fmt::Debug for ActiveEffectHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActiveEffectHandle({self})")
    }
}

#[derive(Clone, Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Slot arena backing the container's effect storage.
#[derive(Clone, Debug)]
pub(crate) struct SlotArena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> SlotArena<T> {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub(crate) fn insert_with(
        &mut self,
        make: impl FnOnce(ActiveEffectHandle) -> T,
    ) -> ActiveEffectHandle {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    value: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let entry = &mut self.slots[slot as usize];
        entry.generation = entry.generation.wrapping_add(1).max(1);
        let handle = ActiveEffectHandle::from_parts(slot, entry.generation);
        entry.value = Some(make(handle));
        self.len += 1;
        handle
    }

    pub(crate) fn get(&self, handle: ActiveEffectHandle) -> Option<&T> {
        self.slots
            .get(handle.slot as usize)
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.value.as_ref())
    }

    pub(crate) fn get_mut(&mut self, handle: ActiveEffectHandle) -> Option<&mut T> {
        self.slots
            .get_mut(handle.slot as usize)
            .filter(|entry| entry.generation == handle.generation)
            .and_then(|entry| entry.value.as_mut())
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, handle: ActiveEffectHandle) -> bool {
        self.get(handle).is_some()
    }

    pub(crate) fn remove(&mut self, handle: ActiveEffectHandle) -> Option<T> {
        let entry = self
            .slots
            .get_mut(handle.slot as usize)
            .filter(|entry| entry.generation == handle.generation)?;
        let value = entry.value.take()?;
        self.free.push(handle.slot);
        self.len -= 1;
        Some(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }
}
