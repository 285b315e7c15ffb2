//! Client prediction keys.
//!
//! A client that applies an effect before the server confirms it tags the
//! application with a key. The server echoes the key on the replicated copy,
//! which lets the client drop its prediction once the real state arrives, or
//! roll it back if the server rejects it.

use std::fmt;

/// Which peer minted a key.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum KeyOrigin {
    /// Generated on this client and not yet sent anywhere.
    #[default]
    Local,
    /// Received from (or echoed by) the server.
    Server,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PredictionKey {
    id: u32,
    origin: KeyOrigin,
}

impl PredictionKey {
    /// No prediction.
    pub const NONE: Self = Self {
        id: 0,
        origin: KeyOrigin::Local,
    };

    pub const fn local(id: u32) -> Self {
        Self {
            id,
            origin: KeyOrigin::Local,
        }
    }

    /// The same key as seen after a round trip through the server.
    pub const fn received(self) -> Self {
        Self {
            id: self.id,
            origin: KeyOrigin::Server,
        }
    }

    pub const fn id(self) -> u32 {
        self.id
    }

    pub const fn origin(self) -> KeyOrigin {
        self.origin
    }

    pub const fn is_valid_key(self) -> bool {
        self.id != 0
    }

    /// A valid key minted on this client.
    pub const fn is_local_client_key(self) -> bool {
        self.is_valid_key() && matches!(self.origin, KeyOrigin::Local)
    }

    pub const fn was_received(self) -> bool {
        matches!(self.origin, KeyOrigin::Server)
    }

    /// Same prediction regardless of which side holds the copy.
    pub const fn same_id(self, other: Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Display for PredictionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid_key() {
            write!(f, "key#{}", self.id)
        } else {
            f.write_str("key#none")
        }
    }
}

impl fmt::Debug for PredictionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PredictionKey({self}, {})", self.origin)
    }
}

/// Monotonic local key source. Ids start at 1 and never wrap to 0.
#[derive(Clone, Debug, Default)]
pub struct PredictionKeyGenerator {
    last: u32,
}

impl PredictionKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_key(&mut self) -> PredictionKey {
        self.last = self.last.wrapping_add(1).max(1);
        PredictionKey::local(self.last)
    }

    pub fn last_key(&self) -> PredictionKey {
        PredictionKey::local(self.last)
    }
}
