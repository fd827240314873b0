use serde::{Deserialize, Serialize};

use crate::wire::Category;

/// Point-in-time copy of the three queue counters plus link state.
///
/// This is the payload of the outbound state channel, serialized as
/// `{"fast":..,"dynamic":..,"slow":..,"connected":..}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub fast: u32,
    pub dynamic: u32,
    pub slow: u32,
    pub connected: bool,
}

impl QueueSnapshot {
    pub fn get(&self, category: Category) -> u32 {
        match category {
            Category::Fast => self.fast,
            Category::Dynamic => self.dynamic,
            Category::Slow => self.slow,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
