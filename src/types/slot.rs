// ABOUTME: Blue/green deployment slots.
// ABOUTME: Each slot maps to its own published host port.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::SlotsConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Blue,
    Green,
}

impl Slot {
    /// The slot a candidate goes into when this one is live.
    pub fn other(self) -> Slot {
        match self {
            Slot::Blue => Slot::Green,
            Slot::Green => Slot::Blue,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Slot::Blue => "blue",
            Slot::Green => "green",
        }
    }

    pub fn port(self, slots: &SlotsConfig) -> u16 {
        match self {
            Slot::Blue => slots.blue,
            Slot::Green => slots.green,
        }
    }

    /// Slot published on `port`, if any.
    pub fn for_port(port: u16, slots: &SlotsConfig) -> Option<Slot> {
        [Slot::Blue, Slot::Green]
            .into_iter()
            .find(|slot| slot.port(slots) == port)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blue" => Ok(Slot::Blue),
            "green" => Ok(Slot::Green),
            other => Err(format!("unknown slot: {other}")),
        }
    }
}
