//! Radio-Ereignisse
//!
//! Ereignisse der Mixing-Engine werden typisiert ueber einen Kanal
//! verschickt. Der Audio-Thread sendet, der Netzwerk- oder UI-Thread
//! empfaengt.

use crate::params::FrequenzHz;
use serde::{Deserialize, Serialize};

/// Zustandswechsel einer Empfangsfrequenz
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RadioEvent {
    /// Auf der Frequenz wird seit diesem Tick empfangen
    RxOffen { frequenz: FrequenzHz },
    /// Der Empfang auf der Frequenz ist beendet
    RxGeschlossen { frequenz: FrequenzHz },
}

impl RadioEvent {
    /// Frequenz, auf die sich das Ereignis bezieht
    pub fn frequenz(&self) -> FrequenzHz {
        match self {
            Self::RxOffen { frequenz } | Self::RxGeschlossen { frequenz } => *frequenz,
        }
    }
}
