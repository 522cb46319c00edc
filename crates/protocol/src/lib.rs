//! airwave-protocol – Transport-Protokoll zum Voice-Server
//!
//! ## Module
//! - [`sequence`] – Sliding-Window-Pruefung eingehender Sequenznummern
//! - [`channel`] – AEAD-Kapselung benannter DTOs (ChaCha20-Poly1305)
//! - [`dto`] – Nachrichtentypen (MessagePack-Arrays)
//! - [`error`] – Fehlertypen

pub mod channel;
pub mod dto;
pub mod error;
pub mod sequence;

pub use channel::{ChannelConfig, CryptoChannel, CryptoMode, EntkapselteNachricht};
pub use dto::Dto;
pub use error::{ProtocolError, ProtocolResult};
pub use sequence::{SequenceTest, SequenzStatus};
