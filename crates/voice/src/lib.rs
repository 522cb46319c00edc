//! airwave-voice – Sprachtransport
//!
//! Verbindet den [`airwave_protocol::CryptoChannel`] mit einem UDP-Socket
//! und stellt den Jitter Buffer fuer die Dekodierseite bereit.
//!
//! ## Module
//! - [`udp`] – UDP-Kanal mit Sequenzpruefung und DTO-Handlern
//! - [`jitter_buffer`] – Zeitstempel-sortierter Jitter Buffer
//! - [`heartbeat`] – Heartbeat-Ueberwachung gegenueber dem Voice-Server
//! - [`error`] – Fehlertypen

pub mod error;
pub mod heartbeat;
pub mod jitter_buffer;
pub mod udp;

pub use error::{VoiceError, VoiceResult};
pub use heartbeat::{HeartbeatConfig, HeartbeatEnde, HeartbeatUeberwachung};
pub use jitter_buffer::{JitterBuffer, JitterBufferConfig, JitterBufferModus, JitterErgebnis};
pub use udp::{UdpChannel, UdpStatistik};
