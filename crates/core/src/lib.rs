//! airwave-core – Gemeinsame Typen, Traits und Fehlertypen
//!
//! Dieses Crate stellt die Bausteine bereit, die von allen anderen
//! airwave-Crates gemeinsam genutzt werden: Sitzungsparameter, die
//! Audio-Schnittstellen zu den Geraete-Backends und Radio-Ereignisse.

pub mod audio;
pub mod error;
pub mod event;
pub mod params;

// Re-Exporte fuer bequemen Zugriff
pub use audio::{AudioSink, AudioSource, SourceStatus};
pub use error::{CoreError, CoreResult};
pub use event::RadioEvent;
pub use params::{ist_hf, Ausgabe, FrequenzHz, SitzungsParameter, HF_GRENZE_HZ};
