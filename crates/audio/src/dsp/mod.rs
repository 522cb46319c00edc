//! DSP-Bausteine der Funksimulation
//!
//! Zwei Arten von Bausteinen:
//! - [`AudioProcessor`]: veraendert einen Puffer in-place (Filter, Kompressor,
//!   Mikrofon-Eingangsfilter)
//! - [`airwave_core::AudioSource`]: erzeugt Frames (Rauschen, Ton, Samples),
//!   zusammengefasst im Effekt-Slot [`EffektGenerator`]

pub mod agc;
pub mod biquad;
pub mod compressor;
pub mod eingang;
pub mod noise;
pub mod noise_gate;
pub mod resources;
pub mod sample;
pub mod tone;
pub mod vhf_filter;

use airwave_core::{AudioSource, SourceStatus};

pub use biquad::BiQuadFilter;
pub use compressor::SimpleCompressor;
pub use eingang::EingangsFilter;
pub use noise::{PinkNoise, WhiteNoise};
pub use resources::EffektRessourcen;
pub use sample::RecordedSample;
pub use tone::SineTone;
pub use vhf_filter::VhfFilter;

/// Gemeinsames Trait fuer alle Audio-Prozessoren
///
/// Verarbeitet Samples in-place. Send + Sync, damit die Engine die
/// Prozessoren hinter einem Mutex zwischen Threads teilen kann.
pub trait AudioProcessor: Send + Sync {
    /// Verarbeitet einen Puffer von Samples in-place
    fn verarbeiten(&mut self, samples: &mut [f32]);

    /// Setzt den internen Zustand zurueck (Filter-Historie, Huellkurven)
    fn zuruecksetzen(&mut self);

    fn ist_aktiv(&self) -> bool {
        true
    }

    fn aktiv_setzen(&mut self, _aktiv: bool) {}
}

// ---------------------------------------------------------------------------
// Effekt-Slot
// ---------------------------------------------------------------------------

/// Aktiver Effekt-Generator eines Slots; ein leerer Slot ist `None`
#[derive(Debug, Clone)]
pub enum EffektGenerator {
    Weiss(WhiteNoise),
    Rosa(PinkNoise),
    Ton(SineTone),
    Aufnahme(RecordedSample),
}

impl AudioSource for EffektGenerator {
    fn get_frame(&mut self, puffer: &mut [f32]) -> SourceStatus {
        match self {
            Self::Weiss(g) => g.get_frame(puffer),
            Self::Rosa(g) => g.get_frame(puffer),
            Self::Ton(g) => g.get_frame(puffer),
            Self::Aufnahme(g) => g.get_frame(puffer),
        }
    }
}

/// Mischt einen Effekt-Slot mit `gain` in `ziel`
///
/// Liefert der Generator nicht `Ok`, wird der Slot geleert. Bei Gain 0
/// wird der Generator nicht abgefragt und bleibt stehen.
pub fn effekt_mischen(
    slot: &mut Option<EffektGenerator>,
    gain: f32,
    ziel: &mut [f32],
    kanal: &mut [f32],
) {
    let Some(generator) = slot.as_mut() else {
        return;
    };
    if gain <= 0.0 {
        return;
    }
    if generator.get_frame(kanal) != SourceStatus::Ok {
        *slot = None;
        return;
    }
    airwave_core::audio::mischen(ziel, kanal, gain);
}
