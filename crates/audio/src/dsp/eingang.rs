//! Eingangsfilter des Mikrofonpfads: Rauschsperre, dann Pegelregelung

use super::agc::{Agc, AgcConfig};
use super::noise_gate::{NoiseGate, NoiseGateConfig};
use super::AudioProcessor;

pub struct EingangsFilter {
    sperre: NoiseGate,
    agc: Agc,
}

impl EingangsFilter {
    pub fn neu(sample_rate: u32, frame_groesse: usize) -> Self {
        Self {
            sperre: NoiseGate::neu(NoiseGateConfig::default(), sample_rate),
            agc: Agc::neu(AgcConfig::default(), sample_rate, frame_groesse),
        }
    }
}

impl AudioProcessor for EingangsFilter {
    fn verarbeiten(&mut self, samples: &mut [f32]) {
        self.sperre.verarbeiten(samples);
        self.agc.verarbeiten(samples);
    }

    fn zuruecksetzen(&mut self) {
        self.sperre.zuruecksetzen();
        self.agc.zuruecksetzen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stille_bleibt_stille() {
        let mut filter = EingangsFilter::neu(48_000, 960);
        let mut frame = vec![0.0001f32; 960];
        filter.verarbeiten(&mut frame);
        assert!(frame.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn sprache_wird_auf_zielpegel_gezogen() {
        let mut filter = EingangsFilter::neu(48_000, 960);
        let mut letzter = Vec::new();
        for _ in 0..100 {
            let mut frame: Vec<f32> = (0..960).map(|i| ((i as f32) * 0.07).sin() * 0.02).collect();
            filter.verarbeiten(&mut frame);
            letzter = frame;
        }
        let rms = (airwave_core::audio::energie(&letzter) / 960.0).sqrt();
        // Ziel -20 dBFS = 0.1
        assert!(rms > 0.05 && rms < 0.2, "rms = {rms}");
    }
}
