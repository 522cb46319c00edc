//! Bandbegrenzung eines VHF-Sprechfunkgeraets
//!
//! Hochpass 310 Hz, drei Glockenfilter bei 450/1450/2000 Hz, Tiefpass
//! 2500 Hz. Die Stufen laufen in Reihe.

use super::biquad::BiQuadFilter;
use super::AudioProcessor;

#[derive(Debug, Clone)]
pub struct VhfFilter {
    stufen: Vec<BiQuadFilter>,
}

impl VhfFilter {
    pub fn neu(sample_rate: f32) -> Self {
        Self {
            stufen: vec![
                BiQuadFilter::hochpass(sample_rate, 310.0, 0.35),
                BiQuadFilter::glocke(sample_rate, 450.0, 0.75, 17.0),
                BiQuadFilter::glocke(sample_rate, 1_450.0, 1.0, 12.5),
                BiQuadFilter::glocke(sample_rate, 2_000.0, 1.0, 12.5),
                BiQuadFilter::tiefpass(sample_rate, 2_500.0, 0.35),
            ],
        }
    }
}

impl AudioProcessor for VhfFilter {
    fn verarbeiten(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.stufen.iter_mut().fold(*s, |x, stufe| stufe.sample(x));
        }
    }

    fn zuruecksetzen(&mut self) {
        self.stufen.iter_mut().for_each(AudioProcessor::zuruecksetzen);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn energie_nach_filter(frequenz: f32) -> f32 {
        let mut filter = VhfFilter::neu(48_000.0);
        let mut samples: Vec<f32> = (0..9_600)
            .map(|i| (2.0 * std::f32::consts::PI * frequenz * i as f32 / 48_000.0).sin() * 0.1)
            .collect();
        filter.verarbeiten(&mut samples);
        samples[4_800..].iter().map(|s| s * s).sum()
    }

    #[test]
    fn sprachband_lauter_als_raender() {
        let sprache = energie_nach_filter(1_450.0);
        assert!(sprache > energie_nach_filter(60.0) * 10.0);
        assert!(sprache > energie_nach_filter(12_000.0) * 10.0);
    }

    #[test]
    fn stille_bleibt_stille() {
        let mut filter = VhfFilter::neu(48_000.0);
        let mut samples = vec![0.0f32; 960];
        filter.verarbeiten(&mut samples);
        assert!(samples.iter().all(|s| *s == 0.0));
    }
}
