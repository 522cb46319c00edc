//! Einfacher Feed-Forward-Kompressor
//!
//! Huellkurve in dB mit getrennter Attack/Release-Zeitkonstante. Die
//! Pegelreduktion ist `env * (1/ratio - 1)` dB, danach Make-up-Gain.

use super::AudioProcessor;

/// Verhindert log(0)
const DC_OFFSET: f64 = 1.0e-25;

#[derive(Debug, Clone)]
pub struct CompressorConfig {
    pub attack_ms: f64,
    pub release_ms: f64,
    pub schwelle_db: f64,
    pub ratio: f64,
    pub makeup_db: f64,
}

impl Default for CompressorConfig {
    /// Werte der Funksimulation
    fn default() -> Self {
        Self {
            attack_ms: 5.0,
            release_ms: 10.0,
            schwelle_db: 16.0,
            ratio: 6.0,
            makeup_db: -5.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimpleCompressor {
    config: CompressorConfig,
    attack_koeff: f64,
    release_koeff: f64,
    makeup_linear: f64,
    huellkurve_db: f64,
}

impl SimpleCompressor {
    pub fn neu(config: CompressorConfig, sample_rate: f32) -> Self {
        Self {
            attack_koeff: zeit_koeff(config.attack_ms, sample_rate),
            release_koeff: zeit_koeff(config.release_ms, sample_rate),
            makeup_linear: db_zu_linear(config.makeup_db),
            huellkurve_db: DC_OFFSET,
            config,
        }
    }

    pub fn standard(sample_rate: f32) -> Self {
        Self::neu(CompressorConfig::default(), sample_rate)
    }

    #[inline]
    fn sample(&mut self, eingang: f32) -> f32 {
        let pegel = eingang.abs() as f64 + DC_OFFSET;
        let ueber_db = (linear_zu_db(pegel) - self.config.schwelle_db).max(0.0) + DC_OFFSET;

        let koeff = if ueber_db > self.huellkurve_db {
            self.attack_koeff
        } else {
            self.release_koeff
        };
        self.huellkurve_db = ueber_db + koeff * (self.huellkurve_db - ueber_db);

        let reduktion_db = (self.huellkurve_db - DC_OFFSET) * (1.0 / self.config.ratio - 1.0);
        (eingang as f64 * db_zu_linear(reduktion_db) * self.makeup_linear) as f32
    }
}

impl AudioProcessor for SimpleCompressor {
    fn verarbeiten(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.sample(*s);
        }
    }

    fn zuruecksetzen(&mut self) {
        self.huellkurve_db = DC_OFFSET;
    }
}

fn zeit_koeff(ms: f64, sample_rate: f32) -> f64 {
    if ms <= 0.0 {
        return 0.0;
    }
    (-1000.0 / (ms * sample_rate as f64)).exp()
}

fn db_zu_linear(db: f64) -> f64 {
    10f64.powf(db / 20.0)
}

fn linear_zu_db(linear: f64) -> f64 {
    20.0 * linear.log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unter_schwelle_nur_makeup() {
        let mut comp = SimpleCompressor::standard(48_000.0);
        let mut samples = vec![0.5f32; 480];
        comp.verarbeiten(&mut samples);
        let erwartet = 0.5 * db_zu_linear(-5.5) as f32;
        assert!((samples[479] - erwartet).abs() < 1e-4);
    }

    #[test]
    fn ueber_schwelle_wird_reduziert() {
        let config = CompressorConfig {
            attack_ms: 0.0,
            release_ms: 0.0,
            schwelle_db: -20.0,
            ratio: 4.0,
            makeup_db: 0.0,
        };
        let mut comp = SimpleCompressor::neu(config, 48_000.0);
        let mut samples = vec![1.0f32; 16];
        comp.verarbeiten(&mut samples);
        // 20 dB ueber Schwelle bei Ratio 4 -> 15 dB Reduktion
        let erwartet = db_zu_linear(-15.0) as f32;
        assert!((samples[15] - erwartet).abs() < 1e-3, "{}", samples[15]);
    }

    #[test]
    fn zuruecksetzen_loescht_huellkurve() {
        let config = CompressorConfig {
            schwelle_db: -20.0,
            ..Default::default()
        };
        let mut comp = SimpleCompressor::neu(config, 48_000.0);
        comp.verarbeiten(&mut [1.0f32; 960]);
        assert!(comp.huellkurve_db > 1.0);
        comp.zuruecksetzen();
        assert_eq!(comp.huellkurve_db, DC_OFFSET);
    }
}
