//! Automatische Pegelregelung fuer das Mikrofon
//!
//! Misst den RMS-Pegel pro Frame in dB und fuehrt die Verstaerkung mit
//! getrennten Zeitkonstanten nach. Ein harter Limiter begrenzt die Spitzen.

use super::AudioProcessor;

#[derive(Debug, Clone)]
pub struct AgcConfig {
    /// Ziel-RMS in dBFS
    pub ziel_db: f32,
    pub max_gain_db: f32,
    pub min_gain_db: f32,
    /// Frames unter diesem Pegel gelten als Stille, der Gain bleibt stehen
    pub stille_db: f32,
    /// Zeitkonstante fuer sinkende Verstaerkung in Sekunden
    pub attack_s: f32,
    /// Zeitkonstante fuer steigende Verstaerkung in Sekunden
    pub release_s: f32,
    pub limiter: f32,
}

impl Default for AgcConfig {
    fn default() -> Self {
        Self {
            ziel_db: -20.0,
            max_gain_db: 24.0,
            min_gain_db: -12.0,
            stille_db: -55.0,
            attack_s: 0.02,
            release_s: 0.4,
            limiter: 0.95,
        }
    }
}

pub struct Agc {
    config: AgcConfig,
    frame_dauer_s: f32,
    gain_db: f32,
    aktiv: bool,
}

impl Agc {
    pub fn neu(config: AgcConfig, sample_rate: u32, frame_groesse: usize) -> Self {
        Self {
            config,
            frame_dauer_s: frame_groesse as f32 / sample_rate.max(1) as f32,
            gain_db: 0.0,
            aktiv: true,
        }
    }

    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    fn koeffizient(&self, zeit_s: f32) -> f32 {
        if zeit_s <= 0.0 {
            return 0.0;
        }
        (-self.frame_dauer_s / zeit_s).exp()
    }
}

impl AudioProcessor for Agc {
    fn verarbeiten(&mut self, samples: &mut [f32]) {
        if !self.aktiv || samples.is_empty() {
            return;
        }

        let rms = (airwave_core::audio::energie(samples) / samples.len() as f64).sqrt() as f32;
        let pegel_db = 20.0 * rms.max(1e-9).log10();

        if pegel_db > self.config.stille_db {
            let soll = (self.config.ziel_db - pegel_db)
                .clamp(self.config.min_gain_db, self.config.max_gain_db);
            let koeff = if soll < self.gain_db {
                self.koeffizient(self.config.attack_s)
            } else {
                self.koeffizient(self.config.release_s)
            };
            self.gain_db = soll + koeff * (self.gain_db - soll);
        }

        let faktor = 10f32.powf(self.gain_db / 20.0);
        let grenze = self.config.limiter;
        for s in samples.iter_mut() {
            *s = (*s * faktor).clamp(-grenze, grenze);
        }
    }

    fn zuruecksetzen(&mut self) {
        self.gain_db = 0.0;
    }

    fn ist_aktiv(&self) -> bool {
        self.aktiv
    }

    fn aktiv_setzen(&mut self, aktiv: bool) {
        self.aktiv = aktiv;
    }
}
