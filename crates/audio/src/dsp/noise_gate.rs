//! Rauschsperre fuer das Mikrofon
//!
//! Oeffnet oberhalb von `oeffnen_db`, schliesst unterhalb von
//! `schliessen_db` (Hysterese). Die Verstaerkung gleitet mit
//! Attack/Release, damit keine Knackser entstehen.

use super::AudioProcessor;

#[derive(Debug, Clone)]
pub struct NoiseGateConfig {
    pub oeffnen_db: f32,
    pub schliessen_db: f32,
    pub attack_s: f32,
    pub release_s: f32,
}

impl Default for NoiseGateConfig {
    fn default() -> Self {
        Self {
            oeffnen_db: -45.0,
            schliessen_db: -50.0,
            attack_s: 0.002,
            release_s: 0.08,
        }
    }
}

pub struct NoiseGate {
    oeffnen: f32,
    schliessen: f32,
    attack: f32,
    release: f32,
    offen: bool,
    gain: f32,
    aktiv: bool,
}

impl NoiseGate {
    pub fn neu(config: NoiseGateConfig, sample_rate: u32) -> Self {
        let rate = sample_rate.max(1) as f32;
        Self {
            oeffnen: db_zu_linear(config.oeffnen_db),
            schliessen: db_zu_linear(config.schliessen_db),
            attack: koeff(config.attack_s, rate),
            release: koeff(config.release_s, rate),
            offen: false,
            gain: 0.0,
            aktiv: true,
        }
    }

    pub fn ist_offen(&self) -> bool {
        self.offen
    }
}

impl AudioProcessor for NoiseGate {
    fn verarbeiten(&mut self, samples: &mut [f32]) {
        if !self.aktiv {
            return;
        }
        for s in samples.iter_mut() {
            let pegel = s.abs();
            if self.offen && pegel < self.schliessen {
                self.offen = false;
            } else if !self.offen && pegel >= self.oeffnen {
                self.offen = true;
            }

            let (ziel, k) = if self.offen {
                (1.0, self.attack)
            } else {
                (0.0, self.release)
            };
            self.gain = ziel + k * (self.gain - ziel);
            *s *= self.gain;
        }
    }

    fn zuruecksetzen(&mut self) {
        self.offen = false;
        self.gain = 0.0;
    }

    fn ist_aktiv(&self) -> bool {
        self.aktiv
    }

    fn aktiv_setzen(&mut self, aktiv: bool) {
        self.aktiv = aktiv;
    }
}

fn koeff(zeit_s: f32, rate: f32) -> f32 {
    if zeit_s <= 0.0 {
        return 0.0;
    }
    (-1.0 / (zeit_s * rate)).exp()
}

fn db_zu_linear(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
