//! Sample-Puffer der Funkeffekte
//!
//! Klick, Knacken, Bordnetz-Brummen und die Rauschbetten werden beim Start
//! synthetisch erzeugt. Eigene Aufnahmen koennen ueber die oeffentlichen
//! Felder eingesetzt werden.

use std::f32::consts::TAU;
use std::sync::Arc;

use super::noise::{PinkNoise, WhiteNoise};
use super::vhf_filter::VhfFilter;
use super::AudioProcessor;

/// Frequenz des Bordnetzes (400-Hz-Wechselstrom)
const BORDNETZ_HZ: f32 = 400.0;

#[derive(Debug, Clone)]
pub struct EffektRessourcen {
    /// Squelch-Klick am Ende eines Empfangs (einmalig)
    pub klick: Arc<Vec<f32>>,
    /// Knacken bei schwachem Signal (Schleife)
    pub knacken: Arc<Vec<f32>>,
    /// Brummen des Bordnetzes (Schleife)
    pub ac_bus: Arc<Vec<f32>>,
    /// Rauschbett VHF (Schleife)
    pub vhf_rauschen: Arc<Vec<f32>>,
    /// Rauschbett HF (Schleife)
    pub hf_rauschen: Arc<Vec<f32>>,
}

impl EffektRessourcen {
    /// Erzeugt alle Puffer fuer die gegebene Abtastrate
    pub fn synthetisieren(sample_rate: u32) -> Self {
        let rate = sample_rate.max(1) as usize;
        Self {
            klick: Arc::new(klick(rate)),
            knacken: Arc::new(knacken(rate)),
            ac_bus: Arc::new(brummen(rate)),
            vhf_rauschen: Arc::new(vhf_rauschen(rate)),
            hf_rauschen: Arc::new(hf_rauschen(rate)),
        }
    }
}

impl Default for EffektRessourcen {
    fn default() -> Self {
        Self::synthetisieren(48_000)
    }
}

/// 12 ms Rauschimpuls mit schnellem Abklingen
fn klick(rate: usize) -> Vec<f32> {
    let laenge = rate * 12 / 1000;
    let mut rauschen = WhiteNoise::neu(0.6);
    let abkling = rate as f32 * 0.002;
    (0..laenge)
        .map(|i| rauschen.naechstes() * (-(i as f32) / abkling).exp())
        .collect()
}

/// 1 s leises Rauschen mit vereinzelten abklingenden Spitzen
fn knacken(rate: usize) -> Vec<f32> {
    let mut grund = WhiteNoise::neu(0.05);
    let mut zufall = WhiteNoise::neu(1.0);
    let mut spitze = 0.0f32;
    let abkling = (-1.0 / (rate as f32 * 0.0015)).exp();

    (0..rate)
        .map(|_| {
            // etwa 0.05 % der Samples starten ein Knacken
            if zufall.naechstes() > 0.999 {
                spitze = 0.9;
            }
            spitze *= abkling;
            grund.naechstes() + spitze * if grund.naechstes() >= 0.0 { 1.0 } else { -1.0 }
        })
        .collect()
}

/// 1 s Brummen bei 400 Hz mit zwei Oberwellen; 400 Hz teilt jede
/// unterstuetzte Abtastrate, die Schleife ist nahtlos
fn brummen(rate: usize) -> Vec<f32> {
    (0..rate)
        .map(|i| {
            let t = i as f32 / rate as f32;
            0.6 * (TAU * BORDNETZ_HZ * t).sin()
                + 0.25 * (TAU * 2.0 * BORDNETZ_HZ * t).sin()
                + 0.15 * (TAU * 3.0 * BORDNETZ_HZ * t).sin()
        })
        .collect()
}

/// 1 s weisses Rauschen, auf das Sprachband begrenzt
fn vhf_rauschen(rate: usize) -> Vec<f32> {
    let mut rauschen = WhiteNoise::neu(1.0);
    let mut daten: Vec<f32> = (0..rate).map(|_| rauschen.naechstes()).collect();
    VhfFilter::neu(rate as f32).verarbeiten(&mut daten);
    normieren(&mut daten, 0.5);
    daten
}

/// 1 s rosa Rauschen
fn hf_rauschen(rate: usize) -> Vec<f32> {
    let mut rauschen = PinkNoise::neu(1.0);
    let mut daten: Vec<f32> = (0..rate).map(|_| rauschen.naechstes()).collect();
    normieren(&mut daten, 0.5);
    daten
}

fn normieren(daten: &mut [f32], ziel_spitze: f32) {
    let spitze = airwave_core::audio::spitzenwert(daten);
    if spitze > 0.0 {
        let faktor = ziel_spitze / spitze;
        daten.iter_mut().for_each(|s| *s *= faktor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn laengen_passen_zur_abtastrate() {
        let r = EffektRessourcen::synthetisieren(48_000);
        assert_eq!(r.klick.len(), 576);
        assert_eq!(r.knacken.len(), 48_000);
        assert_eq!(r.ac_bus.len(), 48_000);
        assert_eq!(r.vhf_rauschen.len(), 48_000);
        assert_eq!(r.hf_rauschen.len(), 48_000);
    }

    #[test]
    fn puffer_sind_endlich_und_hoerbar() {
        let r = EffektRessourcen::default();
        for puffer in [&r.klick, &r.knacken, &r.ac_bus, &r.vhf_rauschen, &r.hf_rauschen] {
            assert!(puffer.iter().all(|s| s.is_finite()));
            let spitze = airwave_core::audio::spitzenwert(puffer);
            assert!(spitze > 0.01 && spitze <= 1.5, "spitze = {spitze}");
        }
    }

    #[test]
    fn klick_klingt_ab() {
        let r = EffektRessourcen::default();
        let anfang = airwave_core::audio::spitzenwert(&r.klick[..48]);
        let ende = airwave_core::audio::spitzenwert(&r.klick[500..]);
        assert!(ende < anfang * 0.1);
    }

    #[test]
    fn eigene_aufnahme_einsetzbar() {
        let mut r = EffektRessourcen::default();
        r.klick = Arc::new(vec![0.5; 10]);
        assert_eq!(r.klick.len(), 10);
    }
}
