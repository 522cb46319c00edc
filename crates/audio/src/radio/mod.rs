//! Funk-Mischengine
//!
//! ## Module
//! - [`state`] – Zustand pro Frequenz (Gain, Routing, Effekt-Slots)
//! - [`stack`] – [`RadioStack`]: Empfang, Mischung pro Ausgabe, Sendepfad
//!
//! Die Effektwerte sind empirisch abgestimmt und werden unveraendert
//! uebernommen.

pub mod stack;
pub mod state;

pub use stack::{AusgabeQuelle, ClientPosition, MikrofonSenke, RadioStack};
pub use state::RadioState;

/// Gain des Squelch-Klicks
pub const KLICK_GAIN: f32 = 1.3;
/// Frequenz des Block-Tons bei Doppelempfang
pub const BLOCKTON_HZ: f32 = 180.0;
pub const BLOCKTON_GAIN: f32 = 0.18;
/// Rauschbett VHF
pub const VHF_RAUSCHEN_GAIN: f32 = 0.17;
/// Rauschbett HF (0 bei HF-Squelch)
pub const HF_RAUSCHEN_GAIN: f32 = 0.16;
pub const AC_BUS_GAIN_VHF: f32 = 0.005;
pub const AC_BUS_GAIN_HF: f32 = 0.001;
/// Sprachpegel auf HF
pub const HF_SPRACH_GAIN: f32 = 0.20;
/// Obergrenze des Knackfaktors
pub const KNACK_MAXIMUM: f32 = 0.20;
const KNACK_OFFSET: f64 = 0.007_766_52;

/// VU-Fenster in Millisekunden
pub const VU_FENSTER_MS: u32 = 300;
/// Untergrenze der Pegelanzeige in dBFS
pub const PEGEL_MINIMUM_DB: f64 = -40.0;

/// Knackfaktor aus dem Entfernungsverhaeltnis
///
/// `exp(d) * d^-4 / 350 - 0.00776652`, begrenzt auf `[0, 0.20]`.
/// Bei `d = 1` (direkt am Sender) ist der Faktor 0, zum Reichweitenrand
/// hin steigt er bis zur Obergrenze.
pub fn knack_faktor(distanz_verhaeltnis: f32) -> f32 {
    let d = distanz_verhaeltnis as f64;
    let faktor = (d.exp() * d.powi(-4) / 350.0 - KNACK_OFFSET) as f32;
    if faktor.is_nan() {
        return KNACK_MAXIMUM;
    }
    faktor.clamp(0.0, KNACK_MAXIMUM)
}

/// Ob ein Funkgeraet auf der angefragten Ausgabe zu hoeren ist
///
/// Mit RT (Radio-Telefonie-Mithoeren) wandern Headset-Geraete auf den
/// Lautsprecher.
pub fn hoerbar(radio_auf_headset: bool, ausgabe_headset: bool, rt: bool) -> bool {
    let passend = radio_auf_headset == ausgabe_headset;
    let nach_lautsprecher = !ausgabe_headset && radio_auf_headset && rt;
    let vom_headset = ausgabe_headset && radio_auf_headset && rt;
    nach_lautsprecher || (passend && !vom_headset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knackfaktor_an_der_grenze_null() {
        assert!(knack_faktor(1.0).abs() < 1e-6);
    }

    #[test]
    fn knackfaktor_begrenzt() {
        assert_eq!(knack_faktor(0.0), KNACK_MAXIMUM);
        assert_eq!(knack_faktor(0.1), KNACK_MAXIMUM);
        assert_eq!(knack_faktor(f32::NAN), KNACK_MAXIMUM);
        let mitte = knack_faktor(0.5);
        assert!(mitte > 0.0 && mitte < KNACK_MAXIMUM, "mitte = {mitte}");
    }

    #[test]
    fn knackfaktor_faellt_mit_naeherem_sender() {
        assert!(knack_faktor(0.45) > knack_faktor(0.6));
        assert!(knack_faktor(0.6) > knack_faktor(0.8));
    }

    #[test]
    fn routing_ohne_rt() {
        assert!(hoerbar(true, true, false));
        assert!(!hoerbar(true, false, false));
        assert!(hoerbar(false, false, false));
        assert!(!hoerbar(false, true, false));
    }

    #[test]
    fn routing_mit_rt_verschiebt_headset() {
        assert!(!hoerbar(true, true, true));
        assert!(hoerbar(true, false, true));
        assert!(hoerbar(false, false, true));
        assert!(!hoerbar(false, true, true));
    }
}
