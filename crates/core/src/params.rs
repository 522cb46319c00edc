//! Sitzungsparameter und Frequenz-Hilfen
//!
//! Die Engine liest nichts von der Platte. Die Werte hier werden vom
//! Aufrufer (Station, Tests) befuellt und per Wert uebergeben.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Frequenz in Hz
pub type FrequenzHz = u32;

/// Unterhalb dieser Frequenz gilt ein Funkgeraet als HF
pub const HF_GRENZE_HZ: FrequenzHz = 30_000_000;

/// Prueft ob eine Frequenz im HF-Band liegt
pub fn ist_hf(frequenz: FrequenzHz) -> bool {
    frequenz < HF_GRENZE_HZ
}

/// Physische Ausgabe einer Mischung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ausgabe {
    Headset,
    Lautsprecher,
}

impl Ausgabe {
    pub fn ist_headset(&self) -> bool {
        matches!(self, Self::Headset)
    }
}

/// Feste Parameter einer Voice-Sitzung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitzungsParameter {
    /// Abtastrate in Hz
    pub sample_rate_hz: u32,
    /// Frame-Laenge in Millisekunden
    pub frame_laenge_ms: u32,
    /// Ziel-Bitrate des Opus-Encoders in bit/s
    pub encoder_bitrate: i32,
    /// Inaktive Streams werden nach dieser Zeit entfernt
    pub stream_timeout_ms: u64,
    /// Intervall der Wartungsrunde
    pub wartung_intervall_ms: u64,
    /// Stille Frames, nach denen ein Stream als beendet gilt
    pub stille_frames: u32,
    /// Frames im Jitter Buffer vor Abspielstart
    pub jitter_vorlauf_pakete: usize,
    /// Kapazitaet des Jitter Buffers in Frames
    pub jitter_max_pakete: usize,
}

impl Default for SitzungsParameter {
    fn default() -> Self {
        Self {
            sample_rate_hz: 48_000,
            frame_laenge_ms: 20,
            encoder_bitrate: 16_384,
            stream_timeout_ms: 60_000,
            wartung_intervall_ms: 30_000,
            stille_frames: 10,
            jitter_vorlauf_pakete: 2,
            jitter_max_pakete: 50,
        }
    }
}

impl SitzungsParameter {
    /// Samples pro Frame
    pub fn frame_groesse(&self) -> usize {
        (self.sample_rate_hz as usize * self.frame_laenge_ms as usize) / 1000
    }

    /// Prueft die Werte gegen das, was der Opus-Codec unterstuetzt
    pub fn validieren(&self) -> CoreResult<()> {
        if !matches!(self.sample_rate_hz, 8_000 | 12_000 | 16_000 | 24_000 | 48_000) {
            return Err(CoreError::konfiguration(format!(
                "Abtastrate {} Hz nicht unterstuetzt",
                self.sample_rate_hz
            )));
        }
        if !matches!(self.frame_laenge_ms, 10 | 20 | 40 | 60) {
            return Err(CoreError::konfiguration(format!(
                "Frame-Laenge {} ms nicht unterstuetzt",
                self.frame_laenge_ms
            )));
        }
        if self.encoder_bitrate < 500 {
            return Err(CoreError::konfiguration(format!(
                "Encoder-Bitrate {} zu niedrig",
                self.encoder_bitrate
            )));
        }
        if self.stille_frames == 0 {
            return Err(CoreError::konfiguration("stille_frames muss > 0 sein"));
        }
        if self.jitter_vorlauf_pakete == 0 || self.jitter_vorlauf_pakete > self.jitter_max_pakete {
            return Err(CoreError::konfiguration(format!(
                "Jitter-Vorlauf {} ausserhalb 1..={}",
                self.jitter_vorlauf_pakete, self.jitter_max_pakete
            )));
        }
        Ok(())
    }

    /// Prueft ob ein Puffer genau einen Frame lang ist
    pub fn frame_pruefen(&self, puffer: &[f32]) -> CoreResult<()> {
        let erwartet = self.frame_groesse();
        if puffer.len() != erwartet {
            return Err(CoreError::FrameGroesse {
                erwartet,
                erhalten: puffer.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_parameter_sind_valide() {
        let p = SitzungsParameter::default();
        assert!(p.validieren().is_ok());
        assert_eq!(p.frame_groesse(), 960);
    }

    #[test]
    fn ungueltige_abtastrate_abgelehnt() {
        let p = SitzungsParameter {
            sample_rate_hz: 44_100,
            ..Default::default()
        };
        assert!(p.validieren().is_err());
    }

    #[test]
    fn jitter_vorlauf_groesser_als_kapazitaet() {
        let p = SitzungsParameter {
            jitter_vorlauf_pakete: 60,
            ..Default::default()
        };
        assert!(p.validieren().is_err());
    }

    #[test]
    fn frame_pruefen_erkennt_falsche_laenge() {
        let p = SitzungsParameter::default();
        assert!(p.frame_pruefen(&[0.0; 960]).is_ok());
        assert!(p.frame_pruefen(&[0.0; 480]).is_err());
    }

    #[test]
    fn hf_grenze() {
        assert!(ist_hf(8_891_000));
        assert!(ist_hf(29_999_999));
        assert!(!ist_hf(30_000_000));
        assert!(!ist_hf(121_500_000));
    }

    #[test]
    fn parameter_aus_toml() {
        let toml = r#"
            encoder_bitrate = 24000
            stream_timeout_ms = 5000
        "#;
        let p: SitzungsParameter = toml::from_str(toml).unwrap();
        assert_eq!(p.encoder_bitrate, 24_000);
        assert_eq!(p.stream_timeout_ms, 5_000);
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(p.sample_rate_hz, 48_000);
    }
}
