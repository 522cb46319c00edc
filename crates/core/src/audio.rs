//! Audio-Schnittstellen zu den Geraete-Backends
//!
//! Die Hardware-Anbindung liegt ausserhalb dieses Workspaces. Sie
//! spricht mit der Engine nur ueber zwei schmale Vertraege:
//! - [`AudioSource`]: Pull-Quelle, liefert pro Aufruf genau einen Frame
//! - [`AudioSink`]: Push-Senke, nimmt pro Aufruf genau einen Frame an
//!
//! Sampleformat ist Mono-f32 mit fester Abtastrate, ein Frame umfasst
//! `SitzungsParameter::frame_groesse()` Samples.

/// Ergebnis eines Pull-Aufrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    /// Frame wurde geschrieben
    Ok,
    /// Quelle ist fehlerhaft, Puffer-Inhalt ist undefiniert
    Error,
    /// Quelle ist beendet und liefert keine weiteren Frames
    Closed,
}

impl SourceStatus {
    pub fn ist_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Pull-basierte Audio-Quelle
pub trait AudioSource: Send {
    /// Schreibt den naechsten Frame in `puffer`
    fn get_frame(&mut self, puffer: &mut [f32]) -> SourceStatus;
}

/// Push-basierte Audio-Senke
pub trait AudioSink: Send {
    /// Nimmt genau einen Frame entgegen
    fn put_frame(&mut self, puffer: &[f32]);
}

/// Mischt `quelle * gain` additiv in `ziel`
#[inline]
pub fn mischen(ziel: &mut [f32], quelle: &[f32], gain: f32) {
    for (z, q) in ziel.iter_mut().zip(quelle) {
        *z += gain * *q;
    }
}

/// Spitzenwert (Betrag) eines Puffers
pub fn spitzenwert(puffer: &[f32]) -> f32 {
    puffer.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}

/// Energie (Summe der Quadrate) eines Puffers
pub fn energie(puffer: &[f32]) -> f64 {
    puffer.iter().map(|s| (*s as f64) * (*s as f64)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mischen_addiert_mit_gain() {
        let mut ziel = vec![1.0f32; 4];
        mischen(&mut ziel, &[0.5, 0.5, 1.0, -1.0], 2.0);
        assert_eq!(ziel, vec![2.0, 2.0, 3.0, -1.0]);
    }

    #[test]
    fn spitzenwert_nutzt_betrag() {
        assert_eq!(spitzenwert(&[0.1, -0.7, 0.3]), 0.7);
        assert_eq!(spitzenwert(&[]), 0.0);
    }

    #[test]
    fn energie_von_stille_ist_null() {
        assert_eq!(energie(&[0.0; 960]), 0.0);
        assert!(energie(&[0.5; 4]) > 0.99);
    }
}
