//! Sinuston fuer den Ueberlagerungston bei gleichzeitigen Sendern

use std::f64::consts::TAU;

use airwave_core::{AudioSource, SourceStatus};

#[derive(Debug, Clone)]
pub struct SineTone {
    frequenz: f64,
    sample_rate: f64,
    phase: f64,
}

impl SineTone {
    pub fn neu(frequenz: f32, sample_rate: u32) -> Self {
        Self {
            frequenz: frequenz as f64,
            sample_rate: sample_rate as f64,
            phase: 0.0,
        }
    }
}

impl AudioSource for SineTone {
    fn get_frame(&mut self, puffer: &mut [f32]) -> SourceStatus {
        let schritt = TAU * self.frequenz / self.sample_rate;
        for s in puffer.iter_mut() {
            *s = self.phase.sin() as f32;
            self.phase = (self.phase + schritt) % TAU;
        }
        SourceStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ton_hat_volle_amplitude() {
        let mut ton = SineTone::neu(180.0, 48_000);
        let mut puffer = vec![0.0f32; 960];
        assert_eq!(ton.get_frame(&mut puffer), SourceStatus::Ok);
        assert_eq!(puffer[0], 0.0);
        let spitze = puffer.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!(spitze > 0.99 && spitze <= 1.0);
    }

    #[test]
    fn phase_laeuft_ueber_frames_weiter() {
        let mut ton = SineTone::neu(180.0, 48_000);
        let mut a = vec![0.0f32; 960];
        let mut b = vec![0.0f32; 960];
        ton.get_frame(&mut a);
        ton.get_frame(&mut b);
        // 180 Hz * 20 ms = 3.6 Perioden, zweiter Frame beginnt nicht bei 0
        assert!(b[0].abs() > 0.1);
    }
}
