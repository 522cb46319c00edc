//! Rauschgeneratoren fuer Funk-Rauschbetten
//!
//! - [`WhiteNoise`]: schneller XOR/Add-Generator auf zwei 32-Bit-Registern
//! - [`PinkNoise`]: Kellett-Filter ueber weissem Rauschen

use airwave_core::{AudioSource, SourceStatus};

/// Skaliert ein i32-Register auf ungefaehr [-1, 1]
const SKALA: f32 = 2.0 / 0xffff_ffffu32 as f32;

#[derive(Debug, Clone)]
pub struct WhiteNoise {
    x1: i32,
    x2: i32,
    pegel: f32,
}

impl WhiteNoise {
    pub fn neu(pegel: f32) -> Self {
        Self {
            x1: 0x6745_2301,
            x2: 0xefcd_ab89u32 as i32,
            pegel,
        }
    }

    pub fn pegel_setzen(&mut self, pegel: f32) {
        self.pegel = pegel;
    }

    #[inline]
    pub fn naechstes(&mut self) -> f32 {
        self.x1 ^= self.x2;
        let wert = self.x2 as f32 * self.pegel * SKALA;
        self.x2 = self.x2.wrapping_add(self.x1);
        wert
    }
}

impl Default for WhiteNoise {
    fn default() -> Self {
        Self::neu(1.0)
    }
}

impl AudioSource for WhiteNoise {
    fn get_frame(&mut self, puffer: &mut [f32]) -> SourceStatus {
        for s in puffer.iter_mut() {
            *s = self.naechstes();
        }
        SourceStatus::Ok
    }
}

#[derive(Debug, Clone)]
pub struct PinkNoise {
    weiss: WhiteNoise,
    gain: f32,
    b: [f32; 7],
}

impl PinkNoise {
    pub fn neu(gain: f32) -> Self {
        Self {
            weiss: WhiteNoise::default(),
            gain,
            b: [0.0; 7],
        }
    }

    #[inline]
    pub fn naechstes(&mut self) -> f32 {
        let w = self.weiss.naechstes();
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + w * 0.0555179;
        b[1] = 0.99332 * b[1] + w * 0.0750759;
        b[2] = 0.96900 * b[2] + w * 0.1538520;
        b[3] = 0.86650 * b[3] + w * 0.3104856;
        b[4] = 0.55000 * b[4] + w * 0.5329522;
        b[5] = -0.7616 * b[5] - w * 0.0168980;
        let summe = b.iter().sum::<f32>() + w * 0.5362;
        b[6] = w * 0.115926;
        (summe / 5.0) * self.gain
    }
}

impl Default for PinkNoise {
    fn default() -> Self {
        Self::neu(1.0)
    }
}

impl AudioSource for PinkNoise {
    fn get_frame(&mut self, puffer: &mut [f32]) -> SourceStatus {
        for s in puffer.iter_mut() {
            *s = self.naechstes();
        }
        SourceStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weisses_rauschen_im_wertebereich() {
        let mut w = WhiteNoise::neu(1.0);
        let mut puffer = vec![0.0f32; 4_800];
        assert_eq!(w.get_frame(&mut puffer), SourceStatus::Ok);
        assert!(puffer.iter().all(|s| s.abs() <= 1.0));
        assert!(puffer.iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn weisses_rauschen_ist_deterministisch() {
        let mut a = WhiteNoise::neu(0.5);
        let mut b = WhiteNoise::neu(0.5);
        for _ in 0..100 {
            assert_eq!(a.naechstes(), b.naechstes());
        }
    }

    #[test]
    fn pegel_skaliert() {
        let mut leise = WhiteNoise::neu(0.1);
        let mut laut = WhiteNoise::neu(1.0);
        for _ in 0..100 {
            let (l, g) = (leise.naechstes(), laut.naechstes());
            assert!((l - g * 0.1).abs() < 1e-6);
        }
    }

    #[test]
    fn rosa_rauschen_begrenzt() {
        let mut p = PinkNoise::neu(1.0);
        let mut puffer = vec![0.0f32; 48_000];
        p.get_frame(&mut puffer);
        assert!(puffer.iter().all(|s| s.is_finite() && s.abs() < 2.0));
        assert!(puffer.iter().any(|s| *s != 0.0));
    }
}
