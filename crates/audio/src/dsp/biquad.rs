//! Biquad-Filter nach dem RBJ Audio-EQ-Cookbook
//!
//! Koeffizienten werden auf `aa0` normiert. Differenzengleichung:
//! `y = a0*x + a1*x1 + a2*x2 - a3*y1 - a4*y2`

use std::f64::consts::PI;

use super::AudioProcessor;

#[derive(Debug, Clone)]
pub struct BiQuadFilter {
    a0: f64,
    a1: f64,
    a2: f64,
    a3: f64,
    a4: f64,
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

impl BiQuadFilter {
    /// Filter aus rohen Koeffizienten (Nenner `aa*`, Zaehler `b*`)
    pub fn aus_koeffizienten(aa0: f64, aa1: f64, aa2: f64, b0: f64, b1: f64, b2: f64) -> Self {
        Self {
            a0: b0 / aa0,
            a1: b1 / aa0,
            a2: b2 / aa0,
            a3: aa1 / aa0,
            a4: aa2 / aa0,
            x1: 0.0,
            x2: 0.0,
            y1: 0.0,
            y2: 0.0,
        }
    }

    /// H(s) = 1 / (s^2 + s/Q + 1)
    pub fn tiefpass(sample_rate: f32, grenzfrequenz: f32, q: f32) -> Self {
        let (cos_w0, alpha) = winkel(sample_rate, grenzfrequenz, q);
        let b0 = (1.0 - cos_w0) / 2.0;
        Self::aus_koeffizienten(1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha, b0, 1.0 - cos_w0, b0)
    }

    /// H(s) = s^2 / (s^2 + s/Q + 1)
    pub fn hochpass(sample_rate: f32, grenzfrequenz: f32, q: f32) -> Self {
        let (cos_w0, alpha) = winkel(sample_rate, grenzfrequenz, q);
        let b0 = (1.0 + cos_w0) / 2.0;
        Self::aus_koeffizienten(
            1.0 + alpha,
            -2.0 * cos_w0,
            1.0 - alpha,
            b0,
            -(1.0 + cos_w0),
            b0,
        )
    }

    /// H(s) = (s^2 + s*(A/Q) + 1) / (s^2 + s/(A*Q) + 1), A = 10^(dB/40)
    pub fn glocke(sample_rate: f32, mittenfrequenz: f32, q: f32, gain_db: f32) -> Self {
        let (cos_w0, alpha) = winkel(sample_rate, mittenfrequenz, q);
        let a = 10f64.powf(gain_db as f64 / 40.0);
        Self::aus_koeffizienten(
            1.0 + alpha / a,
            -2.0 * cos_w0,
            1.0 - alpha / a,
            1.0 + alpha * a,
            -2.0 * cos_w0,
            1.0 - alpha * a,
        )
    }

    /// Ein Sample durch den Filter
    #[inline]
    pub fn sample(&mut self, eingang: f32) -> f32 {
        let ergebnis = self.a0 * eingang as f64 + self.a1 * self.x1 as f64 + self.a2 * self.x2 as f64
            - self.a3 * self.y1 as f64
            - self.a4 * self.y2 as f64;
        let ergebnis = ergebnis as f32;

        self.x2 = self.x1;
        self.x1 = eingang;
        self.y2 = self.y1;
        self.y1 = ergebnis;
        ergebnis
    }
}

impl AudioProcessor for BiQuadFilter {
    fn verarbeiten(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.sample(*s);
        }
    }

    fn zuruecksetzen(&mut self) {
        self.x1 = 0.0;
        self.x2 = 0.0;
        self.y1 = 0.0;
        self.y2 = 0.0;
    }
}

fn winkel(sample_rate: f32, frequenz: f32, q: f32) -> (f64, f64) {
    let w0 = 2.0 * PI * frequenz as f64 / sample_rate as f64;
    (w0.cos(), w0.sin() / (2.0 * q as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sinus(frequenz: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * frequenz * i as f32 / 48_000.0).sin())
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn tiefpass_laesst_gleichanteil_durch() {
        let mut f = BiQuadFilter::tiefpass(48_000.0, 2_500.0, 0.707);
        let mut samples = vec![1.0f32; 4_800];
        f.verarbeiten(&mut samples);
        assert!((samples[4_799] - 1.0).abs() < 0.01);
    }

    #[test]
    fn hochpass_sperrt_gleichanteil() {
        let mut f = BiQuadFilter::hochpass(48_000.0, 310.0, 0.707);
        let mut samples = vec![1.0f32; 4_800];
        f.verarbeiten(&mut samples);
        assert!(samples[4_799].abs() < 0.01);
    }

    #[test]
    fn tiefpass_daempft_hohe_frequenz() {
        let mut f = BiQuadFilter::tiefpass(48_000.0, 1_000.0, 0.707);
        let mut samples = sinus(10_000.0, 4_800);
        f.verarbeiten(&mut samples);
        assert!(rms(&samples[2_400..]) < 0.05);
    }

    #[test]
    fn glocke_hebt_mittenfrequenz_an() {
        let mut f = BiQuadFilter::glocke(48_000.0, 1_000.0, 1.0, 12.0);
        let mut samples = sinus(1_000.0, 9_600);
        f.verarbeiten(&mut samples);
        // +12 dB entspricht Faktor ~4
        let verhaeltnis = rms(&samples[4_800..]) / rms(&sinus(1_000.0, 4_800));
        assert!(verhaeltnis > 3.5 && verhaeltnis < 4.5, "{verhaeltnis}");
    }

    #[test]
    fn zuruecksetzen_loescht_historie() {
        let mut f = BiQuadFilter::hochpass(48_000.0, 310.0, 0.35);
        f.verarbeiten(&mut [1.0, 0.5, -0.5]);
        f.zuruecksetzen();
        let mut frisch = BiQuadFilter::hochpass(48_000.0, 310.0, 0.35);
        assert_eq!(f.sample(0.25), frisch.sample(0.25));
    }
}
