//! Gleitender Mittelwert ueber ein festes Fenster
//!
//! Ringpuffer mit laufender Summe. Wird fuer VU- und Spitzenanzeige des
//! Mikrofons genutzt (Frame-Spitze in dBFS).

/// Gleitender Mittelwert ueber die letzten `fenster` Werte
#[derive(Debug, Clone)]
pub struct RollingAverage {
    daten: Vec<f64>,
    offset: usize,
    mittelwert: f64,
}

impl RollingAverage {
    /// Fenster mit `startwert` vorbelegt; das Fenster ist mindestens 1 breit
    pub fn neu(fenster: usize, startwert: f64) -> Self {
        Self {
            daten: vec![startwert; fenster.max(1)],
            offset: 0,
            mittelwert: startwert,
        }
    }

    /// Fuegt einen Wert hinzu und gibt den neuen Mittelwert zurueck
    pub fn hinzufuegen(&mut self, wert: f64) -> f64 {
        let fenster = self.daten.len();
        self.mittelwert += (wert - self.daten[self.offset]) / fenster as f64;
        self.daten[self.offset] = wert;
        self.offset = (self.offset + 1) % fenster;
        self.mittelwert
    }

    pub fn mittelwert(&self) -> f64 {
        self.mittelwert
    }

    /// Zuletzt hinzugefuegter Wert
    pub fn letzter(&self) -> f64 {
        let fenster = self.daten.len();
        self.daten[(self.offset + fenster - 1) % fenster]
    }

    pub fn maximum(&self) -> f64 {
        self.daten.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn minimum(&self) -> f64 {
        self.daten.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn fenster(&self) -> usize {
        self.daten.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mittelwert_ueber_fenster() {
        let mut avg = RollingAverage::neu(4, 0.0);
        assert_eq!(avg.hinzufuegen(4.0), 1.0);
        assert_eq!(avg.hinzufuegen(4.0), 2.0);
        avg.hinzufuegen(4.0);
        assert_eq!(avg.hinzufuegen(4.0), 4.0);
        // Fenster voll: aeltester Wert faellt heraus
        assert_eq!(avg.hinzufuegen(0.0), 3.0);
    }

    #[test]
    fn min_max_und_letzter() {
        let mut avg = RollingAverage::neu(3, -40.0);
        avg.hinzufuegen(-10.0);
        avg.hinzufuegen(-25.0);
        assert_eq!(avg.maximum(), -10.0);
        assert_eq!(avg.minimum(), -40.0);
        assert_eq!(avg.letzter(), -25.0);
        avg.hinzufuegen(-30.0);
        avg.hinzufuegen(-30.0);
        assert_eq!(avg.maximum(), -25.0);
    }

    #[test]
    fn startwert_ist_mittelwert() {
        let avg = RollingAverage::neu(15, -40.0);
        assert_eq!(avg.mittelwert(), -40.0);
        assert_eq!(avg.maximum(), -40.0);
        assert_eq!(avg.letzter(), -40.0);
    }

    #[test]
    fn fenster_null_wird_eins() {
        let mut avg = RollingAverage::neu(0, 0.0);
        assert_eq!(avg.fenster(), 1);
        assert_eq!(avg.hinzufuegen(5.0), 5.0);
    }
}
