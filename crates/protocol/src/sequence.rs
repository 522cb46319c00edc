//! Sliding-Window-Pruefung fuer eingehende Sequenznummern
//!
//! Haelt die kleinste noch erwartete Sequenz (`minimum`) und ein Bitfeld
//! fuer die naechsten `fenster` Sequenzen danach. Bit `i` steht fuer
//! `minimum + 1 + i`. Alles unterhalb von `minimum` gilt als veraltet.
//!
//! ```text
//! minimum   minimum+1 ... minimum+fenster
//!    |         bit0          bit(fenster-1)
//! ```

/// Ergebnis einer Sequenzpruefung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenzStatus {
    /// Neue Sequenz innerhalb des Fensters
    Ok,
    /// Duplikat oder zu alt
    Veraltet,
    /// Sprung ueber das Fenster hinaus, Paket wird trotzdem angenommen
    Ueberlauf,
}

/// Duplikat- und Reihenfolgeerkennung fuer Sequenznummern
#[derive(Debug, Clone)]
pub struct SequenceTest {
    minimum: u64,
    bitfeld: u64,
    fenster: u32,
}

impl SequenceTest {
    /// Groesstes moegliches Fenster (Breite des Bitfelds)
    pub const MAX_FENSTER: u32 = u64::BITS;

    /// Standard-Fenster des UDP-Kanals
    pub const STANDARD_FENSTER: u32 = 10;

    /// Erstellt eine Pruefung ab Sequenz 0; das Fenster wird auf 1..=64 begrenzt
    pub fn neu(fenster: u32) -> Self {
        Self::ab(0, fenster)
    }

    /// Erstellt eine Pruefung mit vorgegebener Startsequenz
    pub fn ab(start: u64, fenster: u32) -> Self {
        Self {
            minimum: start,
            bitfeld: 0,
            fenster: fenster.clamp(1, Self::MAX_FENSTER),
        }
    }

    /// Prueft eine empfangene Sequenz und aktualisiert das Fenster
    pub fn empfangen(&mut self, seq: u64) -> SequenzStatus {
        if seq < self.minimum {
            return SequenzStatus::Veraltet;
        }
        if seq == self.minimum {
            self.fenster_vorruecken();
            return SequenzStatus::Ok;
        }
        if seq <= self.obergrenze() {
            let maske = 1u64 << (seq - self.minimum - 1);
            if self.bitfeld & maske != 0 {
                return SequenzStatus::Veraltet;
            }
            self.bitfeld |= maske;
            return SequenzStatus::Ok;
        }

        // Sprung: Fenster schrittweise nachziehen
        let grenze = self.obergrenze();
        while self.minimum < grenze {
            self.fenster_vorruecken();
            if self.obergrenze() > seq {
                break;
            }
        }

        if self.minimum >= grenze {
            // Am Ende des Wertebereichs bleibt minimum auf u64::MAX stehen
            self.minimum = seq.saturating_add(1);
            self.bitfeld = 0;
            return SequenzStatus::Ueberlauf;
        }

        if seq == self.minimum {
            self.fenster_vorruecken();
        } else {
            self.bitfeld |= 1u64 << (seq - self.minimum - 1);
        }
        SequenzStatus::Ueberlauf
    }

    /// Naechste erwartete Sequenz
    pub fn naechste(&self) -> u64 {
        self.minimum
    }

    /// Fensterbreite
    pub fn fenster(&self) -> u32 {
        self.fenster
    }

    /// Setzt auf `(0, leer)` zurueck
    pub fn zuruecksetzen(&mut self) {
        self.minimum = 0;
        self.bitfeld = 0;
    }

    /// Letzte Sequenz im Fenster; Sequenzen kommen vom Netz und koennen beliebig gross sein
    fn obergrenze(&self) -> u64 {
        self.minimum.saturating_add(self.fenster as u64)
    }

    /// Schiebt `minimum` hinter den zusammenhaengend empfangenen Block
    fn fenster_vorruecken(&mut self) {
        let schritt = self.bitfeld.trailing_ones() + 1;
        self.minimum = self.minimum.saturating_add(schritt as u64);
        self.bitfeld = self.bitfeld.checked_shr(schritt).unwrap_or(0);
    }
}

impl Default for SequenceTest {
    fn default() -> Self {
        Self::neu(Self::STANDARD_FENSTER)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fortlaufende_sequenzen_sind_ok() {
        let mut test = SequenceTest::neu(10);
        for seq in 0..500u64 {
            assert_eq!(test.empfangen(seq), SequenzStatus::Ok);
            assert_eq!(test.naechste(), seq + 1, "Fenster muss genau 1 weiter");
        }
    }

    #[test]
    fn duplikate_sind_veraltet() {
        let mut test = SequenceTest::neu(10);
        assert_eq!(test.empfangen(0), SequenzStatus::Ok);
        assert_eq!(test.empfangen(3), SequenzStatus::Ok);
        // hinter dem Fenster
        assert_eq!(test.empfangen(0), SequenzStatus::Veraltet);
        // im Fenster bereits markiert
        assert_eq!(test.empfangen(3), SequenzStatus::Veraltet);
        assert_eq!(test.naechste(), 1);
    }

    #[test]
    fn luecke_wird_beim_schliessen_uebersprungen() {
        let mut test = SequenceTest::neu(10);
        assert_eq!(test.empfangen(1), SequenzStatus::Ok);
        assert_eq!(test.empfangen(2), SequenzStatus::Ok);
        assert_eq!(test.empfangen(3), SequenzStatus::Ok);
        assert_eq!(test.naechste(), 0);
        // 0 fehlt noch; danach muss minimum hinter 3 springen
        assert_eq!(test.empfangen(0), SequenzStatus::Ok);
        assert_eq!(test.naechste(), 4);
        assert_eq!(test.empfangen(2), SequenzStatus::Veraltet);
    }

    #[test]
    fn grosser_sprung_ist_ueberlauf() {
        let mut test = SequenceTest::neu(10);
        assert_eq!(test.empfangen(0), SequenzStatus::Ok);
        assert_eq!(test.empfangen(1000), SequenzStatus::Ueberlauf);
        assert_eq!(test.naechste(), 1001);
        assert_eq!(test.empfangen(1001), SequenzStatus::Ok);
        assert_eq!(test.empfangen(999), SequenzStatus::Veraltet);
    }

    #[test]
    fn knapper_sprung_zieht_fenster_nach() {
        let mut test = SequenceTest::neu(10);
        // minimum = 0, fenster = 10: 11 liegt knapp ausserhalb
        assert_eq!(test.empfangen(11), SequenzStatus::Ueberlauf);
        assert_eq!(test.naechste(), 2);
        assert_eq!(test.empfangen(11), SequenzStatus::Veraltet);
        assert_eq!(test.empfangen(1), SequenzStatus::Veraltet);
    }

    #[test]
    fn volles_fenster_rueckt_komplett_vor() {
        let mut test = SequenceTest::neu(64);
        for seq in 1..=64u64 {
            assert_eq!(test.empfangen(seq), SequenzStatus::Ok);
        }
        assert_eq!(test.empfangen(0), SequenzStatus::Ok);
        assert_eq!(test.naechste(), 65);
        assert_eq!(test.empfangen(64), SequenzStatus::Veraltet);
    }

    #[test]
    fn sprung_an_das_ende_des_wertebereichs() {
        let mut test = SequenceTest::neu(10);
        assert_eq!(test.empfangen(0), SequenzStatus::Ok);
        assert_eq!(test.empfangen(u64::MAX), SequenzStatus::Ueberlauf);
        assert_eq!(test.naechste(), u64::MAX);
        assert_eq!(test.empfangen(u64::MAX - 5), SequenzStatus::Veraltet);
        assert_eq!(test.empfangen(1), SequenzStatus::Veraltet);
    }

    #[test]
    fn fenster_am_ende_des_wertebereichs() {
        let mut test = SequenceTest::ab(u64::MAX - 5, 10);
        assert_eq!(test.empfangen(u64::MAX - 5), SequenzStatus::Ok);
        assert_eq!(test.empfangen(u64::MAX), SequenzStatus::Ok);
        assert_eq!(test.empfangen(u64::MAX), SequenzStatus::Veraltet);
        assert_eq!(test.empfangen(u64::MAX - 4), SequenzStatus::Ok);
        assert_eq!(test.naechste(), u64::MAX - 3);
    }

    #[test]
    fn fenster_wird_begrenzt() {
        assert_eq!(SequenceTest::neu(0).fenster(), 1);
        assert_eq!(SequenceTest::neu(1000).fenster(), 64);
        assert_eq!(SequenceTest::default().fenster(), 10);
    }

    #[test]
    fn zuruecksetzen() {
        let mut test = SequenceTest::ab(500, 10);
        assert_eq!(test.empfangen(3), SequenzStatus::Veraltet);
        test.zuruecksetzen();
        assert_eq!(test.naechste(), 0);
        assert_eq!(test.empfangen(3), SequenzStatus::Ok);
    }
}
