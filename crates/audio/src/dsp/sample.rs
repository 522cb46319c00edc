//! Abspielen eines aufgenommenen Samples (Klick, Knacken, Brummen)

use std::sync::Arc;

use airwave_core::{AudioSource, SourceStatus};

#[derive(Debug, Clone)]
pub struct RecordedSample {
    daten: Arc<Vec<f32>>,
    schleife: bool,
    spielt: bool,
    position: usize,
}

impl RecordedSample {
    pub fn neu(daten: Arc<Vec<f32>>, schleife: bool) -> Self {
        Self {
            daten,
            schleife,
            spielt: true,
            position: 0,
        }
    }

    pub fn spielt(&self) -> bool {
        self.spielt
    }
}

impl AudioSource for RecordedSample {
    fn get_frame(&mut self, puffer: &mut [f32]) -> SourceStatus {
        let laenge = self.daten.len();
        if !self.spielt || laenge == 0 {
            return SourceStatus::Closed;
        }

        let mut offset = 0;
        loop {
            if self.schleife && self.position >= laenge {
                self.position = 0;
            }
            let anzahl = (puffer.len() - offset).min(laenge - self.position);
            puffer[offset..offset + anzahl]
                .copy_from_slice(&self.daten[self.position..self.position + anzahl]);
            self.position += anzahl;
            offset += anzahl;
            if !self.schleife || offset >= puffer.len() {
                break;
            }
        }
        puffer[offset..].fill(0.0);

        if !self.schleife && self.position >= laenge {
            self.spielt = false;
        }
        SourceStatus::Ok
    }
}
