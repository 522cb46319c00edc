//! Kodiersenke fuer das Mikrofon
//!
//! Nimmt genau einen PCM-Frame pro Aufruf an, kodiert ihn mit Opus und
//! reicht die Bytes an den registrierten Callback weiter.

use airwave_core::{AudioSink, SitzungsParameter};

use crate::codec::OpusEncoder;
use crate::error::AudioResult;

/// Empfaenger komprimierter Frames
pub type KomprimiertCallback = Box<dyn FnMut(&[u8]) + Send>;

pub struct VoiceEncodeSink {
    encoder: OpusEncoder,
    callback: Option<KomprimiertCallback>,
    /// Kodierte Frames seit dem letzten Reset
    frames: u64,
}

impl VoiceEncodeSink {
    pub fn neu(params: &SitzungsParameter) -> AudioResult<Self> {
        Ok(Self {
            encoder: OpusEncoder::neu(params)?,
            callback: None,
            frames: 0,
        })
    }

    pub fn callback_setzen(&mut self, callback: KomprimiertCallback) {
        self.callback = Some(callback);
    }

    /// Legt den Encoder neu an (nach Sendepausen)
    pub fn zuruecksetzen(&mut self) -> AudioResult<()> {
        self.frames = 0;
        self.encoder.zuruecksetzen()
    }

    pub fn frames_seit_reset(&self) -> u64 {
        self.frames
    }

    pub fn frame_size(&self) -> usize {
        self.encoder.frame_size()
    }
}

impl AudioSink for VoiceEncodeSink {
    fn put_frame(&mut self, puffer: &[f32]) {
        // Encoder-Fehler: Frame wird nicht gesendet, Sitzung laeuft weiter
        match self.encoder.encode(puffer) {
            Ok(daten) => {
                self.frames += 1;
                if let Some(cb) = self.callback.as_mut() {
                    cb(&daten);
                }
            }
            Err(e) => tracing::warn!(fehler = %e, "Encoder-Fehler, Frame verworfen"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn frame_erreicht_callback() {
        let mut sink = VoiceEncodeSink::neu(&SitzungsParameter::default()).unwrap();
        let empfangen = Arc::new(Mutex::new(Vec::<usize>::new()));
        let e = Arc::clone(&empfangen);
        sink.callback_setzen(Box::new(move |daten| e.lock().unwrap().push(daten.len())));

        sink.put_frame(&vec![0.1f32; 960]);
        sink.put_frame(&vec![0.0f32; 960]);
        let laengen = empfangen.lock().unwrap();
        assert_eq!(laengen.len(), 2);
        assert!(laengen.iter().all(|l| *l > 0));
    }

    #[test]
    fn falsche_groesse_wird_verworfen() {
        let mut sink = VoiceEncodeSink::neu(&SitzungsParameter::default()).unwrap();
        let zaehler = Arc::new(Mutex::new(0));
        let z = Arc::clone(&zaehler);
        sink.callback_setzen(Box::new(move |_| *z.lock().unwrap() += 1));
        sink.put_frame(&[0.0f32; 480]);
        assert_eq!(*zaehler.lock().unwrap(), 0);
    }

    #[test]
    fn ohne_callback_kein_fehler() {
        let mut sink = VoiceEncodeSink::neu(&SitzungsParameter::default()).unwrap();
        sink.put_frame(&vec![0.0f32; 960]);
        assert_eq!(sink.frames_seit_reset(), 1);
        assert!(sink.zuruecksetzen().is_ok());
        assert_eq!(sink.frames_seit_reset(), 0);
        assert_eq!(sink.frame_size(), 960);
    }
}
