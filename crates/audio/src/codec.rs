//! Opus Encoder/Decoder Wrapper
//!
//! Kapselt audiopus fuer Mono-Sprache mit fester Frame-Laenge.
//! Die Werte kommen aus [`SitzungsParameter`].

use airwave_core::SitzungsParameter;
use audiopus::{
    coder::{Decoder, Encoder},
    Application, Bitrate, Channels, SampleRate,
};
use tracing::debug;

use crate::error::{AudioError, AudioResult};

/// Groesster Opus-Frame, den ein Encoder ausgeben kann
const MAX_OPUS_BYTES: usize = 4000;

/// Opus-Encoder: kodiert f32-PCM zu Opus-Bytes
pub struct OpusEncoder {
    encoder: Encoder,
    sample_rate: SampleRate,
    bitrate: i32,
    frame_size: usize,
}

impl OpusEncoder {
    /// Erstellt einen VOIP-Encoder mit der Bitrate der Sitzung
    pub fn neu(params: &SitzungsParameter) -> AudioResult<Self> {
        params.validieren()?;
        let sample_rate = abtastrate(params.sample_rate_hz)?;
        let encoder = encoder_erstellen(sample_rate, params.encoder_bitrate)?;
        let frame_size = params.frame_groesse();

        debug!(
            bitrate = params.encoder_bitrate,
            frame_size, "OpusEncoder erstellt"
        );

        Ok(Self {
            encoder,
            sample_rate,
            bitrate: params.encoder_bitrate,
            frame_size,
        })
    }

    /// Kodiert genau einen Frame
    pub fn encode(&mut self, pcm: &[f32]) -> AudioResult<Vec<u8>> {
        if pcm.len() != self.frame_size {
            return Err(AudioError::FrameGroesse {
                erwartet: self.frame_size,
                erhalten: pcm.len(),
            });
        }

        let mut output = vec![0u8; MAX_OPUS_BYTES];
        let written = self.encoder.encode_float(pcm, &mut output)?;
        output.truncate(written);
        Ok(output)
    }

    /// Verwirft den Encoder-Zustand und legt einen neuen Encoder an
    pub fn zuruecksetzen(&mut self) -> AudioResult<()> {
        self.encoder = encoder_erstellen(self.sample_rate, self.bitrate)?;
        Ok(())
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn bitrate(&self) -> i32 {
        self.bitrate
    }
}

/// Opus-Decoder: dekodiert Opus-Bytes zu f32-PCM
pub struct OpusDecoder {
    decoder: Decoder,
    sample_rate: SampleRate,
    frame_size: usize,
}

impl OpusDecoder {
    pub fn neu(params: &SitzungsParameter) -> AudioResult<Self> {
        let sample_rate = abtastrate(params.sample_rate_hz)?;
        let decoder = Decoder::new(sample_rate, Channels::Mono)?;
        Ok(Self {
            decoder,
            sample_rate,
            frame_size: params.frame_groesse(),
        })
    }

    /// Dekodiert in `puffer`; nicht beschriebene Samples werden genullt
    pub fn decode(&mut self, opus_data: &[u8], puffer: &mut [f32]) -> AudioResult<usize> {
        self.frame_pruefen(puffer)?;
        let decoded = self.decoder.decode_float(Some(opus_data), &mut puffer[..], false)?;
        let len = puffer.len();
        puffer[decoded.min(len)..].fill(0.0);
        Ok(decoded)
    }

    /// Packet Loss Concealment: dekodiert ohne Eingabe
    pub fn decode_plc(&mut self, puffer: &mut [f32]) -> AudioResult<usize> {
        self.frame_pruefen(puffer)?;
        let decoded = self.decoder.decode_float(None::<&[u8]>, &mut puffer[..], false)?;
        let len = puffer.len();
        puffer[decoded.min(len)..].fill(0.0);
        Ok(decoded)
    }

    /// Verwirft den Decoder-Zustand
    pub fn zuruecksetzen(&mut self) -> AudioResult<()> {
        self.decoder = Decoder::new(self.sample_rate, Channels::Mono)?;
        Ok(())
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn frame_pruefen(&self, puffer: &[f32]) -> AudioResult<()> {
        if puffer.len() != self.frame_size {
            return Err(AudioError::FrameGroesse {
                erwartet: self.frame_size,
                erhalten: puffer.len(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Konvertierungs-Hilfsfunktionen
// ---------------------------------------------------------------------------

fn encoder_erstellen(sample_rate: SampleRate, bitrate: i32) -> AudioResult<Encoder> {
    let mut encoder = Encoder::new(sample_rate, Channels::Mono, Application::Voip)?;
    encoder.set_bitrate(Bitrate::BitsPerSecond(bitrate))?;
    Ok(encoder)
}

fn abtastrate(hz: u32) -> AudioResult<SampleRate> {
    match hz {
        8_000 => Ok(SampleRate::Hz8000),
        12_000 => Ok(SampleRate::Hz12000),
        16_000 => Ok(SampleRate::Hz16000),
        24_000 => Ok(SampleRate::Hz24000),
        48_000 => Ok(SampleRate::Hz48000),
        andere => Err(AudioError::Konfiguration(format!(
            "Abtastrate {andere} Hz nicht unterstuetzt"
        ))),
    }
}
