//! Nachrichtentypen des Voice-Servers
//!
//! Alle DTOs werden als MessagePack-Array in Feldreihenfolge kodiert.
//! Der Wire-Name steht als Konstante am Typ ([`Dto::NAME`]).
//!
//! | Name | Typ | Richtung |
//! |------|-----|----------|
//! | `AR` | [`AudioRxOnTransceivers`] | Server -> Client |
//! | `AT` | [`AudioTxOnTransceivers`] | Client -> Server |
//! | `H`  | [`Heartbeat`] | Client -> Server |
//! | `HA` | [`HeartbeatAck`] | Server -> Client |

use airwave_core::FrequenzHz;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolResult;

/// Ein ueber den Kanal uebertragbares DTO
pub trait Dto: Serialize + DeserializeOwned {
    /// Wire-Name im DTO-Rahmen
    const NAME: &'static str;

    fn kodieren(&self) -> ProtocolResult<Vec<u8>> {
        Ok(rmp_serde::to_vec(self)?)
    }

    fn dekodieren(daten: &[u8]) -> ProtocolResult<Self> {
        Ok(rmp_serde::from_slice(daten)?)
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// Empfangsseite eines Senders: auf welcher Frequenz, wie weit entfernt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RxTransceiver {
    pub id: u16,
    pub frequency: FrequenzHz,
    /// 1.0 = direkt am Sender, gegen 0 am Reichweitenrand
    pub distance_ratio: f32,
}

/// Transceiver-Referenz eines ausgehenden Pakets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxTransceiver {
    pub id: u16,
}

/// Eingehendes Sprachpaket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioRxOnTransceivers {
    pub callsign: String,
    pub sequence_counter: u32,
    #[serde(with = "binaer")]
    pub audio: Vec<u8>,
    pub last_packet: bool,
    pub transceivers: Vec<RxTransceiver>,
}

impl Dto for AudioRxOnTransceivers {
    const NAME: &'static str = "AR";
}

/// Ausgehendes Sprachpaket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioTxOnTransceivers {
    pub callsign: String,
    pub sequence_counter: u32,
    #[serde(with = "binaer")]
    pub audio: Vec<u8>,
    pub last_packet: bool,
    pub transceivers: Vec<TxTransceiver>,
}

impl Dto for AudioTxOnTransceivers {
    const NAME: &'static str = "AT";
}

// ---------------------------------------------------------------------------
// Heartbeat
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub callsign: String,
}

impl Dto for Heartbeat {
    const NAME: &'static str = "H";
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatAck {}

impl Dto for HeartbeatAck {
    const NAME: &'static str = "HA";
}

// ---------------------------------------------------------------------------
// Transceiver
// ---------------------------------------------------------------------------

/// Simulierter Funkstandort, wie er an die Sitzungsschicht gemeldet wird
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransceiverDto {
    pub id: u16,
    pub frequency: FrequenzHz,
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub height_msl_m: f64,
    pub height_agl_m: f64,
}

/// Standort-Transceiver aus der Stationsabfrage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationTransceiver {
    pub id: String,
    pub name: String,
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub height_msl_m: f64,
    pub height_agl_m: f64,
}

impl StationTransceiver {
    /// Wandelt in ein TransceiverDto; die ID wird erst beim Versand vergeben
    pub fn als_transceiver(&self, frequency: FrequenzHz) -> TransceiverDto {
        TransceiverDto {
            id: 0,
            frequency,
            lat_deg: self.lat_deg,
            lon_deg: self.lon_deg,
            height_msl_m: self.height_msl_m,
            height_agl_m: self.height_agl_m,
        }
    }
}

// ---------------------------------------------------------------------------
// MessagePack bin fuer Byte-Vektoren
// ---------------------------------------------------------------------------

mod binaer {
    use serde::de::{self, SeqAccess, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(daten: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(daten)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        deserializer.deserialize_byte_buf(BytesVisitor)
    }

    struct BytesVisitor;

    impl<'de> Visitor<'de> for BytesVisitor {
        type Value = Vec<u8>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("Binaerdaten")
        }

        fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
            Ok(v.to_vec())
        }

        fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
            Ok(v)
        }

        // aeltere Gegenstellen senden Arrays aus Ganzzahlen
        fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
            let mut daten = Vec::with_capacity(seq.size_hint().unwrap_or(0));
            while let Some(b) = seq.next_element::<u8>()? {
                daten.push(b);
            }
            Ok(daten)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dto_ist_array_in_feldreihenfolge() {
        let dto = Heartbeat {
            callsign: "ED".into(),
        };
        let bytes = dto.kodieren().unwrap();
        // fixarray(1), fixstr(2) "ED"
        assert_eq!(bytes, vec![0x91, 0xa2, b'E', b'D']);
    }

    #[test]
    fn audio_wird_als_bin_kodiert() {
        let dto = AudioTxOnTransceivers {
            callsign: "A".into(),
            sequence_counter: 1,
            audio: vec![0xde, 0xad],
            last_packet: false,
            transceivers: vec![],
        };
        let bytes = dto.kodieren().unwrap();
        // fixarray(5), "A", 1, bin8(2) de ad, false, fixarray(0)
        assert_eq!(
            bytes,
            vec![0x95, 0xa1, b'A', 0x01, 0xc4, 0x02, 0xde, 0xad, 0xc2, 0x90]
        );
    }

    #[test]
    fn rx_paket_dekodieren() {
        let dto = AudioRxOnTransceivers {
            callsign: "EDDM_GND".into(),
            sequence_counter: 99,
            audio: vec![7; 40],
            last_packet: true,
            transceivers: vec![RxTransceiver {
                id: 2,
                frequency: 121_500_000,
                distance_ratio: 0.75,
            }],
        };
        let bytes = dto.kodieren().unwrap();
        assert_eq!(AudioRxOnTransceivers::dekodieren(&bytes).unwrap(), dto);
    }

    #[test]
    fn audio_aus_ganzzahl_array() {
        // [callsign, seq, [1,2,3], false, []]
        let bytes = vec![0x95, 0xa1, b'B', 0x05, 0x93, 0x01, 0x02, 0x03, 0xc2, 0x90];
        let dto = AudioTxOnTransceivers::dekodieren(&bytes).unwrap();
        assert_eq!(dto.audio, vec![1, 2, 3]);
    }

    #[test]
    fn heartbeat_ack_ist_leeres_array() {
        assert_eq!(HeartbeatAck {}.kodieren().unwrap(), vec![0x90]);
        assert_eq!(HeartbeatAck::NAME, "HA");
    }

    #[test]
    fn station_transceiver_umwandeln() {
        let st = StationTransceiver {
            id: "abc".into(),
            name: "EDDF Tower".into(),
            lat_deg: 50.03,
            lon_deg: 8.57,
            height_msl_m: 111.0,
            height_agl_m: 30.0,
        };
        let t = st.als_transceiver(118_700_000);
        assert_eq!(t.id, 0);
        assert_eq!(t.frequency, 118_700_000);
        assert_eq!(t.lat_deg, 50.03);
    }
}
