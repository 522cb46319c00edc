//! AEAD-Kanal fuer benannte DTOs
//!
//! ## Datagramm-Format
//!
//! ```text
//! [header_len u16 LE] [header msgpack: (kanal_tag, sequenz u64, modus u8)] [body]
//! ```
//!
//! Im Modus ChaCha20-Poly1305 ist `body = ciphertext || tag(16)`, die AAD
//! sind die Bytes `header_len + header`. Der Klartext ist selbst gerahmt:
//!
//! ```text
//! [name_len u16 LE] [name] [body_len u16 LE] [body msgpack]
//! ```
//!
//! ## Nonce
//! ```text
//! [0u8; 4] [sequenz u64 LE]
//! ```
//! Eine Sequenz darf pro Schluessel nie wiederholt werden.

use bytes::{BufMut, BytesMut};
use chacha20poly1305::aead::{Aead, KeyInit, OsRng, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use serde::{Deserialize, Serialize};

use crate::dto::Dto;
use crate::error::{ProtocolError, ProtocolResult};

/// Schluessellaenge fuer ChaCha20-Poly1305
pub const SCHLUESSEL_LAENGE: usize = 32;

/// Laenge des Authentifizierungs-Tags
pub const TAG_LAENGE: usize = 16;

/// Laenge der Nonce
pub const NONCE_LAENGE: usize = 12;

/// Maximale Datagramm-Groesse in beide Richtungen
pub const MAX_DATAGRAMM_GROESSE: usize = 1500;

// ---------------------------------------------------------------------------
// CryptoMode
// ---------------------------------------------------------------------------

/// Schutzmodus eines Datagramms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CryptoMode {
    /// Klartext, nur fuer lokale Tests
    Keine = 0,
    /// ChaCha20-Poly1305 (Produktion)
    ChaCha20Poly1305 = 1,
}

impl CryptoMode {
    /// Bit dieses Modus in einer Modus-Maske
    pub fn maske(self) -> u8 {
        1 << (self as u8)
    }
}

impl TryFrom<u8> for CryptoMode {
    type Error = ProtocolError;

    fn try_from(wert: u8) -> Result<Self, Self::Error> {
        match wert {
            0 => Ok(Self::Keine),
            1 => Ok(Self::ChaCha20Poly1305),
            andere => Err(ProtocolError::UnbekannterModus(andere)),
        }
    }
}

// ---------------------------------------------------------------------------
// ChannelConfig
// ---------------------------------------------------------------------------

/// Kanal-Konfiguration, wie sie die Sitzungsschicht uebergibt
///
/// JSON-Form: `{"channelTag", "aeadReceiveKey", "aeadTransmitKey", "hmacKey"}`
/// mit Base64-kodierten Schluesseln.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    pub channel_tag: String,
    #[serde(with = "base64_schluessel")]
    pub aead_receive_key: [u8; SCHLUESSEL_LAENGE],
    #[serde(with = "base64_schluessel")]
    pub aead_transmit_key: [u8; SCHLUESSEL_LAENGE],
    /// Wird vom Protokoll nicht verwendet
    #[serde(default)]
    pub hmac_key: Option<String>,
}

impl ChannelConfig {
    /// Erstellt eine Konfiguration mit zufaelligen Schluesseln
    pub fn zufaellig(channel_tag: impl Into<String>) -> Self {
        Self {
            channel_tag: channel_tag.into(),
            aead_receive_key: zufalls_schluessel(),
            aead_transmit_key: zufalls_schluessel(),
            hmac_key: None,
        }
    }

    /// Konfiguration der Gegenseite: Sende- und Empfangsschluessel vertauscht
    pub fn gespiegelt(&self) -> Self {
        Self {
            channel_tag: self.channel_tag.clone(),
            aead_receive_key: self.aead_transmit_key,
            aead_transmit_key: self.aead_receive_key,
            hmac_key: self.hmac_key.clone(),
        }
    }

    /// Parst die JSON-Form der Sitzungsschicht
    pub fn aus_json(json: &str) -> ProtocolResult<Self> {
        serde_json::from_str(json).map_err(|e| ProtocolError::Schluessel(e.to_string()))
    }
}

impl std::fmt::Debug for ChannelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelConfig")
            .field("channel_tag", &self.channel_tag)
            .field("aead_receive_key", &"<verborgen>")
            .field("aead_transmit_key", &"<verborgen>")
            .finish()
    }
}

fn zufalls_schluessel() -> [u8; SCHLUESSEL_LAENGE] {
    let key = ChaCha20Poly1305::generate_key(&mut OsRng);
    let mut schluessel = [0u8; SCHLUESSEL_LAENGE];
    schluessel.copy_from_slice(key.as_slice());
    schluessel
}

/// Base64-(De)Serialisierung fester Schluessel
///
/// Laengere Eingaben werden abgeschnitten, kuerzere mit Nullen aufgefuellt.
mod base64_schluessel {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    use super::SCHLUESSEL_LAENGE;

    pub fn serialize<S: Serializer>(
        schluessel: &[u8; SCHLUESSEL_LAENGE],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(schluessel))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; SCHLUESSEL_LAENGE], D::Error> {
        let text = String::deserialize(deserializer)?;
        let roh = STANDARD
            .decode(text.trim())
            .map_err(serde::de::Error::custom)?;
        let mut schluessel = [0u8; SCHLUESSEL_LAENGE];
        let n = roh.len().min(SCHLUESSEL_LAENGE);
        schluessel[..n].copy_from_slice(&roh[..n]);
        Ok(schluessel)
    }
}

// ---------------------------------------------------------------------------
// Entkapselte Nachricht
// ---------------------------------------------------------------------------

/// Ergebnis von [`CryptoChannel::entkapseln`]
#[derive(Debug, Clone, PartialEq)]
pub struct EntkapselteNachricht {
    pub kanal_tag: String,
    pub sequenz: u64,
    pub modus: CryptoMode,
    pub dto_name: String,
    /// DTO-Bereich inklusive des inneren `u16`-Laengenpraefix
    pub dto_daten: Vec<u8>,
}

impl EntkapselteNachricht {
    /// Prueft das innere Laengenpraefix und gibt den msgpack-Body zurueck
    pub fn dto_body(&self) -> ProtocolResult<&[u8]> {
        if self.dto_daten.len() < 2 {
            return Err(ProtocolError::UngueltigerRahmen(
                "DTO-Bereich ohne Laengenpraefix".into(),
            ));
        }
        let laenge = u16::from_le_bytes([self.dto_daten[0], self.dto_daten[1]]) as usize;
        let body = &self.dto_daten[2..];
        if laenge != body.len() {
            return Err(ProtocolError::UngueltigerRahmen(format!(
                "DTO-Laenge {laenge} passt nicht zu {} Bytes",
                body.len()
            )));
        }
        Ok(body)
    }

    /// Dekodiert den Body als DTO
    pub fn dto<T: Dto>(&self) -> ProtocolResult<T> {
        T::dekodieren(self.dto_body()?)
    }
}

// ---------------------------------------------------------------------------
// CryptoChannel
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct Header(String, u64, u8);

/// Kapselt und entkapselt DTOs mit dem Kanal-Schluesselpaar
pub struct CryptoChannel {
    config: ChannelConfig,
    sende_cipher: ChaCha20Poly1305,
    empfangs_cipher: ChaCha20Poly1305,
}

impl CryptoChannel {
    /// Erstellt einen Kanal mit leerem Tag und zufaelligen Schluesseln
    pub fn neu() -> Self {
        Self::mit_konfiguration(ChannelConfig::zufaellig(""))
    }

    pub fn mit_konfiguration(config: ChannelConfig) -> Self {
        Self {
            sende_cipher: ChaCha20Poly1305::new(Key::from_slice(&config.aead_transmit_key)),
            empfangs_cipher: ChaCha20Poly1305::new(Key::from_slice(&config.aead_receive_key)),
            config,
        }
    }

    /// Uebernimmt Tag und beide Schluessel
    ///
    /// Gibt `true` zurueck wenn sich der Empfangsschluessel geaendert hat.
    pub fn kanal_konfiguration_setzen(&mut self, config: ChannelConfig) -> bool {
        let empfang_neu = config.aead_receive_key != self.config.aead_receive_key;
        tracing::debug!(kanal = %config.channel_tag, empfang_neu, "Kanal-Konfiguration gewechselt");
        *self = Self::mit_konfiguration(config);
        empfang_neu
    }

    pub fn kanal_tag(&self) -> &str {
        &self.config.channel_tag
    }

    pub fn konfiguration(&self) -> &ChannelConfig {
        &self.config
    }

    /// Rahmt und kapselt ein DTO
    pub fn kapseln_dto<T: Dto>(
        &self,
        dto: &T,
        sequenz: u64,
        modus: CryptoMode,
    ) -> ProtocolResult<Vec<u8>> {
        let body = dto.kodieren()?;
        let klartext = dto_rahmen(T::NAME, &body)?;
        self.kapseln(&klartext, sequenz, modus)
    }

    /// Kapselt einen bereits gerahmten Klartext
    pub fn kapseln(
        &self,
        klartext: &[u8],
        sequenz: u64,
        modus: CryptoMode,
    ) -> ProtocolResult<Vec<u8>> {
        let header = rmp_serde::to_vec(&Header(
            self.config.channel_tag.clone(),
            sequenz,
            modus as u8,
        ))?;
        let header_len = u16::try_from(header.len()).map_err(|_| {
            ProtocolError::UngueltigerHeader(format!("Header zu lang: {} Bytes", header.len()))
        })?;

        let zusatz = match modus {
            CryptoMode::Keine => 0,
            CryptoMode::ChaCha20Poly1305 => TAG_LAENGE,
        };
        let gesamt = 2 + header.len() + klartext.len() + zusatz;
        if gesamt > MAX_DATAGRAMM_GROESSE {
            return Err(ProtocolError::ZuGross {
                groesse: gesamt,
                maximum: MAX_DATAGRAMM_GROESSE,
            });
        }

        let mut puffer = BytesMut::with_capacity(gesamt);
        puffer.put_u16_le(header_len);
        puffer.put_slice(&header);

        match modus {
            CryptoMode::Keine => puffer.put_slice(klartext),
            CryptoMode::ChaCha20Poly1305 => {
                let nonce = nonce_bauen(sequenz);
                let chiffrat = self
                    .sende_cipher
                    .encrypt(
                        Nonce::from_slice(&nonce),
                        Payload {
                            msg: klartext,
                            aad: &puffer[..],
                        },
                    )
                    .map_err(|_| ProtocolError::Verschluesselung)?;
                puffer.put_slice(&chiffrat);
            }
        }

        Ok(puffer.to_vec())
    }

    /// Entkapselt ein Datagramm; jeder Struktur- oder Kryptofehler ist ein `Err`
    pub fn entkapseln(&self, daten: &[u8]) -> ProtocolResult<EntkapselteNachricht> {
        if daten.len() < 2 {
            return Err(ProtocolError::ZuKurz {
                laenge: daten.len(),
            });
        }
        let header_len = u16::from_le_bytes([daten[0], daten[1]]) as usize;
        // Header + Namenslaenge + mindestens ein Zeichen Name
        if daten.len() <= 2 + header_len + 3 {
            return Err(ProtocolError::ZuKurz {
                laenge: daten.len(),
            });
        }

        let header_bytes = &daten[2..2 + header_len];
        let Header(kanal_tag, sequenz, modus_roh) = rmp_serde::from_slice(header_bytes)
            .map_err(|e| ProtocolError::UngueltigerHeader(e.to_string()))?;
        let modus = CryptoMode::try_from(modus_roh)?;

        let offset = 2 + header_len;
        let body = &daten[offset..];
        let klartext = match modus {
            CryptoMode::Keine => body.to_vec(),
            CryptoMode::ChaCha20Poly1305 => {
                if body.len() <= TAG_LAENGE {
                    return Err(ProtocolError::ZuKurz {
                        laenge: daten.len(),
                    });
                }
                let nonce = nonce_bauen(sequenz);
                self.empfangs_cipher
                    .decrypt(
                        Nonce::from_slice(&nonce),
                        Payload {
                            msg: body,
                            aad: &daten[..offset],
                        },
                    )
                    .map_err(|_| {
                        tracing::trace!(
                            kanal = %kanal_tag,
                            sequenz,
                            laenge = daten.len(),
                            "AEAD-Pruefung fehlgeschlagen"
                        );
                        ProtocolError::Authentifizierung
                    })?
            }
        };

        let (dto_name, dto_daten) = dto_rahmen_lesen(&klartext)?;
        Ok(EntkapselteNachricht {
            kanal_tag,
            sequenz,
            modus,
            dto_name,
            dto_daten,
        })
    }
}

impl Default for CryptoChannel {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Hilfsfunktionen
// ---------------------------------------------------------------------------

fn nonce_bauen(sequenz: u64) -> [u8; NONCE_LAENGE] {
    let mut nonce = [0u8; NONCE_LAENGE];
    nonce[4..].copy_from_slice(&sequenz.to_le_bytes());
    nonce
}

/// Baut `name_len | name | body_len | body`
pub fn dto_rahmen(name: &str, body: &[u8]) -> ProtocolResult<Vec<u8>> {
    let name_len = u16::try_from(name.len())
        .map_err(|_| ProtocolError::UngueltigerRahmen("DTO-Name zu lang".into()))?;
    let body_len = u16::try_from(body.len())
        .map_err(|_| ProtocolError::UngueltigerRahmen("DTO-Body zu lang".into()))?;

    let mut puffer = BytesMut::with_capacity(4 + name.len() + body.len());
    puffer.put_u16_le(name_len);
    puffer.put_slice(name.as_bytes());
    puffer.put_u16_le(body_len);
    puffer.put_slice(body);
    Ok(puffer.to_vec())
}

fn dto_rahmen_lesen(klartext: &[u8]) -> ProtocolResult<(String, Vec<u8>)> {
    if klartext.len() < 2 {
        return Err(ProtocolError::UngueltigerRahmen("Klartext ohne Namen".into()));
    }
    let name_len = u16::from_le_bytes([klartext[0], klartext[1]]) as usize;
    if 2 + name_len > klartext.len() {
        return Err(ProtocolError::UngueltigerRahmen(format!(
            "Namenslaenge {name_len} ueberschreitet Klartext"
        )));
    }
    let name = std::str::from_utf8(&klartext[2..2 + name_len])
        .map_err(|e| ProtocolError::UngueltigerRahmen(e.to_string()))?
        .to_string();
    Ok((name, klartext[2 + name_len..].to_vec()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::{AudioTxOnTransceivers, Heartbeat, TxTransceiver};

    fn kanalpaar() -> (CryptoChannel, CryptoChannel) {
        let config = ChannelConfig::zufaellig("tag-1");
        let gegenseite = config.gespiegelt();
        (
            CryptoChannel::mit_konfiguration(config),
            CryptoChannel::mit_konfiguration(gegenseite),
        )
    }

    #[test]
    fn roundtrip_chacha() {
        let (sender, empfaenger) = kanalpaar();
        let dto = Heartbeat {
            callsign: "EDDF_TWR".into(),
        };
        let datagramm = sender
            .kapseln_dto(&dto, 42, CryptoMode::ChaCha20Poly1305)
            .unwrap();

        let nachricht = empfaenger.entkapseln(&datagramm).unwrap();
        assert_eq!(nachricht.kanal_tag, "tag-1");
        assert_eq!(nachricht.sequenz, 42);
        assert_eq!(nachricht.modus, CryptoMode::ChaCha20Poly1305);
        assert_eq!(nachricht.dto_name, "H");
        assert_eq!(nachricht.dto_body().unwrap(), dto.kodieren().unwrap().as_slice());
        assert_eq!(nachricht.dto::<Heartbeat>().unwrap(), dto);
    }

    #[test]
    fn roundtrip_klartext() {
        let (sender, empfaenger) = kanalpaar();
        let dto = AudioTxOnTransceivers {
            callsign: "EDDF_TWR".into(),
            sequence_counter: 7,
            audio: vec![1, 2, 3, 4],
            last_packet: true,
            transceivers: vec![TxTransceiver { id: 0 }, TxTransceiver { id: 3 }],
        };
        let datagramm = sender.kapseln_dto(&dto, 9, CryptoMode::Keine).unwrap();
        let nachricht = empfaenger.entkapseln(&datagramm).unwrap();
        assert_eq!(nachricht.modus, CryptoMode::Keine);
        assert_eq!(nachricht.dto_name, "AT");
        assert_eq!(nachricht.dto::<AudioTxOnTransceivers>().unwrap(), dto);
    }

    #[test]
    fn jedes_gekippte_byte_scheitert() {
        let (sender, empfaenger) = kanalpaar();
        let dto = Heartbeat {
            callsign: "LOWW_APP".into(),
        };
        let datagramm = sender
            .kapseln_dto(&dto, 1, CryptoMode::ChaCha20Poly1305)
            .unwrap();

        for i in 0..datagramm.len() {
            let mut kaputt = datagramm.clone();
            kaputt[i] ^= 0x01;
            match empfaenger.entkapseln(&kaputt) {
                Err(_) => {}
                // Modus-Byte auf Klartext gekippt: wird nie als AEAD gemeldet
                Ok(n) => assert_eq!(n.modus, CryptoMode::Keine, "Byte {i} gekippt"),
            }
        }
    }

    #[test]
    fn falscher_schluessel_scheitert() {
        let sender = CryptoChannel::mit_konfiguration(ChannelConfig::zufaellig("x"));
        let fremd = CryptoChannel::mit_konfiguration(ChannelConfig::zufaellig("x"));
        let datagramm = sender
            .kapseln_dto(&Heartbeat { callsign: "A".into() }, 1, CryptoMode::ChaCha20Poly1305)
            .unwrap();
        assert!(matches!(
            fremd.entkapseln(&datagramm),
            Err(ProtocolError::Authentifizierung)
        ));
    }

    #[test]
    fn zu_kurze_datagramme() {
        let (_, empfaenger) = kanalpaar();
        assert!(matches!(
            empfaenger.entkapseln(&[]),
            Err(ProtocolError::ZuKurz { .. })
        ));
        assert!(matches!(
            empfaenger.entkapseln(&[4, 0, 1, 2, 3, 4]),
            Err(ProtocolError::ZuKurz { .. })
        ));
    }

    #[test]
    fn nonce_aufbau() {
        let nonce = nonce_bauen(0x0102_0304_0506_0708);
        assert_eq!(&nonce[..4], &[0, 0, 0, 0]);
        assert_eq!(&nonce[4..], &[8, 7, 6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn uebergrosses_datagramm_abgelehnt() {
        let (sender, _) = kanalpaar();
        let klartext = dto_rahmen("AT", &vec![0u8; 2000]).unwrap();
        assert!(matches!(
            sender.kapseln(&klartext, 1, CryptoMode::ChaCha20Poly1305),
            Err(ProtocolError::ZuGross { .. })
        ));
    }

    #[test]
    fn falsches_innenpraefix_erkannt() {
        let (sender, empfaenger) = kanalpaar();
        let mut klartext = dto_rahmen("H", &[0x91, 0xa1, 0x41]).unwrap();
        // body_len manipulieren
        klartext[3] = 9;
        let datagramm = sender.kapseln(&klartext, 5, CryptoMode::Keine).unwrap();
        let nachricht = empfaenger.entkapseln(&datagramm).unwrap();
        assert!(nachricht.dto_body().is_err());
    }

    #[test]
    fn konfiguration_json_roundtrip() {
        let config = ChannelConfig::zufaellig("abc");
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"channelTag\":\"abc\""));
        assert!(json.contains("aeadReceiveKey"));
        let zurueck = ChannelConfig::aus_json(&json).unwrap();
        assert_eq!(zurueck, config);
    }

    #[test]
    fn schluesselwechsel_meldet_neuen_empfangsschluessel() {
        let mut kanal = CryptoChannel::neu();
        let config = kanal.konfiguration().clone();
        assert!(!kanal.kanal_konfiguration_setzen(config.clone()));
        assert!(kanal.kanal_konfiguration_setzen(ChannelConfig::zufaellig("neu")));
        assert_eq!(kanal.kanal_tag(), "neu");
    }

    #[test]
    fn modus_maske() {
        assert_eq!(CryptoMode::Keine.maske(), 0b01);
        assert_eq!(CryptoMode::ChaCha20Poly1305.maske(), 0b10);
        assert!(CryptoMode::try_from(7).is_err());
    }
}
