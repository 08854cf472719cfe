//! Wire-Format fuer TCP-Verbindungen
//!
//! Frame-basiertes Protokoll: Length(u32 big-endian) + JSON-Payload.
//! Auf einen `image`-Frame folgen unmittelbar die Rohdaten des Bildes,
//! ohne eigenes Laengenfeld.
//!
//! ## Frame-Format
//!
//! ```text
//! +--------+--------+--------+--------+----...----+----...----+
//! | Laenge (u32 BE) | 4 Bytes        | Payload    | Rohdaten  |
//! +--------+--------+--------+--------+----...----+----...----+
//!                                                  (nur image)
//! ```
//!
//! Die Laenge gibt die Anzahl der Payload-Bytes an (ohne die 4 Laengen-Bytes).
//! Maximale Frame-Groesse ist konfigurierbar (Standard: 1 MB).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::envelope::Envelope;
use crate::error::ProtocolResult;

// ---------------------------------------------------------------------------
// Konstanten
// ---------------------------------------------------------------------------

/// Standard-maximale Frame-Groesse (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Groesse des Laengen-Felds in Bytes
pub const LENGTH_FIELD_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Eingang / Paket
// ---------------------------------------------------------------------------

/// Ein vom Stream gelesenes Element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eingang {
    /// JSON-Payload eines Frames (ohne Laengenfeld)
    Frame(Bytes),
    /// Rohdaten-Block, angefordert via [`FrameCodec::rohdaten_erwarten`]
    Rohdaten(Bytes),
}

/// Eine ausgehende Einheit: Frame plus optionale Rohdaten
///
/// Wird als Ganzes in den Schreibpuffer kodiert. Zwischen Frame und
/// Rohdaten kann daher nichts anderes auf dem Socket landen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paket {
    /// JSON-Payload (ohne Laengenfeld)
    pub frame: Bytes,
    pub nutzlast: Option<Bytes>,
}

impl Paket {
    pub fn frame(frame: Bytes) -> Self {
        Self {
            frame,
            nutzlast: None,
        }
    }

    pub fn mit_nutzlast(frame: Bytes, nutzlast: Bytes) -> Self {
        Self {
            frame,
            nutzlast: Some(nutzlast),
        }
    }

    /// Kodiert einen Envelope zu einem Paket ohne Rohdaten
    pub fn aus_envelope(envelope: &Envelope) -> ProtocolResult<Self> {
        Ok(Self::frame(envelope.encode()?))
    }

    /// Anzahl der Bytes auf dem Draht
    pub fn draht_laenge(&self) -> usize {
        LENGTH_FIELD_SIZE + self.frame.len() + self.nutzlast.as_ref().map_or(0, Bytes::len)
    }
}

// ---------------------------------------------------------------------------
// FrameCodec
// ---------------------------------------------------------------------------

/// tokio-util Codec fuer frame-basierte TCP-Verbindungen
///
/// Implementiert `Decoder<Item = Eingang>` und `Encoder<Paket>` fuer
/// `FramedRead`/`FramedWrite`. Der Decoder liefert nur rohe Frame-Bytes;
/// JSON-Fehler betreffen damit nie den Stream selbst.
///
/// # Beispiel
///
/// ```rust,no_run
/// use tokio_util::codec::Framed;
/// use plauderstube_protocol::wire::FrameCodec;
///
/// // let stream = TcpStream::connect(...).await?;
/// // let framed = Framed::new(stream, FrameCodec::new());
/// ```
#[derive(Debug, Clone)]
pub struct FrameCodec {
    /// Maximale erlaubte Frame-Groesse in Bytes
    max_frame_size: usize,
    /// Laenge des naechsten Rohdaten-Blocks, falls angefordert
    rohdaten: Option<usize>,
}

impl FrameCodec {
    /// Erstellt einen neuen `FrameCodec` mit Standard-Limits
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Erstellt einen `FrameCodec` mit benutzerdefinierter maximaler Frame-Groesse
    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            rohdaten: None,
        }
    }

    /// Gibt die konfigurierte maximale Frame-Groesse zurueck
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Das naechste gelesene Element sind genau `laenge` Rohdaten-Bytes
    ///
    /// Gilt fuer genau einen Block, danach wird wieder in Frames dekodiert.
    pub fn rohdaten_erwarten(&mut self, laenge: usize) {
        self.rohdaten = Some(laenge);
    }

    /// Prueft ob gerade ein Rohdaten-Block aussteht
    pub fn erwartet_rohdaten(&self) -> bool {
        self.rohdaten.is_some()
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Decoder-Implementierung
// ---------------------------------------------------------------------------

impl Decoder for FrameCodec {
    type Item = Eingang;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(laenge) = self.rohdaten {
            if src.len() < laenge {
                src.reserve(laenge - src.len());
                return Ok(None);
            }
            self.rohdaten = None;
            return Ok(Some(Eingang::Rohdaten(src.split_to(laenge).freeze())));
        }

        // Warte auf mindestens 4 Bytes fuer das Laengen-Feld
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }

        // Laenge lesen (big-endian u32) ohne den Buffer zu veraendern
        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;

        if length > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Frame zu gross: {} Bytes (Maximum: {} Bytes)",
                    length, self.max_frame_size
                ),
            ));
        }

        // Pruefen ob der vollstaendige Frame bereits im Buffer ist
        let total_size = LENGTH_FIELD_SIZE + length;
        if src.len() < total_size {
            src.reserve(total_size - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_FIELD_SIZE);
        Ok(Some(Eingang::Frame(src.split_to(length).freeze())))
    }
}

// ---------------------------------------------------------------------------
// Encoder-Implementierung
// ---------------------------------------------------------------------------

impl Encoder<Paket> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Paket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.frame.len() > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Nachricht zu gross: {} Bytes (Maximum: {} Bytes)",
                    item.frame.len(),
                    self.max_frame_size
                ),
            ));
        }

        // Laengen-Feld + Payload + Rohdaten schreiben
        dst.reserve(item.draht_laenge());
        dst.put_u32(item.frame.len() as u32);
        dst.put_slice(&item.frame);
        if let Some(nutzlast) = &item.nutzlast {
            dst.put_slice(nutzlast);
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
