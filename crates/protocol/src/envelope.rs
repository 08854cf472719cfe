//! Envelope – die Steuerungsnachricht des Chat-Protokolls
//!
//! Jeder Frame transportiert genau einen Envelope mit den Feldern `from`,
//! `mode` und `data`. Die Bedeutung von `data` haengt vom Modus ab:
//!
//! | Modus     | `data`                                   |
//! |-----------|------------------------------------------|
//! | `setup`   | Anzeigename (String)                     |
//! | `message` | Nachrichtentext (String)                 |
//! | `escape`  | leer (`""`)                              |
//! | `image`   | `{"length": n, "size": [breite, hoehe]}` |
//!
//! Auf einen `image`-Frame folgen ausserhalb des Frames genau `length`
//! Rohdaten-Bytes.

use bytes::Bytes;
use plauderstube_core::BildGroesse;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// Absendername fuer vom Relay erzeugte Nachrichten
pub const SERVER_ABSENDER: &str = "SERVER";

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Nachrichtenmodus
///
/// Unbekannte Modi werden nicht abgelehnt, sondern als `Unbekannt` mit dem
/// Originalstring dekodiert. Die Session ignoriert sie.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Mode {
    Setup,
    Message,
    Escape,
    Image,
    Unbekannt(String),
}

impl Mode {
    pub fn as_str(&self) -> &str {
        match self {
            Mode::Setup => "setup",
            Mode::Message => "message",
            Mode::Escape => "escape",
            Mode::Image => "image",
            Mode::Unbekannt(s) => s,
        }
    }
}

impl From<String> for Mode {
    fn from(s: String) -> Self {
        match s.as_str() {
            "setup" => Mode::Setup,
            "message" => Mode::Message,
            "escape" => Mode::Escape,
            "image" => Mode::Image,
            _ => Mode::Unbekannt(s),
        }
    }
}

impl From<Mode> for String {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Unbekannt(s) => s,
            bekannt => bekannt.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ImageHeader
// ---------------------------------------------------------------------------

/// `data` eines `image`-Envelopes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHeader {
    /// Anzahl der nachfolgenden Rohdaten-Bytes
    pub length: u64,
    /// Pixel-Abmessung `[breite, hoehe]`
    pub size: [u32; 2],
}

impl ImageHeader {
    pub fn neu(length: u64, groesse: BildGroesse) -> Self {
        Self {
            length,
            size: [groesse.breite, groesse.hoehe],
        }
    }

    pub fn groesse(&self) -> BildGroesse {
        BildGroesse::neu(self.size[0], self.size[1])
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Eine Steuerungsnachricht
///
/// Der Absender in `from` wird ungeprueft uebernommen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: String,
    pub mode: Mode,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    /// Anmeldung mit Anzeigename
    pub fn setup(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            from: name.clone(),
            mode: Mode::Setup,
            data: Value::String(name),
        }
    }

    /// Textnachricht
    pub fn message(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            mode: Mode::Message,
            data: Value::String(text.into()),
        }
    }

    /// Abmeldung
    pub fn escape(from: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            mode: Mode::Escape,
            data: Value::String(String::new()),
        }
    }

    /// Bild-Ankuendigung (die Rohdaten folgen separat)
    pub fn image(from: impl Into<String>, header: ImageHeader) -> Self {
        Self {
            from: from.into(),
            mode: Mode::Image,
            data: serde_json::json!({
                "length": header.length,
                "size": header.size,
            }),
        }
    }

    /// Vom Relay erzeugte Textnachricht
    pub fn server_message(text: impl Into<String>) -> Self {
        Self::message(SERVER_ABSENDER, text)
    }

    /// Ankuendigung, dass ein Teilnehmer den Chat verlassen hat
    pub fn abschied(name: &str) -> Self {
        Self::server_message(format!("{name} has left the chat"))
    }

    /// Serialisiert den Envelope als kompaktes JSON
    pub fn encode(&self) -> ProtocolResult<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Dekodiert einen Frame-Payload
    pub fn decode(frame: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(frame)?)
    }

    /// Textinhalt von `setup` (Name) bzw. `message` (Nachricht)
    pub fn text(&self) -> ProtocolResult<&str> {
        self.data.as_str().ok_or_else(|| {
            ProtocolError::ungueltige_daten(self.mode.clone(), "Text erwartet")
        })
    }

    /// Bild-Header eines `image`-Envelopes
    pub fn image_header(&self) -> ProtocolResult<ImageHeader> {
        if self.mode != Mode::Image {
            return Err(ProtocolError::ungueltige_daten(
                self.mode.clone(),
                "kein image-Envelope",
            ));
        }
        ImageHeader::deserialize(&self.data)
            .map_err(|e| ProtocolError::ungueltige_daten(Mode::Image, e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
