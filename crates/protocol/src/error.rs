//! Fehlertypen fuer das Protokoll

use thiserror::Error;

use crate::envelope::Mode;

/// Fehler beim Kodieren oder Dekodieren eines Envelopes
///
/// Ein `ProtocolError` betrifft immer nur einen einzelnen Frame. Die
/// Verbindung bleibt davon unberuehrt.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame ist kein gueltiges JSON oder passt nicht zum Envelope-Schema
    #[error("Ungueltiger Frame: {0}")]
    Json(#[from] serde_json::Error),

    /// `data` passt nicht zum Modus (z.B. Zahl statt Text bei `message`)
    #[error("Ungueltige Daten fuer Modus '{mode}': {grund}")]
    UngueltigeDaten { mode: Mode, grund: String },
}

impl ProtocolError {
    pub fn ungueltige_daten(mode: Mode, grund: impl Into<String>) -> Self {
        Self::UngueltigeDaten {
            mode,
            grund: grund.into(),
        }
    }
}

/// Result-Typ fuer Protokolloperationen
pub type ProtocolResult<T> = Result<T, ProtocolError>;
