//! Fehlertypen fuer das Client-Backend

use plauderstube_core::BildGroesse;
use plauderstube_protocol::ProtocolError;
use thiserror::Error;

/// Fehler die bei der Server-Verbindung auftreten koennen
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP-Verbindung fehlgeschlagen oder abgebrochen
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Nachricht konnte nicht kodiert werden
    #[error("Protokollfehler: {0}")]
    Protokoll(#[from] ProtocolError),

    /// Pixeldaten passen nicht zur angegebenen Bildgroesse
    #[error("Bild {groesse}: {erwartet} Bytes erwartet, {erhalten} erhalten")]
    UngueltigeBildgroesse {
        groesse: BildGroesse,
        erwartet: u64,
        erhalten: usize,
    },
}

/// Result-Typ fuer das Client-Backend
pub type ClientResult<T> = Result<T, ClientError>;
