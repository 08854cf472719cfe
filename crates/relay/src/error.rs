//! Fehlertypen fuer das Relay
//!
//! Einordnung:
//! - `Io`, `BildZuGross`, `VerbindungGetrennt`: beenden nur die eigene Session
//! - `ListenerFatal`: Listening-Socket unbrauchbar, beendet den Prozess

use thiserror::Error;

/// Fehlertyp fuer das Relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// IO-Fehler auf einer Client-Verbindung
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Verbindung wurde vom Client getrennt
    #[error("Verbindung getrennt")]
    VerbindungGetrennt,

    /// Angekuendigtes Bild ueberschreitet das Limit
    #[error("Bild zu gross: {laenge} Bytes (Maximum: {maximum} Bytes)")]
    BildZuGross { laenge: u64, maximum: usize },

    /// Listening-Socket konnte nicht gebunden werden oder ist unbrauchbar
    #[error("Listener auf {adresse} nicht nutzbar: {quelle}")]
    ListenerFatal {
        adresse: String,
        #[source]
        quelle: std::io::Error,
    },
}

impl RelayError {
    pub fn listener_fatal(adresse: impl ToString, quelle: std::io::Error) -> Self {
        Self::ListenerFatal {
            adresse: adresse.to_string(),
            quelle,
        }
    }

    /// Nur `ListenerFatal` darf den Prozess beenden
    pub fn ist_fatal(&self) -> bool {
        matches!(self, Self::ListenerFatal { .. })
    }
}

/// Result-Typ fuer das Relay
pub type RelayResult<T> = Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn listener_fatal_nennt_adresse() {
        let e = RelayError::listener_fatal(
            "0.0.0.0:33000",
            io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        );
        assert!(e.ist_fatal());
        assert!(e.to_string().contains("0.0.0.0:33000"));
        assert!(e.to_string().contains("address in use"));
    }

    #[test]
    fn session_fehler_sind_nicht_fatal() {
        assert!(!RelayError::VerbindungGetrennt.ist_fatal());
        assert!(!RelayError::BildZuGross {
            laenge: 10,
            maximum: 5
        }
        .ist_fatal());
        assert!(!RelayError::from(io::Error::from(io::ErrorKind::BrokenPipe)).ist_fatal());
    }
}
