//! plauderstube-core – Gemeinsame Typen und Traits
//!
//! Dieses Crate stellt die Bausteine bereit, die Relay, Client und Server
//! gemeinsam nutzen: Verbindungs-IDs, Bildabmessungen und die
//! Benachrichtigungs-Schnittstelle fuer empfangene Nachrichten und Bilder.

pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use event::{ChatEreignis, EreignisBeobachter, KeinBeobachter};
pub use types::{BildGroesse, IdGenerator, VerbindungsId};
