//! plauderstube-relay – TCP-Relay fuer den Gruppenchat
//!
//! Nimmt beliebig viele Client-Verbindungen an, dekodiert das Frame-Protokoll
//! und verteilt Nachrichten sowie Bild-Rohdaten an alle angemeldeten
//! Teilnehmer.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayServer)
//!     |
//!     v
//! ClientSession (pro Verbindung ein Task + Schreib-Task)
//!     |  State Machine: WartetAufSetup -> Aktiv -> Geschlossen
//!     |
//!     +-- ClientRegistry  (VerbindungsId -> Anzeigename + Send-Queue)
//!     +-- Broadcaster     (Frame/Rohdaten an alle Mitglieder)
//!     +-- EreignisBeobachter (Benachrichtigung pro Nachricht/Bild)
//! ```

pub mod beobachter;
pub mod broadcast;
pub mod error;
pub mod registry;
pub mod session;
pub mod state;
pub mod tcp;

// Bequeme Re-Exporte
pub use beobachter::LogBeobachter;
pub use broadcast::{Broadcaster, ClientSender};
pub use error::{RelayError, RelayResult};
pub use registry::ClientRegistry;
pub use session::{ClientSession, SessionZustand};
pub use state::{RelayConfig, RelayState, VerbindungsPlatz};
pub use tcp::RelayServer;
