//! plauderstube-client – Client-Backend fuer den Gruppenchat
//!
//! Verbindet sich mit einem Relay, meldet einen Anzeigenamen an, sendet
//! Nachrichten und Bilder und liefert empfangene Inhalte als
//! [`ChatEreignis`](plauderstube_core::ChatEreignis).

pub mod connection;
pub mod error;

pub use connection::ChatVerbindung;
pub use error::{ClientError, ClientResult};
