//! plauderstube-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert den Nachrichten-Umschlag (`Envelope`), der zwischen
//! Client und Relay ausgetauscht wird, sowie das Frame-Format auf dem
//! TCP-Stream (u32-Laengenpraefix + JSON, gefolgt von optionalen Rohdaten).

pub mod envelope;
pub mod error;
pub mod wire;

pub use envelope::{Envelope, ImageHeader, Mode, SERVER_ABSENDER};
pub use error::{ProtocolError, ProtocolResult};
pub use wire::{Eingang, FrameCodec, Paket};
