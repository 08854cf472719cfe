//! Benachrichtigungs-Schnittstelle fuer empfangene Chat-Inhalte
//!
//! Relay und Client melden jede weitergeleitete bzw. empfangene Nachricht und
//! jedes Bild genau einmal an einen `EreignisBeobachter`. Die Darstellung
//! (Fenster, Bildanzeige) liegt ausserhalb dieses Workspaces und haengt sich
//! ueber diesen Trait ein.

use bytes::Bytes;

use crate::types::BildGroesse;

/// Inhalte die an den Beobachter gemeldet werden
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEreignis {
    /// Textnachricht eines Teilnehmers
    Nachricht { von: String, text: String },
    /// Bilduebertragung (RGBA-Rohdaten)
    Bild {
        von: String,
        groesse: BildGroesse,
        daten: Bytes,
    },
}

impl ChatEreignis {
    /// Anzeigename des Absenders
    pub fn von(&self) -> &str {
        match self {
            ChatEreignis::Nachricht { von, .. } | ChatEreignis::Bild { von, .. } => von,
        }
    }
}

/// Callback fuer empfangene Nachrichten und Bilder
///
/// Wird aus tokio-Tasks heraus aufgerufen und darf daher nicht blockieren.
pub trait EreignisBeobachter: Send + Sync + 'static {
    fn ereignis(&self, ereignis: &ChatEreignis);
}

/// Beobachter der alle Ereignisse verwirft
#[derive(Debug, Default, Clone, Copy)]
pub struct KeinBeobachter;

impl EreignisBeobachter for KeinBeobachter {
    fn ereignis(&self, _ereignis: &ChatEreignis) {}
}
