//! Standard-Beobachter des Relays: schreibt jedes Ereignis ins Log

use plauderstube_core::{ChatEreignis, EreignisBeobachter};

/// Protokolliert weitergeleitete Nachrichten und Bilder via `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogBeobachter;

impl EreignisBeobachter for LogBeobachter {
    fn ereignis(&self, ereignis: &ChatEreignis) {
        match ereignis {
            ChatEreignis::Nachricht { von, text } => {
                tracing::info!(von = %von, "{von}: {text}");
            }
            ChatEreignis::Bild { von, groesse, daten } => {
                tracing::info!(
                    von = %von,
                    groesse = %groesse,
                    bytes = daten.len(),
                    "Bild von {von} weitergeleitet"
                );
            }
        }
    }
}
