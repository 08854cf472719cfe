//! Gemeinsamer Relay-Zustand
//!
//! Haelt Registry, Broadcaster und Beobachter als geteilte Referenzen, die
//! sicher zwischen tokio-Tasks geteilt werden koennen. Es gibt keinen
//! globalen Zustand: Listener und Sessions bekommen ein `Arc<RelayState>`.

use bytes::Bytes;
use plauderstube_core::{EreignisBeobachter, IdGenerator, VerbindungsId};
use plauderstube_protocol::{Envelope, Paket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::broadcast::Broadcaster;
use crate::registry::ClientRegistry;

/// Konfiguration fuer das Relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximale gleichzeitige Verbindungen
    pub max_clients: usize,
    /// Maximale Groesse eines JSON-Frames in Bytes
    pub max_frame_groesse: usize,
    /// Maximale Groesse eines Bild-Rohdatenblocks in Bytes
    pub max_bild_groesse: usize,
    /// Kapazitaet der Send-Queue pro Verbindung (in Paketen)
    pub sende_queue_groesse: usize,
    /// Obergrenze fuer eingereihte, ungeschriebene Bytes pro Verbindung
    pub max_sende_puffer: usize,
    /// Obergrenze fuer einen einzelnen Schreibvorgang
    pub schreib_timeout: Duration,
    /// Absender erhalten ihre eigenen Nachrichten und Bilder zurueck
    pub echo_an_absender: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_clients: 512,
            max_frame_groesse: plauderstube_protocol::wire::DEFAULT_MAX_FRAME_SIZE,
            max_bild_groesse: 64 * 1024 * 1024,
            sende_queue_groesse: 64,
            max_sende_puffer: 64 * 1024 * 1024,
            schreib_timeout: Duration::from_secs(5),
            echo_an_absender: true,
        }
    }
}

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    /// Relay-Konfiguration
    pub config: Arc<RelayConfig>,
    /// Angemeldete Verbindungen
    pub registry: ClientRegistry,
    /// Fan-out ueber die Registry
    pub broadcaster: Broadcaster,
    /// Benachrichtigung pro weitergeleiteter Nachricht / Bild
    pub beobachter: Arc<dyn EreignisBeobachter>,
    ids: IdGenerator,
    aktive_verbindungen: AtomicUsize,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayConfig, beobachter: Arc<dyn EreignisBeobachter>) -> Arc<Self> {
        let registry = ClientRegistry::neu();
        Arc::new(Self {
            config: Arc::new(config),
            broadcaster: Broadcaster::neu(registry.clone()),
            registry,
            beobachter,
            ids: IdGenerator::neu(),
            aktive_verbindungen: AtomicUsize::new(0),
        })
    }

    /// Vergibt die ID fuer eine neue Verbindung
    pub fn naechste_id(&self) -> VerbindungsId {
        self.ids.naechste()
    }

    /// Anzahl offener Verbindungen (angemeldet oder nicht)
    pub fn aktive_verbindungen(&self) -> usize {
        self.aktive_verbindungen.load(Ordering::Acquire)
    }

    /// Reserviert einen Verbindungsplatz
    ///
    /// Gibt `None` zurueck wenn `max_clients` erreicht ist. Der Platz wird
    /// beim Drop des Guards wieder frei.
    pub fn platz_reservieren(self: &Arc<Self>) -> Option<VerbindungsPlatz> {
        let max = self.config.max_clients;
        self.aktive_verbindungen
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .ok()
            .map(|_| VerbindungsPlatz {
                state: Arc::clone(self),
            })
    }

    /// Meldet eine Verbindung ab und kuendigt den Abschied an
    ///
    /// Idempotent: nur der erste Aufruf fuer eine angemeldete Verbindung
    /// entfernt den Eintrag und sendet die Ankuendigung.
    pub fn verabschieden(&self, id: VerbindungsId) -> Option<String> {
        let name = self.registry.abmelden(id)?;

        match self.abschied_frame(&name) {
            Some(frame) => {
                self.broadcaster.an_alle_senden(frame);
            }
            None => {
                tracing::warn!(
                    verbindung = %id,
                    name_laenge = name.len(),
                    "Abschied passt nicht in einen Frame – keine Ankuendigung"
                );
            }
        }

        tracing::info!(verbindung = %id, name = %name, "Teilnehmer hat den Chat verlassen");
        Some(name)
    }

    /// Prueft ob fuer diesen Anzeigenamen eine Abschieds-Ankuendigung
    /// innerhalb von `max_frame_groesse` moeglich ist
    pub fn name_zulaessig(&self, name: &str) -> bool {
        self.abschied_frame(name).is_some()
    }

    /// Kodierte Abschieds-Ankuendigung, `None` wenn sie zu gross waere
    fn abschied_frame(&self, name: &str) -> Option<Bytes> {
        Envelope::abschied(name)
            .encode()
            .ok()
            .filter(|frame| frame.len() <= self.config.max_frame_groesse)
    }

    /// Verteilt einen empfangenen Frame (und ggf. Rohdaten) an die Mitglieder
    ///
    /// Beruecksichtigt `echo_an_absender`.
    pub fn weiterleiten(
        &self,
        absender: VerbindungsId,
        frame: Bytes,
        nutzlast: Option<Bytes>,
    ) -> usize {
        if !self.config.echo_an_absender {
            return self
                .broadcaster
                .an_alle_ausser_senden(absender, Paket { frame, nutzlast });
        }
        match nutzlast {
            Some(nutzlast) => self.broadcaster.an_alle_mit_nutzlast_senden(frame, nutzlast),
            None => self.broadcaster.an_alle_senden(frame),
        }
    }
}

/// Reservierter Verbindungsplatz, gibt den Platz beim Drop frei
pub struct VerbindungsPlatz {
    state: Arc<RelayState>,
}

impl Drop for VerbindungsPlatz {
    fn drop(&mut self) {
        self.state
            .aktive_verbindungen
            .fetch_sub(1, Ordering::AcqRel);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
