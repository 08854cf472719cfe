//! Broadcaster – Verteilt Frames und Rohdaten an alle Mitglieder
//!
//! Jede Verbindung besitzt eine begrenzte Send-Queue, die von ihrem eigenen
//! Schreib-Task geleert wird. Die Queue ist zweifach begrenzt: in Paketen
//! (Kanal-Kapazitaet) und in ausstehenden Bytes. Der Broadcaster reiht nur
//! ein und blockiert nie: ein langsamer oder toter Client verzoegert die
//! Zustellung an andere Clients nicht.
//!
//! ## Selektives Broadcasting
//! - An alle Mitglieder: `an_alle_senden`
//! - Mit Rohdaten (Bilder): `an_alle_mit_nutzlast_senden`
//! - An alle ausser einen: `an_alle_ausser_senden`

use bytes::Bytes;
use plauderstube_core::VerbindungsId;
use plauderstube_protocol::Paket;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::registry::ClientRegistry;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Clients
#[derive(Clone, Debug)]
pub struct ClientSender {
    id: VerbindungsId,
    tx: mpsc::Sender<Paket>,
    /// Eingereihte, vom Schreib-Task noch nicht geschriebene Bytes
    ausstehend: Arc<AtomicUsize>,
    max_ausstehend: usize,
}

impl ClientSender {
    /// Sender ohne Byte-Limit (nur die Kanal-Kapazitaet begrenzt)
    pub fn neu(id: VerbindungsId, tx: mpsc::Sender<Paket>) -> Self {
        Self::mit_byte_limit(id, tx, usize::MAX)
    }

    /// Sender mit Obergrenze fuer ausstehende Bytes
    ///
    /// Ein Paket wird immer angenommen wenn nichts aussteht, damit auch ein
    /// einzelnes Bild ueber dem Limit zugestellt werden kann.
    pub fn mit_byte_limit(id: VerbindungsId, tx: mpsc::Sender<Paket>, max_ausstehend: usize) -> Self {
        Self {
            id,
            tx,
            ausstehend: Arc::new(AtomicUsize::new(0)),
            max_ausstehend,
        }
    }

    pub fn id(&self) -> VerbindungsId {
        self.id
    }

    /// Aktuell eingereihte, noch nicht geschriebene Bytes
    pub fn ausstehende_bytes(&self) -> usize {
        self.ausstehend.load(Ordering::Acquire)
    }

    /// Zaehler, den der Schreib-Task nach jedem Schreibvorgang verringert
    pub(crate) fn ausstehend_zaehler(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.ausstehend)
    }

    /// Reiht ein Paket nicht-blockierend ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist oder
    /// das Byte-Limit ueberschritten wuerde.
    pub fn senden(&self, paket: Paket) -> bool {
        let laenge = paket.draht_laenge();
        let vorher = self.ausstehend.fetch_add(laenge, Ordering::AcqRel);
        if vorher > 0 && vorher.saturating_add(laenge) > self.max_ausstehend {
            self.ausstehend.fetch_sub(laenge, Ordering::AcqRel);
            tracing::warn!(
                verbindung = %self.id,
                ausstehend = vorher,
                bytes = laenge,
                "Sendepuffer voll – Paket verworfen"
            );
            return false;
        }

        match self.tx.try_send(paket) {
            Ok(()) => true,
            Err(e) => {
                self.ausstehend.fetch_sub(laenge, Ordering::AcqRel);
                match e {
                    mpsc::error::TrySendError::Full(_) => {
                        tracing::warn!(verbindung = %self.id, "Send-Queue voll – Paket verworfen");
                    }
                    mpsc::error::TrySendError::Closed(_) => {
                        tracing::debug!(verbindung = %self.id, "Send-Queue geschlossen (Client getrennt)");
                    }
                }
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

/// Fan-out ueber die aktuellen Mitglieder der Registry
///
/// Fehlgeschlagene Zustellungen werden nur gezaehlt und geloggt. Das
/// Aufraeumen eines toten Mitglieds uebernimmt dessen eigene Session, sobald
/// ihr Schreib-Task endet.
#[derive(Clone)]
pub struct Broadcaster {
    registry: ClientRegistry,
}

impl Broadcaster {
    pub fn neu(registry: ClientRegistry) -> Self {
        Self { registry }
    }

    /// Sendet einen Frame an alle Mitglieder
    ///
    /// Gibt die Anzahl der erfolgreich eingereihten Zustellungen zurueck.
    pub fn an_alle_senden(&self, frame: Bytes) -> usize {
        self.verteilen(Paket::frame(frame), None)
    }

    /// Sendet einen Frame gefolgt von Rohdaten an alle Mitglieder
    ///
    /// Frame und Rohdaten bilden ein Paket, jeder Empfaenger sieht also den
    /// Frame unmittelbar vor den Rohdaten.
    pub fn an_alle_mit_nutzlast_senden(&self, frame: Bytes, nutzlast: Bytes) -> usize {
        self.verteilen(Paket::mit_nutzlast(frame, nutzlast), None)
    }

    /// Sendet ein Paket an alle Mitglieder ausser einem
    pub fn an_alle_ausser_senden(&self, ausgeschlossen: VerbindungsId, paket: Paket) -> usize {
        self.verteilen(paket, Some(ausgeschlossen))
    }

    fn verteilen(&self, paket: Paket, ausgeschlossen: Option<VerbindungsId>) -> usize {
        let empfaenger = self.registry.empfaenger();
        let mut versucht = 0;
        let mut gesendet = 0;

        for sender in &empfaenger {
            if Some(sender.id()) == ausgeschlossen {
                continue;
            }
            versucht += 1;
            // Bytes::clone teilt nur den Puffer
            if sender.senden(paket.clone()) {
                gesendet += 1;
            }
        }

        if gesendet < versucht {
            tracing::debug!(
                gesendet,
                fehlgeschlagen = versucht - gesendet,
                "Broadcast teilweise nicht zugestellt"
            );
        }
        gesendet
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
