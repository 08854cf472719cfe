//! Client-Registry – Wer ist angemeldet und unter welchem Namen
//!
//! Haelt pro Verbindung, die den `setup`-Handshake abgeschlossen hat, den
//! Anzeigenamen und das Send-Handle. Eintraege werden per Key atomar
//! eingefuegt und entfernt; ein gleichzeitiger Leser sieht einen Eintrag
//! entweder ganz oder gar nicht.

use dashmap::DashMap;
use plauderstube_core::VerbindungsId;
use std::sync::Arc;

use crate::broadcast::ClientSender;

/// Registry-Eintrag einer angemeldeten Verbindung
#[derive(Debug, Clone)]
struct Mitglied {
    name: String,
    sender: ClientSender,
}

/// Prozessweite Zuordnung Verbindung -> Anzeigename
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct ClientRegistry {
    inner: Arc<DashMap<VerbindungsId, Mitglied>>,
}

impl ClientRegistry {
    /// Erstellt eine leere Registry
    pub fn neu() -> Self {
        Self::default()
    }

    /// Meldet eine Verbindung an oder benennt sie um
    ///
    /// Gibt den vorherigen Namen zurueck, falls die Verbindung bereits
    /// angemeldet war.
    pub fn registrieren(
        &self,
        id: VerbindungsId,
        name: impl Into<String>,
        sender: ClientSender,
    ) -> Option<String> {
        let name = name.into();
        tracing::debug!(verbindung = %id, name = %name, "Client in Registry eingetragen");
        self.inner
            .insert(id, Mitglied { name, sender })
            .map(|alt| alt.name)
    }

    /// Entfernt eine Verbindung
    ///
    /// Gibt den Namen zurueck, falls sie angemeldet war. Mehrfaches Abmelden
    /// ist erlaubt und liefert ab dem zweiten Mal `None`.
    pub fn abmelden(&self, id: VerbindungsId) -> Option<String> {
        match self.inner.remove(&id) {
            Some((_, mitglied)) => {
                tracing::debug!(verbindung = %id, name = %mitglied.name, "Client aus Registry entfernt");
                Some(mitglied.name)
            }
            None => {
                tracing::debug!(verbindung = %id, "Abmelden einer unbekannten Verbindung");
                None
            }
        }
    }

    /// Momentaufnahme aller Mitglieder, sortiert nach Verbindungsreihenfolge
    pub fn mitglieder(&self) -> Vec<(VerbindungsId, String)> {
        let mut liste: Vec<_> = self
            .inner
            .iter()
            .map(|entry| (*entry.key(), entry.value().name.clone()))
            .collect();
        liste.sort_by_key(|(id, _)| *id);
        liste
    }

    /// Momentaufnahme aller Send-Handles fuer den Broadcast
    pub(crate) fn empfaenger(&self) -> Vec<ClientSender> {
        let mut liste: Vec<_> = self
            .inner
            .iter()
            .map(|entry| entry.value().sender.clone())
            .collect();
        liste.sort_by_key(ClientSender::id);
        liste
    }

    /// Anzeigename einer Verbindung
    pub fn name(&self, id: VerbindungsId) -> Option<String> {
        self.inner.get(&id).map(|m| m.name.clone())
    }

    /// Prueft ob eine Verbindung angemeldet ist
    pub fn ist_registriert(&self, id: VerbindungsId) -> bool {
        self.inner.contains_key(&id)
    }

    /// Anzahl der angemeldeten Verbindungen
    pub fn anzahl(&self) -> usize {
        self.inner.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tokio::sync::mpsc;

    fn sender(id: u64) -> ClientSender {
        let (tx, _rx) = mpsc::channel(4);
        ClientSender::neu(VerbindungsId(id), tx)
    }

    #[test]
    fn registrieren_und_abmelden() {
        let registry = ClientRegistry::neu();
        let id = VerbindungsId(1);

        assert_eq!(registry.registrieren(id, "alice", sender(1)), None);
        assert!(registry.ist_registriert(id));
        assert_eq!(registry.name(id).as_deref(), Some("alice"));

        assert_eq!(registry.abmelden(id).as_deref(), Some("alice"));
        assert!(!registry.ist_registriert(id));
        assert_eq!(registry.anzahl(), 0);
    }

    #[test]
    fn erneutes_setup_ueberschreibt_namen() {
        let registry = ClientRegistry::neu();
        let id = VerbindungsId(3);

        registry.registrieren(id, "alice", sender(3));
        let alt = registry.registrieren(id, "alicia", sender(3));

        assert_eq!(alt.as_deref(), Some("alice"));
        assert_eq!(registry.anzahl(), 1);
        assert_eq!(registry.name(id).as_deref(), Some("alicia"));
    }

    #[test]
    fn doppeltes_abmelden_ist_harmlos() {
        let registry = ClientRegistry::neu();
        let id = VerbindungsId(9);
        registry.registrieren(id, "bob", sender(9));

        assert!(registry.abmelden(id).is_some());
        assert!(registry.abmelden(id).is_none());
        assert!(registry.abmelden(VerbindungsId(1234)).is_none());
    }

    #[test]
    fn mitglieder_sortiert_nach_id() {
        let registry = ClientRegistry::neu();
        for (id, name) in [(5, "eve"), (1, "alice"), (3, "carol")] {
            registry.registrieren(VerbindungsId(id), name, sender(id));
        }

        let namen: Vec<_> = registry.mitglieder().into_iter().map(|(_, n)| n).collect();
        assert_eq!(namen, ["alice", "carol", "eve"]);

        let ids: Vec<_> = registry.empfaenger().iter().map(ClientSender::id).collect();
        assert_eq!(ids, [VerbindungsId(1), VerbindungsId(3), VerbindungsId(5)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn keine_doppelten_eintraege_bei_nebenlaeufigkeit() {
        let registry = ClientRegistry::neu();
        let mut tasks = Vec::new();

        for t in 0..8u64 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                for i in 0..200u64 {
                    // Mehrere Tasks konkurrieren um dieselben IDs
                    let id = (t + i) % 16;
                    if i % 3 == 0 {
                        registry.abmelden(VerbindungsId(id));
                    } else {
                        registry.registrieren(VerbindungsId(id), format!("t{t}-{i}"), sender(id));
                    }

                    let snapshot = registry.mitglieder();
                    let eindeutig: HashSet<_> = snapshot.iter().map(|(id, _)| *id).collect();
                    assert_eq!(eindeutig.len(), snapshot.len());
                    tokio::task::yield_now().await;
                }
            }));
        }

        for task in tasks {
            task.await.unwrap();
        }
        assert!(registry.anzahl() <= 16);
    }
}
