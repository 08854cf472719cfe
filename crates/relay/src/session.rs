//! Client-Session – Verwaltet eine einzelne Verbindung
//!
//! Jede Verbindung bekommt eine `ClientSession` in einem eigenen tokio-Task
//! plus einen Schreib-Task, der die Send-Queue der Verbindung leert.
//!
//! ## State Machine
//! ```text
//! WartetAufSetup --setup--> Aktiv --escape/Fehler/EOF--> Geschlossen
//!       |                                                    ^
//!       +------------------- escape/Fehler/EOF --------------+
//! ```
//!
//! ## Aufraeumen
//! Abmelden und Abschieds-Ankuendigung haengen an einem Drop-Guard und
//! laufen damit auf jedem Ausstiegspfad genau einmal.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use plauderstube_core::{ChatEreignis, VerbindungsId};
use plauderstube_protocol::{Eingang, Envelope, FrameCodec, Mode, Paket};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};

use crate::broadcast::ClientSender;
use crate::error::{RelayError, RelayResult};
use crate::state::RelayState;

// ---------------------------------------------------------------------------
// Verbindungszustand
// ---------------------------------------------------------------------------

/// Zustand der Session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionZustand {
    /// Verbunden, noch kein `setup` empfangen
    WartetAufSetup,
    /// Angemeldet, Nachrichten werden weitergeleitet
    Aktiv,
    /// Endzustand
    Geschlossen,
}

// ---------------------------------------------------------------------------
// Abmeldung (Drop-Guard)
// ---------------------------------------------------------------------------

struct Abmeldung {
    state: Arc<RelayState>,
    id: VerbindungsId,
}

impl Drop for Abmeldung {
    fn drop(&mut self) {
        self.state.verabschieden(self.id);
    }
}

// ---------------------------------------------------------------------------
// ClientSession
// ---------------------------------------------------------------------------

/// Verarbeitet eine einzelne Verbindung
///
/// Liest Frames via `FrameCodec`, interpretiert den Modus und aktualisiert
/// Registry bzw. ruft den Broadcaster auf.
pub struct ClientSession {
    state: Arc<RelayState>,
    id: VerbindungsId,
    peer_addr: SocketAddr,
    zustand: SessionZustand,
}

impl ClientSession {
    /// Erstellt eine neue ClientSession
    pub fn neu(state: Arc<RelayState>, id: VerbindungsId, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            id,
            peer_addr,
            zustand: SessionZustand::WartetAufSetup,
        }
    }

    /// Startet die Verarbeitungsschleife
    ///
    /// Laeuft bis `escape`, EOF oder einem Transportfehler. Fehler dieser
    /// Verbindung verlassen die Methode nicht.
    pub async fn verarbeiten<S>(mut self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let config = Arc::clone(&self.state.config);
        let peer_addr = self.peer_addr;

        tracing::info!(peer = %peer_addr, verbindung = %self.id, "Neue Verbindung");

        let (lese_haelfte, schreib_haelfte) = tokio::io::split(stream);
        let mut eingang =
            FramedRead::new(lese_haelfte, FrameCodec::with_max_size(config.max_frame_groesse));
        let ausgang =
            FramedWrite::new(schreib_haelfte, FrameCodec::with_max_size(config.max_frame_groesse));

        // Ausgehende Pakete (Broadcaster -> Schreib-Task -> TCP)
        let (tx, rx) = mpsc::channel(config.sende_queue_groesse);
        let sender = ClientSender::mit_byte_limit(self.id, tx, config.max_sende_puffer);
        let mut schreiber = tokio::spawn(schreib_schleife(
            ausgang,
            rx,
            sender.ausstehend_zaehler(),
            config.schreib_timeout,
            self.id,
        ));
        let mut schreiber_beendet = false;

        let abmeldung = Abmeldung {
            state: Arc::clone(&self.state),
            id: self.id,
        };

        while self.zustand != SessionZustand::Geschlossen {
            tokio::select! {
                eingabe = eingang.next() => {
                    match eingabe {
                        Some(Ok(Eingang::Frame(frame))) => {
                            if let Err(e) = self.frame_verarbeiten(frame, &mut eingang, &sender).await {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    fehler = %e,
                                    "Verbindung wird wegen Fehler geschlossen"
                                );
                                self.zustand = SessionZustand::Geschlossen;
                            }
                        }
                        Some(Ok(Eingang::Rohdaten(daten))) => {
                            // Rohdaten werden nur direkt nach einem image-Frame angefordert
                            tracing::warn!(
                                peer = %peer_addr,
                                bytes = daten.len(),
                                "Unerwartete Rohdaten verworfen"
                            );
                        }
                        Some(Err(e)) => {
                            tracing::warn!(peer = %peer_addr, fehler = %e, "Frame-Lesefehler");
                            self.zustand = SessionZustand::Geschlossen;
                        }
                        None => {
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            self.zustand = SessionZustand::Geschlossen;
                        }
                    }
                }

                // Schreib-Task beendet sich nur bei Schreibfehler oder Timeout
                _ = &mut schreiber => {
                    schreiber_beendet = true;
                    tracing::warn!(peer = %peer_addr, "Schreiben fehlgeschlagen – Verbindung wird geschlossen");
                    self.zustand = SessionZustand::Geschlossen;
                }
            }
        }

        // Erst abmelden: die Registry haelt eine Kopie des Senders
        drop(abmeldung);
        drop(sender);
        drop(eingang);

        if !schreiber_beendet {
            // Restliche Queue wird noch geschrieben, dann Schreibseite geschlossen
            let _ = schreiber.await;
        }

        tracing::info!(peer = %peer_addr, verbindung = %self.id, "Verbindungs-Task beendet");
    }

    /// Verarbeitet einen einzelnen Frame
    ///
    /// Ein `Err` beendet die Session. Dekodier- und Protokollfehler des
    /// Frames selbst werden hier geloggt und verworfen.
    async fn frame_verarbeiten<R>(
        &mut self,
        frame: Bytes,
        eingang: &mut FramedRead<R, FrameCodec>,
        sender: &ClientSender,
    ) -> RelayResult<()>
    where
        R: AsyncRead + Unpin,
    {
        let envelope = match Envelope::decode(&frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(peer = %self.peer_addr, fehler = %e, "Ungueltiger Frame verworfen");
                return Ok(());
            }
        };

        tracing::trace!(
            peer = %self.peer_addr,
            mode = %envelope.mode,
            from = %envelope.from,
            "Envelope empfangen"
        );

        match &envelope.mode {
            Mode::Setup => self.setup(&envelope, sender),
            Mode::Message => self.nachricht(&envelope, frame),
            Mode::Image => self.bild(&envelope, frame, eingang).await?,
            Mode::Escape => self.escape(),
            Mode::Unbekannt(mode) => {
                tracing::warn!(peer = %self.peer_addr, mode = %mode, "Unbekannter Modus ignoriert");
            }
        }
        Ok(())
    }

    fn setup(&mut self, envelope: &Envelope, sender: &ClientSender) {
        let name = match envelope.text() {
            Ok(name) => name,
            Err(e) => {
                tracing::warn!(peer = %self.peer_addr, fehler = %e, "Ungueltiges setup ignoriert");
                return;
            }
        };

        // Der Abschied muss spaeter noch in einen Frame passen
        if !self.state.name_zulaessig(name) {
            tracing::warn!(
                peer = %self.peer_addr,
                laenge = name.len(),
                "Anzeigename zu lang – setup ignoriert"
            );
            return;
        }

        match self
            .state
            .registry
            .registrieren(self.id, name, sender.clone())
        {
            Some(alt) => {
                tracing::info!(peer = %self.peer_addr, alt = %alt, name = %name, "Teilnehmer umbenannt")
            }
            None => tracing::info!(peer = %self.peer_addr, name = %name, "Teilnehmer angemeldet"),
        }
        self.zustand = SessionZustand::Aktiv;
    }

    fn nachricht(&self, envelope: &Envelope, frame: Bytes) {
        if self.zustand != SessionZustand::Aktiv {
            tracing::warn!(peer = %self.peer_addr, "Nachricht vor setup ignoriert");
            return;
        }
        let text = match envelope.text() {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(peer = %self.peer_addr, fehler = %e, "Ungueltige Nachricht ignoriert");
                return;
            }
        };

        self.state.beobachter.ereignis(&ChatEreignis::Nachricht {
            von: envelope.from.clone(),
            text: text.to_string(),
        });
        // Originale Frame-Bytes unveraendert weitergeben
        self.state.weiterleiten(self.id, frame, None);
    }

    async fn bild<R>(
        &self,
        envelope: &Envelope,
        frame: Bytes,
        eingang: &mut FramedRead<R, FrameCodec>,
    ) -> RelayResult<()>
    where
        R: AsyncRead + Unpin,
    {
        let header = match envelope.image_header() {
            Ok(header) => header,
            Err(e) => {
                // Ohne Laenge lassen sich die Rohdaten nicht ueberspringen
                tracing::warn!(peer = %self.peer_addr, fehler = %e, "Ungueltiger Bild-Header ignoriert");
                return Ok(());
            }
        };

        let maximum = self.state.config.max_bild_groesse;
        let laenge = usize::try_from(header.length)
            .ok()
            .filter(|laenge| *laenge <= maximum)
            .ok_or(RelayError::BildZuGross {
                laenge: header.length,
                maximum,
            })?;

        eingang.decoder_mut().rohdaten_erwarten(laenge);
        let pixel = match eingang.next().await {
            Some(Ok(Eingang::Rohdaten(pixel))) => pixel,
            Some(Ok(Eingang::Frame(_))) => {
                return Err(RelayError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "Frame statt Bild-Rohdaten gelesen",
                )))
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(RelayError::VerbindungGetrennt),
        };

        if self.zustand != SessionZustand::Aktiv {
            tracing::warn!(peer = %self.peer_addr, bytes = pixel.len(), "Bild vor setup verworfen");
            return Ok(());
        }

        self.state.beobachter.ereignis(&ChatEreignis::Bild {
            von: envelope.from.clone(),
            groesse: header.groesse(),
            daten: pixel.clone(),
        });
        self.state.weiterleiten(self.id, frame, Some(pixel));
        Ok(())
    }

    fn escape(&mut self) {
        if self.state.verabschieden(self.id).is_none() {
            tracing::info!(peer = %self.peer_addr, "escape ohne vorheriges setup");
        }
        self.zustand = SessionZustand::Geschlossen;
    }
}

// ---------------------------------------------------------------------------
// Schreib-Task
// ---------------------------------------------------------------------------

/// Leert die Send-Queue einer Verbindung in den Socket
///
/// Endet bei Schreibfehler oder Timeout sofort, sonst sobald alle Sender
/// der Queue verworfen wurden. Ein Frame ueber der Maximalgroesse wird
/// verworfen, die Verbindung bleibt bestehen.
async fn schreib_schleife<W>(
    mut ausgang: FramedWrite<W, FrameCodec>,
    mut rx: mpsc::Receiver<Paket>,
    ausstehend: Arc<AtomicUsize>,
    timeout: Duration,
    id: VerbindungsId,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(paket) = rx.recv().await {
        let laenge = paket.draht_laenge();
        let maximum = ausgang.encoder().max_frame_size();
        if paket.frame.len() > maximum {
            tracing::warn!(
                verbindung = %id,
                bytes = paket.frame.len(),
                maximum,
                "Zu grosser Frame verworfen"
            );
            ausstehend.fetch_sub(laenge, Ordering::AcqRel);
            continue;
        }

        let ergebnis = tokio::time::timeout(timeout, ausgang.send(paket)).await;
        ausstehend.fetch_sub(laenge, Ordering::AcqRel);
        match ergebnis {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(verbindung = %id, fehler = %e, "Senden fehlgeschlagen");
                return;
            }
            Err(_) => {
                tracing::warn!(
                    verbindung = %id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Schreib-Timeout"
                );
                return;
            }
        }
    }

    match tokio::time::timeout(timeout, ausgang.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(verbindung = %id, fehler = %e, "Schliessen fehlgeschlagen"),
        Err(_) => tracing::debug!(verbindung = %id, "Timeout beim Schliessen"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RelayConfig;
    use plauderstube_core::{BildGroesse, EreignisBeobachter};
    use plauderstube_protocol::ImageHeader;
    use tokio::io::DuplexStream;
    use tokio_util::codec::Framed;

    /// Sammelt alle gemeldeten Ereignisse
    #[derive(Default)]
    struct Aufzeichnung(parking_lot::Mutex<Vec<ChatEreignis>>);

    impl EreignisBeobachter for Aufzeichnung {
        fn ereignis(&self, ereignis: &ChatEreignis) {
            self.0.lock().push(ereignis.clone());
        }
    }

    struct Aufbau {
        state: Arc<RelayState>,
        aufzeichnung: Arc<Aufzeichnung>,
    }

    fn aufbau(config: RelayConfig) -> Aufbau {
        let aufzeichnung = Arc::new(Aufzeichnung::default());
        let state = RelayState::neu(config, aufzeichnung.clone());
        Aufbau {
            state,
            aufzeichnung,
        }
    }

    type Verbindung = (
        Framed<DuplexStream, FrameCodec>,
        VerbindungsId,
        tokio::task::JoinHandle<()>,
    );

    /// Startet eine Session ueber eine In-Memory-Verbindung
    fn verbinden(state: &Arc<RelayState>) -> Verbindung {
        verbinden_mit_puffer(state, 64 * 1024)
    }

    /// Wie `verbinden`, mit vorgegebener Puffergroesse der Leitung
    fn verbinden_mit_puffer(state: &Arc<RelayState>, puffer: usize) -> Verbindung {
        let (client, server) = tokio::io::duplex(puffer);
        let id = state.naechste_id();
        let session = ClientSession::neu(Arc::clone(state), id, "127.0.0.1:40000".parse().unwrap());
        let task = tokio::spawn(session.verarbeiten(server));
        (Framed::new(client, FrameCodec::new()), id, task)
    }

    async fn senden(client: &mut Framed<DuplexStream, FrameCodec>, envelope: Envelope) {
        client
            .send(Paket::aus_envelope(&envelope).unwrap())
            .await
            .unwrap();
    }

    async fn naechster_envelope(client: &mut Framed<DuplexStream, FrameCodec>) -> Envelope {
        let eingang = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("Timeout beim Lesen")
            .expect("Stream beendet")
            .unwrap();
        match eingang {
            Eingang::Frame(frame) => Envelope::decode(&frame).unwrap(),
            Eingang::Rohdaten(_) => panic!("Frame erwartet"),
        }
    }

    async fn warten_bis(bedingung: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !bedingung() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("Bedingung nicht erreicht");
    }

    #[tokio::test]
    async fn setup_meldet_an() {
        let a = aufbau(RelayConfig::default());
        let (mut client, id, _task) = verbinden(&a.state);

        senden(&mut client, Envelope::setup("alice")).await;
        warten_bis(|| a.state.registry.ist_registriert(id)).await;
        assert_eq!(a.state.registry.name(id).as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn nachricht_wird_gemeldet_und_zurueckgesendet() {
        let a = aufbau(RelayConfig::default());
        let (mut client, id, _task) = verbinden(&a.state);

        senden(&mut client, Envelope::setup("alice")).await;
        warten_bis(|| a.state.registry.ist_registriert(id)).await;
        senden(&mut client, Envelope::message("alice", "hi")).await;

        assert_eq!(
            naechster_envelope(&mut client).await,
            Envelope::message("alice", "hi")
        );
        assert_eq!(
            a.aufzeichnung.0.lock().as_slice(),
            [ChatEreignis::Nachricht {
                von: "alice".into(),
                text: "hi".into()
            }]
        );
    }

    #[tokio::test]
    async fn nachricht_vor_setup_wird_ignoriert() {
        let a = aufbau(RelayConfig::default());
        let (mut beobachter, bob, _t1) = verbinden(&a.state);
        senden(&mut beobachter, Envelope::setup("bob")).await;
        warten_bis(|| a.state.registry.ist_registriert(bob)).await;

        let (mut frueh, id, _t2) = verbinden(&a.state);
        senden(&mut frueh, Envelope::message("eve", "zu frueh")).await;
        senden(&mut frueh, Envelope::setup("eve")).await;
        warten_bis(|| a.state.registry.ist_registriert(id)).await;
        senden(&mut frueh, Envelope::message("eve", "jetzt")).await;

        // bob sieht nur die Nachricht nach dem setup
        let e = naechster_envelope(&mut beobachter).await;
        assert_eq!(e.text().unwrap(), "jetzt");
        assert_eq!(a.aufzeichnung.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn kaputter_frame_und_unbekannter_modus_schliessen_nicht() {
        let a = aufbau(RelayConfig::default());
        let (mut client, id, task) = verbinden(&a.state);
        senden(&mut client, Envelope::setup("alice")).await;

        client
            .send(Paket::frame(Bytes::from_static(b"{kein json")))
            .await
            .unwrap();
        client
            .send(Paket::frame(Bytes::from_static(
                br#"{"from":"alice","mode":"wave","data":null}"#,
            )))
            .await
            .unwrap();
        client
            .send(Paket::frame(Bytes::from_static(
                br#"{"from":"alice","mode":"message","data":7}"#,
            )))
            .await
            .unwrap();
        senden(&mut client, Envelope::message("alice", "noch da")).await;

        let e = naechster_envelope(&mut client).await;
        assert_eq!(e.text().unwrap(), "noch da");
        assert!(a.state.registry.ist_registriert(id));
        assert!(!task.is_finished());
    }

    #[tokio::test]
    async fn bild_wird_mit_rohdaten_weitergeleitet() {
        let a = aufbau(RelayConfig::default());
        let (mut client, id, _task) = verbinden(&a.state);
        senden(&mut client, Envelope::setup("alice")).await;
        warten_bis(|| a.state.registry.ist_registriert(id)).await;

        let pixel = Bytes::from((0u8..12).collect::<Vec<_>>());
        let envelope = Envelope::image("alice", ImageHeader::neu(12, BildGroesse::neu(2, 3)));
        client
            .send(Paket::mit_nutzlast(envelope.encode().unwrap(), pixel.clone()))
            .await
            .unwrap();

        assert_eq!(naechster_envelope(&mut client).await, envelope);
        client.codec_mut().rohdaten_erwarten(12);
        let rohdaten = client.next().await.unwrap().unwrap();
        assert_eq!(rohdaten, Eingang::Rohdaten(pixel.clone()));

        assert_eq!(
            a.aufzeichnung.0.lock().as_slice(),
            [ChatEreignis::Bild {
                von: "alice".into(),
                groesse: BildGroesse::neu(2, 3),
                daten: pixel,
            }]
        );
    }

    #[tokio::test]
    async fn bild_vor_setup_wird_uebersprungen() {
        let a = aufbau(RelayConfig::default());
        let (mut client, id, _task) = verbinden(&a.state);

        let envelope = Envelope::image("eve", ImageHeader::neu(4, BildGroesse::neu(1, 1)));
        // Rohdaten die wie ein riesiges Laengenfeld aussehen
        client
            .send(Paket::mit_nutzlast(
                envelope.encode().unwrap(),
                Bytes::from_static(&[0xff, 0xff, 0xff, 0xff]),
            ))
            .await
            .unwrap();
        senden(&mut client, Envelope::setup("eve")).await;
        senden(&mut client, Envelope::message("eve", "synchron")).await;

        warten_bis(|| a.state.registry.ist_registriert(id)).await;
        assert_eq!(naechster_envelope(&mut client).await.text().unwrap(), "synchron");
        assert!(a.aufzeichnung.0.lock().iter().all(|e| matches!(e, ChatEreignis::Nachricht { .. })));
    }

    #[tokio::test]
    async fn zu_grosses_bild_beendet_verbindung() {
        let a = aufbau(RelayConfig {
            max_bild_groesse: 8,
            ..RelayConfig::default()
        });
        let (mut client, id, task) = verbinden(&a.state);
        senden(&mut client, Envelope::setup("alice")).await;
        warten_bis(|| a.state.registry.ist_registriert(id)).await;

        senden(
            &mut client,
            Envelope::image("alice", ImageHeader::neu(9, BildGroesse::neu(3, 3))),
        )
        .await;

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("Session muss enden")
            .unwrap();
        assert!(!a.state.registry.ist_registriert(id));
    }

    #[tokio::test]
    async fn escape_meldet_ab_und_kuendigt_an() {
        let a = aufbau(RelayConfig::default());
        let (mut alice, alice_id, alice_task) = verbinden(&a.state);
        let (mut bob, bob_id, _bob_task) = verbinden(&a.state);
        senden(&mut alice, Envelope::setup("alice")).await;
        senden(&mut bob, Envelope::setup("bob")).await;
        warten_bis(|| a.state.registry.anzahl() == 2).await;

        senden(&mut alice, Envelope::escape("alice")).await;
        // Zweites escape wird nicht mehr verarbeitet
        let _ = alice
            .send(Paket::aus_envelope(&Envelope::escape("alice")).unwrap())
            .await;

        tokio::time::timeout(Duration::from_secs(2), alice_task)
            .await
            .expect("Session muss enden")
            .unwrap();

        assert_eq!(naechster_envelope(&mut bob).await, Envelope::abschied("alice"));
        assert!(!a.state.registry.ist_registriert(alice_id));
        assert!(a.state.registry.ist_registriert(bob_id));

        // alice bekommt keine Ankuendigung, ihr Stream endet
        let rest = tokio::time::timeout(Duration::from_secs(2), alice.next())
            .await
            .expect("Stream muss enden");
        assert!(rest.is_none());
    }

    #[tokio::test]
    async fn verbindungsabbruch_kuendigt_genau_einmal_an() {
        let a = aufbau(RelayConfig::default());
        let (mut alice, _alice_id, alice_task) = verbinden(&a.state);
        let (mut bob, _bob_id, _bob_task) = verbinden(&a.state);
        senden(&mut alice, Envelope::setup("alice")).await;
        senden(&mut bob, Envelope::setup("bob")).await;
        warten_bis(|| a.state.registry.anzahl() == 2).await;

        drop(alice);
        tokio::time::timeout(Duration::from_secs(2), alice_task)
            .await
            .expect("Session muss enden")
            .unwrap();

        assert_eq!(naechster_envelope(&mut bob).await, Envelope::abschied("alice"));
        senden(&mut bob, Envelope::message("bob", "allein")).await;
        // Keine zweite Ankuendigung vor bobs eigener Nachricht
        assert_eq!(naechster_envelope(&mut bob).await.text().unwrap(), "allein");
        assert_eq!(a.state.registry.anzahl(), 1);
    }

    #[tokio::test]
    async fn zu_langer_name_trennt_andere_nicht() {
        let a = aufbau(RelayConfig {
            max_frame_groesse: 128,
            ..RelayConfig::default()
        });
        let (mut bob, bob_id, _bob_task) = verbinden(&a.state);
        senden(&mut bob, Envelope::setup("bob")).await;
        warten_bis(|| a.state.registry.ist_registriert(bob_id)).await;

        // setup-Frame mit genau 128 Bytes: lesbar, der Abschied waere zu gross
        let name = "x".repeat(128 - Envelope::setup("").encode().unwrap().len());
        let envelope = Envelope {
            data: name.into(),
            ..Envelope::setup("")
        };
        assert_eq!(envelope.encode().unwrap().len(), 128);

        let (mut eve, _eve_id, eve_task) = verbinden(&a.state);
        senden(&mut eve, envelope).await;
        drop(eve);
        tokio::time::timeout(Duration::from_secs(2), eve_task)
            .await
            .expect("Session muss enden")
            .unwrap();

        senden(&mut bob, Envelope::message("bob", "noch da")).await;
        assert_eq!(naechster_envelope(&mut bob).await.text().unwrap(), "noch da");
        assert!(a.state.registry.ist_registriert(bob_id));
        assert_eq!(a.state.registry.anzahl(), 1);
    }

    #[tokio::test]
    async fn zu_grosser_frame_wird_beim_schreiben_verworfen() {
        let a = aufbau(RelayConfig {
            max_frame_groesse: 128,
            ..RelayConfig::default()
        });
        let (mut bob, bob_id, bob_task) = verbinden(&a.state);
        senden(&mut bob, Envelope::setup("bob")).await;
        warten_bis(|| a.state.registry.ist_registriert(bob_id)).await;

        assert_eq!(a.state.broadcaster.an_alle_senden(Bytes::from(vec![b'x'; 129])), 1);
        senden(&mut bob, Envelope::message("bob", "danach")).await;

        assert_eq!(naechster_envelope(&mut bob).await.text().unwrap(), "danach");
        assert!(a.state.registry.ist_registriert(bob_id));
        assert!(!bob_task.is_finished());
    }

    #[tokio::test]
    async fn blockierter_client_blockiert_andere_nicht() {
        let a = aufbau(RelayConfig {
            schreib_timeout: Duration::from_millis(100),
            ..RelayConfig::default()
        });
        let (mut bob, bob_id, _bob_task) = verbinden(&a.state);
        // Liest nie, die Leitung fasst kaum einen Frame
        let (mut stau, stau_id, stau_task) = verbinden_mit_puffer(&a.state, 64);
        senden(&mut bob, Envelope::setup("bob")).await;
        senden(&mut stau, Envelope::setup("stau")).await;
        warten_bis(|| a.state.registry.anzahl() == 2).await;

        for i in 0..20 {
            senden(&mut bob, Envelope::message("bob", format!("nachricht {i}"))).await;
        }

        // Schreib-Timeout trennt den blockierten Client
        tokio::time::timeout(Duration::from_secs(2), stau_task)
            .await
            .expect("Session muss enden")
            .unwrap();
        assert!(!a.state.registry.ist_registriert(stau_id));

        let mut erhalten = Vec::new();
        while erhalten.len() < 20 {
            let e = naechster_envelope(&mut bob).await;
            if e.from == "bob" {
                erhalten.push(e.text().unwrap().to_string());
            }
        }
        let erwartet: Vec<_> = (0..20).map(|i| format!("nachricht {i}")).collect();
        assert_eq!(erhalten, erwartet);
        assert!(a.state.registry.ist_registriert(bob_id));
        drop(stau);
    }
}
