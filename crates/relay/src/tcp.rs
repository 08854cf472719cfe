//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `RelayServer` bindet einen TCP-Socket und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer `ClientSession`.
//!
//! ## Concurrency-Modell
//! Alle Verbindungs-Tasks laufen auf dem Multi-Thread-Executor. Der
//! gemeinsame Zustand liegt in `RelayState` (DashMap + Atomics), Sessions
//! teilen sonst nichts miteinander.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::{RelayError, RelayResult};
use crate::session::ClientSession;
use crate::state::RelayState;

/// Pause nach einem voruebergehenden Accept-Fehler
const ACCEPT_PAUSE: Duration = Duration::from_millis(10);

/// TCP-Relay-Server
pub struct RelayServer {
    state: Arc<RelayState>,
    listener: TcpListener,
}

impl RelayServer {
    /// Bindet den Listening-Socket
    ///
    /// Ein Bind-Fehler ist fatal (`RelayError::ListenerFatal`).
    pub async fn binden(state: Arc<RelayState>, bind_addr: SocketAddr) -> RelayResult<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| RelayError::listener_fatal(bind_addr, e))?;
        Ok(Self { state, listener })
    }

    /// Tatsaechlich gebundene Adresse (relevant bei Port 0)
    pub fn lokale_adresse(&self) -> RelayResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &Arc<RelayState> {
        &self.state
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    ///
    /// Kehrt nur bei Shutdown (`Ok`) oder einem unbrauchbaren
    /// Listening-Socket (`Err`) zurueck. Laufende Sessions werden beim
    /// Shutdown nicht abgebrochen.
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> RelayResult<()> {
        let lokale_addr = self.lokale_adresse()?;
        tracing::info!(adresse = %lokale_addr, "TCP Relay-Server gestartet");

        loop {
            tokio::select! {
                // Neue eingehende Verbindung
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let Some(platz) = self.state.platz_reservieren() else {
                                tracing::warn!(
                                    peer = %peer_addr,
                                    max = self.state.config.max_clients,
                                    "Server voll – Verbindung abgelehnt"
                                );
                                drop(stream);
                                continue;
                            };

                            if let Err(e) = stream.set_nodelay(true) {
                                tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                            }

                            let id = self.state.naechste_id();
                            tracing::debug!(peer = %peer_addr, verbindung = %id, "Verbindung akzeptiert");

                            let session = ClientSession::neu(Arc::clone(&self.state), id, peer_addr);
                            tokio::spawn(async move {
                                let _platz = platz;
                                session.verarbeiten(stream).await;
                            });
                        }
                        Err(e) if listener_unbrauchbar(&e) => {
                            tracing::error!(fehler = %e, "Listening-Socket unbrauchbar");
                            return Err(RelayError::listener_fatal(lokale_addr, e));
                        }
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(ACCEPT_PAUSE).await;
                        }
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("Relay-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("TCP Relay-Server gestoppt");
        Ok(())
    }
}

/// Accept-Fehler, nach denen der Socket nicht mehr nutzbar ist
///
/// Alles andere (EMFILE, ECONNABORTED, ...) betrifft nur die einzelne
/// Verbindung oder ist voruebergehend.
fn listener_unbrauchbar(e: &std::io::Error) -> bool {
    if e.kind() == std::io::ErrorKind::InvalidInput {
        return true;
    }

    // errno 9 ist nur auf Unix EBADF
    #[cfg(unix)]
    {
        const EBADF: i32 = 9;
        if e.raw_os_error() == Some(EBADF) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RelayConfig;
    use plauderstube_core::KeinBeobachter;
    use std::io;

    #[test]
    fn accept_fehler_einordnung() {
        #[cfg(unix)]
        assert!(listener_unbrauchbar(&io::Error::from_raw_os_error(9)));
        assert!(listener_unbrauchbar(&io::Error::new(
            io::ErrorKind::InvalidInput,
            "kein Socket"
        )));
        assert!(!listener_unbrauchbar(&io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "abgebrochen"
        )));
        assert!(!listener_unbrauchbar(&io::Error::new(
            io::ErrorKind::Other,
            "zu viele Dateien"
        )));
    }

    #[tokio::test]
    async fn belegter_port_ist_fatal() {
        let state = RelayState::neu(RelayConfig::default(), Arc::new(KeinBeobachter));
        let erster = RelayServer::binden(Arc::clone(&state), "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let adresse = erster.lokale_adresse().unwrap();

        let fehler = RelayServer::binden(state, adresse)
            .await
            .err()
            .expect("zweiter Bind muss fehlschlagen");
        assert!(fehler.ist_fatal());
    }

    #[tokio::test]
    async fn shutdown_beendet_accept_loop() {
        let state = RelayState::neu(RelayConfig::default(), Arc::new(KeinBeobachter));
        let server = RelayServer::binden(state, "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let (tx, rx) = watch::channel(false);
        let task = tokio::spawn(server.starten(rx));

        tx.send(true).unwrap();
        let ergebnis = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("Accept-Loop muss enden")
            .unwrap();
        assert!(ergebnis.is_ok());
    }
}
