//! plauderstube-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod logging;

use anyhow::Result;
use config::ServerConfig;
use plauderstube_core::EreignisBeobachter;
use plauderstube_relay::{LogBeobachter, RelayServer, RelayState};
use std::sync::Arc;
use tokio::sync::watch;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
    beobachter: Arc<dyn EreignisBeobachter>,
}

impl Server {
    /// Erstellt einen neuen Server, der weitergeleitete Inhalte loggt
    pub fn neu(config: ServerConfig) -> Self {
        Self::mit_beobachter(config, Arc::new(LogBeobachter))
    }

    /// Erstellt einen Server mit eigenem Beobachter
    pub fn mit_beobachter(config: ServerConfig, beobachter: Arc<dyn EreignisBeobachter>) -> Self {
        Self { config, beobachter }
    }

    /// Bindet den TCP-Listener
    pub async fn binden(&self) -> Result<RelayServer> {
        let adresse = self.config.tcp_bind_adresse()?;
        let state = RelayState::neu(self.config.relay_config(), Arc::clone(&self.beobachter));
        let relay = RelayServer::binden(state, adresse).await?;
        Ok(relay)
    }

    /// Startet das Relay und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
                    let _ = shutdown_tx.send(true);
                }
                Err(e) => {
                    tracing::error!(fehler = %e, "Ctrl-C-Handler konnte nicht registriert werden");
                }
            }
        });

        self.starten_mit_shutdown(shutdown_rx).await
    }

    /// Startet das Relay und laeuft bis `shutdown_rx` `true` meldet
    pub async fn starten_mit_shutdown(self, shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let relay = self.binden().await?;

        tracing::info!(
            tcp = %relay.lokale_adresse()?,
            max_clients = self.config.relay.max_clients,
            echo = self.config.relay.echo_an_absender,
            "Server startet"
        );

        relay.starten(shutdown_rx).await?;
        tracing::info!("Server beendet");
        Ok(())
    }
}
