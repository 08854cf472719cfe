//! Plauderstube Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet das Relay.

use anyhow::Result;
use plauderstube_server::{config::ServerConfig, logging, Server};

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad =
        std::env::var("PLAUDERSTUBE_CONFIG").unwrap_or_else(|_| "config.toml".into());

    // Fehlende Datei wird erst nach dem Logging-Setup gemeldet
    let (config, gefunden) = ServerConfig::laden(&config_pfad)?;

    logging::logging_initialisieren(&config.logging.level, &config.logging.format);

    if !gefunden {
        tracing::warn!(
            pfad = %config_pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Plauderstube Server wird initialisiert"
    );

    Server::neu(config).starten().await
}
