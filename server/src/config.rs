//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use anyhow::Context;
use plauderstube_relay::RelayConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::logging;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Relay-Einstellungen (Limits, Queues, Echo)
    pub relay: RelayEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer den TCP-Listener (IP-Literal)
    pub bind_adresse: String,
    /// Port fuer den TCP-Listener
    pub tcp_port: u16,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            tcp_port: 33000,
        }
    }
}

/// Relay-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayEinstellungen {
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: usize,
    /// Maximale Groesse eines JSON-Frames in Bytes
    pub max_frame_groesse: usize,
    /// Maximale Groesse eines Bildes in Bytes
    pub max_bild_groesse: usize,
    /// Send-Queue pro Verbindung (Pakete)
    pub sende_queue_groesse: usize,
    /// Ungeschriebene Bytes pro Verbindung, bevor Pakete verworfen werden
    pub max_sende_puffer: usize,
    /// Timeout fuer einen einzelnen Schreibvorgang
    pub schreib_timeout_ms: u64,
    /// Absender erhalten ihre eigenen Nachrichten zurueck
    pub echo_an_absender: bool,
}

impl Default for RelayEinstellungen {
    fn default() -> Self {
        let relay = RelayConfig::default();
        Self {
            max_clients: relay.max_clients,
            max_frame_groesse: relay.max_frame_groesse,
            max_bild_groesse: relay.max_bild_groesse,
            sende_queue_groesse: relay.sende_queue_groesse,
            max_sende_puffer: relay.max_sende_puffer,
            schreib_timeout_ms: relay.schreib_timeout.as_millis() as u64,
            echo_an_absender: relay.echo_an_absender,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level oder EnvFilter-Direktive, z.B. "info" oder "plauderstube_relay=debug"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    ///
    /// Existiert die Datei nicht, wird die Standardkonfiguration mit
    /// `false` zurueckgegeben. Das Logging ist zu diesem Zeitpunkt noch
    /// nicht initialisiert, der Aufrufer meldet das selbst.
    pub fn laden(pfad: &str) -> anyhow::Result<(Self, bool)> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config = Self::aus_toml(&inhalt)
                    .with_context(|| format!("Konfigurationsfehler in '{pfad}'"))?;
                Ok((config, true))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok((Self::default(), false)),
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Parst und prueft eine Konfiguration aus einem TOML-String
    pub fn aus_toml(inhalt: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(inhalt)?;
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft Werte, die erst zur Laufzeit auffallen wuerden
    pub fn pruefen(&self) -> anyhow::Result<()> {
        let relay = &self.relay;
        anyhow::ensure!(relay.max_clients > 0, "relay.max_clients muss > 0 sein");
        anyhow::ensure!(
            relay.sende_queue_groesse > 0,
            "relay.sende_queue_groesse muss > 0 sein"
        );
        anyhow::ensure!(
            relay.max_sende_puffer > 0,
            "relay.max_sende_puffer muss > 0 sein"
        );
        anyhow::ensure!(
            relay.max_frame_groesse > 0 && relay.max_frame_groesse <= u32::MAX as usize,
            "relay.max_frame_groesse muss zwischen 1 und {} liegen",
            u32::MAX
        );
        anyhow::ensure!(
            relay.schreib_timeout_ms > 0,
            "relay.schreib_timeout_ms muss > 0 sein"
        );
        anyhow::ensure!(
            logging::log_format_gueltig(&self.logging.format),
            "logging.format '{}' unbekannt (text oder json)",
            self.logging.format
        );
        self.tcp_bind_adresse()?;
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse fuer TCP zurueck
    pub fn tcp_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let adresse = format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.tcp_port);
        adresse
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{adresse}'"))
    }

    /// Laufzeit-Konfiguration fuer das Relay
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            max_clients: self.relay.max_clients,
            max_frame_groesse: self.relay.max_frame_groesse,
            max_bild_groesse: self.relay.max_bild_groesse,
            sende_queue_groesse: self.relay.sende_queue_groesse,
            max_sende_puffer: self.relay.max_sende_puffer,
            schreib_timeout: Duration::from_millis(self.relay.schreib_timeout_ms),
            echo_an_absender: self.relay.echo_an_absender,
        }
    }
}
