//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable (hat Vorrang vor der Config-Datei):
//! - `PS_LOG_LEVEL`: Log-Level oder EnvFilter-Direktive, Standard: info
//! - `PS_LOG_FORMAT`: Format (text/json), Standard: text

use tracing_subscriber::{fmt, EnvFilter};

/// Umgebungsvariable fuer das Log-Level
pub const LEVEL_ENV: &str = "PS_LOG_LEVEL";
/// Umgebungsvariable fuer das Log-Format
pub const FORMAT_ENV: &str = "PS_LOG_FORMAT";

/// Ausgabeformat der Log-Zeilen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Initialisiert das Logging-System.
///
/// Liest `PS_LOG_LEVEL` und `PS_LOG_FORMAT` aus der Umgebung und faellt auf
/// die uebergebenen Werte aus der Konfiguration zurueck.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env(LEVEL_ENV)
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    match wirksames_format(std::env::var(FORMAT_ENV).ok().as_deref(), format) {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        LogFormat::Text => {
            fmt().with_env_filter(filter).with_target(true).init();
        }
    }
}

/// Waehlt das Format: Umgebung vor Konfiguration, Unbekanntes wird zu Text
pub fn wirksames_format(aus_env: Option<&str>, aus_config: &str) -> LogFormat {
    match aus_env.unwrap_or(aus_config) {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    }
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_werte() {
        assert!(log_format_gueltig("text"));
        assert!(log_format_gueltig("json"));
        assert!(!log_format_gueltig("xml"));
        assert!(!log_format_gueltig("JSON"));
    }

    #[test]
    fn umgebung_hat_vorrang() {
        assert_eq!(wirksames_format(Some("json"), "text"), LogFormat::Json);
        assert_eq!(wirksames_format(Some("text"), "json"), LogFormat::Text);
        assert_eq!(wirksames_format(None, "json"), LogFormat::Json);
        assert_eq!(wirksames_format(None, "yaml"), LogFormat::Text);
    }

    #[test]
    fn filter_direktiven_aus_config() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("plauderstube_relay=debug,warn").is_ok());
    }
}
