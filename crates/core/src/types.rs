//! Gemeinsame Identifikationstypen fuer Plauderstube
//!
//! IDs verwenden das Newtype-Pattern um Verwechslungen mit anderen
//! Zahlenwerten zur Compilezeit auszuschliessen.

use std::sync::atomic::{AtomicU64, Ordering};

/// Anzahl der Farbkanaele pro Pixel (RGBA)
pub const KANAELE_PRO_PIXEL: u64 = 4;

/// Eindeutige ID einer TCP-Verbindung
///
/// Wird beim Accept vergeben und steigt monoton, dadurch entspricht die
/// Sortierung nach ID der Verbindungsreihenfolge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VerbindungsId(pub u64);

impl std::fmt::Display for VerbindungsId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn:{}", self.0)
    }
}

/// Vergibt fortlaufende Verbindungs-IDs (thread-safe)
#[derive(Debug)]
pub struct IdGenerator {
    naechste: AtomicU64,
}

impl IdGenerator {
    /// Erstellt einen Generator, der bei 1 beginnt
    pub fn neu() -> Self {
        Self {
            naechste: AtomicU64::new(1),
        }
    }

    /// Gibt die naechste freie ID zurueck
    pub fn naechste(&self) -> VerbindungsId {
        VerbindungsId(self.naechste.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::neu()
    }
}

/// Zweidimensionale Pixel-Abmessung eines Bildes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BildGroesse {
    pub breite: u32,
    pub hoehe: u32,
}

impl BildGroesse {
    pub fn neu(breite: u32, hoehe: u32) -> Self {
        Self { breite, hoehe }
    }

    /// Anzahl der Bytes unkomprimierter RGBA-Pixeldaten
    pub fn erwartete_bytes(&self) -> u64 {
        u64::from(self.breite) * u64::from(self.hoehe) * KANAELE_PRO_PIXEL
    }
}

impl std::fmt::Display for BildGroesse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.breite, self.hoehe)
    }
}
