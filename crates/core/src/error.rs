//! Fehlertypen fuer Palaver
//!
//! Zentraler Fehler-Enum fuer die Service-Schicht. Die Fach-Crates
//! (Bus, Hash-Pool) definieren eigene, feiner aufgeloeste Fehler und
//! stellen From-Konvertierungen in diesen Typ bereit.

use thiserror::Error;

/// Globaler Result-Alias fuer Palaver
pub type Result<T> = std::result::Result<T, PalaverError>;

/// Alle moeglichen Fehler im Palaver-System
#[derive(Debug, Error)]
pub enum PalaverError {
    // --- Verbindung & Netzwerk ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Subsysteme ---
    #[error("Bus-Fehler: {0}")]
    Bus(String),

    #[error("Hash-Pool-Fehler: {0}")]
    HashPool(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PalaverError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}
