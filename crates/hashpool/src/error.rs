//! Fehlertypen fuer den Hash-Worker-Pool
//!
//! Die Lebenszyklus-Fehler bleiben bewusst getrennt, damit Aufrufer
//! unterschiedliche Strategien fahren koennen – etwa Backoff-Retry bei
//! voller Warteschlange, aber nicht bei Zeitueberschreitung.

use thiserror::Error;

/// Alle moeglichen Fehler im Hash-Worker-Pool
#[derive(Debug, Error)]
pub enum PoolError {
    // --- Lebenszyklus ---
    #[error("Pool ist geschlossen")]
    Geschlossen,

    #[error("Warteschlange voll")]
    WarteschlangeVoll,

    #[error("Zeitlimit ueberschritten")]
    Zeitlimit,

    // --- Validierung (vor der Warteschlange) ---
    #[error("Passwort ist leer")]
    PasswortLeer,

    #[error("Passwort zu kurz: mindestens {minimum} Zeichen")]
    PasswortZuKurz { minimum: usize },

    #[error("Passwort zu lang: hoechstens {maximum} Zeichen")]
    PasswortZuLang { maximum: usize },

    // --- Pruefung ---
    #[error("Passwort falsch")]
    FalschesPasswort,

    // --- Hashing ---
    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    Hashing(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl From<PoolError> for palaver_core::PalaverError {
    fn from(e: PoolError) -> Self {
        palaver_core::PalaverError::HashPool(e.to_string())
    }
}

/// Result-Alias fuer den Hash-Worker-Pool
pub type PoolResult<T> = Result<T, PoolError>;
