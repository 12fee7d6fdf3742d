//! Fehlertypen fuer den Broadcast-Bus

use thiserror::Error;

/// Alle moeglichen Fehler im Broadcast-Bus
#[derive(Debug, Error)]
pub enum BusError {
    // --- Verbindung ---
    #[error("Broker-Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Zeitlimit ueberschritten: {0}")]
    Zeitlimit(String),

    // --- Veroeffentlichen & Abonnieren ---
    #[error("Serialisierung fehlgeschlagen: {0}")]
    Serialisierung(#[from] serde_json::Error),

    #[error("Broker-Fehler: {0}")]
    Broker(String),

    // --- Lebenszyklus ---
    #[error("Bus ist geschlossen")]
    Geschlossen,
}

impl From<BusError> for palaver_core::PalaverError {
    fn from(e: BusError) -> Self {
        palaver_core::PalaverError::Bus(e.to_string())
    }
}

/// Result-Alias fuer den Broadcast-Bus
pub type BusResult<T> = Result<T, BusError>;
