//! Auftrags-Typen des Hash-Worker-Pools

use tokio::sync::oneshot;

use crate::error::PoolResult;

/// Art der CPU-Arbeit eines Auftrags
#[derive(Debug)]
pub enum AuftragArt {
    /// Passwort hashen
    Hashen { passwort: String },
    /// Passwort gegen einen gespeicherten Hash pruefen
    Pruefen { passwort: String, hash: String },
}

/// Ergebnis eines ausgefuehrten Auftrags
#[derive(Debug)]
pub enum AuftragErgebnis {
    /// PHC-Hash aus einem Hash-Auftrag
    Hash(String),
    /// Erfolgreiche Pruefung
    Verifiziert,
}

/// In die Warteschlange eingereihter Auftrag
///
/// Jeder Auftrag antwortet genau einmal ueber seinen privaten Kanal.
/// Wartet der Aufrufer nicht mehr (Zeitlimit, Abbruch), verwirft der
/// Worker das Ergebnis – nebenlaeufige Aufrufer sehen einander nie.
pub struct Auftrag {
    pub art: AuftragArt,
    pub antwort: oneshot::Sender<PoolResult<AuftragErgebnis>>,
}
