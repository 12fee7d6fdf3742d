//! palaver-observability – Structured Logging fuer Palaver
//!
//! Initialisiert tracing-subscriber fuer alle Palaver-Binaries.
//! Metriken laufen bewusst nicht hier: der Bus und der Hash-Pool
//! exponieren ihre Zaehler als Statistik-Snapshots, die Auswertung
//! ist Sache der Einbettung.

pub mod logging;

pub use logging::{
    log_format_aus_env, log_format_gueltig, log_level_aus_env, log_level_gueltig,
    logging_initialisieren,
};
