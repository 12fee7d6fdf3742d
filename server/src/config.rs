//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use palaver_bus::BusKonfiguration;
use palaver_core::NodeId;
use palaver_hashpool::{HashKosten, PoolKonfiguration};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Broadcast-Bus-Einstellungen
    pub bus: BusEinstellungen,
    /// Hash-Pool-Einstellungen
    pub hash_pool: HashPoolEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// Broadcast-Bus-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusEinstellungen {
    /// Broker-Backend: "redis" oder "speicher" (Einzelknoten ohne Redis)
    pub broker: String,
    /// Verbindungs-URL des Redis-Brokers
    pub redis_url: String,
    /// Praefix aller Topic-Namen
    pub topic_praefix: String,
    /// Knoten-Identitaet (leer = zufaellig generiert)
    pub node_id: Option<String>,
    /// Zeitlimit fuer Verbindungsaufbau und Ping in Millisekunden
    pub verbindungs_zeitlimit_ms: u64,
}

impl Default for BusEinstellungen {
    fn default() -> Self {
        Self {
            broker: "redis".into(),
            redis_url: "redis://127.0.0.1:6379".into(),
            topic_praefix: "palaver:".into(),
            node_id: None,
            verbindungs_zeitlimit_ms: 3000,
        }
    }
}

/// Hash-Pool-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HashPoolEinstellungen {
    /// Anzahl der Worker (0 = Anzahl der CPU-Kerne)
    pub worker_anzahl: usize,
    /// Warteschlangen-Kapazitaet als Vielfaches der Worker-Anzahl
    pub queue_faktor: usize,
    /// Zeitlimit pro Operation in Millisekunden
    pub zeitlimit_ms: u64,
    /// Argon2-Speicher in KiB
    pub speicher_kib: u32,
    /// Argon2-Iterationen
    pub iterationen: u32,
    /// Argon2-Parallelitaet
    pub parallelitaet: u32,
}

impl Default for HashPoolEinstellungen {
    fn default() -> Self {
        Self {
            worker_anzahl: 0,
            queue_faktor: 4,
            zeitlimit_ms: 30_000,
            speicher_kib: 64 * 1024,
            iterationen: 3,
            parallelitaet: 1,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
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
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft Wertebereiche, die serde nicht abdeckt
    fn pruefen(&self) -> anyhow::Result<()> {
        if !palaver_observability::log_level_gueltig(&self.logging.level) {
            anyhow::bail!("Ungueltiger Log-Level: '{}'", self.logging.level);
        }
        if !palaver_observability::log_format_gueltig(&self.logging.format) {
            anyhow::bail!("Ungueltiges Log-Format: '{}'", self.logging.format);
        }
        match self.bus.broker.as_str() {
            "redis" | "speicher" => {}
            andere => anyhow::bail!("Unbekanntes Broker-Backend: '{andere}'"),
        }
        Ok(())
    }

    /// Uebersetzt die Bus-Sektion in die Bus-Konfiguration
    pub fn bus_konfiguration(&self) -> BusKonfiguration {
        BusKonfiguration {
            node_id: self.bus.node_id.clone().map(NodeId::benannt),
            topic_praefix: self.bus.topic_praefix.clone(),
        }
    }

    /// Uebersetzt die Pool-Sektion in die Pool-Konfiguration
    pub fn pool_konfiguration(&self) -> PoolKonfiguration {
        PoolKonfiguration {
            worker_anzahl: self.hash_pool.worker_anzahl,
            queue_faktor: self.hash_pool.queue_faktor,
            zeitlimit: Duration::from_millis(self.hash_pool.zeitlimit_ms),
            kosten: HashKosten {
                speicher_kib: self.hash_pool.speicher_kib,
                iterationen: self.hash_pool.iterationen,
                parallelitaet: self.hash_pool.parallelitaet,
            },
        }
    }

    /// Zeitlimit fuer Broker-Verbindungsaufbau und Ping
    pub fn verbindungs_zeitlimit(&self) -> Duration {
        Duration::from_millis(self.bus.verbindungs_zeitlimit_ms)
    }
}
