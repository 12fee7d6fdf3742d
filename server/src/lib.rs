//! palaver-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und stellt den oeffentlichen
//! Einstiegspunkt fuer Integrationstests bereit.

pub mod config;

use std::sync::Arc;

use config::ServerConfig;
use palaver_bus::{Broker, BroadcastBus, RedisBroker, SpeicherBroker};
use palaver_core::{Bereich, PalaverError, Result};
use palaver_hashpool::HashPool;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet die Backbone-Komponenten und laeuft bis zum Shutdown-Signal
    ///
    /// Reihenfolge:
    /// 1. Broker verbinden (fail fast bei Unerreichbarkeit)
    /// 2. Broadcast-Bus starten und Global-Topic abonnieren
    /// 3. Hash-Worker-Pool starten
    /// 4. Auf Ctrl-C / SIGTERM warten
    /// 5. Bus und Pool mit gebundener Frist herunterfahren
    pub async fn starten(self) -> Result<()> {
        let broker = self.broker_verbinden().await?;

        let bus = BroadcastBus::neu(broker, self.config.bus_konfiguration()).await?;
        bus.abonnieren(Bereich::Global).await?;
        bus.bei_nachricht(|nachricht| {
            tracing::debug!(
                typ = %nachricht.typ,
                von = %nachricht.origin_node,
                "Cluster-Event empfangen"
            );
        });

        let pool = HashPool::neu(self.config.pool_konfiguration());
        let statistik = pool.statistik();
        tracing::info!(
            worker = statistik.worker_anzahl,
            "Hash-Worker-Pool bereit"
        );

        tracing::info!(
            node_id = %bus.node_id(),
            "Palaver-Backbone laeuft. Warte auf Shutdown-Signal (Ctrl-C)..."
        );
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| PalaverError::intern(format!("Ctrl-C-Handler: {e}")))?;
        tracing::info!("Shutdown-Signal empfangen, fahre herunter");

        // Erst der Bus (keine neuen Events mehr), dann der Pool
        bus.schliessen().await?;
        pool.schliessen().await?;
        Ok(())
    }

    /// Baut das konfigurierte Broker-Backend auf
    async fn broker_verbinden(&self) -> Result<Arc<dyn Broker>> {
        match self.config.bus.broker.as_str() {
            "speicher" => {
                tracing::info!("In-Memory-Broker aktiv (Einzelknoten-Betrieb)");
                Ok(Arc::new(SpeicherBroker::neu()))
            }
            _ => {
                let broker = RedisBroker::verbinden(
                    &self.config.bus.redis_url,
                    self.config.verbindungs_zeitlimit(),
                )
                .await?;
                Ok(Arc::new(broker))
            }
        }
    }
}
