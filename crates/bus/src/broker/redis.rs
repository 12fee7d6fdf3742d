//! Redis-Broker – Pub/Sub ueber eine geteilte Redis-Instanz
//!
//! PUBLISH und PING laufen ueber eine gemultiplexte Verbindung; jedes
//! Abonnement bekommt eine eigene Pub/Sub-Verbindung samt
//! Weiterleitungs-Task. Bricht die Broker-Seite weg, endet der
//! Nachrichtenstrom und der betroffene Listener stoppt – ein
//! Wiederaufbau ist bewusst Sache des Aufrufers.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::broker::{Broker, BrokerAbo, ABO_KANAL_GROESSE};
use crate::error::{BusError, BusResult};

/// Redis-gestuetzter Broker
pub struct RedisBroker {
    client: redis::Client,
    verbindung: MultiplexedConnection,
}

impl RedisBroker {
    /// Verbindet sich mit Redis und prueft die Erreichbarkeit
    ///
    /// Schlaegt innerhalb des Zeitlimits fehl statt erst beim ersten
    /// Veroeffentlichen.
    pub async fn verbinden(url: &str, zeitlimit: Duration) -> BusResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| BusError::Verbindung(format!("Ungueltige Broker-URL '{url}': {e}")))?;

        let verbindung = timeout(zeitlimit, client.get_multiplexed_async_connection())
            .await
            .map_err(|_| BusError::Zeitlimit(format!("Verbindungsaufbau zu '{url}'")))?
            .map_err(|e| BusError::Verbindung(format!("Broker '{url}' nicht erreichbar: {e}")))?;

        let broker = Self { client, verbindung };
        timeout(zeitlimit, broker.ping())
            .await
            .map_err(|_| BusError::Zeitlimit("Broker-Ping beim Verbinden".into()))??;

        tracing::info!(url = %url, "Mit Redis-Broker verbunden");
        Ok(broker)
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn ping(&self) -> BusResult<()> {
        let mut verbindung = self.verbindung.clone();
        let antwort: String = redis::cmd("PING")
            .query_async(&mut verbindung)
            .await
            .map_err(|e| BusError::Broker(format!("PING fehlgeschlagen: {e}")))?;
        if antwort == "PONG" {
            Ok(())
        } else {
            Err(BusError::Broker(format!("Unerwartete PING-Antwort: {antwort}")))
        }
    }

    async fn veroeffentlichen(&self, topic: &str, nutzlast: Vec<u8>) -> BusResult<()> {
        let mut verbindung = self.verbindung.clone();
        let _abonnenten: i64 = verbindung
            .publish(topic, nutzlast)
            .await
            .map_err(|e| BusError::Broker(format!("PUBLISH auf '{topic}' fehlgeschlagen: {e}")))?;
        Ok(())
    }

    async fn abonnieren(&self, topic: &str) -> BusResult<BrokerAbo> {
        let mut pubsub = self
            .client
            .get_async_pubsub()
            .await
            .map_err(|e| BusError::Broker(format!("Pub/Sub-Verbindung fehlgeschlagen: {e}")))?;
        pubsub
            .subscribe(topic)
            .await
            .map_err(|e| BusError::Broker(format!("SUBSCRIBE '{topic}' fehlgeschlagen: {e}")))?;

        let (tx, rx) = mpsc::channel(ABO_KANAL_GROESSE);
        let topic_name = topic.to_string();
        let weiterleitung = tokio::spawn(async move {
            // Der Strom besitzt die Pub/Sub-Verbindung; endet er, ist die
            // Broker-Seite weg und der Kanal schliesst sich.
            let mut strom = pubsub.into_on_message();
            while let Some(nachricht) = strom.next().await {
                let nutzlast = nachricht.get_payload_bytes().to_vec();
                if tx.send(nutzlast).await.is_err() {
                    break;
                }
            }
            tracing::debug!(topic = %topic_name, "Redis-Abonnement beendet");
        });

        Ok(BrokerAbo::neu(topic, rx, weiterleitung))
    }

    async fn schliessen(&self) -> BusResult<()> {
        // Die gemultiplexte Verbindung schliesst mit dem letzten Clone;
        // Pub/Sub-Verbindungen enden mit ihren Weiterleitungs-Tasks.
        Ok(())
    }
}
