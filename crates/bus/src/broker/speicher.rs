//! In-Memory-Broker – Topic-Fanout ohne externen Dienst
//!
//! Fuer Einzelknoten-Deployments und Tests. Clones teilen die
//! Topic-Tabelle, sodass mehrere Bus-Instanzen im selben Prozess sich
//! genauso verhalten wie ueber einen echten Broker verbundene Knoten.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};

use crate::broker::{Broker, BrokerAbo, ABO_KANAL_GROESSE};
use crate::error::BusResult;

/// Puffer pro Topic; langsame Abonnenten verlieren die aeltesten Frames
const TOPIC_KANAL_GROESSE: usize = 256;

/// Prozess-lokaler Broker ueber tokio-Broadcast-Kanaelen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone, Default)]
pub struct SpeicherBroker {
    inner: Arc<SpeicherBrokerInner>,
}

#[derive(Default)]
struct SpeicherBrokerInner {
    /// Topic -> Broadcast-Sender; entsteht beim ersten Zugriff
    themen: DashMap<String, broadcast::Sender<Vec<u8>>>,
}

impl SpeicherBroker {
    /// Erstellt einen neuen, leeren Broker
    pub fn neu() -> Self {
        Self::default()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Vec<u8>> {
        self.inner
            .themen
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_KANAL_GROESSE).0)
            .clone()
    }
}

#[async_trait]
impl Broker for SpeicherBroker {
    async fn ping(&self) -> BusResult<()> {
        Ok(())
    }

    async fn veroeffentlichen(&self, topic: &str, nutzlast: Vec<u8>) -> BusResult<()> {
        // Kein Abonnent ist kein Fehler: Pub/Sub liefert best-effort
        let _ = self.sender(topic).send(nutzlast);
        Ok(())
    }

    async fn abonnieren(&self, topic: &str) -> BusResult<BrokerAbo> {
        let mut quelle = self.sender(topic).subscribe();
        let (tx, rx) = mpsc::channel(ABO_KANAL_GROESSE);
        let topic_name = topic.to_string();
        let weiterleitung = tokio::spawn(async move {
            loop {
                match quelle.recv().await {
                    Ok(nutzlast) => {
                        if tx.send(nutzlast).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(anzahl)) => {
                        tracing::warn!(
                            topic = %topic_name,
                            verpasst = anzahl,
                            "Langsamer Abonnent, Frames verworfen"
                        );
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(BrokerAbo::neu(topic, rx, weiterleitung))
    }

    async fn schliessen(&self) -> BusResult<()> {
        // Sender fallen lassen: offene Abonnements laufen leer und enden
        self.inner.themen.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn veroeffentlichen_und_empfangen() {
        let broker = SpeicherBroker::neu();
        let mut abo = broker.abonnieren("test:topic").await.unwrap();

        broker
            .veroeffentlichen("test:topic", b"hallo".to_vec())
            .await
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(1), abo.empfangen())
            .await
            .expect("Frame muss ankommen")
            .unwrap();
        assert_eq!(frame, b"hallo");
    }

    #[tokio::test]
    async fn veroeffentlichen_ohne_abonnenten_ist_ok() {
        let broker = SpeicherBroker::neu();
        broker
            .veroeffentlichen("test:leer", b"x".to_vec())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn clone_teilt_topic_tabelle() {
        let broker = SpeicherBroker::neu();
        let geteilt = broker.clone();

        let mut abo = broker.abonnieren("test:geteilt").await.unwrap();
        geteilt
            .veroeffentlichen("test:geteilt", b"quer".to_vec())
            .await
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(1), abo.empfangen())
            .await
            .expect("Frame muss ueber den Clone ankommen")
            .unwrap();
        assert_eq!(frame, b"quer");
    }

    #[tokio::test]
    async fn zwei_abonnenten_erhalten_beide() {
        let broker = SpeicherBroker::neu();
        let mut abo1 = broker.abonnieren("test:fanout").await.unwrap();
        let mut abo2 = broker.abonnieren("test:fanout").await.unwrap();

        broker
            .veroeffentlichen("test:fanout", b"an-alle".to_vec())
            .await
            .unwrap();

        for abo in [&mut abo1, &mut abo2] {
            let frame = tokio::time::timeout(Duration::from_secs(1), abo.empfangen())
                .await
                .expect("beide Abonnenten muessen den Frame sehen")
                .unwrap();
            assert_eq!(frame, b"an-alle");
        }
    }

    #[tokio::test]
    async fn schliessen_beendet_abonnements() {
        let broker = SpeicherBroker::neu();
        let mut abo = broker.abonnieren("test:ende").await.unwrap();

        broker.schliessen().await.unwrap();

        let ende = tokio::time::timeout(Duration::from_secs(1), abo.empfangen())
            .await
            .expect("Abonnement muss enden");
        assert!(ende.is_none(), "Nach schliessen darf nichts mehr kommen");
    }
}
