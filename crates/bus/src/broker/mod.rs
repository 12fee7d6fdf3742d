//! Broker-Abstraktion – Publish/Subscribe-Anbindung des Busses
//!
//! Der Bus spricht nie direkt mit Redis, sondern ueber den `Broker`-Trait.
//! Das haelt die Bus-Logik testbar und erlaubt Einzelknoten-Deployments
//! ganz ohne externen Dienst (siehe `SpeicherBroker`).

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::BusResult;

pub mod redis;
pub mod speicher;

pub use self::redis::RedisBroker;
pub use speicher::SpeicherBroker;

/// Groesse des Weiterleitungs-Kanals pro Abonnement
pub(crate) const ABO_KANAL_GROESSE: usize = 256;

/// Publish/Subscribe-faehiger Broker
///
/// `veroeffentlichen` ist aus Sicht des Aufrufers synchron: es wartet,
/// bis der Broker die Nachricht angenommen hat, nicht auf die Zustellung
/// an entfernte Abonnenten.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Prueft die Erreichbarkeit des Brokers
    async fn ping(&self) -> BusResult<()>;

    /// Schreibt eine Nutzlast auf ein Topic
    async fn veroeffentlichen(&self, topic: &str, nutzlast: Vec<u8>) -> BusResult<()>;

    /// Oeffnet ein Abonnement fuer ein Topic
    async fn abonnieren(&self, topic: &str) -> BusResult<BrokerAbo>;

    /// Schliesst die Broker-Verbindung
    async fn schliessen(&self) -> BusResult<()>;
}

/// Laufendes Abonnement eines Broker-Topics
///
/// Liefert rohe Nutzlast-Frames ueber einen gebundenen Kanal. Hinter dem
/// Kanal laeuft eine Weiterleitungs-Task, die die Broker-Seite des
/// Abonnements besitzt; `beenden` (oder Drop) bricht sie ab und gibt
/// damit das Abonnement frei.
pub struct BrokerAbo {
    topic: String,
    empfaenger: mpsc::Receiver<Vec<u8>>,
    weiterleitung: JoinHandle<()>,
}

impl BrokerAbo {
    /// Buendelt Empfangs-Kanal und Weiterleitungs-Task zu einem Handle
    pub fn neu(
        topic: impl Into<String>,
        empfaenger: mpsc::Receiver<Vec<u8>>,
        weiterleitung: JoinHandle<()>,
    ) -> Self {
        Self {
            topic: topic.into(),
            empfaenger,
            weiterleitung,
        }
    }

    /// Gibt den Topic-Namen dieses Abonnements zurueck
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Empfaengt den naechsten Frame
    ///
    /// `None` bedeutet: die Broker-Seite hat das Abonnement beendet.
    pub async fn empfangen(&mut self) -> Option<Vec<u8>> {
        self.empfaenger.recv().await
    }

    /// Beendet die Weiterleitung und gibt das Abonnement frei
    pub fn beenden(&self) {
        self.weiterleitung.abort();
    }
}

impl Drop for BrokerAbo {
    fn drop(&mut self) {
        self.weiterleitung.abort();
    }
}
