//! palaver-bus – Broker-gestuetzter Broadcast-Bus
//!
//! Macht aus horizontal skalierten Palaver-Knoten einen logischen Hub:
//! Events, die ein Knoten veroeffentlicht, erreichen ueber den Broker
//! die Listener aller anderen Knoten. Die eigene Instanz filtert ihre
//! Nachrichten heraus, lokale Effekte wendet die Service-Schicht vorher
//! selbst an.
//!
//! # Beispiel
//!
//! ```no_run
//! use std::sync::Arc;
//! use palaver_bus::{BroadcastBus, BusKonfiguration, SpeicherBroker};
//! use palaver_core::{Bereich, BusNachricht, ChannelId, EventTyp};
//!
//! #[tokio::main]
//! async fn main() {
//!     let broker = Arc::new(SpeicherBroker::neu());
//!     let bus = BroadcastBus::neu(broker, BusKonfiguration::default())
//!         .await
//!         .unwrap();
//!
//!     let kanal = ChannelId::new();
//!     bus.abonnieren(Bereich::Kanal(kanal)).await.unwrap();
//!     bus.bei_nachricht(|nachricht| println!("{}", nachricht.typ));
//!
//!     let event = BusNachricht::neu(
//!         EventTyp::MessageCreate,
//!         Bereich::Kanal(kanal),
//!         serde_json::json!({"text": "hallo"}),
//!     );
//!     bus.veroeffentlichen(event).await.unwrap();
//! }
//! ```

pub mod broker;
pub mod bus;
pub mod error;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use broker::{Broker, BrokerAbo, RedisBroker, SpeicherBroker};
pub use bus::{BroadcastBus, BusKonfiguration, BusStatistik, NachrichtenHandler};
pub use error::{BusError, BusResult};
