//! Broadcast-Bus – Cluster-weiter Event-Fanout ueber einen Broker
//!
//! Jeder Palaver-Knoten betreibt genau einen Bus. Veroeffentlichte
//! Events gehen an den Broker; pro abonniertem Topic lauscht genau eine
//! Listener-Task, filtert eigene Nachrichten heraus und verteilt den
//! Rest an die registrierten Handler.
//!
//! ## Garantien
//! - Ein Broker-Abonnement pro Topic, egal wie oft abonniert wird
//! - Eigene Nachrichten erreichen nie die lokalen Handler
//! - Handler feuern in Registrierungs-Reihenfolge, ausserhalb der Locks

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use palaver_core::{Bereich, BusNachricht, NodeId};

use crate::broker::{Broker, BrokerAbo};
use crate::error::{BusError, BusResult};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Frist fuer das Beenden der Listener-Tasks bei Close und Abbestellen
const SCHLIESS_GNADENFRIST: Duration = Duration::from_secs(5);

/// Frist fuer den Erreichbarkeits-Ping beim Konstruieren
const PING_ZEITLIMIT: Duration = Duration::from_secs(3);

/// Konfiguration des Broadcast-Busses
#[derive(Debug, Clone)]
pub struct BusKonfiguration {
    /// Identitaet dieses Knotens (None = zufaellig generiert)
    pub node_id: Option<NodeId>,
    /// Praefix aller Topic-Namen, trennt Deployments auf geteilten Brokern
    pub topic_praefix: String,
}

impl Default for BusKonfiguration {
    fn default() -> Self {
        Self {
            node_id: None,
            topic_praefix: "palaver:".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// Callback fuer empfangene Fremd-Nachrichten
pub type NachrichtenHandler = dyn Fn(BusNachricht) + Send + Sync;

/// Handler-Registry mit eigenem Lock
///
/// Der Dispatch nimmt den Read-Lock nur fuer den Snapshot; die Handler
/// selbst laufen ausserhalb, damit ein langsamer Handler weder neue
/// Registrierungen noch die Zustellung anderer Topics blockiert.
#[derive(Default)]
struct HandlerListe {
    liste: parking_lot::RwLock<Vec<Arc<NachrichtenHandler>>>,
}

impl HandlerListe {
    fn registrieren(&self, handler: Arc<NachrichtenHandler>) {
        self.liste.write().push(handler);
    }

    fn verteilen(&self, nachricht: &BusNachricht) {
        let snapshot: Vec<_> = self.liste.read().iter().cloned().collect();
        for handler in snapshot {
            handler(nachricht.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

/// Momentaufnahme des Bus-Zustands, bei jedem Aufruf neu berechnet
#[derive(Debug, Clone)]
pub struct BusStatistik {
    pub node_id: NodeId,
    pub aktive_abos: usize,
    pub themen: Vec<String>,
}

// ---------------------------------------------------------------------------
// BroadcastBus
// ---------------------------------------------------------------------------

/// Eintrag der Abonnement-Registry: Listener-Task samt Abbruch-Token
struct AboEintrag {
    abbruch: CancellationToken,
    listener: JoinHandle<()>,
}

/// Cluster-weiter Broadcast-Bus
///
/// Thread-safe via Arc; Clone teilt den inneren Zustand. Mehrere
/// unabhaengige Bus-Instanzen in einem Prozess stoeren sich nicht –
/// jede traegt ihre eigene Registry.
#[derive(Clone)]
pub struct BroadcastBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    node_id: NodeId,
    topic_praefix: String,
    broker: Arc<dyn Broker>,
    /// Topic -> laufender Listener; Write-Lock nur fuer An-/Abmelden
    abos: RwLock<HashMap<String, AboEintrag>>,
    handler: Arc<HandlerListe>,
    geschlossen: AtomicBool,
}

impl BroadcastBus {
    /// Erstellt einen neuen Bus ueber dem gegebenen Broker
    ///
    /// Prueft die Broker-Erreichbarkeit mit gebundenem Zeitlimit und
    /// schlaegt sofort fehl statt erst beim ersten Veroeffentlichen.
    pub async fn neu(broker: Arc<dyn Broker>, konfiguration: BusKonfiguration) -> BusResult<Self> {
        timeout(PING_ZEITLIMIT, broker.ping())
            .await
            .map_err(|_| BusError::Zeitlimit("Broker-Ping beim Start".into()))??;

        let node_id = konfiguration.node_id.unwrap_or_else(NodeId::generieren);
        tracing::info!(node_id = %node_id, "Broadcast-Bus bereit");

        Ok(Self {
            inner: Arc::new(BusInner {
                node_id,
                topic_praefix: konfiguration.topic_praefix,
                broker,
                abos: RwLock::new(HashMap::new()),
                handler: Arc::new(HandlerListe::default()),
                geschlossen: AtomicBool::new(false),
            }),
        })
    }

    /// Gibt die Identitaet dieses Knotens zurueck
    pub fn node_id(&self) -> &NodeId {
        &self.inner.node_id
    }

    /// Veroeffentlicht ein Event an alle Knoten des adressierten Bereichs
    ///
    /// Stempelt Absender und Zeitpunkt, loest das Topic per
    /// Bereichs-Prioritaet auf und wartet, bis der Broker die Nachricht
    /// angenommen hat. Fehler gehen unveraendert an den Aufrufer zurueck;
    /// der Bus wiederholt nichts. Lokale Handler werden fuer eigene
    /// Events nie aufgerufen – lokale Effekte sind Sache der
    /// Service-Schicht.
    pub async fn veroeffentlichen(&self, mut nachricht: BusNachricht) -> BusResult<()> {
        if self.inner.geschlossen.load(Ordering::Acquire) {
            return Err(BusError::Geschlossen);
        }
        nachricht.origin_node = self.inner.node_id.clone();
        nachricht.timestamp = Utc::now();

        let topic = nachricht.bereich().topic(&self.inner.topic_praefix);
        let nutzlast = serde_json::to_vec(&nachricht)?;

        self.inner.broker.veroeffentlichen(&topic, nutzlast).await?;
        tracing::trace!(topic = %topic, typ = %nachricht.typ, "Event veroeffentlicht");
        Ok(())
    }

    /// Abonniert den gegebenen Bereich
    ///
    /// Idempotent: der erste Aufruf pro Topic oeffnet ein
    /// Broker-Abonnement und startet genau eine Listener-Task, jeder
    /// weitere ist ein No-Op.
    pub async fn abonnieren(&self, bereich: Bereich) -> BusResult<()> {
        if self.inner.geschlossen.load(Ordering::Acquire) {
            return Err(BusError::Geschlossen);
        }
        let topic = bereich.topic(&self.inner.topic_praefix);

        {
            let abos = self.inner.abos.read().await;
            if abos.contains_key(&topic) {
                return Ok(());
            }
        }

        // Broker-Abonnement ausserhalb des Locks oeffnen
        let abo = self.inner.broker.abonnieren(&topic).await?;

        let mut abos = self.inner.abos.write().await;
        if abos.contains_key(&topic) {
            // Wettlauf verloren: ein paralleler Aufruf war schneller
            abo.beenden();
            return Ok(());
        }

        let abbruch = CancellationToken::new();
        let listener = tokio::spawn(listener_schleife(
            topic.clone(),
            abo,
            self.inner.node_id.clone(),
            self.inner.handler.clone(),
            abbruch.clone(),
        ));
        abos.insert(topic.clone(), AboEintrag { abbruch, listener });
        tracing::debug!(topic = %topic, "Topic abonniert");
        Ok(())
    }

    /// Bestellt den gegebenen Bereich ab; No-Op wenn nicht abonniert
    pub async fn abbestellen(&self, bereich: Bereich) -> BusResult<()> {
        let topic = bereich.topic(&self.inner.topic_praefix);
        let eintrag = { self.inner.abos.write().await.remove(&topic) };
        if let Some(eintrag) = eintrag {
            eintrag.abbruch.cancel();
            if timeout(SCHLIESS_GNADENFRIST, eintrag.listener).await.is_err() {
                tracing::warn!(topic = %topic, "Listener beendet sich nicht rechtzeitig");
            }
            tracing::debug!(topic = %topic, "Topic abbestellt");
        }
        Ok(())
    }

    /// Registriert einen Handler fuer empfangene Fremd-Nachrichten
    ///
    /// Alle registrierten Handler feuern pro Nachricht in
    /// Registrierungs-Reihenfolge; die Reihenfolge ueber verschiedene
    /// Topics hinweg ist unbestimmt.
    pub fn bei_nachricht<F>(&self, handler: F)
    where
        F: Fn(BusNachricht) + Send + Sync + 'static,
    {
        self.inner.handler.registrieren(Arc::new(handler));
    }

    /// Momentaufnahme: Knoten-Identitaet und aktive Abonnements
    pub async fn statistik(&self) -> BusStatistik {
        let abos = self.inner.abos.read().await;
        BusStatistik {
            node_id: self.inner.node_id.clone(),
            aktive_abos: abos.len(),
            themen: abos.keys().cloned().collect(),
        }
    }

    /// Faehrt den Bus herunter
    ///
    /// Bricht alle Listener ab, wartet bis zur Gnadenfrist auf ihr Ende
    /// (laengeres Haengen wird geloggt, nicht fatal) und schliesst dann
    /// den Broker. Danach weist der Bus jede neue Arbeit sofort ab.
    pub async fn schliessen(&self) -> BusResult<()> {
        if self.inner.geschlossen.swap(true, Ordering::AcqRel) {
            return Ok(()); // bereits geschlossen
        }

        let eintraege: Vec<AboEintrag> = {
            let mut abos = self.inner.abos.write().await;
            abos.drain().map(|(_, eintrag)| eintrag).collect()
        };

        for eintrag in &eintraege {
            eintrag.abbruch.cancel();
        }

        let listener = eintraege.into_iter().map(|eintrag| eintrag.listener);
        if timeout(
            SCHLIESS_GNADENFRIST,
            futures_util::future::join_all(listener),
        )
        .await
        .is_err()
        {
            tracing::warn!("Nicht alle Listener innerhalb der Gnadenfrist beendet, fahre fort");
        }

        self.inner.broker.schliessen().await?;
        tracing::info!(node_id = %self.inner.node_id, "Broadcast-Bus geschlossen");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Lauscht auf einem Topic bis zum Abbruch oder Ende des Abonnements
///
/// Eigene Nachrichten (origin_node == node_id) werden vor den Handlern
/// verworfen. Unlesbare Nutzlasten werden geloggt und uebersprungen,
/// beenden aber den Listener nicht.
async fn listener_schleife(
    topic: String,
    mut abo: BrokerAbo,
    node_id: NodeId,
    handler: Arc<HandlerListe>,
    abbruch: CancellationToken,
) {
    loop {
        let roh = tokio::select! {
            _ = abbruch.cancelled() => break,
            roh = abo.empfangen() => roh,
        };
        let Some(roh) = roh else {
            tracing::warn!(topic = %topic, "Broker-Abonnement beendet, Listener stoppt");
            break;
        };

        match serde_json::from_slice::<BusNachricht>(&roh) {
            Ok(nachricht) => {
                if nachricht.origin_node == node_id {
                    // Selbst-Filterung: eigene Events kommen nicht erneut
                    // durch den Fanout-Pfad
                    continue;
                }
                handler.verteilen(&nachricht);
            }
            Err(e) => {
                tracing::warn!(topic = %topic, fehler = %e, "Unlesbare Bus-Nachricht verworfen");
            }
        }
    }
    abo.beenden();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_liste_feuert_in_reihenfolge() {
        let liste = HandlerListe::default();
        let reihenfolge = Arc::new(parking_lot::Mutex::new(Vec::new()));

        for index in 0..3 {
            let reihenfolge = reihenfolge.clone();
            liste.registrieren(Arc::new(move |_| reihenfolge.lock().push(index)));
        }

        let nachricht = BusNachricht::neu(
            palaver_core::EventTyp::TypingStart,
            Bereich::Global,
            serde_json::Value::Null,
        );
        liste.verteilen(&nachricht);

        assert_eq!(*reihenfolge.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn konfiguration_standardwerte() {
        let konfiguration = BusKonfiguration::default();
        assert!(konfiguration.node_id.is_none());
        assert_eq!(konfiguration.topic_praefix, "palaver:");
    }
}
