//! Bus-Szenarien ueber einem geteilten SpeicherBroker
//!
//! Zwei Bus-Instanzen am selben Broker verhalten sich wie zwei Knoten
//! am selben Redis – damit lassen sich Selbst-Filterung, Idempotenz und
//! Shutdown ohne externen Dienst pruefen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use palaver_core::{Bereich, BusNachricht, ChannelId, EventTyp, NodeId, ServerId};

use crate::broker::SpeicherBroker;
use crate::bus::{BroadcastBus, BusKonfiguration};
use crate::error::BusError;

fn konfiguration(name: &str) -> BusKonfiguration {
    BusKonfiguration {
        node_id: Some(NodeId::benannt(name)),
        topic_praefix: "test:".into(),
    }
}

async fn bus_paar() -> (BroadcastBus, BroadcastBus) {
    let broker = SpeicherBroker::neu();
    let a = BroadcastBus::neu(Arc::new(broker.clone()), konfiguration("node-a"))
        .await
        .expect("Bus a muss starten");
    let b = BroadcastBus::neu(Arc::new(broker), konfiguration("node-b"))
        .await
        .expect("Bus b muss starten");
    (a, b)
}

fn message_create(kanal: ChannelId) -> BusNachricht {
    BusNachricht::neu(
        EventTyp::MessageCreate,
        Bereich::Kanal(kanal),
        serde_json::json!({"text": "hallo"}),
    )
}

/// Haengt einen Handler an, der alle Nachrichten in einen Kanal kippt
fn nachrichten_sammeln(bus: &BroadcastBus) -> mpsc::UnboundedReceiver<BusNachricht> {
    let (tx, rx) = mpsc::unbounded_channel();
    bus.bei_nachricht(move |nachricht| {
        let _ = tx.send(nachricht);
    });
    rx
}

#[tokio::test]
async fn fremde_nachricht_kommt_an_eigene_nicht() {
    let (a, b) = bus_paar().await;
    let kanal = ChannelId::new();
    a.abonnieren(Bereich::Kanal(kanal)).await.unwrap();
    b.abonnieren(Bereich::Kanal(kanal)).await.unwrap();

    let mut bei_a = nachrichten_sammeln(&a);
    let mut bei_b = nachrichten_sammeln(&b);

    a.veroeffentlichen(message_create(kanal)).await.unwrap();

    let empfangen = timeout(Duration::from_secs(1), bei_b.recv())
        .await
        .expect("node-b muss die Nachricht erhalten")
        .unwrap();
    assert_eq!(empfangen.typ, EventTyp::MessageCreate);
    assert_eq!(empfangen.bereich(), Bereich::Kanal(kanal));
    assert_eq!(empfangen.origin_node, NodeId::benannt("node-a"));

    // node-a darf das eigene Event nicht durch den Fanout-Pfad sehen
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(bei_a.try_recv().is_err(), "Selbst-Filterung verletzt");
}

#[tokio::test]
async fn doppeltes_abonnement_bleibt_ein_listener() {
    let (a, b) = bus_paar().await;
    let kanal = ChannelId::new();

    b.abonnieren(Bereich::Kanal(kanal)).await.unwrap();
    b.abonnieren(Bereich::Kanal(kanal)).await.unwrap();
    b.abonnieren(Bereich::Kanal(kanal)).await.unwrap();

    let statistik = b.statistik().await;
    assert_eq!(statistik.aktive_abos, 1, "genau ein Registry-Eintrag");

    // Ein Listener heisst: genau eine Zustellung pro Nachricht
    let mut bei_b = nachrichten_sammeln(&b);
    a.veroeffentlichen(message_create(kanal)).await.unwrap();

    timeout(Duration::from_secs(1), bei_b.recv())
        .await
        .expect("erste Zustellung")
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        bei_b.try_recv().is_err(),
        "doppelter Listener wuerde doppelt zustellen"
    );
}

#[tokio::test]
async fn abbestellen_stoppt_zustellung_und_erneut_abonnieren_setzt_fort() {
    let (a, b) = bus_paar().await;
    let kanal = ChannelId::new();
    b.abonnieren(Bereich::Kanal(kanal)).await.unwrap();
    let mut bei_b = nachrichten_sammeln(&b);

    a.veroeffentlichen(message_create(kanal)).await.unwrap();
    timeout(Duration::from_secs(1), bei_b.recv())
        .await
        .expect("Zustellung vor dem Abbestellen")
        .unwrap();

    b.abbestellen(Bereich::Kanal(kanal)).await.unwrap();
    assert_eq!(b.statistik().await.aktive_abos, 0);

    a.veroeffentlichen(message_create(kanal)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(
        bei_b.try_recv().is_err(),
        "nach Abbestellen keine Zustellung"
    );

    b.abonnieren(Bereich::Kanal(kanal)).await.unwrap();
    a.veroeffentlichen(message_create(kanal)).await.unwrap();
    timeout(Duration::from_secs(1), bei_b.recv())
        .await
        .expect("Zustellung nach erneutem Abonnieren")
        .unwrap();
}

#[tokio::test]
async fn abbestellen_ohne_abonnement_ist_noop() {
    let (_, b) = bus_paar().await;
    b.abbestellen(Bereich::Server(ServerId::new())).await.unwrap();
}

#[tokio::test]
async fn schliessen_beendet_alle_listener_und_weist_arbeit_ab() {
    let (a, _) = bus_paar().await;
    a.abonnieren(Bereich::Kanal(ChannelId::new())).await.unwrap();
    a.abonnieren(Bereich::Server(ServerId::new())).await.unwrap();
    a.abonnieren(Bereich::Global).await.unwrap();
    assert_eq!(a.statistik().await.aktive_abos, 3);

    a.schliessen().await.expect("Close innerhalb der Gnadenfrist");

    assert_eq!(a.statistik().await.aktive_abos, 0);
    assert!(matches!(
        a.veroeffentlichen(message_create(ChannelId::new())).await,
        Err(BusError::Geschlossen)
    ));
    assert!(matches!(
        a.abonnieren(Bereich::Global).await,
        Err(BusError::Geschlossen)
    ));

    // Doppeltes Schliessen bleibt fehlerfrei
    a.schliessen().await.unwrap();
}

#[tokio::test]
async fn nebenlaeufige_veroeffentlichungen_gehen_nicht_verloren() {
    let (a, b) = bus_paar().await;
    let kanal = ChannelId::new();
    b.abonnieren(Bereich::Kanal(kanal)).await.unwrap();

    let zaehler = Arc::new(AtomicUsize::new(0));
    {
        let zaehler = zaehler.clone();
        b.bei_nachricht(move |_| {
            zaehler.fetch_add(1, Ordering::SeqCst);
        });
    }

    const ANZAHL: usize = 25;
    let mut sender = Vec::new();
    for _ in 0..ANZAHL {
        let a = a.clone();
        sender.push(tokio::spawn(async move {
            a.veroeffentlichen(message_create(kanal)).await
        }));
    }
    for task in sender {
        task.await.unwrap().expect("jede Veroeffentlichung angenommen");
    }

    // Zustellung ist asynchron: bis zum Zeitlimit auf den Zielstand warten
    let frist = tokio::time::Instant::now() + Duration::from_secs(2);
    while zaehler.load(Ordering::SeqCst) < ANZAHL {
        assert!(
            tokio::time::Instant::now() < frist,
            "nur {}/{ANZAHL} Nachrichten zugestellt",
            zaehler.load(Ordering::SeqCst)
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(zaehler.load(Ordering::SeqCst), ANZAHL);
}

#[tokio::test]
async fn mehrere_handler_feuern_in_registrierungs_reihenfolge() {
    let (a, b) = bus_paar().await;
    let kanal = ChannelId::new();
    b.abonnieren(Bereich::Kanal(kanal)).await.unwrap();

    let reihenfolge = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let (tx, mut fertig) = mpsc::unbounded_channel();
    for index in 0..3 {
        let reihenfolge = reihenfolge.clone();
        let tx = tx.clone();
        b.bei_nachricht(move |_| {
            reihenfolge.lock().push(index);
            let _ = tx.send(());
        });
    }

    a.veroeffentlichen(message_create(kanal)).await.unwrap();

    for _ in 0..3 {
        timeout(Duration::from_secs(1), fertig.recv())
            .await
            .expect("alle Handler muessen feuern")
            .unwrap();
    }
    assert_eq!(*reihenfolge.lock(), vec![0, 1, 2]);
}

#[tokio::test]
async fn globaler_bereich_erreicht_alle_knoten() {
    let (a, b) = bus_paar().await;
    a.abonnieren(Bereich::Global).await.unwrap();
    b.abonnieren(Bereich::Global).await.unwrap();

    let mut bei_a = nachrichten_sammeln(&a);
    let mut bei_b = nachrichten_sammeln(&b);

    let event = BusNachricht::neu(
        EventTyp::ServerUpdate,
        Bereich::Global,
        serde_json::json!({"name": "Palaver"}),
    );
    b.veroeffentlichen(event).await.unwrap();

    let empfangen = timeout(Duration::from_secs(1), bei_a.recv())
        .await
        .expect("node-a muss das Global-Event erhalten")
        .unwrap();
    assert_eq!(empfangen.typ, EventTyp::ServerUpdate);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(bei_b.try_recv().is_err(), "Absender filtert sich selbst");
}

#[tokio::test]
async fn unbekannter_event_typ_wird_zugestellt() {
    // Versions-Skew: ein neuerer Knoten sendet einen hier unbekannten Typ
    let (a, b) = bus_paar().await;
    let kanal = ChannelId::new();
    b.abonnieren(Bereich::Kanal(kanal)).await.unwrap();
    let mut bei_b = nachrichten_sammeln(&b);

    let event = BusNachricht::neu(
        EventTyp::Unbekannt("voice-state-update".into()),
        Bereich::Kanal(kanal),
        serde_json::json!({"muted": true}),
    );
    a.veroeffentlichen(event).await.unwrap();

    let empfangen = timeout(Duration::from_secs(1), bei_b.recv())
        .await
        .expect("unbekannte Typen duerfen nicht verloren gehen")
        .unwrap();
    assert_eq!(empfangen.typ.as_str(), "voice-state-update");
}

#[tokio::test]
async fn statistik_nennt_topics() {
    let (a, _) = bus_paar().await;
    let kanal = ChannelId::new();
    a.abonnieren(Bereich::Kanal(kanal)).await.unwrap();
    a.abonnieren(Bereich::Global).await.unwrap();

    let statistik = a.statistik().await;
    assert_eq!(statistik.node_id, NodeId::benannt("node-a"));
    assert_eq!(statistik.aktive_abos, 2);
    assert!(statistik.themen.contains(&"test:global".to_string()));
    assert!(statistik
        .themen
        .contains(&format!("test:channel:{}", kanal.inner())));
}
