//! Hash-Worker-Pool – begrenzte Nebenlaeufigkeit fuer teure Hashes
//!
//! Eine feste Worker-Anzahl zieht Auftraege aus einer gebundenen
//! Warteschlange. Ein Ansturm gleichzeitiger Login-Anfragen wird so zu
//! einer planbaren Pipeline statt CPU-Thrash: jenseits der Kapazitaet
//! scheitern Auftraege sofort mit `WarteschlangeVoll` (Backpressure),
//! statt unbegrenzt Ressourcen zu binden.
//!
//! ## Zeitlimit-Semantik
//! Das Pool-Zeitlimit begrenzt das Warten auf das Ergebnis. Laeuft es
//! ab, kehrt der Aufrufer mit `Zeitlimit` zurueck – der Worker rechnet
//! die nicht unterbrechbare Hash-Operation aber zu Ende und verwirft
//! das Ergebnis (sichtbar im `verworfene`-Zaehler).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::auftrag::{Auftrag, AuftragArt, AuftragErgebnis};
use crate::error::{PoolError, PoolResult};
use crate::hasher::{self, HashKosten};

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Minimale Passwortlaenge (Zeichen)
const PASSWORT_MIN_LAENGE: usize = 8;

/// Maximale Passwortlaenge (Zeichen), Schutz vor absichtlich teuren Eingaben
const PASSWORT_MAX_LAENGE: usize = 512;

/// Frist fuer das Ende der Worker beim Schliessen
const SCHLIESS_GNADENFRIST: Duration = Duration::from_secs(10);

/// Konfiguration des Hash-Worker-Pools
#[derive(Debug, Clone)]
pub struct PoolKonfiguration {
    /// Anzahl der Worker (0 = Anzahl der CPU-Kerne)
    pub worker_anzahl: usize,
    /// Warteschlangen-Kapazitaet als Vielfaches der Worker-Anzahl
    pub queue_faktor: usize,
    /// Zeitlimit pro Operation (Warten auf das Ergebnis)
    pub zeitlimit: Duration,
    /// Argon2id-Kostenparameter
    pub kosten: HashKosten,
}

impl Default for PoolKonfiguration {
    fn default() -> Self {
        Self {
            worker_anzahl: 0,
            queue_faktor: 4,
            zeitlimit: Duration::from_secs(30),
            kosten: HashKosten::default(),
        }
    }
}

impl PoolKonfiguration {
    /// Loest `worker_anzahl == 0` auf die Anzahl der CPU-Kerne auf
    fn effektive_worker(&self) -> usize {
        if self.worker_anzahl == 0 {
            num_cpus::get()
        } else {
            self.worker_anzahl
        }
    }
}

// ---------------------------------------------------------------------------
// Statistik
// ---------------------------------------------------------------------------

/// Momentaufnahme des Pool-Zustands, bei jedem Aufruf neu berechnet
#[derive(Debug, Clone)]
pub struct PoolStatistik {
    pub worker_anzahl: usize,
    pub warteschlangen_tiefe: usize,
    pub laufende_auftraege: u64,
    pub gehashte: u64,
    pub gepruefte: u64,
    pub zeitueberschreitungen: u64,
    pub verworfene: u64,
}

#[derive(Default)]
struct PoolZaehler {
    laufende: AtomicU64,
    gehashte: AtomicU64,
    gepruefte: AtomicU64,
    zeitueberschreitungen: AtomicU64,
    verworfene: AtomicU64,
}

// ---------------------------------------------------------------------------
// HashPool
// ---------------------------------------------------------------------------

/// Begrenzter Worker-Pool fuer Passwort-Hashing
///
/// Thread-safe via Arc; Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct HashPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    zeitlimit: Duration,
    worker_anzahl: usize,
    warteschlangen_kapazitaet: usize,
    /// None nach dem Schliessen; Worker enden, wenn der letzte Sender faellt
    auftrag_tx: parking_lot::Mutex<Option<mpsc::Sender<Auftrag>>>,
    worker: parking_lot::Mutex<Vec<JoinHandle<()>>>,
    zaehler: Arc<PoolZaehler>,
    geschlossen: AtomicBool,
}

impl HashPool {
    /// Startet den Pool mit fester Worker-Anzahl und gebundener Queue
    pub fn neu(konfiguration: PoolKonfiguration) -> Self {
        let worker_anzahl = konfiguration.effektive_worker();
        let kapazitaet = (worker_anzahl * konfiguration.queue_faktor).max(1);

        let (auftrag_tx, auftrag_rx) = mpsc::channel(kapazitaet);
        let auftrag_rx = Arc::new(Mutex::new(auftrag_rx));
        let zaehler = Arc::new(PoolZaehler::default());

        let mut worker = Vec::with_capacity(worker_anzahl);
        for worker_id in 0..worker_anzahl {
            worker.push(tokio::spawn(worker_schleife(
                worker_id,
                auftrag_rx.clone(),
                zaehler.clone(),
                konfiguration.kosten,
            )));
        }

        tracing::info!(
            worker = worker_anzahl,
            kapazitaet = kapazitaet,
            "Hash-Worker-Pool gestartet"
        );

        Self {
            inner: Arc::new(PoolInner {
                zeitlimit: konfiguration.zeitlimit,
                worker_anzahl,
                warteschlangen_kapazitaet: kapazitaet,
                auftrag_tx: parking_lot::Mutex::new(Some(auftrag_tx)),
                worker: parking_lot::Mutex::new(worker),
                zaehler,
                geschlossen: AtomicBool::new(false),
            }),
        }
    }

    /// Hasht ein Passwort ueber den Pool
    ///
    /// Validiert die Laengen-Grenzen vor der Warteschlange (fail fast)
    /// und blockiert dann bis zum Ergebnis oder bis zum Pool-Zeitlimit.
    /// Bricht der Aufrufer frueher ab (Future fallen lassen), rechnet
    /// der Worker unbeeindruckt zu Ende und verwirft das Ergebnis.
    pub async fn passwort_hashen(&self, passwort: &str) -> PoolResult<String> {
        passwort_validieren(passwort)?;
        match self
            .einreihen(AuftragArt::Hashen {
                passwort: passwort.to_string(),
            })
            .await?
        {
            AuftragErgebnis::Hash(hash) => Ok(hash),
            AuftragErgebnis::Verifiziert => {
                Err(PoolError::Intern("Hash-Auftrag ohne Hash-Ergebnis".into()))
            }
        }
    }

    /// Prueft ein Passwort gegen einen gespeicherten Hash
    ///
    /// Ein legitimer Nicht-Treffer ist `FalschesPasswort` – Aufrufer
    /// koennen "Passwort falsch" von "Pool ueberlastet" unterscheiden.
    pub async fn passwort_pruefen(&self, passwort: &str, hash: &str) -> PoolResult<()> {
        passwort_validieren(passwort)?;
        match self
            .einreihen(AuftragArt::Pruefen {
                passwort: passwort.to_string(),
                hash: hash.to_string(),
            })
            .await?
        {
            AuftragErgebnis::Verifiziert => Ok(()),
            AuftragErgebnis::Hash(_) => {
                Err(PoolError::Intern("Pruef-Auftrag mit Hash-Ergebnis".into()))
            }
        }
    }

    /// Reiht einen Auftrag ein und wartet auf sein Ergebnis
    async fn einreihen(&self, art: AuftragArt) -> PoolResult<AuftragErgebnis> {
        if self.inner.geschlossen.load(Ordering::Acquire) {
            return Err(PoolError::Geschlossen);
        }
        let sender = match self.inner.auftrag_tx.lock().as_ref() {
            Some(tx) => tx.clone(),
            None => return Err(PoolError::Geschlossen),
        };

        let (antwort_tx, antwort_rx) = oneshot::channel();
        sender
            .try_send(Auftrag {
                art,
                antwort: antwort_tx,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PoolError::WarteschlangeVoll,
                mpsc::error::TrySendError::Closed(_) => PoolError::Geschlossen,
            })?;
        // Sender sofort freigeben, damit Schliessen den Kanal leerlaufen laesst
        drop(sender);

        match timeout(self.inner.zeitlimit, antwort_rx).await {
            Ok(Ok(ergebnis)) => ergebnis,
            // Worker weg ohne Antwort: nur beim Herunterfahren moeglich
            Ok(Err(_)) => Err(PoolError::Geschlossen),
            Err(_) => {
                self.inner
                    .zaehler
                    .zeitueberschreitungen
                    .fetch_add(1, Ordering::Relaxed);
                Err(PoolError::Zeitlimit)
            }
        }
    }

    /// Momentaufnahme des Pool-Zustands
    pub fn statistik(&self) -> PoolStatistik {
        let warteschlangen_tiefe = self
            .inner
            .auftrag_tx
            .lock()
            .as_ref()
            .map(|tx| self.inner.warteschlangen_kapazitaet - tx.capacity())
            .unwrap_or(0);

        let zaehler = &self.inner.zaehler;
        PoolStatistik {
            worker_anzahl: self.inner.worker_anzahl,
            warteschlangen_tiefe,
            laufende_auftraege: zaehler.laufende.load(Ordering::SeqCst),
            gehashte: zaehler.gehashte.load(Ordering::Relaxed),
            gepruefte: zaehler.gepruefte.load(Ordering::Relaxed),
            zeitueberschreitungen: zaehler.zeitueberschreitungen.load(Ordering::Relaxed),
            verworfene: zaehler.verworfene.load(Ordering::Relaxed),
        }
    }

    /// Faehrt den Pool herunter
    ///
    /// Neue Auftraege scheitern sofort mit `Geschlossen`; bereits
    /// angenommene laufen zu Ende. Worker, die die Gnadenfrist
    /// ueberziehen, werden geloggt und nicht weiter erwartet.
    pub async fn schliessen(&self) -> PoolResult<()> {
        if self.inner.geschlossen.swap(true, Ordering::AcqRel) {
            return Ok(()); // bereits geschlossen
        }

        // Letzter Sender faellt: der Kanal laeuft leer und die Worker enden
        self.inner.auftrag_tx.lock().take();

        let handles: Vec<_> = { self.inner.worker.lock().drain(..).collect() };
        if timeout(
            SCHLIESS_GNADENFRIST,
            futures_util::future::join_all(handles),
        )
        .await
        .is_err()
        {
            tracing::warn!("Worker nicht innerhalb der Gnadenfrist beendet, fahre fort");
        }

        tracing::info!("Hash-Worker-Pool geschlossen");
        Ok(())
    }
}

/// Validiert ein Passwort vor dem Einreihen (fail fast)
fn passwort_validieren(passwort: &str) -> PoolResult<()> {
    if passwort.is_empty() {
        return Err(PoolError::PasswortLeer);
    }
    let laenge = passwort.chars().count();
    if laenge < PASSWORT_MIN_LAENGE {
        return Err(PoolError::PasswortZuKurz {
            minimum: PASSWORT_MIN_LAENGE,
        });
    }
    if laenge > PASSWORT_MAX_LAENGE {
        return Err(PoolError::PasswortZuLang {
            maximum: PASSWORT_MAX_LAENGE,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

/// Zieht Auftraege aus der geteilten Warteschlange, bis sie leerlaeuft
///
/// Die eigentliche Berechnung laeuft via spawn_blocking, damit die
/// Async-Threads frei bleiben; pro Worker rechnet hoechstens ein
/// Auftrag gleichzeitig.
async fn worker_schleife(
    worker_id: usize,
    warteschlange: Arc<Mutex<mpsc::Receiver<Auftrag>>>,
    zaehler: Arc<PoolZaehler>,
    kosten: HashKosten,
) {
    loop {
        let auftrag = { warteschlange.lock().await.recv().await };
        let Some(Auftrag { art, antwort }) = auftrag else {
            break;
        };

        zaehler.laufende.fetch_add(1, Ordering::SeqCst);
        let ergebnis = match tokio::task::spawn_blocking(move || ausfuehren(art, &kosten)).await {
            Ok(ergebnis) => ergebnis,
            Err(e) => Err(PoolError::Intern(format!("Hash-Task abgestuerzt: {e}"))),
        };
        zaehler.laufende.fetch_sub(1, Ordering::SeqCst);

        match &ergebnis {
            Ok(AuftragErgebnis::Hash(_)) => {
                zaehler.gehashte.fetch_add(1, Ordering::Relaxed);
            }
            Ok(AuftragErgebnis::Verifiziert) | Err(PoolError::FalschesPasswort) => {
                zaehler.gepruefte.fetch_add(1, Ordering::Relaxed);
            }
            Err(_) => {}
        }

        if antwort.send(ergebnis).is_err() {
            // Aufrufer wartet nicht mehr (Zeitlimit oder Abbruch)
            zaehler.verworfene.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(worker = worker_id, "Ergebnis verworfen, Aufrufer weg");
        }
    }
    tracing::debug!(worker = worker_id, "Worker beendet");
}

/// Fuehrt die CPU-Arbeit eines Auftrags aus (blockierend)
fn ausfuehren(art: AuftragArt, kosten: &HashKosten) -> PoolResult<AuftragErgebnis> {
    match art {
        AuftragArt::Hashen { passwort } => {
            hasher::passwort_hashen(&passwort, kosten).map(AuftragErgebnis::Hash)
        }
        AuftragArt::Pruefen { passwort, hash } => {
            hasher::passwort_verifizieren(&passwort, &hash, kosten)
                .map(|_| AuftragErgebnis::Verifiziert)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
