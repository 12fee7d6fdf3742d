//! palaver-hashpool – Begrenzter Worker-Pool fuer Passwort-Hashing
//!
//! Argon2id ist absichtlich teuer. Ohne Begrenzung wird ein Schub
//! gleichzeitiger Logins zum CPU-Denial-of-Service; dieser Pool macht
//! daraus eine gebundene Warteschlange mit fester Worker-Anzahl und
//! planbarer Latenz.
//!
//! # Beispiel
//!
//! ```no_run
//! use palaver_hashpool::{HashPool, PoolKonfiguration};
//!
//! #[tokio::main]
//! async fn main() {
//!     let pool = HashPool::neu(PoolKonfiguration::default());
//!
//!     let hash = pool.passwort_hashen("sicheres_passwort!").await.unwrap();
//!     pool.passwort_pruefen("sicheres_passwort!", &hash).await.unwrap();
//!
//!     pool.schliessen().await.unwrap();
//! }
//! ```

pub mod auftrag;
pub mod error;
pub mod hasher;
pub mod pool;

// Bequeme Re-Exporte
pub use error::{PoolError, PoolResult};
pub use hasher::HashKosten;
pub use pool::{HashPool, PoolKonfiguration, PoolStatistik};
