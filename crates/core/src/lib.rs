//! palaver-core – Gemeinsame Typen, Events und Fehlertypen
//!
//! Dieses Crate stellt die fundamentalen Bausteine bereit, die von allen
//! anderen Palaver-Crates gemeinsam genutzt werden: ID-Newtypes, das
//! Broadcast-Envelope samt Event-Vokabular und der zentrale Fehlertyp.

pub mod error;
pub mod event;
pub mod types;

// Re-Exporte fuer bequemen Zugriff
pub use error::{PalaverError, Result};
pub use event::{Bereich, BusNachricht, EventTyp};
pub use types::{ChannelId, NodeId, ServerId, UserId};
