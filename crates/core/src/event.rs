//! Broadcast-Envelope und Event-Vokabular
//!
//! `BusNachricht` ist das Wire-Format, das zwischen den Palaver-Knoten
//! ueber den Broker laeuft. Jede Nachricht adressiert genau einen
//! `Bereich` (Kanal, Server, Benutzer oder Global); aus dem Bereich
//! leitet der Bus das Broker-Topic ab.
//!
//! Das Event-Vokabular ist bewusst offen: unbekannte Typ-Strings
//! ueberleben Deserialisierung und erneute Serialisierung verlustfrei,
//! damit Knoten mit unterschiedlichen Versionen gemischt laufen koennen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ChannelId, NodeId, ServerId, UserId};

// ---------------------------------------------------------------------------
// EventTyp
// ---------------------------------------------------------------------------

/// Typ eines Broadcast-Events
///
/// Auf dem Draht ein unbeschraenkter String (`message-create`,
/// `typing-start`, ...). Unbekannte Werte landen in `Unbekannt` statt
/// die Deserialisierung scheitern zu lassen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventTyp {
    MessageCreate,
    MessageUpdate,
    MessageDelete,
    TypingStart,
    PresenceUpdate,
    ReactionAdd,
    ReactionRemove,
    ChannelUpdate,
    ChannelDelete,
    MemberJoin,
    MemberLeave,
    ServerUpdate,
    /// Von diesem Knoten nicht gekannter Event-Typ (Versions-Skew)
    Unbekannt(String),
}

impl EventTyp {
    /// Gibt die Wire-Darstellung des Typs zurueck
    pub fn as_str(&self) -> &str {
        match self {
            Self::MessageCreate => "message-create",
            Self::MessageUpdate => "message-update",
            Self::MessageDelete => "message-delete",
            Self::TypingStart => "typing-start",
            Self::PresenceUpdate => "presence-update",
            Self::ReactionAdd => "reaction-add",
            Self::ReactionRemove => "reaction-remove",
            Self::ChannelUpdate => "channel-update",
            Self::ChannelDelete => "channel-delete",
            Self::MemberJoin => "member-join",
            Self::MemberLeave => "member-leave",
            Self::ServerUpdate => "server-update",
            Self::Unbekannt(s) => s,
        }
    }
}

impl From<String> for EventTyp {
    fn from(s: String) -> Self {
        match s.as_str() {
            "message-create" => Self::MessageCreate,
            "message-update" => Self::MessageUpdate,
            "message-delete" => Self::MessageDelete,
            "typing-start" => Self::TypingStart,
            "presence-update" => Self::PresenceUpdate,
            "reaction-add" => Self::ReactionAdd,
            "reaction-remove" => Self::ReactionRemove,
            "channel-update" => Self::ChannelUpdate,
            "channel-delete" => Self::ChannelDelete,
            "member-join" => Self::MemberJoin,
            "member-leave" => Self::MemberLeave,
            "server-update" => Self::ServerUpdate,
            _ => Self::Unbekannt(s),
        }
    }
}

impl From<EventTyp> for String {
    fn from(typ: EventTyp) -> Self {
        typ.as_str().to_string()
    }
}

impl std::fmt::Display for EventTyp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Bereich
// ---------------------------------------------------------------------------

/// Adressierungs-Bereich einer Bus-Nachricht
///
/// Genau ein Bereich pro Nachricht; die Aufloesung aus dem Envelope folgt
/// der Prioritaet Kanal > Server > Benutzer > Global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bereich {
    Kanal(ChannelId),
    Server(ServerId),
    Benutzer(UserId),
    Global,
}

impl Bereich {
    /// Leitet den Broker-Topic-Namen fuer diesen Bereich ab
    pub fn topic(&self, praefix: &str) -> String {
        match self {
            Self::Kanal(id) => format!("{praefix}channel:{}", id.inner()),
            Self::Server(id) => format!("{praefix}server:{}", id.inner()),
            Self::Benutzer(id) => format!("{praefix}user:{}", id.inner()),
            Self::Global => format!("{praefix}global"),
        }
    }
}

impl std::fmt::Display for Bereich {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Kanal(id) => write!(f, "{id}"),
            Self::Server(id) => write!(f, "{id}"),
            Self::Benutzer(id) => write!(f, "{id}"),
            Self::Global => f.write_str("global"),
        }
    }
}

// ---------------------------------------------------------------------------
// BusNachricht
// ---------------------------------------------------------------------------

/// Envelope einer Broadcast-Nachricht zwischen Palaver-Knoten
///
/// Die Feldnamen sind das Wire-Format (JSON). `data` bleibt fuer den Bus
/// opak; Konsumenten deserialisieren es anhand von `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusNachricht {
    /// Event-Typ, bestimmt die Interpretation von `data`
    #[serde(rename = "type")]
    pub typ: EventTyp,
    /// Kanal-Adressierung (hoechste Prioritaet)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Uuid>,
    /// Server-Adressierung
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_id: Option<Uuid>,
    /// Benutzer-Adressierung (niedrigste Prioritaet vor Global)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    /// Opake Nutzlast, je nach `type` zu deserialisieren
    pub data: serde_json::Value,
    /// Identitaet des sendenden Knotens (Selbst-Filterung)
    pub origin_node: NodeId,
    /// Sendezeitpunkt, vom Bus beim Veroeffentlichen gestempelt
    pub timestamp: DateTime<Utc>,
}

impl BusNachricht {
    /// Erstellt eine Nachricht fuer den gegebenen Bereich
    ///
    /// `origin_node` und `timestamp` werden vom Bus beim Veroeffentlichen
    /// ueberschrieben; bis dahin tragen sie Platzhalterwerte.
    pub fn neu(typ: EventTyp, bereich: Bereich, data: serde_json::Value) -> Self {
        let mut nachricht = Self {
            typ,
            channel_id: None,
            server_id: None,
            user_id: None,
            data,
            origin_node: NodeId::benannt(""),
            timestamp: Utc::now(),
        };
        match bereich {
            Bereich::Kanal(id) => nachricht.channel_id = Some(id.inner()),
            Bereich::Server(id) => nachricht.server_id = Some(id.inner()),
            Bereich::Benutzer(id) => nachricht.user_id = Some(id.inner()),
            Bereich::Global => {}
        }
        nachricht
    }

    /// Loest den Adressierungs-Bereich der Nachricht auf
    ///
    /// Genau ein Bereich zaehlt: Kanal vor Server vor Benutzer vor Global.
    /// Zusaetzlich gesetzte Felder werden ignoriert, nicht kombiniert.
    pub fn bereich(&self) -> Bereich {
        if let Some(id) = self.channel_id {
            Bereich::Kanal(ChannelId(id))
        } else if let Some(id) = self.server_id {
            Bereich::Server(ServerId(id))
        } else if let Some(id) = self.user_id {
            Bereich::Benutzer(UserId(id))
        } else {
            Bereich::Global
        }
    }
}
