//! Append-only event shape (spec §4.7 "Event shape: `(seq, timestamp,
//! kind, entityId, payload)`").
//!
//! No teacher equivalent — grounded conceptually in `main.rs`'s reference
//! to "Persistence uses event sourcing via PersistenceService -> SQLite",
//! and in idiom on the channel-plus-typed-payload shape from
//! `seanchatmangpt-knhk/rust/knhk-workflow-engine/src/events.rs`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    CalendarUpdated,
    TradePartnerCreated,
    TradePartnerUpdated,
    TradePartnerDeleted,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::TaskCreated => "TASK_CREATED",
            EventKind::TaskUpdated => "TASK_UPDATED",
            EventKind::TaskDeleted => "TASK_DELETED",
            EventKind::CalendarUpdated => "CALENDAR_UPDATED",
            EventKind::TradePartnerCreated => "TRADE_PARTNER_CREATED",
            EventKind::TradePartnerUpdated => "TRADE_PARTNER_UPDATED",
            EventKind::TradePartnerDeleted => "TRADE_PARTNER_DELETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "TASK_CREATED" => EventKind::TaskCreated,
            "TASK_UPDATED" => EventKind::TaskUpdated,
            "TASK_DELETED" => EventKind::TaskDeleted,
            "CALENDAR_UPDATED" => EventKind::CalendarUpdated,
            "TRADE_PARTNER_CREATED" => EventKind::TradePartnerCreated,
            "TRADE_PARTNER_UPDATED" => EventKind::TradePartnerUpdated,
            "TRADE_PARTNER_DELETED" => EventKind::TradePartnerDeleted,
            _ => return None,
        })
    }
}

/// One recorded mutation, the unit of the append-only log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub seq: i64,
    pub ts: DateTime<Utc>,
    pub kind: EventKind,
    pub entity_id: String,
    pub payload: Value,
}
