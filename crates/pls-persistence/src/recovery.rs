//! Startup recovery (spec §4.7 "Recovery"): load the latest snapshot, then
//! replay events with `seq > snapshot.lastAppliedSeq` in order. Replay is
//! idempotent for `*_UPDATED` and tolerant of missing prior state for
//! `*_DELETED`.

use pls_core::{Calendar, Task};
use serde_json::Value;

use crate::error::Result;
use crate::event::{Event, EventKind};
use crate::payload::{calendar_from_payload, task_from_payload};
use crate::store::PersistenceService;

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredState {
    pub tasks: Vec<Task>,
    pub calendar: Calendar,
    pub trade_partners: Vec<Value>,
}

pub fn recover(service: &PersistenceService) -> Result<RecoveredState> {
    let snapshot = service.latest_snapshot()?;
    let (mut tasks, mut calendar, mut trade_partners, last_applied_seq) = match snapshot {
        Some(s) => (s.tasks, s.calendar, s.trade_partners, s.last_applied_seq),
        None => (Vec::new(), Calendar::default(), Vec::new(), 0),
    };

    let events = service.events_after(last_applied_seq)?;
    for event in events {
        apply_event(&mut tasks, &mut calendar, &mut trade_partners, &event)?;
    }

    Ok(RecoveredState { tasks, calendar, trade_partners })
}

fn apply_event(
    tasks: &mut Vec<Task>,
    calendar: &mut Calendar,
    trade_partners: &mut Vec<Value>,
    event: &Event,
) -> Result<()> {
    match event.kind {
        EventKind::TaskCreated | EventKind::TaskUpdated => {
            let task = task_from_payload(&event.payload)?;
            match tasks.iter_mut().find(|t| t.id == task.id) {
                Some(existing) => *existing = task,
                None => tasks.push(task),
            }
        }
        EventKind::TaskDeleted => {
            tasks.retain(|t| t.id != event.entity_id);
        }
        EventKind::CalendarUpdated => {
            *calendar = calendar_from_payload(&event.payload)?;
        }
        EventKind::TradePartnerCreated | EventKind::TradePartnerUpdated => {
            let id_matches = |v: &Value| v.get("id").and_then(Value::as_str) == Some(event.entity_id.as_str());
            match trade_partners.iter_mut().find(|v| id_matches(v)) {
                Some(existing) => *existing = event.payload.clone(),
                None => trade_partners.push(event.payload.clone()),
            }
        }
        EventKind::TradePartnerDeleted => {
            trade_partners.retain(|v| v.get("id").and_then(Value::as_str) != Some(event.entity_id.as_str()));
        }
    }
    Ok(())
}
