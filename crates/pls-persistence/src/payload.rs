//! camelCase (in-memory wire shape, §3) <-> snake_case (persisted payload
//! shape, §6 "`payload_json` for `TASK_*` uses the Task shape in §3 with
//! snake_case field names mapped from the in-memory camelCase") key
//! conversion for event payloads.

use serde_json::{Map, Value};

use crate::error::Result;
use pls_core::{Calendar, Task};

fn camel_to_snake(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            out.push('_');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

fn snake_to_camel(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut upper_next = false;
    for c in s.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn transform_keys(value: &Value, f: impl Fn(&str) -> String + Copy) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(f(k), transform_keys(v, f));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| transform_keys(v, f)).collect()),
        other => other.clone(),
    }
}

pub fn task_to_payload(task: &Task) -> Result<Value> {
    let value = serde_json::to_value(task)?;
    Ok(transform_keys(&value, camel_to_snake))
}

pub fn task_from_payload(payload: &Value) -> Result<Task> {
    let camel = transform_keys(payload, snake_to_camel);
    Ok(serde_json::from_value(camel)?)
}

pub fn calendar_to_payload(calendar: &Calendar) -> Result<Value> {
    let value = serde_json::to_value(calendar)?;
    Ok(transform_keys(&value, camel_to_snake))
}

pub fn calendar_from_payload(payload: &Value) -> Result<Calendar> {
    let camel = transform_keys(payload, snake_to_camel);
    Ok(serde_json::from_value(camel)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_round_trips_through_snake_case_payload() {
        let mut task = Task::new("t1", "V", 3);
        task.name = "Pour foundation".into();
        task.parent_id = Some("p1".into());

        let payload = task_to_payload(&task).unwrap();
        assert!(payload.get("parent_id").is_some());
        assert!(payload.get("parentId").is_none());

        let back = task_from_payload(&payload).unwrap();
        assert_eq!(task, back);
    }

    #[test]
    fn calendar_round_trips_through_snake_case_payload() {
        let calendar = Calendar::default();
        let payload = calendar_to_payload(&calendar).unwrap();
        let back = calendar_from_payload(&payload).unwrap();
        assert_eq!(calendar, back);
    }
}
