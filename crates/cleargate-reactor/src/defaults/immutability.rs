//! Immutability checkers: no-op and JSON-snapshot based.

use std::fmt::Write as _;
use std::marker::PhantomData;

use serde::Serialize;
use serde_json::Value;

use crate::traits::{ImmutabilityChecker, Snapshot};

/// Checker that never reports a change.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopImmutabilityChecker;

impl<P> ImmutabilityChecker<P> for NoopImmutabilityChecker {
    fn take_snapshot(&self, _payload: &P) -> Snapshot {
        Box::new(())
    }

    fn diff(&self, _snapshot: &Snapshot, _payload: &P) -> Option<String> {
        None
    }
}

/// Checker that snapshots the payload as a JSON tree and reports every
/// changed path.
pub struct JsonImmutabilityChecker<P> {
    _payload: PhantomData<fn(&P)>,
}

impl<P> JsonImmutabilityChecker<P> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<P> Default for JsonImmutabilityChecker<P> {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot_of<P: Serialize>(payload: &P) -> Value {
    serde_json::to_value(payload)
        .unwrap_or_else(|e| Value::String(format!("<unserializable: {e}>")))
}

impl<P: Serialize> ImmutabilityChecker<P> for JsonImmutabilityChecker<P> {
    fn take_snapshot(&self, payload: &P) -> Snapshot {
        Box::new(snapshot_of(payload))
    }

    fn diff(&self, snapshot: &Snapshot, payload: &P) -> Option<String> {
        let before = snapshot.downcast_ref::<Value>()?;
        let after = snapshot_of(payload);
        let mut changes = Vec::new();
        collect_changes("", before, &after, &mut changes);
        if changes.is_empty() {
            None
        } else {
            Some(changes.join("; "))
        }
    }
}

fn collect_changes(path: &str, before: &Value, after: &Value, out: &mut Vec<String>) {
    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            for (key, bv) in b {
                let child = format!("{path}/{key}");
                match a.get(key) {
                    Some(av) => collect_changes(&child, bv, av, out),
                    None => out.push(format!("{child}: removed {bv}")),
                }
            }
            for (key, av) in a {
                if !b.contains_key(key) {
                    out.push(format!("{path}/{key}: added {av}"));
                }
            }
        }
        (Value::Array(b), Value::Array(a)) if b.len() == a.len() => {
            for (i, (bv, av)) in b.iter().zip(a).enumerate() {
                collect_changes(&format!("{path}/{i}"), bv, av, out);
            }
        }
        _ if before != after => {
            let mut line = String::new();
            let shown = if path.is_empty() { "/" } else { path };
            let _ = write!(line, "{shown}: {before} -> {after}");
            out.push(line);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Serialize)]
    struct Account {
        owner: String,
        balance: Mutex<i64>,
        tags: Mutex<Vec<String>>,
    }

    fn account() -> Account {
        Account {
            owner: "ann".into(),
            balance: Mutex::new(10),
            tags: Mutex::new(vec![]),
        }
    }

    #[test]
    fn unchanged_payload_has_no_diff() {
        let checker = JsonImmutabilityChecker::new();
        let payload = account();
        let snapshot = checker.take_snapshot(&payload);
        assert_eq!(checker.diff(&snapshot, &payload), None);
    }

    #[test]
    fn changed_fields_are_reported_by_path() {
        let checker = JsonImmutabilityChecker::new();
        let payload = account();
        let snapshot = checker.take_snapshot(&payload);

        *payload.balance.lock() = 4;
        payload.tags.lock().push("vip".into());

        let diff = checker.diff(&snapshot, &payload).unwrap();
        assert!(diff.contains("/balance: 10 -> 4"), "{diff}");
        assert!(diff.contains("/tags: [] -> [\"vip\"]"), "{diff}");
        assert!(!diff.contains("owner"));
    }

    #[test]
    fn noop_checker_never_reports() {
        let payload = account();
        let snapshot = NoopImmutabilityChecker.take_snapshot(&payload);
        *payload.balance.lock() = 0;
        assert_eq!(
            ImmutabilityChecker::<Account>::diff(&NoopImmutabilityChecker, &snapshot, &payload),
            None
        );
    }
}
