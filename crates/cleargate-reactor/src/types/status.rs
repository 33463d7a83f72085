//! Merge statuses and the transition predicates that match them.

use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Label returned by a merger or router to select outgoing transitions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(Cow<'static, str>);

impl Status {
    pub const fn from_static(label: &'static str) -> Self {
        Self(Cow::Borrowed(label))
    }

    pub fn new(label: impl Into<String>) -> Self {
        Self(Cow::Owned(label.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Status {
    fn from(label: &'static str) -> Self {
        Self::from_static(label)
    }
}

impl From<String> for Status {
    fn from(label: String) -> Self {
        Self::new(label)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A closed set of statuses, usually implemented by a fieldless enum.
///
/// Declaring the domain on a merger lets graph validation prove that every
/// status the merger can return is covered by a transition.
pub trait StatusDomain: Into<Status> {
    fn domain() -> Vec<Status>;
}

/// Which statuses a transition accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusPredicate {
    Any,
    OneOf(BTreeSet<Status>),
}

impl StatusPredicate {
    pub fn one_of<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Status>,
    {
        Self::OneOf(statuses.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, status: &Status) -> bool {
        match self {
            Self::Any => true,
            Self::OneOf(set) => set.contains(status),
        }
    }
}

impl fmt::Display for StatusPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::OneOf(set) => {
                let labels: Vec<&str> = set.iter().map(Status::as_str).collect();
                write!(f, "[{}]", labels.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_and_owned_statuses_compare_equal() {
        assert_eq!(Status::from("DONE"), Status::new(String::from("DONE")));
        assert_eq!(Status::from_static("DONE").to_string(), "DONE");
    }

    #[test]
    fn predicate_matching() {
        let on = StatusPredicate::one_of(["A", "B"]);
        assert!(on.matches(&"A".into()));
        assert!(!on.matches(&"C".into()));
        assert!(StatusPredicate::Any.matches(&"C".into()));
        assert_eq!(on.to_string(), "[A, B]");
    }

    #[test]
    fn status_serializes_as_plain_string() {
        let json = serde_json::to_value(Status::from("OK")).unwrap();
        assert_eq!(json, serde_json::json!("OK"));
        let back: Status = serde_json::from_value(json).unwrap();
        assert_eq!(back, Status::from("OK"));
    }
}
