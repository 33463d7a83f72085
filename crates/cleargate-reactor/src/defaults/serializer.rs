//! Debug serializers used in failure messages.

use std::fmt::Debug;
use std::marker::PhantomData;

use serde::Serialize;

use crate::traits::DebugSerializer;

/// Dumps only the payload's type name. Safe for payloads carrying secrets.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeNameSerializer;

impl<P> DebugSerializer<P> for TypeNameSerializer {
    fn dump(&self, _payload: &P) -> String {
        std::any::type_name::<P>().to_string()
    }
}

/// Dumps the payload as compact JSON.
pub struct JsonDebugSerializer<P> {
    _payload: PhantomData<fn(&P)>,
}

impl<P> JsonDebugSerializer<P> {
    pub fn new() -> Self {
        Self {
            _payload: PhantomData,
        }
    }
}

impl<P> Default for JsonDebugSerializer<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Serialize> DebugSerializer<P> for JsonDebugSerializer<P> {
    fn dump(&self, payload: &P) -> String {
        serde_json::to_string(payload).unwrap_or_else(|e| format!("<unserializable: {e}>"))
    }
}

/// Dumps the payload with its `Debug` implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugFmtSerializer;

impl<P: Debug> DebugSerializer<P> for DebugFmtSerializer {
    fn dump(&self, payload: &P) -> String {
        format!("{payload:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize)]
    struct Ticket {
        id: u32,
    }

    #[test]
    fn serializers_render_payload() {
        let ticket = Ticket { id: 3 };
        assert!(TypeNameSerializer.dump(&ticket).ends_with("Ticket"));
        assert_eq!(JsonDebugSerializer::new().dump(&ticket), r#"{"id":3}"#);
        assert_eq!(DebugFmtSerializer.dump(&ticket), "Ticket { id: 3 }");
    }
}
