//! Defensive copier backed by `Value::clone`.

use serde_json::Value;

use crate::traits::DefensiveCopier;

/// Deep copy through `Clone`. A `serde_json::Value` owns its whole tree, so
/// the clone shares nothing with the original.
#[derive(Debug, Default, Clone, Copy)]
pub struct CloneCopier;

impl DefensiveCopier for CloneCopier {
    fn copy(&self, value: &Value) -> Value {
        value.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn copy_is_independent() {
        let original = json!({"items": [1, 2]});
        let mut copy = CloneCopier.copy(&original);
        copy["items"][0] = json!(9);
        assert_eq!(original["items"][0], json!(1));
    }
}
