use beacon_types::protocol::{Map, Value};

/// Out-of-band metadata travelling with an item through the capture pipeline.
///
/// A hint is created per capture call and handed to every callback and
/// processor that runs for the item. It never becomes part of the payload.
#[derive(Debug, Default, Clone)]
pub struct Hint {
    from_cache: bool,
    extras: Map<String, Value>,
}

impl Hint {
    /// Creates an empty hint.
    pub fn new() -> Hint {
        Default::default()
    }

    /// Creates a hint marking the item as replayed from an offline cache.
    ///
    /// Scope data is not applied to replayed items, since the scope at replay
    /// time has nothing to do with the moment the item was recorded.
    pub fn from_cache() -> Hint {
        Hint {
            from_cache: true,
            ..Default::default()
        }
    }

    /// Whether the item is a replay of previously recorded telemetry.
    pub fn is_from_cache(&self) -> bool {
        self.from_cache
    }

    /// Attaches an extra value under the given key.
    pub fn set_extra(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.extras.insert(key.into(), value.into());
    }

    /// Looks up an extra value.
    pub fn get_extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_flag_and_extras() {
        let mut hint = Hint::from_cache();
        assert!(hint.is_from_cache());
        hint.set_extra("origin", "disk");
        assert_eq!(
            hint.get_extra("origin").and_then(Value::as_str),
            Some("disk")
        );
        assert!(hint.get_extra("missing").is_none());
    }
}
