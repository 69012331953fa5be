//! Canonical cache keys.
//!
//! Every hub addresses its lines by a canonical string. The conversion is a
//! compile-time obligation of the key type rather than a runtime check: a
//! type that cannot name its line simply cannot be used as a hub key.

/// A value that identifies one cache line within a hub.
///
/// Implementations must be stable (the same key always produces the same
/// string) and injective within a hub (two keys that name different entities
/// must produce different strings). Composite keys should join their parts
/// with a separator that cannot occur in the parts themselves.
pub trait HubKey {
    /// The canonical string this key maps to.
    fn hub_key(&self) -> String;
}

impl HubKey for String {
    fn hub_key(&self) -> String {
        self.clone()
    }
}

impl HubKey for &str {
    fn hub_key(&self) -> String {
        (*self).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_keys_are_identity() {
        assert_eq!("journal".hub_key(), "journal");
        assert_eq!("journal".to_string().hub_key(), "journal");
    }

    #[test]
    fn owned_and_borrowed_keys_agree() {
        let owned = String::from("alice");
        assert_eq!(owned.hub_key(), "alice".hub_key());
    }
}
