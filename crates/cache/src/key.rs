use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use strata_types::Value;

const MULTIPLIER: u64 = 37;
const INITIAL_HASHCODE: u64 = 17;

/// An ordered, composite fingerprint of a query.
///
/// Components are accumulated in binding order (statement id, bounds, SQL
/// text, each bound parameter, environment id); two keys are equal iff every
/// component is equal in the same order. A running hashcode, checksum and
/// count reject unequal keys before the full component comparison.
#[derive(Debug, Clone)]
pub struct CacheKey {
    hashcode: u64,
    checksum: u64,
    count: u64,
    components: Vec<Value>,
}

impl CacheKey {
    /// Create an empty key.
    pub fn new() -> Self {
        Self {
            hashcode: INITIAL_HASHCODE,
            checksum: 0,
            count: 0,
            components: Vec::new(),
        }
    }

    /// Append one component. Null is a valid component.
    pub fn update(&mut self, component: Value) {
        let base = component_hash(&component);
        self.count += 1;
        self.checksum = self.checksum.wrapping_add(base);
        let scaled = base.wrapping_mul(self.count);
        self.hashcode = self.hashcode.wrapping_mul(MULTIPLIER).wrapping_add(scaled);
        self.components.push(component);
    }

    /// Append every component from an iterator, in order.
    pub fn update_all<I: IntoIterator<Item = Value>>(&mut self, components: I) {
        for component in components {
            self.update(component);
        }
    }

    /// Number of accumulated components.
    pub fn component_count(&self) -> usize {
        self.components.len()
    }
}

impl Default for CacheKey {
    fn default() -> Self {
        Self::new()
    }
}

fn component_hash(component: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    component.hash(&mut hasher);
    hasher.finish()
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        // Cheap rejections first; the component walk settles collisions.
        self.hashcode == other.hashcode
            && self.checksum == other.checksum
            && self.count == other.count
            && self.components == other.components
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hashcode);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hashcode, self.checksum)?;
        for component in &self.components {
            write!(f, ":{component}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_of(components: &[Value]) -> CacheKey {
        let mut key = CacheKey::new();
        key.update_all(components.iter().cloned());
        key
    }

    #[test]
    fn test_same_components_same_key() {
        let components = [
            Value::from("app.findUser"),
            Value::Integer(0),
            Value::Integer(50),
            Value::from("SELECT * FROM users WHERE id = ?"),
            Value::Integer(42),
        ];
        assert_eq!(key_of(&components), key_of(&components));
    }

    #[test]
    fn test_any_changed_component_changes_key() {
        let base = key_of(&[Value::from("stmt"), Value::Integer(1)]);
        assert_ne!(base, key_of(&[Value::from("stmt"), Value::Integer(2)]));
        assert_ne!(base, key_of(&[Value::from("other"), Value::Integer(1)]));
        assert_ne!(base, key_of(&[Value::from("stmt")]));
    }

    #[test]
    fn test_component_order_is_significant() {
        let forward = key_of(&[Value::Integer(1), Value::Integer(2)]);
        let reversed = key_of(&[Value::Integer(2), Value::Integer(1)]);
        assert_ne!(forward, reversed);
    }

    #[test]
    fn test_null_component_participates() {
        let with_null = key_of(&[Value::from("stmt"), Value::Null]);
        let without = key_of(&[Value::from("stmt")]);
        assert_ne!(with_null, without);
        assert_eq!(with_null, key_of(&[Value::from("stmt"), Value::Null]));
    }

    #[test]
    fn test_empty_keys_are_equal() {
        assert_eq!(CacheKey::new(), CacheKey::new());
    }
}
