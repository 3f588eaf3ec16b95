//! Ordered, labeled attribute storage shared by queries and articles.
//!
//! Each key maps to a value slot, a display label and an ordering index.
//! Iteration always follows the index, so declared fields keep their
//! canonical order and ad hoc keys land after them in insertion order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Int(u64),
    Text(String),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            AttrValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<u64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            AttrValue::Text(s) => s.parse().ok(),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Int(n) => write!(f, "{}", n),
            AttrValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for AttrValue {
    fn from(n: u64) -> Self {
        AttrValue::Int(n)
    }
}

impl From<u32> for AttrValue {
    fn from(n: u32) -> Self {
        AttrValue::Int(u64::from(n))
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Text(s)
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Text(s.to_string())
    }
}

#[derive(Debug, Clone)]
struct Slot {
    value: Option<AttrValue>,
    label: String,
    index: usize,
}

/// One attribute as seen during iteration
#[derive(Debug, Clone, Copy)]
pub struct Attribute<'a> {
    pub key: &'a str,
    pub label: &'a str,
    pub value: Option<&'a AttrValue>,
    pub index: usize,
}

/// Ordered key/value store with display labels
#[derive(Debug, Clone, Default)]
pub struct AttributeBag {
    slots: HashMap<String, Slot>,
}

impl AttributeBag {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_index(&self) -> usize {
        self.slots
            .values()
            .map(|s| s.index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Register a field with its label and default value.
    ///
    /// Meant for constructors laying out the canonical field set.
    pub fn declare(&mut self, key: &str, label: &str, default: Option<AttrValue>) {
        let index = self.next_index();
        self.slots.insert(
            key.to_string(),
            Slot {
                value: default,
                label: label.to_string(),
                index,
            },
        );
    }

    /// Value for `key`, `None` when absent or unset
    pub fn get(&self, key: &str) -> Option<&AttrValue> {
        self.slots.get(key).and_then(|s| s.value.as_ref())
    }

    /// Text value for `key`
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttrValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Overwrite the value of a known key, or append a new key labeled by
    /// itself. Label and index of known keys never change.
    pub fn set(&mut self, key: &str, value: impl Into<AttrValue>) {
        self.set_value(key, Some(value.into()));
    }

    /// Like [`set`](Self::set) but allows clearing a slot back to unset.
    pub fn set_value(&mut self, key: &str, value: Option<AttrValue>) {
        if let Some(slot) = self.slots.get_mut(key) {
            slot.value = value;
            return;
        }
        let index = self.next_index();
        self.slots.insert(
            key.to_string(),
            Slot {
                value,
                label: key.to_string(),
                index,
            },
        );
    }

    /// Set only when the key was declared
    pub fn set_if_declared(&mut self, key: &str, value: impl Into<AttrValue>) -> bool {
        match self.slots.get_mut(key) {
            Some(slot) => {
                slot.value = Some(value.into());
                true
            }
            None => false,
        }
    }

    /// Drop an entry. Index gaps are left as they are.
    pub fn remove(&mut self, key: &str) -> Option<AttrValue> {
        self.slots.remove(key).and_then(|s| s.value)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Attributes sorted by index
    pub fn iter(&self) -> impl Iterator<Item = Attribute<'_>> {
        let mut items: Vec<Attribute<'_>> = self
            .slots
            .iter()
            .map(|(key, slot)| Attribute {
                key,
                label: &slot.label,
                value: slot.value.as_ref(),
                index: slot.index,
            })
            .collect();
        items.sort_by_key(|a| a.index);
        items.into_iter()
    }

    /// Length of the longest label, for aligned text output
    pub fn max_label_len(&self) -> usize {
        self.slots
            .values()
            .map(|s| s.label.chars().count())
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(bag: &AttributeBag) -> Vec<String> {
        bag.iter().map(|a| a.key.to_string()).collect()
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut bag = AttributeBag::new();
        for key in ["zeta", "alpha", "mid", "beta", "omega"] {
            bag.set(key, key);
        }
        assert_eq!(keys(&bag), vec!["zeta", "alpha", "mid", "beta", "omega"]);
    }

    #[test]
    fn test_overwrite_keeps_label_and_index() {
        let mut bag = AttributeBag::new();
        bag.declare("title", "Title", None);
        bag.declare("year", "Year", None);
        bag.set("extra", "x");
        bag.set("title", "Quantum theory");

        let attrs: Vec<_> = bag.iter().collect();
        assert_eq!(attrs[0].key, "title");
        assert_eq!(attrs[0].label, "Title");
        assert_eq!(attrs[0].index, 0);
        assert_eq!(attrs[0].value, Some(&AttrValue::from("Quantum theory")));
        assert_eq!(attrs[2].key, "extra");
        assert_eq!(attrs[2].label, "extra");
    }

    #[test]
    fn test_declare_indices() {
        let mut bag = AttributeBag::new();
        bag.declare("a", "A", None);
        bag.declare("b", "B", Some(AttrValue::Int(0)));
        let idx: Vec<usize> = bag.iter().map(|a| a.index).collect();
        assert_eq!(idx, vec![0, 1]);
        assert_eq!(bag.get("b"), Some(&AttrValue::Int(0)));
    }

    #[test]
    fn test_absent_key_reads_none() {
        let bag = AttributeBag::new();
        assert!(bag.get("missing").is_none());
        assert!(bag.get_str("missing").is_none());
    }

    #[test]
    fn test_remove_leaves_gap() {
        let mut bag = AttributeBag::new();
        bag.set("a", 1u64);
        bag.set("b", 2u64);
        bag.set("c", 3u64);
        assert_eq!(bag.remove("b"), Some(AttrValue::Int(2)));
        bag.set("d", 4u64);
        let idx: Vec<usize> = bag.iter().map(|a| a.index).collect();
        assert_eq!(idx, vec![0, 2, 3]);
    }

    #[test]
    fn test_set_if_declared() {
        let mut bag = AttributeBag::new();
        bag.declare("num_results", "Results", Some(AttrValue::Int(0)));
        assert!(bag.set_if_declared("num_results", 1230u64));
        assert!(!bag.set_if_declared("other", 1u64));
        assert_eq!(bag.get("num_results").and_then(AttrValue::as_int), Some(1230));
        assert!(!bag.contains_key("other"));
    }
}
