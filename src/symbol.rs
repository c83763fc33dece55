//! Symbol table: scoped name -> value and name -> pointer maps.
//!
//! Two keyed maps with insert-or-assign setters and assertion-style
//! lookups that fail with a `CompileError` rather than panicking.

use std::collections::BTreeMap;

use crate::error::CompileError;
use crate::value::{ArrayLiteral, Literal};

/// Two mappings keyed by identifier name. Invariant: a name appears in at
/// most one map (enforced by callers — `set_symbol` and `set_pointer`
/// each only touch their own map).
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
    table: BTreeMap<String, Literal>,
    addr: BTreeMap<String, ArrayLiteral>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_symbol(&mut self, name: impl Into<String>, entry: Literal) {
        self.table.insert(name.into(), entry);
    }

    pub fn set_pointer(&mut self, name: impl Into<String>, entry: ArrayLiteral) {
        self.addr.insert(name.into(), entry);
    }

    pub fn remove(&mut self, name: &str) {
        self.table.remove(name);
        self.addr.remove(name);
    }

    pub fn clear(&mut self) {
        self.table.clear();
        self.addr.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty() && self.addr.is_empty()
    }

    pub fn size(&self) -> usize {
        self.table.len() + self.addr.len()
    }

    pub fn get_symbol(&self, name: &str) -> Result<&Literal, CompileError> {
        self.table
            .get(name)
            .ok_or_else(|| symbol_not_found(name))
    }

    pub fn get_pointer(&self, name: &str) -> Result<&ArrayLiteral, CompileError> {
        self.addr
            .get(name)
            .ok_or_else(|| symbol_not_found(name))
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.table.contains_key(name) || self.addr.contains_key(name)
    }

    pub fn is_pointer(&self, name: &str) -> bool {
        self.addr.contains_key(name)
    }

    /// Scan the pointer map for an array equal to `addr` (mirrors the
    /// original's `is_pointer_address`, a reverse lookup by value).
    pub fn is_pointer_address(&self, addr: &ArrayLiteral) -> bool {
        self.addr.values().any(|v| v == addr)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.table.keys()
    }

    pub fn pointers(&self) -> impl Iterator<Item = &String> {
        self.addr.keys()
    }
}

fn symbol_not_found(name: &str) -> CompileError {
    CompileError::undefined_symbol(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get_symbol() {
        let mut table = SymbolTable::new();
        table.set_symbol("x", Literal::int(10));
        assert_eq!(table.get_symbol("x").unwrap().as_int(), Some(10));
    }

    #[test]
    fn missing_symbol_fails() {
        let table = SymbolTable::new();
        assert!(table.get_symbol("missing").is_err());
    }

    #[test]
    fn set_and_get_pointer() {
        let mut table = SymbolTable::new();
        table.set_pointer("v", vec![Literal::int(1), Literal::int(2)]);
        assert!(table.is_pointer("v"));
        assert!(!table.is_defined("w"));
        assert!(table.is_defined("v"));
    }

    #[test]
    fn insert_or_assign_semantics() {
        let mut table = SymbolTable::new();
        table.set_symbol("x", Literal::int(1));
        table.set_symbol("x", Literal::int(2));
        assert_eq!(table.get_symbol("x").unwrap().as_int(), Some(2));
        assert_eq!(table.size(), 1);
    }

    #[test]
    fn remove_clears_both_maps() {
        let mut table = SymbolTable::new();
        table.set_symbol("x", Literal::int(1));
        table.set_pointer("x", vec![]);
        table.remove("x");
        assert!(table.is_empty());
    }

    #[test]
    fn is_pointer_address_scans_by_value() {
        let mut table = SymbolTable::new();
        let arr = vec![Literal::int(1)];
        table.set_pointer("v", arr.clone());
        assert!(table.is_pointer_address(&arr));
        assert!(!table.is_pointer_address(&vec![Literal::int(2)]));
    }
}
