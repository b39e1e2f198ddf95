//! The symbol table: name -> typed value.

use std::collections::HashMap;

use chain_sol::WELL_KNOWN;
use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::value::TypedValue;

/// Single-writer map from symbol name to value.
///
/// `set` overwrites: re-resolving an entity replaces its slot, so resolving
/// twice never grows the table.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: HashMap<String, TypedValue>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table seeded with the well-known program and sysvar addresses.
    pub fn with_well_known() -> Self {
        let mut table = Self::new();
        for (name, address) in WELL_KNOWN {
            table.entries.insert(name.to_string(), TypedValue::Address(address));
        }
        table
    }

    pub fn get(&self, name: &str) -> Option<&TypedValue> {
        self.entries.get(name)
    }

    /// Like [`get`](Self::get), failing with `UnresolvedReference`.
    pub fn lookup(&self, name: &str) -> Result<&TypedValue> {
        self.get(name)
            .ok_or_else(|| ResolveError::UnresolvedReference(name.to_string()))
    }

    /// Insert or replace a symbol, returning the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: TypedValue) -> Option<TypedValue> {
        let name = name.into();
        debug!(symbol = %name, tag = value.tag_name(), "symbol committed");
        self.entries.insert(name, value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Symbol names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use chain_sol::programs::TOKEN_PROGRAM_ID;

    #[test]
    fn well_known_addresses_are_seeded() {
        let table = SymbolTable::with_well_known();
        assert_eq!(table.len(), WELL_KNOWN.len());
        assert_eq!(
            table.get("token_program"),
            Some(&TypedValue::Address(TOKEN_PROGRAM_ID))
        );
    }

    #[test]
    fn set_overwrites_instead_of_appending() {
        let mut table = SymbolTable::new();
        assert!(table.set("n", TypedValue::U8(1)).is_none());
        assert_eq!(table.set("n", TypedValue::U8(2)), Some(TypedValue::U8(1)));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("n"), Some(&TypedValue::U8(2)));
    }

    #[test]
    fn lookup_of_missing_name_is_unresolved() {
        let table = SymbolTable::new();
        let err = table.lookup("nope").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnresolvedReference);
    }

    #[test]
    fn names_are_sorted() {
        let mut table = SymbolTable::new();
        table.set("b", TypedValue::Boolean(true));
        table.set("a", TypedValue::Boolean(false));
        assert_eq!(table.names(), vec!["a", "b"]);
    }
}
