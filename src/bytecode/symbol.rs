use std::collections::HashMap;

// =============================================================================
// SYMBOL TABLE - Identifier resolution for the compiler
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolScope {
    Global,
    Local,
}

/// A resolved binding: where a name lives and which slot it occupies.
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub scope: SymbolScope,
    pub index: usize,
}

/// Chained symbol table. A table with no outer is the global table; inner
/// tables are pushed and popped in lockstep with function nesting, so the
/// chain is a plain `Box` stack rather than anything reference-counted.
#[derive(Debug, Default)]
pub struct SymbolTable {
    store: HashMap<String, Symbol>,
    outer: Option<Box<SymbolTable>>,
    num_definitions: usize,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn new_enclosed(outer: SymbolTable) -> Self {
        SymbolTable {
            store: HashMap::new(),
            outer: Some(Box::new(outer)),
            num_definitions: 0,
        }
    }

    /// Allocate the next slot in this table for `name`. Redefining a name
    /// overwrites its mapping but still burns a fresh index.
    pub fn define(&mut self, name: &str) -> Symbol {
        let scope = if self.outer.is_none() {
            SymbolScope::Global
        } else {
            SymbolScope::Local
        };

        let symbol = Symbol {
            name: name.to_string(),
            scope,
            index: self.num_definitions,
        };
        self.num_definitions += 1;
        self.store.insert(name.to_string(), symbol.clone());

        symbol
    }

    /// Nearest definition wins: check this table, then walk outward.
    pub fn resolve(&self, name: &str) -> Option<&Symbol> {
        self.store
            .get(name)
            .or_else(|| self.outer.as_ref().and_then(|outer| outer.resolve(name)))
    }

    /// Detach and return the enclosing table, if any. Leaving the global
    /// table this way is the caller's error to report.
    pub fn into_outer(self) -> Option<SymbolTable> {
        self.outer.map(|outer| *outer)
    }

    pub fn is_global(&self) -> bool {
        self.outer.is_none()
    }

    pub fn num_definitions(&self) -> usize {
        self.num_definitions
    }
}
