//! Byte-string interning for property and variable names.
//!
//! Property tables key their entries by `Symbol` so lookups and equality
//! checks are integer comparisons instead of byte scans. Symbols are only
//! meaningful relative to the interner that produced them, which lives in
//! the per-execution `Env`.

use std::collections::HashMap;

/// Interned name handle. Only valid for the `Interner` that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Symbol(pub u32);

#[derive(Debug, Default)]
pub struct Interner {
    map: HashMap<Vec<u8>, Symbol>,
    names: Vec<Vec<u8>>,
}

impl Interner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a name, returning the existing symbol if already known.
    pub fn intern(&mut self, name: &[u8]) -> Symbol {
        if let Some(&sym) = self.map.get(name) {
            return sym;
        }
        let sym = Symbol(self.names.len() as u32);
        self.names.push(name.to_vec());
        self.map.insert(name.to_vec(), sym);
        sym
    }

    /// Look up a symbol without interning.
    pub fn find(&self, name: &[u8]) -> Option<Symbol> {
        self.map.get(name).copied()
    }

    /// The name bytes behind a symbol.
    pub fn lookup(&self, sym: Symbol) -> Option<&[u8]> {
        self.names.get(sym.0 as usize).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
