//! Instrument registry - the set of tradable symbols.

use rustc_hash::FxHashMap;

use crate::error::RegistryError;
use crate::instrument::Instrument;

/// Symbol-to-instrument mapping. Symbols are case-sensitive ASCII.
#[derive(Default)]
pub struct Registry {
    instruments: FxHashMap<String, Instrument>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// List a fresh, empty instrument under `symbol`.
    ///
    /// Rejects empty symbols and duplicates.
    pub fn create(&mut self, symbol: &str) -> Result<(), RegistryError> {
        if symbol.is_empty() {
            return Err(RegistryError::EmptySymbol);
        }
        if self.instruments.contains_key(symbol) {
            return Err(RegistryError::DuplicateSymbol(symbol.to_string()));
        }
        self.instruments
            .insert(symbol.to_string(), Instrument::new(symbol));
        Ok(())
    }

    /// Look up an instrument.
    pub fn get(&self, symbol: &str) -> Option<&Instrument> {
        self.instruments.get(symbol)
    }

    /// Look up an instrument for mutation.
    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut Instrument> {
        self.instruments.get_mut(symbol)
    }

    /// Whether the symbol is listed.
    pub fn contains(&self, symbol: &str) -> bool {
        self.instruments.contains_key(symbol)
    }

    /// Number of listed instruments.
    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    /// True when nothing is listed.
    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    /// Listed symbols, sorted (diagnostic output).
    pub fn symbols(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.instruments.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let mut registry = Registry::new();
        assert!(registry.create("TSLA").is_ok());
        assert!(registry.contains("TSLA"));
        assert_eq!(registry.get("TSLA").map(|i| i.symbol()), Some("TSLA"));
        assert!(registry.get_mut("TSLA").is_some());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = Registry::new();
        registry.create("TSLA").unwrap();
        assert_eq!(
            registry.create("TSLA"),
            Err(RegistryError::DuplicateSymbol("TSLA".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_symbol_rejected() {
        let mut registry = Registry::new();
        assert_eq!(registry.create(""), Err(RegistryError::EmptySymbol));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_symbols_case_sensitive() {
        let mut registry = Registry::new();
        registry.create("TSLA").unwrap();
        registry.create("tsla").unwrap();
        assert_eq!(registry.len(), 2);
        assert!(!registry.contains("Tsla"));
        assert_eq!(registry.symbols(), vec!["TSLA", "tsla"]);
    }
}
