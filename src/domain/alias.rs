//! Exact-match label normalisation.

use std::collections::HashMap;

/// Rewrites raw category labels to canonical ones. Unmapped labels pass
/// through unchanged; matching is exact (case and whitespace sensitive).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    pub fn resolve(&self, raw: &str) -> String {
        self.entries
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_only() {
        let table = AliasTable::from_pairs([("MBWay", "MB Way"), ("Credit Card", "Card")]);
        assert_eq!(table.resolve("MBWay"), "MB Way");
        assert_eq!(table.resolve("mbway"), "mbway");
        assert_eq!(table.resolve("Credit Card "), "Credit Card ");
        assert_eq!(table.resolve("Unknown"), "Unknown");
        assert_eq!(table.len(), 2);
    }
}
