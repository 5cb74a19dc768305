use std::path::Path;

use crate::error::VisualizationError;
use crate::pipeline::traits::LabelMapper;

/// Index-to-symbol table read from a vocabulary file with one symbol per
/// line. Blank lines are skipped; the n-th symbol has label index n.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    symbols: Vec<String>,
    eos_index: Option<u32>,
}

impl SymbolTable {
    pub fn new(symbols: Vec<String>, eos_symbol: Option<&str>) -> Self {
        let eos_index = eos_symbol
            .and_then(|eos| symbols.iter().position(|s| s == eos))
            .map(|i| i as u32);
        Self { symbols, eos_index }
    }

    pub fn load(path: &Path, eos_symbol: Option<&str>) -> Result<Self, VisualizationError> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| VisualizationError::io("read vocabulary file", e))?;
        let symbols: Vec<String> = data
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        if symbols.is_empty() {
            return Err(VisualizationError::invalid_input(format!(
                "vocabulary file '{}' is empty",
                path.display()
            )));
        }
        let table = Self::new(symbols, eos_symbol);
        tracing::debug!(
            path = %path.display(),
            num_symbols = table.len(),
            eos_index = ?table.eos_index,
            "vocabulary loaded"
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn eos_index(&self) -> Option<u32> {
        self.eos_index
    }
}

impl LabelMapper for SymbolTable {
    fn decode_list(&self, indices: &[u32]) -> Result<Vec<String>, VisualizationError> {
        indices
            .iter()
            .take_while(|&&index| Some(index) != self.eos_index)
            .map(|&index| {
                self.symbols.get(index as usize).cloned().ok_or_else(|| {
                    VisualizationError::invalid_input(format!(
                        "label index {index} is outside the {}-symbol vocabulary",
                        self.symbols.len()
                    ))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timit_like() -> SymbolTable {
        let symbols = ["aa", "ae", "t", "iy", "k", "s", "sh", "ae2", "<eos>"]
            .into_iter()
            .map(str::to_string)
            .collect();
        SymbolTable::new(symbols, Some("<eos>"))
    }

    #[test]
    fn decode_list_maps_each_index() {
        let table = timit_like();
        assert_eq!(table.decode_list(&[4, 1, 2]).unwrap(), vec!["k", "ae", "t"]);
    }

    #[test]
    fn decode_joins_with_spaces() {
        let table = timit_like();
        assert_eq!(table.decode(&[4, 1, 2]).unwrap(), "k ae t");
    }

    #[test]
    fn decode_list_stops_at_eos() {
        let table = timit_like();
        assert_eq!(table.eos_index(), Some(8));
        assert_eq!(table.decode_list(&[5, 3, 8, 0, 0]).unwrap(), vec!["s", "iy"]);
    }

    #[test]
    fn without_eos_every_index_is_decoded() {
        let symbols = vec!["a".to_string(), "b".to_string()];
        let table = SymbolTable::new(symbols, None);
        assert_eq!(table.decode_list(&[1, 0, 1]).unwrap(), vec!["b", "a", "b"]);
    }

    #[test]
    fn unknown_index_fails() {
        let table = timit_like();
        assert!(table.decode_list(&[42]).is_err());
    }

    #[test]
    fn load_reads_one_symbol_per_line() {
        let path = std::env::temp_dir().join(format!(
            "attention_viz_vocab_{}.txt",
            std::process::id()
        ));
        std::fs::write(&path, "aa\nae\n\n<eos>\n").expect("write vocab");
        let table = SymbolTable::load(&path, Some("<eos>")).expect("load vocab");
        assert_eq!(table.len(), 3);
        assert_eq!(table.eos_index(), Some(2));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_missing_file_fails() {
        let result = SymbolTable::load(Path::new("/nonexistent/vocab.txt"), None);
        assert!(matches!(result, Err(VisualizationError::Io { .. })));
    }
}
