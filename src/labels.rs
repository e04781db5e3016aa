use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::types::ScoredClass;

/// One class in the pretrained taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassLabel {
    pub id: String,
    pub name: String,
}

/// The fixed label set the classifier head was trained on, indexed by
/// output position.
#[derive(Debug, Clone)]
pub struct LabelTaxonomy {
    entries: Vec<ClassLabel>,
}

impl LabelTaxonomy {
    /// Read a labels file with one class per line. Lines are either synset
    /// style `<class_id> <label>` or a bare `<label>` (the line number then
    /// doubles as the class id). Blank lines and `#` comments are skipped.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read labels file {}", path.display()))?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let entry = match line.split_once(char::is_whitespace) {
                Some((id, name)) => ClassLabel {
                    id: id.to_string(),
                    name: name.trim().to_string(),
                },
                None => ClassLabel {
                    id: entries.len().to_string(),
                    name: line.to_string(),
                },
            };
            entries.push(entry);
        }
        if entries.is_empty() {
            bail!("labels file contains no classes");
        }
        Ok(Self { entries })
    }

    /// Placeholder taxonomy for checkpoints that ship no labels file.
    pub fn positional(num_classes: usize) -> Self {
        let entries = (0..num_classes)
            .map(|index| ClassLabel {
                id: index.to_string(),
                name: format!("LABEL_{index}"),
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Attach a confidence to the class at `index`. An index outside the
    /// taxonomy gets a positional fallback rather than failing the request.
    pub fn scored(&self, index: usize, confidence: f32) -> ScoredClass {
        match self.entries.get(index) {
            Some(entry) => ScoredClass {
                class_id: entry.id.clone(),
                label: entry.name.clone(),
                confidence,
            },
            None => ScoredClass {
                class_id: index.to_string(),
                label: format!("LABEL_{index}"),
                confidence,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_synset_style_lines() {
        let taxonomy = LabelTaxonomy::parse(
            "n01440764 tench\nn02123045 tabby_cat\nn02504458 African_elephant\n",
        )
        .unwrap();

        assert_eq!(taxonomy.len(), 3);
        let scored = taxonomy.scored(1, 0.9);
        assert_eq!(scored.class_id, "n02123045");
        assert_eq!(scored.label, "tabby_cat");
    }

    #[test]
    fn parses_bare_labels_with_positional_ids() {
        let taxonomy = LabelTaxonomy::parse("tench\ngoldfish\n").unwrap();
        let scored = taxonomy.scored(1, 0.5);
        assert_eq!(scored.class_id, "1");
        assert_eq!(scored.label, "goldfish");
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        let taxonomy = LabelTaxonomy::parse("# header\n\ntench\n\n# tail\ngoldfish\n").unwrap();
        assert_eq!(taxonomy.len(), 2);
    }

    #[test]
    fn empty_file_is_an_error() {
        assert!(LabelTaxonomy::parse("").is_err());
        assert!(LabelTaxonomy::parse("# only a comment\n").is_err());
    }

    #[test]
    fn out_of_range_index_falls_back_to_positional_label() {
        let taxonomy = LabelTaxonomy::parse("tench\n").unwrap();
        let scored = taxonomy.scored(7, 0.1);
        assert_eq!(scored.class_id, "7");
        assert_eq!(scored.label, "LABEL_7");
    }

    #[test]
    fn positional_taxonomy_covers_every_class() {
        let taxonomy = LabelTaxonomy::positional(1000);
        assert_eq!(taxonomy.len(), 1000);
        assert_eq!(taxonomy.scored(999, 0.2).label, "LABEL_999");
    }
}
