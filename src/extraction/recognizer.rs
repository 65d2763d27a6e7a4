//! Optional named-entity recognition.
//!
//! The extractor can be given an [`EntityRecognizer`]; when one is present its
//! `PRODUCT` entities join the medications and its `DISEASE`/`CONDITION`
//! entities join the diagnoses. Without one those contributions are skipped.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::info;

use super::ExtractionError;
use crate::errors::{AppError, AppResult};

/// A labelled span of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEntity {
    pub text: String,
    pub label: String,
}

impl NamedEntity {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// Named-entity capability. Implementations are called concurrently and must
/// not hold mutable state without their own synchronization.
pub trait EntityRecognizer: Send + Sync {
    fn name(&self) -> &str;

    fn recognize(&self, text: &str) -> Result<Vec<NamedEntity>, ExtractionError>;
}

/// Dictionary-backed recognizer.
///
/// Loaded from JSON of the form
/// `{"PRODUCT": ["Tylenol"], "DISEASE": ["asthma"], "CONDITION": ["obesity"]}`.
/// Terms match as case-insensitive whole words; the entity text is the span as
/// written in the document.
#[derive(Debug)]
pub struct LexiconRecognizer {
    patterns: Vec<(String, Regex)>,
}

impl LexiconRecognizer {
    /// Builds one alternation pattern per label.
    pub fn from_entries(entries: &BTreeMap<String, Vec<String>>) -> Result<Self, ExtractionError> {
        let mut patterns = Vec::new();
        for (label, terms) in entries {
            let mut terms: Vec<&str> = terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
            if terms.is_empty() {
                continue;
            }
            // Longest first so "heart failure" wins over "heart".
            terms.sort_by_key(|t| std::cmp::Reverse(t.len()));
            let alternation = terms
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            patterns.push((label.clone(), Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))?));
        }
        Ok(Self { patterns })
    }

    /// Loads a lexicon file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::FileSystem(format!("Failed to read entity lexicon '{}': {}", path.display(), e))
        })?;
        let entries: BTreeMap<String, Vec<String>> = serde_json::from_str(&content).map_err(|e| {
            AppError::Config(format!("Invalid entity lexicon '{}': {}", path.display(), e))
        })?;
        let recognizer = Self::from_entries(&entries)?;
        info!(
            path = %path.display(),
            labels = recognizer.patterns.len(),
            "Loaded entity lexicon"
        );
        Ok(recognizer)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|(label, _)| label.as_str())
    }
}

impl EntityRecognizer for LexiconRecognizer {
    fn name(&self) -> &str {
        "lexicon"
    }

    fn recognize(&self, text: &str) -> Result<Vec<NamedEntity>, ExtractionError> {
        Ok(self
            .patterns
            .iter()
            .flat_map(|(label, pattern)| {
                pattern
                    .find_iter(text)
                    .map(move |m| NamedEntity::new(m.as_str(), label.as_str()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn lexicon() -> LexiconRecognizer {
        let mut entries = BTreeMap::new();
        entries.insert("PRODUCT".to_string(), vec!["Tylenol".to_string()]);
        entries.insert(
            "DISEASE".to_string(),
            vec!["heart".to_string(), "heart failure".to_string()],
        );
        LexiconRecognizer::from_entries(&entries).unwrap()
    }

    #[test]
    fn test_recognizes_whole_words_case_insensitive() {
        let entities = lexicon().recognize("Takes TYLENOL for pain; history of heart failure").unwrap();

        assert!(entities.contains(&NamedEntity::new("TYLENOL", "PRODUCT")));
        assert!(entities.contains(&NamedEntity::new("heart failure", "DISEASE")));
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn test_ignores_partial_words() {
        assert!(lexicon().recognize("Tylenolx sweetheart").unwrap().is_empty());
    }

    #[test]
    fn test_empty_label_lists_skipped() {
        let mut entries = BTreeMap::new();
        entries.insert("CONDITION".to_string(), vec!["  ".to_string()]);
        let recognizer = LexiconRecognizer::from_entries(&entries).unwrap();
        assert_eq!(recognizer.labels().count(), 0);
    }

    #[test]
    fn test_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lexicon.json");
        fs::write(&path, r#"{"CONDITION": ["obesity"]}"#).unwrap();

        let recognizer = LexiconRecognizer::from_file(&path).unwrap();

        assert_eq!(recognizer.labels().collect::<Vec<_>>(), vec!["CONDITION"]);
        assert_eq!(
            recognizer.recognize("Obesity noted").unwrap(),
            vec![NamedEntity::new("Obesity", "CONDITION")]
        );
    }

    #[test]
    fn test_from_file_malformed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lexicon.json");
        fs::write(&path, "[1, 2").unwrap();

        assert!(matches!(LexiconRecognizer::from_file(&path), Err(AppError::Config(_))));
    }
}
