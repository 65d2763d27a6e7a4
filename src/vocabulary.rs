//! # Medical Vocabulary
//!
//! The read-only table of medication names, dosage units, lab test names and
//! abbreviations that drives entity extraction. It is loaded once at startup
//! and shared behind an `Arc`; nothing mutates it afterwards.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{error_logging, AppError, AppResult};

/// Default vocabulary file name, relative to the working directory.
pub const DEFAULT_VOCABULARY_PATH: &str = "medical_terms.json";

/// Medical terminology configuration loaded from JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicalVocabulary {
    /// Known medication names
    #[serde(default)]
    pub medications: Vec<String>,
    /// Dosage unit tokens used by the dosage pattern
    #[serde(default)]
    pub common_dosages: Vec<String>,
    /// Known lab test names
    #[serde(default)]
    pub lab_test_names: Vec<String>,
    /// Vital sign names (carried for callers, no extractor reads them)
    #[serde(default)]
    pub vital_signs: Vec<String>,
    /// Abbreviation to expansion
    #[serde(default)]
    pub medical_abbreviations: BTreeMap<String, String>,
}

impl Default for MedicalVocabulary {
    fn default() -> Self {
        let abbreviations = [
            ("qd", "once daily"),
            ("bid", "twice daily"),
            ("tid", "three times daily"),
            ("qid", "four times daily"),
            ("prn", "as needed"),
            ("po", "by mouth"),
            ("sc", "subcutaneous"),
            ("im", "intramuscular"),
            ("iv", "intravenous"),
        ];

        Self {
            medications: Vec::new(),
            common_dosages: [
                "mg",
                "mcg",
                "ml",
                "g",
                "tablet",
                "capsule",
                "injection",
                "daily",
                "twice daily",
                "three times daily",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            lab_test_names: Vec::new(),
            vital_signs: [
                "BP",
                "blood pressure",
                "heart rate",
                "pulse",
                "temperature",
                "respiratory rate",
                "SpO2",
                "oxygen saturation",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            medical_abbreviations: abbreviations
                .iter()
                .map(|(abbr, full)| (abbr.to_string(), full.to_string()))
                .collect(),
        }
    }
}

impl MedicalVocabulary {
    /// Validate vocabulary entries
    pub fn validate(&self) -> AppResult<()> {
        let validate_terms = |terms: &[String], category: &str| -> AppResult<()> {
            for (i, term) in terms.iter().enumerate() {
                if term.trim().is_empty() {
                    return Err(AppError::Vocabulary(format!(
                        "{}[{}] cannot be empty",
                        category, i
                    )));
                }
                if term.chars().any(|c| c.is_control()) {
                    return Err(AppError::Vocabulary(format!(
                        "{}[{}] '{}' contains control characters",
                        category, i, term
                    )));
                }
            }
            Ok(())
        };

        validate_terms(&self.medications, "medications")?;
        validate_terms(&self.common_dosages, "common_dosages")?;
        validate_terms(&self.lab_test_names, "lab_test_names")?;
        validate_terms(&self.vital_signs, "vital_signs")?;

        for (abbr, full) in &self.medical_abbreviations {
            if abbr.trim().is_empty() || full.trim().is_empty() {
                return Err(AppError::Vocabulary(format!(
                    "medical_abbreviations entry '{}' -> '{}' must have both sides non-empty",
                    abbr, full
                )));
            }
        }

        Ok(())
    }

    /// Parse a vocabulary from JSON text
    pub fn from_json(content: &str) -> AppResult<Self> {
        let vocabulary: Self = serde_json::from_str(content)?;
        vocabulary.validate()?;
        Ok(vocabulary)
    }
}

/// Loads the vocabulary at `path`, writing the built-in default there first if
/// the file does not exist.
///
/// # Errors
///
/// A file that exists but does not parse is an error; it is never silently
/// replaced by the default. Failing to persist the default is only logged.
pub fn load_or_init(path: impl AsRef<Path>) -> AppResult<Arc<MedicalVocabulary>> {
    let path = path.as_ref();

    match fs::read_to_string(path) {
        Ok(content) => {
            let vocabulary = MedicalVocabulary::from_json(&content).map_err(|e| {
                error_logging::log_config_error(&e, "MEDICAL_TERMS_PATH", "load_vocabulary");
                AppError::Vocabulary(format!("{} ({})", e, path.display()))
            })?;
            info!(
                path = %path.display(),
                medications = vocabulary.medications.len(),
                lab_tests = vocabulary.lab_test_names.len(),
                abbreviations = vocabulary.medical_abbreviations.len(),
                "Loaded medical vocabulary"
            );
            Ok(Arc::new(vocabulary))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let vocabulary = MedicalVocabulary::default();
            if let Err(write_err) = write_vocabulary(path, &vocabulary) {
                warn!(
                    path = %path.display(),
                    error = %write_err,
                    "Could not persist default medical vocabulary"
                );
            } else {
                info!(path = %path.display(), "Wrote default medical vocabulary");
            }
            Ok(Arc::new(vocabulary))
        }
        Err(e) => Err(AppError::FileSystem(format!(
            "Failed to read vocabulary '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// Writes a vocabulary as pretty-printed JSON.
pub fn write_vocabulary(path: impl AsRef<Path>, vocabulary: &MedicalVocabulary) -> AppResult<()> {
    let json = serde_json::to_string_pretty(vocabulary)?;
    fs::write(path, json)?;
    Ok(())
}
