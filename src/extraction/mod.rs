//! # Medical Entity Extraction
//!
//! Turns recognized document text into an [`EntityMap`]: one entry per field
//! category (dates, patient info, medications, ...). Which categories run is
//! decided by the declared [`DocumentType`], and a category is present in the
//! result only when its extractor found something.
//!
//! Extraction never fails outward. If an extractor faults, the whole result
//! collapses to a single `raw_text` entry carrying the input text.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::debug;

use crate::errors::error_logging;
use crate::vocabulary::MedicalVocabulary;

pub mod extractors;
pub mod recognizer;

pub use extractors::VocabularyPatterns;
pub use recognizer::{EntityRecognizer, LexiconRecognizer, NamedEntity};

/// Errors raised inside extraction.
#[derive(Debug, Clone)]
pub enum ExtractionError {
    /// A vocabulary-derived pattern failed to compile
    Pattern(String),
    /// The named-entity recognizer failed
    Recognizer(String),
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::Pattern(msg) => write!(f, "[EXTRACT_PATTERN] {}", msg),
            ExtractionError::Recognizer(msg) => write!(f, "[EXTRACT_NER] {}", msg),
        }
    }
}

impl std::error::Error for ExtractionError {}

impl From<regex::Error> for ExtractionError {
    fn from(err: regex::Error) -> Self {
        ExtractionError::Pattern(err.to_string())
    }
}

/// Declared kind of medical document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Prescription,
    LabReport,
    MedicalNote,
    /// Anything else, including unspecified; runs every extractor
    Other,
}

impl DocumentType {
    /// Interprets a free-form tag. Unknown tags map to `Other`.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "prescription" => DocumentType::Prescription,
            "lab_report" => DocumentType::LabReport,
            "medical_note" => DocumentType::MedicalNote,
            _ => DocumentType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Prescription => "prescription",
            DocumentType::LabReport => "lab_report",
            DocumentType::MedicalNote => "medical_note",
            DocumentType::Other => "other",
        }
    }

    /// Categories extracted for this document type, in run order.
    pub fn categories(&self) -> &'static [Category] {
        use Category::*;
        match self {
            DocumentType::Prescription => &[Dates, PatientInfo, Medications, DoctorInfo, Instructions],
            DocumentType::LabReport => &[Dates, PatientInfo, LabResults, DoctorInfo],
            DocumentType::MedicalNote => &[Dates, PatientInfo, Diagnoses, DoctorInfo, Medications],
            DocumentType::Other => &[
                Dates,
                PatientInfo,
                Medications,
                DoctorInfo,
                Instructions,
                LabResults,
                Diagnoses,
            ],
        }
    }
}

impl From<&str> for DocumentType {
    fn from(tag: &str) -> Self {
        DocumentType::parse(tag)
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named slice of extraction output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Dates,
    PatientInfo,
    Medications,
    DoctorInfo,
    LabResults,
    Instructions,
    Diagnoses,
    /// Only present when extraction degraded
    RawText,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Dates => "dates",
            Category::PatientInfo => "patient_info",
            Category::Medications => "medications",
            Category::DoctorInfo => "doctor_info",
            Category::LabResults => "lab_results",
            Category::Instructions => "instructions",
            Category::Diagnoses => "diagnoses",
            Category::RawText => "raw_text",
        }
    }
}

/// One lab measurement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabResult {
    pub test: String,
    pub value: String,
    pub unit: String,
}

/// Value stored under a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum EntityValue {
    Text(String),
    Fields(BTreeMap<String, String>),
    Items(Vec<String>),
    LabResults(Vec<LabResult>),
}

impl EntityValue {
    pub fn is_empty(&self) -> bool {
        match self {
            EntityValue::Text(text) => text.is_empty(),
            EntityValue::Fields(fields) => fields.is_empty(),
            EntityValue::Items(items) => items.is_empty(),
            EntityValue::LabResults(results) => results.is_empty(),
        }
    }

    pub fn as_items(&self) -> Option<&[String]> {
        match self {
            EntityValue::Items(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_fields(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            EntityValue::Fields(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_lab_results(&self) -> Option<&[LabResult]> {
        match self {
            EntityValue::LabResults(results) => Some(results),
            _ => None,
        }
    }
}

/// Category to non-empty value.
pub type EntityMap = BTreeMap<Category, EntityValue>;

/// Document-type aware entity extractor.
///
/// Holds the vocabulary-derived patterns and an optional named-entity
/// recognizer. Immutable after construction; safe to share between threads.
#[derive(Clone)]
pub struct EntityExtractor {
    patterns: Arc<VocabularyPatterns>,
    recognizer: Option<Arc<dyn EntityRecognizer>>,
}

impl EntityExtractor {
    /// Compiles the vocabulary patterns.
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::Pattern` if a vocabulary term produces a
    /// pattern the regex engine rejects (for example one exceeding the size
    /// limit).
    pub fn new(
        vocabulary: Arc<MedicalVocabulary>,
        recognizer: Option<Arc<dyn EntityRecognizer>>,
    ) -> Result<Self, ExtractionError> {
        let patterns = VocabularyPatterns::compile(&vocabulary)?;
        Ok(Self {
            patterns: Arc::new(patterns),
            recognizer,
        })
    }

    pub fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Extracts every category that applies to `document_type`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use medical_ingest::extraction::{Category, DocumentType, EntityExtractor};
    /// use medical_ingest::vocabulary::MedicalVocabulary;
    ///
    /// let extractor = EntityExtractor::new(Arc::new(MedicalVocabulary::default()), None).unwrap();
    /// let entities = extractor.extract("Glucose: 95 mg/dL", DocumentType::LabReport);
    /// assert!(entities.contains_key(&Category::LabResults));
    /// assert!(!entities.contains_key(&Category::Medications));
    /// ```
    pub fn extract(&self, text: &str, document_type: DocumentType) -> EntityMap {
        let start_time = Instant::now();

        match self.try_extract(text, document_type) {
            Ok(entities) => {
                debug!(
                    document_type = %document_type,
                    categories = entities.len(),
                    "Extraction completed in {}ms",
                    start_time.elapsed().as_millis()
                );
                entities
            }
            Err(e) => {
                error_logging::log_extraction_error(&e, document_type.as_str(), text.len());
                crate::observability::record_extraction_degraded(document_type.as_str());
                let mut degraded = EntityMap::new();
                degraded.insert(Category::RawText, EntityValue::Text(text.to_string()));
                degraded
            }
        }
    }

    fn try_extract(&self, text: &str, document_type: DocumentType) -> Result<EntityMap, ExtractionError> {
        let categories = document_type.categories();
        let entities = match &self.recognizer {
            Some(recognizer) if reads_named_entities(categories) => recognizer.recognize(text)?,
            _ => Vec::new(),
        };

        let mut results = EntityMap::new();
        for category in categories {
            let value = self.run_category(*category, text, &entities);
            if !value.is_empty() {
                results.insert(*category, value);
            }
        }
        Ok(results)
    }

    fn run_category(&self, category: Category, text: &str, entities: &[NamedEntity]) -> EntityValue {
        let patterns = self.patterns.as_ref();
        match category {
            Category::Dates => EntityValue::Items(extractors::extract_dates(text)),
            Category::PatientInfo => EntityValue::Fields(extractors::extract_patient_info(text)),
            Category::Medications => {
                EntityValue::Items(extractors::extract_medications(text, patterns, entities))
            }
            Category::DoctorInfo => EntityValue::Fields(extractors::extract_doctor_info(text)),
            Category::LabResults => EntityValue::LabResults(extractors::extract_lab_results(text, patterns)),
            Category::Instructions => EntityValue::Items(extractors::extract_instructions(text, patterns)),
            Category::Diagnoses => EntityValue::Items(extractors::extract_diagnoses(text, entities)),
            Category::RawText => EntityValue::Text(text.to_string()),
        }
    }
}

/// Only medications and diagnoses consume named entities.
fn reads_named_entities(categories: &[Category]) -> bool {
    categories
        .iter()
        .any(|c| matches!(c, Category::Medications | Category::Diagnoses))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingRecognizer;

    impl EntityRecognizer for FailingRecognizer {
        fn name(&self) -> &str {
            "failing"
        }

        fn recognize(&self, _text: &str) -> Result<Vec<NamedEntity>, ExtractionError> {
            Err(ExtractionError::Recognizer("model unavailable".to_string()))
        }
    }

    fn extractor() -> EntityExtractor {
        EntityExtractor::new(Arc::new(MedicalVocabulary::default()), None).unwrap()
    }

    #[test]
    fn test_document_type_parsing() {
        assert_eq!(DocumentType::parse("prescription"), DocumentType::Prescription);
        assert_eq!(DocumentType::parse(" Lab_Report "), DocumentType::LabReport);
        assert_eq!(DocumentType::parse("medical_note"), DocumentType::MedicalNote);
        assert_eq!(DocumentType::parse("discharge_summary"), DocumentType::Other);
        assert_eq!(DocumentType::parse(""), DocumentType::Other);
    }

    #[test]
    fn test_other_runs_all_seven_categories() {
        assert_eq!(DocumentType::Other.categories().len(), 7);
        assert!(!DocumentType::Other.categories().contains(&Category::RawText));
    }

    #[test]
    fn test_every_type_runs_dates_and_patient_info() {
        for doc in [
            DocumentType::Prescription,
            DocumentType::LabReport,
            DocumentType::MedicalNote,
            DocumentType::Other,
        ] {
            assert!(doc.categories().contains(&Category::Dates));
            assert!(doc.categories().contains(&Category::PatientInfo));
        }
    }

    #[test]
    fn test_whitespace_text_yields_empty_map() {
        let entities = extractor().extract("   \n\t  ", DocumentType::Other);
        assert!(entities.is_empty());
    }

    #[test]
    fn test_recognizer_fault_collapses_to_raw_text() {
        let recognizer: Arc<dyn EntityRecognizer> = Arc::new(FailingRecognizer);
        let extractor =
            EntityExtractor::new(Arc::new(MedicalVocabulary::default()), Some(recognizer)).unwrap();
        let text = "Patient: John Smith\nDOB: 01/02/1980";

        let entities = extractor.extract(text, DocumentType::Prescription);

        assert_eq!(entities.len(), 1);
        assert_eq!(
            entities.get(&Category::RawText),
            Some(&EntityValue::Text(text.to_string()))
        );
    }

    #[test]
    fn test_lab_report_never_calls_recognizer() {
        let recognizer: Arc<dyn EntityRecognizer> = Arc::new(FailingRecognizer);
        let extractor =
            EntityExtractor::new(Arc::new(MedicalVocabulary::default()), Some(recognizer)).unwrap();

        let entities = extractor.extract("Glucose: 95 mg/dL", DocumentType::LabReport);

        assert!(entities.contains_key(&Category::LabResults));
        assert!(!entities.contains_key(&Category::RawText));
    }

    #[test]
    fn test_named_entity_consumers() {
        assert!(!reads_named_entities(DocumentType::LabReport.categories()));
        assert!(reads_named_entities(DocumentType::Prescription.categories()));
        assert!(reads_named_entities(DocumentType::MedicalNote.categories()));
        assert!(reads_named_entities(DocumentType::Other.categories()));
    }

    #[test]
    fn test_entity_map_serializes_with_category_names() {
        let entities = extractor().extract("Glucose: 95 mg/dL", DocumentType::LabReport);
        let json = serde_json::to_value(&entities).unwrap();

        assert_eq!(json["lab_results"][0]["test"], "Glucose");
        assert_eq!(json["lab_results"][0]["value"], "95");
        assert_eq!(json["lab_results"][0]["unit"], "mg/dL");
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let text = "Dr. Jane Doe\nTake Aspirin 81 mg daily\nDiagnosis: Hypertension";
        let extractor = extractor();
        assert_eq!(
            extractor.extract(text, DocumentType::Other),
            extractor.extract(text, DocumentType::Other)
        );
    }
}
