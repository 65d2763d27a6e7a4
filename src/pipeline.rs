//! # Ingestion Pipeline
//!
//! Sequences image conditioning, text recognition and entity extraction for a
//! single document. The coordinator holds only shared, read-only collaborators,
//! so one [`Pipeline`] can serve many documents at once.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use image::ImageFormat;
use serde::Serialize;
use tracing::info;

use crate::extraction::{DocumentType, EntityExtractor, EntityMap};
use crate::ocr::{RecognitionEngine, RecognizedText};
use crate::ocr_errors::OcrError;
use crate::preprocessing::{ConditioningPath, ImageConditioner, PreprocessingError};

/// Raw document bytes plus the format the caller believes they are in.
#[derive(Debug, Clone)]
pub struct RawImage {
    bytes: Vec<u8>,
    declared_format: Option<ImageFormat>,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>, declared_format: Option<ImageFormat>) -> Self {
        Self {
            bytes,
            declared_format,
        }
    }

    /// Reads a file, declaring the format implied by its extension.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let declared_format = ImageFormat::from_path(path).ok();
        Ok(Self::new(bytes, declared_format))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn declared_format(&self) -> Option<ImageFormat> {
        self.declared_format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Failures that cross the pipeline boundary.
#[derive(Debug, Clone)]
pub enum IngestError {
    /// The bytes are not an image any decode path understands
    Decode(PreprocessingError),
    /// The recognition backend could not be invoked at all
    Environment(OcrError),
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Decode(e) => write!(f, "[DECODE] {}", e),
            IngestError::Environment(e) => write!(f, "[ENVIRONMENT] {}", e),
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IngestError::Decode(e) => Some(e),
            IngestError::Environment(e) => Some(e),
        }
    }
}

/// Terminal artifact of one ingestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub document_type: DocumentType,
    pub conditioning: ConditioningPath,
    pub recognized: RecognizedText,
    pub entities: EntityMap,
}

/// Pipeline coordinator.
#[derive(Clone)]
pub struct Pipeline {
    conditioner: Arc<ImageConditioner>,
    engine: Arc<RecognitionEngine>,
    extractor: Arc<EntityExtractor>,
}

impl Pipeline {
    pub fn new(conditioner: ImageConditioner, engine: RecognitionEngine, extractor: EntityExtractor) -> Self {
        Self {
            conditioner: Arc::new(conditioner),
            engine: Arc::new(engine),
            extractor: Arc::new(extractor),
        }
    }

    pub fn engine(&self) -> &RecognitionEngine {
        &self.engine
    }

    /// Ingests one document.
    ///
    /// # Errors
    ///
    /// `IngestError::Decode` when the bytes cannot be decoded, and
    /// `IngestError::Environment` when the recognition backend is unusable.
    /// Every other problem degrades the result instead of failing it.
    pub fn ingest(&self, raw: RawImage, document_type: DocumentType) -> Result<ExtractionResult, IngestError> {
        let span = crate::observability::ingest_span(document_type.as_str(), raw.len());
        let _guard = span.enter();
        let start_time = Instant::now();

        let conditioned = self.conditioner.condition(&raw).map_err(IngestError::Decode)?;
        drop(raw);

        let recognized = {
            let _ocr = crate::observability::ocr_span("recognize").entered();
            self.engine.recognize(&conditioned).map_err(IngestError::Environment)?
        };

        let entities = {
            let _extraction = crate::observability::extraction_span(document_type.as_str()).entered();
            self.extractor.extract(&recognized.text, document_type)
        };

        let duration = start_time.elapsed();
        crate::observability::record_ingest_metrics(document_type.as_str(), duration);
        info!(
            document_type = %document_type,
            conditioning = conditioned.path.as_str(),
            profile = %recognized.profile_label(),
            categories = entities.len(),
            "Document ingested in {}ms",
            duration.as_millis()
        );

        Ok(ExtractionResult {
            document_type,
            conditioning: conditioned.path,
            recognized,
            entities,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::Category;
    use crate::ocr::{RecognitionBackend, SENTINEL_TEXT};
    use crate::ocr_config::RecognitionProfile;
    use crate::vocabulary::MedicalVocabulary;
    use image::{DynamicImage, GrayImage, Luma};
    use std::io::Cursor;

    struct FixedBackend(Result<String, OcrError>);

    impl RecognitionBackend for FixedBackend {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _image: &GrayImage, _profile: Option<RecognitionProfile>) -> Result<String, OcrError> {
            self.0.clone()
        }
    }

    fn pipeline(backend: FixedBackend) -> Pipeline {
        let extractor = EntityExtractor::new(Arc::new(MedicalVocabulary::default()), None).unwrap();
        Pipeline::new(
            ImageConditioner::default(),
            RecognitionEngine::new(Arc::new(backend), 10),
            extractor,
        )
    }

    fn png() -> RawImage {
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(GrayImage::from_pixel(30, 30, Luma([255])))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        RawImage::new(bytes, Some(ImageFormat::Png))
    }

    #[test]
    fn test_ingest_runs_all_stages() {
        let pipeline = pipeline(FixedBackend(Ok("Glucose: 95 mg/dL\nHemoglobin: 13.2 g/dL".to_string())));

        let result = pipeline.ingest(png(), DocumentType::LabReport).unwrap();

        assert_eq!(result.conditioning, ConditioningPath::Normal);
        assert!(result.recognized.profile.is_some());
        assert_eq!(
            result.entities.get(&Category::LabResults).and_then(|v| v.as_lab_results()).map(|r| r.len()),
            Some(2)
        );
    }

    #[test]
    fn test_empty_buffer_is_decode_error() {
        let pipeline = pipeline(FixedBackend(Ok("unused".to_string())));

        let result = pipeline.ingest(RawImage::new(Vec::new(), None), DocumentType::Other);

        assert!(matches!(result, Err(IngestError::Decode(_))));
    }

    #[test]
    fn test_unreachable_backend_is_environment_error() {
        let pipeline = pipeline(FixedBackend(Err(OcrError::Initialization("no tessdata".to_string()))));

        let result = pipeline.ingest(png(), DocumentType::Other);

        assert!(matches!(result, Err(IngestError::Environment(_))));
    }

    #[test]
    fn test_sentinel_text_flows_through_extraction() {
        let pipeline = pipeline(FixedBackend(Ok(String::new())));

        let result = pipeline.ingest(png(), DocumentType::Other).unwrap();

        assert_eq!(result.recognized.text, SENTINEL_TEXT);
        assert!(result.entities.is_empty());
    }

    #[test]
    fn test_raw_image_from_path_declares_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.png");
        std::fs::write(&path, png().bytes()).unwrap();

        let raw = RawImage::from_path(&path).unwrap();

        assert_eq!(raw.declared_format(), Some(ImageFormat::Png));
        assert!(!raw.is_empty());
    }
}
