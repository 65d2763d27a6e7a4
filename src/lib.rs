//! # Medical Document Ingestion
//!
//! Turns scanned or photographed medical documents into structured facts:
//! the image is conditioned for OCR, recognized with Tesseract under an ordered
//! set of configurations, and the text is mined for dates, patient details,
//! medications, lab values, instructions and diagnoses.

pub mod config;
pub mod errors;
pub mod extraction;
pub mod instance_manager;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod ocr_errors;
pub mod pipeline;
pub mod preprocessing;
pub mod vocabulary;

// Re-export types for easier access
pub use extraction::{Category, DocumentType, EntityExtractor, EntityMap, EntityValue, LabResult};
pub use ocr::{RecognitionBackend, RecognitionEngine, RecognizedText, TesseractBackend};
pub use pipeline::{ExtractionResult, IngestError, Pipeline, RawImage};
