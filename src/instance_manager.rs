//! # OCR Instance Manager Module
//!
//! Thread-safe pool of Tesseract instances. Creating a Tesseract instance loads
//! the trained language data from disk, so instances are built once per engine
//! mode and reused by every later recognition attempt.
//!
//! Tesseract only reads the engine mode while initializing, so each pooled
//! instance is initialized with its own mode through `init_4`.

use std::collections::HashMap;
use std::ffi::CString;
use std::path::Path;
use std::sync::Arc;

use leptess::capi::{TessOcrEngineMode, TessOcrEngineMode_OEM_DEFAULT, TessOcrEngineMode_OEM_LSTM_ONLY};
use leptess::tesseract::TessApi;
use parking_lot::Mutex;
use tracing::info;

use crate::ocr_config::{EngineMode, OcrConfig};
use crate::ocr_errors::OcrError;

/// Common tessdata installation paths, checked in order.
const TESSDATA_CANDIDATES: [&str; 6] = [
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
    "./tessdata",
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
];

/// Thread-safe OCR instance manager for reusing Tesseract instances
///
/// Instances are keyed by requested engine mode; `None` is the instance left at
/// Tesseract's own defaults and never reconfigured after init. Each instance sits behind its own mutex, so
/// documents processed concurrently serialize only on the instance they share.
pub struct OcrInstanceManager {
    config: OcrConfig,
    tessdata_dir: Option<String>,
    instances: Mutex<HashMap<Option<EngineMode>, Arc<Mutex<TessApi>>>>,
}

impl OcrInstanceManager {
    /// Create a new OCR instance manager
    ///
    /// The tessdata directory is resolved once here. Instances are created
    /// lazily on the first `get_instance()` call for each engine mode.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use medical_ingest::instance_manager::OcrInstanceManager;
    /// use medical_ingest::ocr_config::OcrConfig;
    ///
    /// let manager = OcrInstanceManager::new(OcrConfig::default());
    /// assert_eq!(manager.instance_count(), 0);
    /// ```
    pub fn new(config: OcrConfig) -> Self {
        let tessdata_dir = find_tessdata_dir(config.tessdata_dir.as_deref());
        Self {
            config,
            tessdata_dir,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Directory handed to Tesseract, `None` meaning its compiled-in default.
    pub fn tessdata_dir(&self) -> Option<&str> {
        self.tessdata_dir.as_deref()
    }

    /// Get or create the instance for an engine mode.
    ///
    /// # Errors
    ///
    /// Returns `OcrError::Initialization` when Tesseract cannot load the
    /// configured languages from the tessdata directory under the requested
    /// engine mode.
    pub fn get_instance(&self, engine_mode: Option<EngineMode>) -> Result<Arc<Mutex<TessApi>>, OcrError> {
        if let Some(instance) = self.instances.lock().get(&engine_mode) {
            return Ok(Arc::clone(instance));
        }

        let instance = Arc::new(Mutex::new(self.create_instance(engine_mode)?));

        // Another thread may have raced us here; keep whichever landed first.
        let mut instances = self.instances.lock();
        let stored = instances.entry(engine_mode).or_insert(instance);
        Ok(Arc::clone(stored))
    }

    fn create_instance(&self, engine_mode: Option<EngineMode>) -> Result<TessApi, OcrError> {
        let oem = init_engine_mode(engine_mode);
        info!(
            languages = %self.config.languages,
            tessdata_dir = ?self.tessdata_dir,
            engine_mode = ?engine_mode,
            oem = oem,
            "Creating new Tesseract instance"
        );

        let init_error = |detail: String| {
            OcrError::Initialization(format!(
                "Failed to initialize Tesseract for '{}' (tessdata: {:?}, oem: {}): {}",
                self.config.languages, self.tessdata_dir, oem, detail
            ))
        };

        let datapath = self
            .tessdata_dir
            .as_deref()
            .map(CString::new)
            .transpose()
            .map_err(|e| init_error(e.to_string()))?;
        let language = CString::new(self.config.languages.as_str()).map_err(|e| init_error(e.to_string()))?;

        let mut tess = TessApi::new(self.tessdata_dir.as_deref(), &self.config.languages)
            .map_err(|e| init_error(format!("{:?}", e)))?;
        tess.raw
            .init_4(datapath.as_deref(), Some(language.as_c_str()), oem)
            .map_err(|e| init_error(format!("{:?}", e)))?;

        Ok(tess)
    }

    /// Get the number of cached instances
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }
}

/// Engine mode a pooled instance is initialized with.
///
/// The unconfigured instance (`None`) uses Tesseract's default engine.
pub fn init_engine_mode(engine_mode: Option<EngineMode>) -> TessOcrEngineMode {
    match engine_mode {
        Some(EngineMode::LstmOnly) => TessOcrEngineMode_OEM_LSTM_ONLY,
        Some(EngineMode::Default) | None => TessOcrEngineMode_OEM_DEFAULT,
    }
}

/// Resolves the tessdata directory.
///
/// An explicit directory wins, then `TESSDATA_PREFIX`, then the first common
/// install location that exists. `None` lets Tesseract use its built-in path.
pub fn find_tessdata_dir(explicit: Option<&str>) -> Option<String> {
    if let Some(dir) = explicit {
        return Some(dir.to_string());
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        if !prefix.trim().is_empty() {
            return Some(prefix);
        }
    }

    for path in TESSDATA_CANDIDATES {
        if Path::new(path).is_dir() {
            info!("Using tessdata path: {}", path);
            return Some(path.to_string());
        }
    }

    info!("No tessdata directory found, using Tesseract default");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr_config::ENGINE_PRIORITY;

    #[test]
    fn test_explicit_tessdata_dir_wins() {
        assert_eq!(
            find_tessdata_dir(Some("/srv/models/tessdata")),
            Some("/srv/models/tessdata".to_string())
        );
    }

    #[test]
    fn test_each_engine_mode_gets_its_own_init_mode() {
        assert_eq!(init_engine_mode(Some(EngineMode::LstmOnly)), TessOcrEngineMode_OEM_LSTM_ONLY);
        assert_eq!(init_engine_mode(Some(EngineMode::Default)), TessOcrEngineMode_OEM_DEFAULT);
        assert_eq!(init_engine_mode(None), TessOcrEngineMode_OEM_DEFAULT);

        let modes: Vec<_> = ENGINE_PRIORITY.iter().map(|m| init_engine_mode(Some(*m))).collect();
        assert_ne!(modes[0], modes[1]);
    }

    #[test]
    fn test_init_modes_match_engine_mode_values() {
        for mode in ENGINE_PRIORITY {
            assert_eq!(init_engine_mode(Some(mode)) as u32, mode as u32);
        }
    }

    #[test]
    fn test_manager_starts_empty() {
        let manager = OcrInstanceManager::new(OcrConfig {
            tessdata_dir: Some("/nonexistent/tessdata".to_string()),
            ..OcrConfig::default()
        });
        assert_eq!(manager.instance_count(), 0);
        assert_eq!(manager.tessdata_dir(), Some("/nonexistent/tessdata"));
    }

    #[test]
    fn test_missing_tessdata_is_initialization_error() {
        let manager = OcrInstanceManager::new(OcrConfig {
            tessdata_dir: Some("/nonexistent/tessdata".to_string()),
            ..OcrConfig::default()
        });

        let result = manager.get_instance(None);

        assert!(matches!(result, Err(OcrError::Initialization(_))));
        assert_eq!(manager.instance_count(), 0);
    }
}
