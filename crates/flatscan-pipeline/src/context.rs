// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan context — builds the document components once from a validated
// configuration and hands them to the preview and capture workers.
//
// There is no global state: callers create one context at startup, share it
// as `Arc<ScanContext>`, and call `shutdown` when the scanner closes.

use std::sync::Arc;

use flatscan_core::config::ScanConfig;
use flatscan_core::error::{FlatscanError, Result};
use flatscan_document::{
    BoundaryDetector, EnhancementPipeline, PerspectiveRectifier, RasterImage, RecognizedText,
    TextRecognizer,
};
use tracing::{info, instrument};

/// Shared, immutable collaborators for one scanner session.
pub struct ScanContext {
    config: ScanConfig,
    detector: BoundaryDetector,
    rectifier: PerspectiveRectifier,
    enhancer: EnhancementPipeline,
    recognizer: Option<Arc<dyn TextRecognizer>>,
}

impl ScanContext {
    /// Validate `config` and construct the detector, rectifier and
    /// enhancement pipeline. Call once at startup.
    #[instrument(skip_all)]
    pub fn init(config: ScanConfig) -> Result<Self> {
        config.validate()?;
        let enhancer = EnhancementPipeline::new(config.enhancement.clone())?;
        info!(
            block_size = config.enhancement.block_size,
            auto_capture = config.auto_capture.enabled,
            "scan context initialised"
        );
        Ok(Self {
            config,
            detector: BoundaryDetector::new(),
            rectifier: PerspectiveRectifier::new(),
            enhancer,
            recognizer: None,
        })
    }

    /// Attach the text recognition collaborator.
    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        info!(recognizer = recognizer.name(), "text recognizer attached");
        self.recognizer = Some(recognizer);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn detector(&self) -> &BoundaryDetector {
        &self.detector
    }

    pub fn rectifier(&self) -> &PerspectiveRectifier {
        &self.rectifier
    }

    pub fn enhancer(&self) -> &EnhancementPipeline {
        &self.enhancer
    }

    pub fn has_recognizer(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Hand a processed image to the recognizer.
    pub fn recognize(&self, image: &RasterImage) -> Result<RecognizedText> {
        let recognizer = self
            .recognizer
            .as_ref()
            .ok_or_else(|| FlatscanError::Recognition("no recognizer configured".into()))?;
        recognizer.recognize(image)
    }

    /// Tear down the context. Owned collaborators are released here.
    pub fn shutdown(self) {
        info!(
            recognizer = self.recognizer.as_ref().map(|r| r.name().to_owned()),
            "scan context shut down"
        );
    }
}
