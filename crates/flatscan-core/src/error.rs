// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Flatscan.

use thiserror::Error;

/// Top-level error type for all Flatscan operations.
///
/// "No boundary found" is deliberately absent: detection reports it as
/// `None`, and only the orchestrator decides to substitute a default.
#[derive(Debug, Error)]
pub enum FlatscanError {
    // -- Image / geometry errors --
    #[error("invalid image: {0}")]
    InvalidImage(String),

    #[error("image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Collaborators --
    #[error("text recognition failed: {0}")]
    Recognition(String),

    // -- Orchestration --
    #[error("capture was cancelled")]
    Cancelled,

    #[error("background worker failed: {0}")]
    Worker(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FlatscanError>;
