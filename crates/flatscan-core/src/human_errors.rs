// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages.
//
// Every technical error is mapped to plain English with a clear suggestion.
// Severity drives how the capture screen presents it.

use crate::error::FlatscanError;

/// Severity of an error from the user's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Worth trying again as-is.
    Transient,
    /// The user must do something (retake the photo, fix the corners).
    ActionRequired,
    /// Retrying will not help: unsupported input or a bad setting.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the user should try (shown as body text).
    pub suggestion: String,
    /// Whether the system should auto-retry.
    pub retriable: bool,
    /// Severity level (drives icon/colour in UI).
    pub severity: Severity,
}

/// Convert a `FlatscanError` into a `HumanError`.
pub fn humanize_error(err: &FlatscanError) -> HumanError {
    match err {
        // -- Image / geometry errors --
        FlatscanError::InvalidImage(_) => HumanError {
            message: "We couldn't read this image.".into(),
            suggestion: "The file may be damaged or in an unusual format. \
                         Try saving it as a JPEG or PNG first."
                .into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        FlatscanError::EmptyImage { .. } => HumanError {
            message: "The photo is empty.".into(),
            suggestion: "Take the picture again, making sure the camera can see the page.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FlatscanError::InvalidGeometry(_) => HumanError {
            message: "The page corners don't make a usable shape.".into(),
            suggestion: "Drag the four corner handles onto the corners of the page, then try again."
                .into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FlatscanError::InvalidConfig(detail) => HumanError {
            message: "A scan setting is out of range.".into(),
            suggestion: format!("Reset the scan settings to their defaults. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        // -- Collaborators --
        FlatscanError::Recognition(_) => HumanError {
            message: "Text recognition didn't work on this scan.".into(),
            suggestion: "Try scanning the document again with better lighting, \
                         making sure the text is clear and in focus."
                .into(),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Orchestration --
        FlatscanError::Cancelled => HumanError {
            message: "The scan was discarded.".into(),
            suggestion: "Take a new picture when you're ready.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FlatscanError::Worker(_) => HumanError {
            message: "Processing the scan stopped unexpectedly.".into(),
            suggestion: "Try again. If this keeps happening, please report it.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        // -- Storage --
        FlatscanError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound => HumanError {
                message: "The file couldn't be found.".into(),
                suggestion: "It may have been moved or deleted. Try choosing the file again."
                    .into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            std::io::ErrorKind::PermissionDenied => HumanError {
                message: "The app doesn't have permission to use that file.".into(),
                suggestion: "Check the file permissions, \
                             or try copying the file to a different location first."
                    .into(),
                retriable: false,
                severity: Severity::ActionRequired,
            },
            _ => HumanError {
                message: "There was a problem reading or writing a file.".into(),
                suggestion: "Try again. If this keeps happening, your device's storage may be full."
                    .into(),
                retriable: true,
                severity: Severity::Transient,
            },
        },

        FlatscanError::Serialization(_) => HumanError {
            message: "The settings file couldn't be read.".into(),
            suggestion: "The file may be damaged. Recreate it with the default settings.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}
