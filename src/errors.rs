//! Error types for the adventures application.
//!
//! This module defines the error taxonomy shared by the store, the screens
//! and the platform collaborators. Some failures are recoverable and are
//! surfaced to the user as an [`Alert`]; the rest propagate.

use std::io;

use thiserror::Error;

use crate::{Alert, Capability};

/// The main error type for the adventures application.
#[derive(Error, Debug)]
pub enum AdventureError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The user (or the system) refused access to a device capability.
    #[error("Permission denied: {capability}")]
    PermissionDenied { capability: Capability },

    /// A forward or reverse geocoding lookup produced no result.
    #[error("No location found for: {query}")]
    GeocodeNotFound { query: String },

    /// The geocoding service failed while answering a lookup.
    #[error("Geocoding service error: {message}")]
    GeocodeService { message: String },

    /// Latitude or longitude outside the valid range.
    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    /// A form action was attempted from a mode that does not allow it.
    #[error("Cannot {action} while {mode}")]
    InvalidTransition { action: &'static str, mode: String },

    /// The draft failed validation on submit.
    #[error("Invalid adventure: {message}")]
    InvalidDraft { message: String },

    /// Adventure with the same ID already exists.
    #[error("Adventure already exists: {id}")]
    AdventureAlreadyExists { id: String },

    /// Adventure was not found when performing an operation.
    #[error("Adventure not found: {id}")]
    AdventureNotFound { id: String },

    /// Every id the store can represent has been handed out.
    #[error("Adventure ids exhausted after {last}")]
    IdsExhausted { last: u64 },

    /// An asynchronous operation was abandoned because its screen went away.
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: &'static str },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl AdventureError {
    /// Returns the user-facing modal for recoverable errors, `None` otherwise.
    pub fn alert(&self) -> Option<Alert> {
        match self {
            AdventureError::PermissionDenied { capability } => {
                Some(Alert::permission_required(*capability))
            }
            AdventureError::GeocodeNotFound { .. } | AdventureError::GeocodeService { .. } => {
                Some(Alert::new(
                    "Erro",
                    "Não foi possível encontrar a localização",
                ))
            }
            _ => None,
        }
    }

    /// Whether the error is recovered locally instead of aborting the flow.
    pub fn is_recoverable(&self) -> bool {
        self.alert().is_some()
    }
}
