//! Error types for image store access.

use thiserror::Error;

/// Errors returned by an [`ImageStore`](crate::ImageStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The daemon or store cannot be reached.
    #[error("image store unavailable: {0}")]
    Unavailable(String),

    /// The store refused because a container still references the image.
    #[error("{reference} is in use: {message}")]
    InUse { reference: String, message: String },

    /// The image or tag no longer exists.
    #[error("{0} not found")]
    NotFound(String),

    /// Any other refusal reported by the store.
    #[error("image store error {status}: {message}")]
    Api { status: u16, message: String },

    /// The store answered with something we could not interpret.
    #[error("malformed image store response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn in_use(reference: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InUse {
            reference: reference.into(),
            message: message.into(),
        }
    }

    pub fn is_in_use(&self) -> bool {
        matches!(self, Self::InUse { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Stable reason code for logs and reports.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "store_unavailable",
            Self::InUse { .. } => "image_in_use",
            Self::NotFound(_) => "not_found",
            Self::Api { .. } => "store_error",
            Self::Decode(_) => "decode_error",
        }
    }
}
