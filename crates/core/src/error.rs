//! Viewer error taxonomy

use thiserror::Error;

use stripview_render::DocumentError;

use crate::config::ConfigError;

/// Errors surfaced by [`Viewer`](crate::Viewer) operations.
#[derive(Debug, Error)]
pub enum ViewerError {
    /// The document could not be opened. Check for
    /// [`DocumentError::PasswordRequired`] to ask for a password.
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("document has no pages")]
    EmptyDocument,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot start render worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

impl ViewerError {
    pub fn is_password_required(&self) -> bool {
        matches!(self, ViewerError::Document(DocumentError::PasswordRequired))
    }
}

pub type ViewerResult<T> = Result<T, ViewerError>;
