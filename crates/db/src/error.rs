use thiserror::Error;

use crate::DocumentId;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failures raised by the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cast to document id failed for value \"{0}\"")]
    InvalidId(String),

    #[error("No document found for id \"{id}\" in collection \"{collection}\"")]
    DocumentNotFound { id: DocumentId, collection: String },

    #[error("{collection} validation failed: {reason}")]
    Schema { collection: String, reason: String },

    #[error("field path '{0}' is not a plain identifier")]
    InvalidField(&'static str),

    #[error("failed to format timestamp: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error(transparent)]
    Surreal(#[from] surrealdb::Error),
}
