use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The local store could not be opened or is missing for a guest session.
    #[error("local storage unavailable: {0}")]
    Unavailable(String),

    #[error("no {collection} record with id '{id}'")]
    NotFound { collection: &'static str, id: String },

    #[error("duplicate id '{id}' in {collection}")]
    DuplicateId { collection: &'static str, id: String },

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("no board selected")]
    NoBoardSelected,

    #[error("no active session")]
    NoSession,

    /// Remote call failed; the service response is surfaced verbatim.
    #[error("remote request failed: {0}")]
    Remote(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}
