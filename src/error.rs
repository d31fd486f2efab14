//! Error types for consent and access-control operations.
//!
//! Every business-rule rejection is a distinct [`ConsentError`] variant that
//! carries the identifiers involved, so an API layer can render an actionable
//! message. Faults raised by the persistence or record-store collaborators are
//! wrapped in [`ConsentError::StorageFailure`] and propagated unchanged.

use thiserror::Error;

/// Result type alias for consent operations.
pub type ConsentResult<T> = Result<T, ConsentError>;

/// Result type alias for store collaborator operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Faults raised by the persistence and record-store collaborators.
///
/// These are the only errors treated as unexpected. The registry performs no
/// retries when it sees one.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The underlying sled database reported an error
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    /// A stored item could not be serialized or deserialized
    #[error("Serialization error for {context}: {source}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A multi-tree transaction could not be committed
    #[error("Transaction aborted: {0}")]
    Transaction(String),

    /// A lock guarding store state was poisoned by a panicking writer
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// Stored bytes violate an internal invariant (e.g. a dangling index entry)
    #[error("Corrupted store state: {0}")]
    Corrupted(String),
}

impl StorageError {
    /// Create a serialization error closure for use with `map_err`
    pub fn serialization(context: &str) -> impl FnOnce(serde_json::Error) -> Self + '_ {
        move |source| Self::Serialization {
            context: context.to_string(),
            source,
        }
    }
}

/// Unified error type for the consent subsystem.
#[derive(Error, Debug)]
pub enum ConsentError {
    /// A dotted field path contained an empty segment
    #[error("Invalid field path '{path}': segments must be non-empty")]
    InvalidFieldPath { path: String },

    /// The holder already has an active grant with this requester
    #[error("Holder {holder_id} is already connected with requester {requester_id}")]
    AlreadyConnected {
        holder_id: String,
        requester_id: String,
    },

    /// No active grant exists between the pair
    #[error("No active connection between holder {holder_id} and requester {requester_id}")]
    NoActiveConnection {
        holder_id: String,
        requester_id: String,
    },

    /// A pending request already exists for the pair
    #[error("Requester {requester_id} already has pending request {request_id} for holder {holder_id}")]
    DuplicateRequest {
        holder_id: String,
        requester_id: String,
        request_id: String,
    },

    /// A request named no fields
    #[error("Requested field set must not be empty")]
    EmptyFieldSet,

    /// A requested path is not in the recognized-field catalog
    #[error("Unknown field '{field}'")]
    UnknownField { field: String },

    /// The addressed request or grant does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The caller is not the party entitled to act on the request
    #[error("Caller {caller_id} does not own request {request_id}")]
    NotOwner {
        caller_id: String,
        request_id: String,
    },

    /// Only pending requests can be cancelled
    #[error("Request {request_id} is {status}, only pending requests can be cancelled")]
    NotPending { request_id: String, status: String },

    /// A resolved request cannot be resolved again
    #[error("Request {request_id} was already resolved as {status}")]
    AlreadyResolved { request_id: String, status: String },

    /// The current grant for the pair is already revoked
    #[error("Grant between holder {holder_id} and requester {requester_id} is already revoked")]
    AlreadyRevoked {
        holder_id: String,
        requester_id: String,
    },

    /// The holder has never uploaded a record
    #[error("Holder {holder_id} has not uploaded a record")]
    NoRecordUploaded { holder_id: String },

    /// The record store could not return the holder's record
    #[error("Record {content_id} for holder {holder_id} is unavailable: {reason}")]
    RecordUnavailable {
        holder_id: String,
        content_id: String,
        reason: String,
    },

    /// A store collaborator failed
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] StorageError),
}

/// Stable, machine-readable classification of a [`ConsentError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidFieldPath,
    AlreadyConnected,
    NoActiveConnection,
    DuplicateRequest,
    EmptyFieldSet,
    UnknownField,
    NotFound,
    NotOwner,
    NotPending,
    AlreadyResolved,
    AlreadyRevoked,
    NoRecordUploaded,
    RecordUnavailable,
    StorageFailure,
}

impl ErrorKind {
    /// Code string suitable for API responses
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::InvalidFieldPath => "INVALID_FIELD_PATH",
            ErrorKind::AlreadyConnected => "ALREADY_CONNECTED",
            ErrorKind::NoActiveConnection => "NO_ACTIVE_CONNECTION",
            ErrorKind::DuplicateRequest => "DUPLICATE_REQUEST",
            ErrorKind::EmptyFieldSet => "EMPTY_FIELD_SET",
            ErrorKind::UnknownField => "UNKNOWN_FIELD",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::NotOwner => "NOT_OWNER",
            ErrorKind::NotPending => "NOT_PENDING",
            ErrorKind::AlreadyResolved => "ALREADY_RESOLVED",
            ErrorKind::AlreadyRevoked => "ALREADY_REVOKED",
            ErrorKind::NoRecordUploaded => "NO_RECORD_UPLOADED",
            ErrorKind::RecordUnavailable => "RECORD_UNAVAILABLE",
            ErrorKind::StorageFailure => "STORAGE_FAILURE",
        }
    }
}

impl ConsentError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsentError::InvalidFieldPath { .. } => ErrorKind::InvalidFieldPath,
            ConsentError::AlreadyConnected { .. } => ErrorKind::AlreadyConnected,
            ConsentError::NoActiveConnection { .. } => ErrorKind::NoActiveConnection,
            ConsentError::DuplicateRequest { .. } => ErrorKind::DuplicateRequest,
            ConsentError::EmptyFieldSet => ErrorKind::EmptyFieldSet,
            ConsentError::UnknownField { .. } => ErrorKind::UnknownField,
            ConsentError::NotFound { .. } => ErrorKind::NotFound,
            ConsentError::NotOwner { .. } => ErrorKind::NotOwner,
            ConsentError::NotPending { .. } => ErrorKind::NotPending,
            ConsentError::AlreadyResolved { .. } => ErrorKind::AlreadyResolved,
            ConsentError::AlreadyRevoked { .. } => ErrorKind::AlreadyRevoked,
            ConsentError::NoRecordUploaded { .. } => ErrorKind::NoRecordUploaded,
            ConsentError::RecordUnavailable { .. } => ErrorKind::RecordUnavailable,
            ConsentError::StorageFailure(_) => ErrorKind::StorageFailure,
        }
    }

    /// Whether this error is a business-rule rejection rather than a store fault
    pub fn is_rejection(&self) -> bool {
        !matches!(self, ConsentError::StorageFailure(_))
    }

    pub(crate) fn request_not_found(request_id: &str) -> Self {
        ConsentError::NotFound {
            entity: "Access request",
            id: request_id.to_string(),
        }
    }

    pub(crate) fn grant_not_found(holder_id: &str, requester_id: &str) -> Self {
        ConsentError::NotFound {
            entity: "Consent grant",
            id: format!("{holder_id}/{requester_id}"),
        }
    }
}
