// Core database operations
pub mod core;
mod consent_operations;
mod record_operations;


// Re-export the main DbOperations struct
pub use core::DbOperations;
pub use record_operations::content_id_for;
