pub mod catalog;
pub mod field_path;

pub use catalog::{FieldCatalog, SchemaFieldCatalog};
pub use field_path::{get_at_path, set_at_path, FieldPath, FieldSet, Record};
