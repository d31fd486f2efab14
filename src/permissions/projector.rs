use crate::schema::field_path::{get_at_path, set_at_path, FieldSet, Record};
use log::debug;

/// Reduces a record to the fields a requester is allowed to see.
///
/// Pure and stateless; safe to call from any number of threads.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecordProjector;

impl RecordProjector {
    pub fn new() -> Self {
        Self
    }

    /// Copies the value at every approved path present in `record` into a
    /// fresh record at the same path. Approved paths missing from `record`
    /// are skipped.
    ///
    /// An approved path and one of its descendants may both be approved; the
    /// result then holds the ancestor's whole subtree whichever order they
    /// are applied in.
    pub fn project(&self, record: &Record, approved_fields: &FieldSet) -> Record {
        let mut result = Record::new();
        let mut copied = 0;
        for path in approved_fields {
            if let Some(value) = get_at_path(record, path) {
                set_at_path(&mut result, path, value.clone());
                copied += 1;
            }
        }
        debug!(
            "Projected {} of {} approved fields",
            copied,
            approved_fields.len()
        );
        result
    }
}
