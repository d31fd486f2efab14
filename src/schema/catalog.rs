use crate::config::ConfigError;
use crate::schema::field_path::{FieldPath, FieldSet};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Decides which dotted field paths a requester may ask for.
///
/// The registry never hardcodes the record schema; it is handed one of these.
pub trait FieldCatalog: Send + Sync {
    fn is_recognized(&self, path: &str) -> bool;

    /// First member of `fields` that is not recognized, if any.
    fn first_unrecognized<'a>(&self, fields: &'a FieldSet) -> Option<&'a FieldPath> {
        fields.iter().find(|p| !self.is_recognized(&p.as_dotted()))
    }
}

impl<F> FieldCatalog for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_recognized(&self, path: &str) -> bool {
        self(path)
    }
}

/// Fields a clinical record may expose to a requester.
const CLINICAL_FIELDS: &[&str] = &[
    "patientInfo.name",
    "patientInfo.dateOfBirth",
    "patientInfo.gender",
    "patientInfo.bloodType",
    "patientInfo.address",
    "patientInfo.phone",
    "vitals.heartRate",
    "vitals.bloodPressure",
    "vitals.temperature",
    "vitals.respiratoryRate",
    "vitals.oxygenSaturation",
    "vitals.height",
    "vitals.weight",
    "medicalHistory.conditions",
    "medicalHistory.surgeries",
    "medicalHistory.familyHistory",
    "medications",
    "allergies",
    "immunizations",
    "labResults.bloodTests",
    "labResults.urinalysis",
    "labResults.imaging",
    "insurance.provider",
    "insurance.policyNumber",
    "emergencyContact.name",
    "emergencyContact.phone",
    "emergencyContact.relationship",
];

/// A fixed list of recognized dotted paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaFieldCatalog {
    fields: BTreeSet<String>,
}

impl SchemaFieldCatalog {
    /// Builds a catalog, rejecting malformed paths.
    pub fn new<I, S>(fields: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for field in fields {
            let field = field.into();
            FieldPath::parse(&field).map_err(|e| ConfigError::Validation(e.to_string()))?;
            set.insert(field);
        }
        Ok(Self { fields: set })
    }

    /// The built-in clinical record catalog.
    pub fn clinical_default() -> Self {
        Self {
            fields: CLINICAL_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// Loads a catalog from a JSON file of the form `{"fields": ["a.b", ...]}`.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let raw: SchemaFieldCatalog = serde_json::from_str(&content)?;
        let catalog = Self::new(raw.fields)?;
        info!(
            "Loaded field catalog with {} fields from {}",
            catalog.len(),
            path.as_ref().display()
        );
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }
}

impl FieldCatalog for SchemaFieldCatalog {
    fn is_recognized(&self, path: &str) -> bool {
        self.fields.contains(path)
    }
}
