//! Per-partition entity declarations.
//!
//! # Responsibility
//! - Declare the partition name, business key and field order of each
//!   entity type.
//! - Provide the single business-key extraction used by every merge path.
//!
//! # Invariants
//! - Each entity type declares exactly one business key.
//! - Partition names are unique across the built-in schemas.

use crate::model::record::Record;

/// How the domain identifies "the same entity" across seed and overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusinessKey {
    /// The record id itself is the business key.
    RecordId,
    /// A named field holds the business key.
    Field(&'static str),
}

/// Static declaration of one entity type and its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySchema {
    /// Partition name; also the durable storage key.
    pub partition: &'static str,
    pub business_key: BusinessKey,
    /// Domain fields in export column order (`id` and `createdAt` excluded).
    pub fields: &'static [&'static str],
    /// Domain fields holding dates, normalized on import.
    pub timestamp_fields: &'static [&'static str],
}

impl EntitySchema {
    /// Extracts the business key of `record`.
    ///
    /// Returns `None` when the key field is absent or blank; such records
    /// never collide with anything.
    pub fn business_key_of(&self, record: &Record) -> Option<String> {
        let key = match self.business_key {
            BusinessKey::RecordId => record.id.as_str().trim().to_string(),
            BusinessKey::Field(name) => record.text(name)?.trim().to_string(),
        };
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }

    /// Returns whether `name` is a date-like field of this schema.
    pub fn is_timestamp_field(&self, name: &str) -> bool {
        self.timestamp_fields.contains(&name)
    }

    /// Looks up a built-in schema by partition name.
    pub fn by_partition(partition: &str) -> Option<&'static EntitySchema> {
        BUILTIN_SCHEMAS
            .iter()
            .copied()
            .find(|schema| schema.partition == partition.trim())
    }
}

pub const ORGANIZERS: EntitySchema = EntitySchema {
    partition: "organizers",
    business_key: BusinessKey::Field("organizerNumber"),
    fields: &[
        "organizerNumber",
        "company",
        "contactName",
        "phone",
        "email",
        "city",
        "licenseExpiry",
        "status",
        "logoUrl",
    ],
    timestamp_fields: &["licenseExpiry"],
};

pub const EMPLOYEES: EntitySchema = EntitySchema {
    partition: "employees",
    business_key: BusinessKey::RecordId,
    fields: &[
        "fullName",
        "department",
        "position",
        "phone",
        "email",
        "nationality",
        "hireDate",
        "salary",
        "status",
        "photoUrl",
    ],
    timestamp_fields: &["hireDate"],
};

/// HR module keeps its own employee partition with the same shape.
pub const HR_EMPLOYEES: EntitySchema = EntitySchema {
    partition: "hr_employees",
    ..EMPLOYEES
};

/// Simplified passport storage containers used by passport intake.
pub const PASSPORT_CONTAINERS: EntitySchema = EntitySchema {
    partition: "passport_containers",
    business_key: BusinessKey::Field("containerNumber"),
    fields: &["containerNumber", "location", "capacity", "stored", "status"],
    timestamp_fields: &[],
};

pub const BUILTIN_SCHEMAS: &[&EntitySchema] =
    &[&ORGANIZERS, &EMPLOYEES, &HR_EMPLOYEES, &PASSPORT_CONTAINERS];
