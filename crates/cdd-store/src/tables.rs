//! Table and key definitions for the attribute store.

use redb::TableDefinition;

/// Single key-value table holding the serialized dictionary datasets.
pub const METADATA_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("cdd_metadata");

/// Key for the full list of default attribute records.
pub const ATTRIBUTES_KEY: &str = "clinical_attributes";

/// Key for the per-study override map.
pub const OVERRIDES_KEY: &str = "clinical_attribute_overrides";
