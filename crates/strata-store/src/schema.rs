//! SQL schema definitions.

/// Schema v1: a single ordered key-value table.
///
/// `key` is compared as a BLOB (memcmp), which gives the lexicographic order
/// the ledger's prefix iteration relies on.
pub const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key BLOB PRIMARY KEY,
    value BLOB NOT NULL
) WITHOUT ROWID;
"#;
