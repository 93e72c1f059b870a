//! Proptest strategies for wire-format fields

use proptest::prelude::*;

/// Document identifiers as the upload side produces them
pub fn document_id_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9]{1,12}",
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
    ]
}

/// Object keys: path-like, no delimiter
pub fn object_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_./ -]{1,64}"
}

/// Any field content that does not contain the delimiter, including empty
pub fn field_strategy() -> impl Strategy<Value = String> {
    "[^|]{0,32}"
}
