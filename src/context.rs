use std::collections::HashMap;

use mongodb::bson::Bson;

/// Key-value attributes describing the subject of an evaluation (user,
/// request, device). Values are dynamically typed; rules inspect only the
/// keys they name and ignore everything else.
pub type EvaluationContext = HashMap<String, Bson>;

/// Serde default for value fields that may be omitted on the wire.
pub(crate) fn bson_null() -> Bson {
    Bson::Null
}
