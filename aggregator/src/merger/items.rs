use crate::errors::{AggregatorError, Result};
use crate::executor::UpstreamResponse;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Field holding the item array of a collection response
pub const COLLECTION_FIELD: &str = "value";
/// Field added to every merged item, holding the binding that produced it
pub const PROVENANCE_FIELD: &str = "gateway";

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemDocument {
    pub value: Vec<JsonValue>,
}

/// Concatenates the items of every response.
///
/// A response whose root has a `value` array contributes each element of it;
/// any other object root is a single item. Items keep response order, then
/// upstream order within a response.
pub fn merge_items(responses: Vec<UpstreamResponse>) -> Result<ItemDocument> {
    let mut value = Vec::new();

    for response in responses {
        let root: JsonValue = serde_json::from_slice(&response.body).map_err(|e| {
            AggregatorError::MergeFailed(format!("upstream returned invalid JSON: {e}"))
        })?;
        let provenance = response.binding.to_json();

        for item in collection_items(root)? {
            value.push(with_provenance(item, &provenance)?);
        }
    }

    Ok(ItemDocument { value })
}

fn collection_items(root: JsonValue) -> Result<Vec<JsonValue>> {
    let mut object = match root {
        JsonValue::Object(object) => object,
        other => {
            return Err(AggregatorError::MergeFailed(format!(
                "expected a JSON object, got {}",
                kind(&other)
            )));
        }
    };

    if !matches!(object.get(COLLECTION_FIELD), Some(JsonValue::Array(_))) {
        return Ok(vec![JsonValue::Object(object)]);
    }
    if object.contains_key("nextLink") {
        tracing::debug!("Upstream collection is paged, merging the first page only");
    }
    match object.remove(COLLECTION_FIELD) {
        Some(JsonValue::Array(items)) => Ok(items),
        _ => Ok(Vec::new()),
    }
}

fn with_provenance(item: JsonValue, provenance: &JsonValue) -> Result<JsonValue> {
    match item {
        JsonValue::Object(mut object) => {
            object.insert(PROVENANCE_FIELD.to_string(), provenance.clone());
            Ok(JsonValue::Object(object))
        }
        other => Err(AggregatorError::MergeFailed(format!(
            "collection items must be JSON objects, got {}",
            kind(&other)
        ))),
    }
}

fn kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
