use serde::{Deserialize, Serialize};

/// Error body returned by the API for every non-2xx response.
///
/// `detail` is a plain string for business-rule rejections ("No active meal
/// plan...") and a list of `{loc, msg, type}` items for request validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: serde_json::Value,
}

impl ErrorBody {
    /// Flatten `detail` into text suitable for showing to the user verbatim.
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            serde_json::Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
            serde_json::Value::Array(items) if !items.is_empty() => Some(
                items
                    .iter()
                    .map(validation_item_message)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            serde_json::Value::Object(map) => map
                .get("message")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            _ => None,
        }
    }
}

fn validation_item_message(item: &serde_json::Value) -> String {
    let msg = item
        .get("msg")
        .and_then(|v| v.as_str())
        .unwrap_or("invalid value");
    let field = item.get("loc").and_then(|v| v.as_array()).map(|loc| {
        loc.iter()
            .filter(|part| part.as_str() != Some("body"))
            .map(|part| match part {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    });
    match field {
        Some(field) if !field.is_empty() => format!("{field}: {msg}"),
        _ => msg.to_string(),
    }
}
