//! Parsing of `generateContent` responses.
//!
//! Model output is untrusted: it is declared to follow the response schema,
//! but fields may be missing, numbers may arrive as strings and coordinates
//! may fall outside [0, 1]. Invalid elements are dropped with a warning,
//! never trusted.

use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use super::error::ProviderError;
use crate::model::{BoundingBox, DetectedObject, Detection};

/// Pull the model text out of a `generateContent` response body.
pub fn extract_text(body: &str) -> Result<String> {
    let envelope: Value =
        serde_json::from_str(body).context("provider response is not valid JSON")?;

    if let Some(reason) = envelope["promptFeedback"]["blockReason"].as_str() {
        return Err(ProviderError::new(None, format!("request blocked: {}", reason)).into());
    }
    if let Some(error) = envelope.get("error") {
        let status = error["code"].as_u64().and_then(|code| u16::try_from(code).ok());
        let message = error["message"]
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        let marker = error["status"].as_str().unwrap_or_default();
        return Err(ProviderError::new(status, format!("{} {}", marker, message).trim()).into());
    }

    let Some(candidate) = envelope["candidates"].get(0) else {
        return Ok(String::new());
    };
    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|part| part["text"].as_str()).collect())
        .unwrap_or_default();
    Ok(text)
}

/// Parse the model text into validated objects.
///
/// Empty text or an empty array is a valid "nothing found" result whose raw
/// JSON is `[]`.
pub fn parse_detection(text: &str) -> Result<Detection> {
    let trimmed = strip_code_fence(text.trim());
    if trimmed.is_empty() {
        return Ok(Detection::empty());
    }

    let value: Value = serde_json::from_str(trimmed)
        .map_err(|e| anyhow!("invalid response body: model text is not JSON ({})", e))?;
    let elements = value
        .as_array()
        .ok_or_else(|| anyhow!("invalid response body: expected a JSON array"))?;
    if elements.is_empty() {
        return Ok(Detection::empty());
    }

    let mut objects = Vec::with_capacity(elements.len());
    for (index, element) in elements.iter().enumerate() {
        match parse_object(element) {
            Ok(object) => objects.push(object),
            Err(err) => log::warn!("dropping detection #{}: {}", index, err),
        }
    }

    Ok(Detection {
        objects,
        raw_json: text.to_string(),
    })
}

fn parse_object(element: &Value) -> Result<DetectedObject> {
    let fields = element
        .as_object()
        .ok_or_else(|| anyhow!("element is not an object"))?;

    let name = fields
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| anyhow!("missing name"))?
        .to_string();
    let description = optional_string(fields.get("description"));
    let price = optional_string(fields.get("price"));

    let timestamp = number(fields.get("timestamp"), "timestamp")?.max(0.0);

    let bbox = fields
        .get("boundingBox")
        .ok_or_else(|| anyhow!("missing boundingBox"))?;
    let bounding_box = BoundingBox {
        x_min: unit(number(bbox.get("x_min"), "x_min")?),
        y_min: unit(number(bbox.get("y_min"), "y_min")?),
        x_max: unit(number(bbox.get("x_max"), "x_max")?),
        y_max: unit(number(bbox.get("y_max"), "y_max")?),
    };

    Ok(DetectedObject {
        name,
        description,
        timestamp,
        bounding_box,
        price,
    })
}

fn optional_string(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        _ => String::new(),
    }
}

fn number(value: Option<&Value>, field: &str) -> Result<f64> {
    let parsed = match value {
        Some(Value::Number(number)) => number.as_f64(),
        Some(Value::String(text)) => text.trim().trim_end_matches('s').trim().parse().ok(),
        _ => None,
    };
    match parsed {
        Some(number) if number.is_finite() => Ok(number),
        _ => Err(anyhow!("{} is missing or not a finite number", field)),
    }
}

fn unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
