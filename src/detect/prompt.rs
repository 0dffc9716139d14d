use serde_json::{json, Value};

/// Instruction text sent alongside the video.
pub fn build_prompt(targets: &[String]) -> String {
    let target_list = targets.join(", ");
    format!(
        "You are an expert appraiser reviewing a video. Find every instance of the \
following objects: {target_list}.\n\
\n\
Rules:\n\
1. Name each object as specifically as possible: brand, model, style or material \
when visible (for example \"Herman Miller Aeron chair\" rather than \"chair\").\n\
2. Return one entry per physically distinct instance. Do not merge identical-looking \
items; two matching chairs are two entries.\n\
3. Search exhaustively, including objects in the background, partially occluded \
objects and objects that appear only briefly.\n\
4. For each instance pick the timestamp (in seconds from the start of the video) \
where it is most clearly visible, and give a tight bounding box around it at that \
moment using normalized coordinates between 0 and 1 (x_min, y_min, x_max, y_max).\n\
5. Estimate a realistic current market price range in USD for each instance, \
formatted like \"$450 - $550\".\n\
6. Respond with a JSON array only, where every element has the fields name, \
description, timestamp, boundingBox {{x_min, y_min, x_max, y_max}} and price. \
If nothing matches, respond with []."
    )
}

/// Structured-output schema for `generationConfig.responseSchema`.
pub fn response_schema() -> Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING", "description": "Specific name of the object" },
                "description": { "type": "STRING", "description": "Short visual description" },
                "timestamp": {
                    "type": "NUMBER",
                    "description": "Seconds from the start of the video where the object is clearest"
                },
                "boundingBox": {
                    "type": "OBJECT",
                    "properties": {
                        "x_min": { "type": "NUMBER" },
                        "y_min": { "type": "NUMBER" },
                        "x_max": { "type": "NUMBER" },
                        "y_max": { "type": "NUMBER" }
                    },
                    "required": ["x_min", "y_min", "x_max", "y_max"]
                },
                "price": { "type": "STRING", "description": "Estimated USD price range" }
            },
            "required": ["name", "description", "timestamp", "boundingBox", "price"]
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_every_target() {
        let prompt = build_prompt(&["chair".to_string(), "sofa".to_string()]);
        assert!(prompt.contains("chair, sofa"));
        assert!(prompt.contains("JSON array"));
    }

    #[test]
    fn schema_requires_all_fields() {
        let schema = response_schema();
        let required: Vec<&str> = schema["items"]["required"]
            .as_array()
            .map(|fields| fields.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        assert_eq!(
            required,
            vec!["name", "description", "timestamp", "boundingBox", "price"]
        );
    }
}
