//! Comparison prompt and structured-output schema
//!
//! The provider is asked for a JSON document constrained by
//! [`comparison_schema`], which mirrors [`crate::comparison::ComparisonResult`]
//! key for key.

use serde_json::{json, Value};

/// Generates the structured comparison prompt for two devices
///
/// # Examples
///
/// ```
/// use device_duel::prompts::comparison_prompt::generate_comparison_prompt;
///
/// let prompt = generate_comparison_prompt("Pixel 9 Pro", "iPhone 16 Pro");
/// assert!(prompt.contains("\"Pixel 9 Pro\" and \"iPhone 16 Pro\""));
/// ```
pub fn generate_comparison_prompt(device_one: &str, device_two: &str) -> String {
    format!(
        r#"You are a tech comparison expert. Compare the following two devices: "{device_one}" and "{device_two}".
Provide a detailed analysis in JSON format based on the provided schema.
Your analysis should include:
1. A detailed summary including an overview, 2-3 key differences, and who each device is best for.
2. A clear winner and a short reason why. If it's a tie or subjective, explain why.
3. For each device:
- Its full, corrected name.
- A list of 3-5 key pros.
- A list of 3-5 key cons.
- A rating object with scores out of 10 (can be a float, e.g. 8.5) for: overall, performance, camera, battery, display, and value.
Keep pros and cons concise and to the point."#
    )
}

fn rating_schema() -> Value {
    let score = |what: &str| {
        json!({
            "type": "NUMBER",
            "description": format!("{} score out of 10. Can be a float.", what)
        })
    };

    json!({
        "type": "OBJECT",
        "properties": {
            "overall": score("Overall"),
            "performance": score("Performance"),
            "camera": score("Camera"),
            "battery": score("Battery life"),
            "display": score("Display quality"),
            "value": score("Value for money")
        },
        "required": ["overall", "performance", "camera", "battery", "display", "value"]
    })
}

fn device_schema(ordinal: &str) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "name": {
                "type": "STRING",
                "description": format!("The full, corrected name of the {} device.", ordinal)
            },
            "pros": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "A list of 3-5 key pros for this device."
            },
            "cons": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "A list of 3-5 key cons for this device."
            },
            "rating": rating_schema()
        },
        "required": ["name", "pros", "cons", "rating"]
    })
}

/// Response schema in the provider's OpenAPI-subset dialect
pub fn comparison_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "detailedSummary": {
                "type": "OBJECT",
                "properties": {
                    "overview": {
                        "type": "STRING",
                        "description": "A brief overall summary of the comparison, about 2-3 sentences."
                    },
                    "keyDifferences": {
                        "type": "ARRAY",
                        "items": { "type": "STRING" },
                        "description": "A list of 2-3 main differentiating factors."
                    },
                    "bestForDeviceOne": {
                        "type": "STRING",
                        "description": "Describe the ideal user for the first device in one sentence."
                    },
                    "bestForDeviceTwo": {
                        "type": "STRING",
                        "description": "Describe the ideal user for the second device in one sentence."
                    }
                },
                "required": ["overview", "keyDifferences", "bestForDeviceOne", "bestForDeviceTwo"]
            },
            "winner": {
                "type": "STRING",
                "description": "The name of the winning device. If it's a tie, state 'It's a tie'."
            },
            "winnerReason": {
                "type": "STRING",
                "description": "A short reason for the winner or why it's a tie."
            },
            "deviceOne": device_schema("first"),
            "deviceTwo": device_schema("second")
        },
        "required": ["detailedSummary", "winner", "winnerReason", "deviceOne", "deviceTwo"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::tests::sample_json;

    #[test]
    fn test_prompt_quotes_both_devices() {
        let prompt = generate_comparison_prompt("Galaxy S24", "Pixel 8");
        assert!(prompt.contains("\"Galaxy S24\""));
        assert!(prompt.contains("\"Pixel 8\""));
        assert!(prompt.contains("3-5 key pros"));
    }

    #[test]
    fn test_schema_covers_every_document_key() {
        let schema = comparison_schema();
        let document = sample_json();

        for key in document.as_object().unwrap().keys() {
            assert!(
                schema["properties"].get(key).is_some(),
                "schema is missing {}",
                key
            );
        }
        for key in document["deviceOne"]["rating"].as_object().unwrap().keys() {
            assert!(schema["properties"]["deviceOne"]["properties"]["rating"]["properties"]
                .get(key)
                .is_some());
        }
    }

    #[test]
    fn test_schema_marks_all_top_level_fields_required() {
        let schema = comparison_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 5);
        assert_eq!(schema["properties"]["deviceTwo"]["required"].as_array().unwrap().len(), 4);
    }
}
