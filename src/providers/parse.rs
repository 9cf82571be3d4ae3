//! JSON extraction from free-text model replies.
//!
//! The primary provider answers with prose that *contains* a JSON object
//! rather than strictly being one, so parsing is a fallible, explicit step
//! here instead of control flow by exception.

use serde::Deserialize;
use thiserror::Error;

use super::{DetectedFoodItem, RawFoodItem};

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("no JSON object found in provider reply")]
    NoJson,
    #[error("provider JSON is malformed: {0}")]
    Malformed(String),
    #[error("provider JSON is missing a `foods` list")]
    MissingFoods,
    #[error("provider reply contained no usable food items")]
    NoUsableItems,
}

#[derive(Debug, Deserialize)]
struct FoodListEnvelope {
    foods: Option<Vec<serde_json::Value>>,
}

/// Extract, parse, and shape-check a `{"foods": [...]}` object out of a
/// free-text provider reply. Never panics; callers branch on the result.
pub fn parse_provider_json(text: &str) -> Result<Vec<DetectedFoodItem>, ParseError> {
    let candidate = first_json_object(text).ok_or(ParseError::NoJson)?;

    let envelope: FoodListEnvelope =
        serde_json::from_str(candidate).map_err(|e| ParseError::Malformed(e.to_string()))?;
    let foods = envelope.foods.ok_or(ParseError::MissingFoods)?;

    let items: Vec<DetectedFoodItem> = foods
        .into_iter()
        .filter_map(|v| serde_json::from_value::<RawFoodItem>(v).ok())
        .filter_map(RawFoodItem::normalize)
        .collect();

    if items.is_empty() {
        return Err(ParseError::NoUsableItems);
    }
    Ok(items)
}

/// First balanced JSON object in the text, located by handing candidate
/// prefixes to the serde_json streaming deserializer. Fenced ```json blocks
/// are just prose around the object, so they need no special casing beyond
/// starting the scan at the first `{`.
fn first_json_object(text: &str) -> Option<&str> {
    for (idx, ch) in text.char_indices() {
        if ch != '{' {
            continue;
        }
        let candidate = &text[idx..];
        let mut de = serde_json::Deserializer::from_str(candidate).into_iter::<serde_json::Value>();
        if let Some(Ok(_)) = de.next() {
            let end = de.byte_offset();
            if end > 0 && end <= candidate.len() {
                return Some(&candidate[..end]);
            }
        }
    }
    None
}
