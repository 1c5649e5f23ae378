//! Maps raw deal items from the paging API onto [`ProductRecord`].

use serde_json::Value;

use crate::models::ProductRecord;

/// Seller used when an item carries no manufacturer name.
pub const DEFAULT_SELLER: &str = "Newegg";

pub fn extract_product(sequence_number: u32, item: &Value) -> ProductRecord {
    let cell = item.get("ItemCell");
    let description = cell.and_then(|c| c.get("Description"));
    let review = cell.and_then(|c| c.get("Review"));
    let manufacturer = cell.and_then(|c| c.get("ItemManufactory"));

    let seller = first_present(manufacturer, &["Manufactory"]);

    ProductRecord {
        sequence_number,
        title: first_present(description, &["ProductName", "ShortTitle"]),
        description: first_present(description, &["Title", "LineDescription"]),
        bullet_description: collapse_whitespace(&first_present(description, &["BulletDescription"])),
        price: cell.and_then(|c| c.get("FinalPrice")).map(as_text).unwrap_or_default(),
        rating: first_present(review, &["RatingOneDecimal", "Rating"]),
        seller: if seller.is_empty() { DEFAULT_SELLER.to_string() } else { seller },
        product_number: item.get("ProductNumber").map(as_text).unwrap_or_default(),
    }
}

/// Replace every run of whitespace (newlines included) with one space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Text of the first key in `keys` holding a non-blank value, or empty.
fn first_present(obj: Option<&Value>, keys: &[&str]) -> String {
    let Some(obj) = obj else {
        return String::new();
    };
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .filter(|v| is_present(v))
        .map(as_text)
        .next()
        .unwrap_or_default()
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
