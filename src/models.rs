use serde::{Serialize, Deserialize};

/// One normalized deal item from the paging API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub sequence_number: u32,
    pub title: String,
    pub description: String,
    pub bullet_description: String,
    pub price: String,
    pub rating: String,
    pub seller: String,
    pub product_number: String,
}

/// A product container scraped from the listing page. Every field is
/// optional since the page markup is not stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingProduct {
    pub position: usize,
    pub name: Option<String>,
    pub price: Option<String>,
    pub rating: Option<String>,
    pub seller: Option<String>,
}
