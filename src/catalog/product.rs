// Product record and the helpers used when storing one
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub price: f64,
}

impl Product {
    pub fn new(code: &str, name: &str, price: f64) -> Self {
        Product { code: code.to_string(), name: name.to_string(), price }
    }
}

/// Four groups of four uppercase hex digits, e.g. `A12T-4GH7-QPL9-3N4M`.
pub fn gen_product_code() -> String {
    let u = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{}-{}-{}-{}", &u[0..4], &u[8..12], &u[12..16], &u[16..20])
}

/// Letters and digits only; spaces are ignored.
pub fn is_alphanumeric(s: &str) -> bool {
    s.chars().filter(|c| *c != ' ').all(|c| c.is_ascii_alphanumeric())
}

pub fn round_price(price: f64, places: i32) -> f64 {
    let f = 10f64.powi(places);
    (price * f).round() / f
}
