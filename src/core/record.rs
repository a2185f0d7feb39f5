use serde::{Deserialize, Serialize};

/// Relative slack allowed between a stored total and the recomputed product
const TOTAL_TOLERANCE: f64 = 1e-9;

/// One entered line: two user-supplied sources and the derived total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub price: f64,
    pub quantity: f64,
    pub total: f64,
}

impl Record {
    /// Build a record whose total is derived from `price` and `quantity`.
    pub fn new(price: f64, quantity: f64) -> Self {
        Self {
            price,
            quantity,
            total: line_total(Some(price), Some(quantity)),
        }
    }

    /// True when `total` agrees with what the sources derive to, up to
    /// floating-point rounding of the product.
    pub fn is_consistent(&self) -> bool {
        let expected = line_total(Some(self.price), Some(self.quantity));
        (self.total - expected).abs() <= TOTAL_TOLERANCE * expected.abs().max(1.0)
    }
}

impl Default for Record {
    fn default() -> Self {
        Self {
            price: 0.0,
            quantity: 0.0,
            total: 0.0,
        }
    }
}

/// Normalizes a raw input: absent, zero, NaN and infinite values carry no amount.
pub fn amount(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v != 0.0)
}

/// `price * quantity`, or `0` when either side has no computable amount.
///
/// Never returns NaN or an infinity; a product that overflows also yields `0`.
pub fn line_total(price: Option<f64>, quantity: Option<f64>) -> f64 {
    match (amount(price), amount(quantity)) {
        (Some(p), Some(q)) => {
            let total = p * q;
            if total.is_finite() { total } else { 0.0 }
        }
        _ => 0.0,
    }
}

/// Demo rows served when the store has never been written.
pub fn seed_records() -> Vec<Record> {
    vec![Record::new(100.0, 1.0), Record::new(200.0, 2.0)]
}
