use super::derived::Derived;
use crate::core::{Record, amount};
use tokio::sync::watch;

/// The two user-entered inputs, already normalized: absent, zero and non-finite
/// entries are stored as `None`, so equality checks are always well defined.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LineInputs {
    pub price: Option<f64>,
    pub quantity: Option<f64>,
}

impl LineInputs {
    pub fn new(price: Option<f64>, quantity: Option<f64>) -> Self {
        Self {
            price: amount(price),
            quantity: amount(quantity),
        }
    }
}

/// `total` bound to `price` and `quantity`.
///
/// `combine` only ever sees two computable amounts; every other input state
/// yields `0`, as does a non-finite result.
pub struct TotalField {
    derived: Derived<LineInputs, f64>,
}

impl Default for TotalField {
    fn default() -> Self {
        Self::new()
    }
}

impl TotalField {
    /// `total = price * quantity`
    pub fn new() -> Self {
        Self::bind(LineInputs::default(), |price, quantity| price * quantity)
    }

    pub fn bind<F>(sources: LineInputs, combine: F) -> Self
    where
        F: Fn(f64, f64) -> f64 + Send + Sync + 'static,
    {
        let sources = LineInputs::new(sources.price, sources.quantity);
        let derived = Derived::bind(sources, move |inputs: &LineInputs| {
            match (inputs.price, inputs.quantity) {
                (Some(price), Some(quantity)) => {
                    let total = combine(price, quantity);
                    if total.is_finite() { total } else { 0.0 }
                }
                _ => 0.0,
            }
        });
        Self { derived }
    }

    /// Set the price and return the recomputed total
    pub fn set_price(&mut self, price: impl Into<Option<f64>>) -> f64 {
        let price = amount(price.into());
        self.derived.update(|inputs| inputs.price = price);
        self.total()
    }

    /// Set the quantity and return the recomputed total
    pub fn set_quantity(&mut self, quantity: impl Into<Option<f64>>) -> f64 {
        let quantity = amount(quantity.into());
        self.derived.update(|inputs| inputs.quantity = quantity);
        self.total()
    }

    pub fn reset(&mut self) {
        self.derived.set_sources(LineInputs::default());
    }

    pub fn total(&self) -> f64 {
        *self.derived.get()
    }

    pub fn inputs(&self) -> LineInputs {
        *self.derived.sources()
    }

    pub fn evaluations(&self) -> u64 {
        self.derived.evaluations()
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.derived.subscribe()
    }

    /// The record the current inputs describe; missing inputs become `0`
    pub fn record(&self) -> Record {
        let inputs = self.inputs();
        Record {
            price: inputs.price.unwrap_or(0.0),
            quantity: inputs.quantity.unwrap_or(0.0),
            total: self.total(),
        }
    }
}
