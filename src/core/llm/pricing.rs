//! Per-model cost accounting.
//!
//! Prices live in the registry's model tables (USD per million tokens).
//! Unknown or custom model identifiers price at zero, which suits local
//! models; paid custom endpoints can register explicit prices instead.

use super::registry::ProviderRegistry;

/// USD-per-million-token prices for one model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPrice {
    pub const FREE: ModelPrice = ModelPrice {
        input_per_million: 0.0,
        output_per_million: 0.0,
    };

    /// Cost of one call given raw token counts.
    pub fn cost_usd(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        (input_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (output_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

/// Looks a model up across every provider's table. Falls back to free for
/// identifiers the table has never heard of.
pub fn price_for(registry: &ProviderRegistry, model_id: &str) -> ModelPrice {
    for provider in registry.providers() {
        if let Some(m) = provider.models.iter().find(|m| m.id == model_id) {
            return ModelPrice {
                input_per_million: m.input_price,
                output_per_million: m.output_price,
            };
        }
    }
    ModelPrice::FREE
}
