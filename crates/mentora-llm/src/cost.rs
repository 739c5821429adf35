//! Model Pricing - LLM cost information
//!
//! Per-model USD prices per 1M tokens, used to record an estimated cost on
//! every assistant message.

use crate::completion::TokenUsage;

/// Default cost per 1M input tokens (USD) for unknown models
pub const DEFAULT_INPUT_COST_PER_MILLION: f64 = 5.0;

/// Default cost per 1M output tokens (USD) for unknown models
pub const DEFAULT_OUTPUT_COST_PER_MILLION: f64 = 15.0;

/// Pricing for one model (USD per 1M tokens)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPricing {
    /// Input (prompt) cost per 1M tokens
    pub input_per_million: f64,
    /// Output (completion) cost per 1M tokens
    pub output_per_million: f64,
}

impl ModelPricing {
    const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// Pricing used when a model is not in the table
    pub const DEFAULT: Self = Self::new(
        DEFAULT_INPUT_COST_PER_MILLION,
        DEFAULT_OUTPUT_COST_PER_MILLION,
    );

    /// Look up pricing by model name (prefix match, longest prefix wins)
    #[must_use]
    pub fn for_model(model: &str) -> Self {
        PRICING
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, pricing)| *pricing)
            .unwrap_or(Self::DEFAULT)
    }

    /// Cost in USD for the given usage
    #[must_use]
    pub fn cost(&self, usage: &TokenUsage) -> f64 {
        (f64::from(usage.prompt_tokens) * self.input_per_million
            + f64::from(usage.completion_tokens) * self.output_per_million)
            / 1_000_000.0
    }
}

// Prefix table; entries are matched against the model name reported by the provider.
const PRICING: &[(&str, ModelPricing)] = &[
    // Google Gemini
    ("gemini-1.5-flash", ModelPricing::new(0.075, 0.30)),
    ("gemini-1.5-pro", ModelPricing::new(1.25, 5.00)),
    ("gemini-2.0-flash", ModelPricing::new(0.10, 0.40)),
    ("gemini-2.5-flash", ModelPricing::new(0.30, 2.50)),
    ("gemini-2.5-pro", ModelPricing::new(1.25, 10.00)),
    // Anthropic Claude
    ("claude-3-5-haiku", ModelPricing::new(0.80, 4.00)),
    ("claude-3-5-sonnet", ModelPricing::new(3.00, 15.00)),
    ("claude-sonnet-4", ModelPricing::new(3.00, 15.00)),
    ("claude-haiku-4-5", ModelPricing::new(1.00, 5.00)),
    ("claude-opus-4", ModelPricing::new(15.00, 75.00)),
    // OpenAI
    ("gpt-4", ModelPricing::new(30.00, 60.00)),
    ("gpt-4-turbo", ModelPricing::new(10.00, 30.00)),
    ("gpt-4o", ModelPricing::new(2.50, 10.00)),
    ("gpt-4o-mini", ModelPricing::new(0.15, 0.60)),
    // xAI Grok
    ("grok-2", ModelPricing::new(2.00, 10.00)),
    ("grok-3", ModelPricing::new(3.00, 15.00)),
    ("grok-3-mini", ModelPricing::new(0.30, 0.50)),
];

/// Estimated USD cost for a completion
#[must_use]
pub fn estimate_cost_usd(model: &str, usage: &TokenUsage) -> f64 {
    ModelPricing::for_model(model).cost(usage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_longest_prefix_wins() {
        assert_eq!(
            ModelPricing::for_model("gpt-4o-mini-2024-07-18"),
            ModelPricing::new(0.15, 0.60)
        );
        assert_eq!(
            ModelPricing::for_model("gpt-4o-2024-08-06"),
            ModelPricing::new(2.50, 10.00)
        );
        assert_eq!(
            ModelPricing::for_model("gpt-4-0613"),
            ModelPricing::new(30.00, 60.00)
        );
    }

    #[test]
    fn test_unknown_model_uses_default() {
        assert_eq!(ModelPricing::for_model("mystery-model"), ModelPricing::DEFAULT);
    }

    #[test]
    fn test_estimate_cost() {
        let usage = TokenUsage::new(1_000_000, 1_000_000);
        let cost = estimate_cost_usd("claude-3-5-sonnet-20241022", &usage);
        assert!((cost - 18.0).abs() < 1e-9);

        let zero = estimate_cost_usd("gemini-1.5-pro", &TokenUsage::default());
        assert_eq!(zero, 0.0);
    }
}
