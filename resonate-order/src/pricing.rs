use resonate_core::EngineError;
use serde::{Deserialize, Serialize};

/// A requested line item, before pricing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemRequest {
    pub deliverable_type: String,
    pub platform: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub description: Option<String>,
}

/// Computed totals for a set of requested line items.
/// `line_totals` is positionally aligned with the request slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingQuote {
    pub line_totals: Vec<i64>,
    pub subtotal_cents: i64,
    pub platform_fee_cents: i64,
    pub total_cents: i64,
}

/// Computes subtotal, platform fee, and total for an order request.
///
/// All arithmetic is exact i64 math in minor currency units; only the
/// platform fee applies rounding (half-up on `subtotal * fee_rate`).
pub struct PricingEngine {
    fee_rate: f64,
}

impl PricingEngine {
    pub const DEFAULT_FEE_RATE: f64 = 0.15;

    pub fn new(fee_rate: f64) -> Self {
        Self { fee_rate }
    }

    pub fn price(&self, items: &[LineItemRequest]) -> Result<PricingQuote, EngineError> {
        if items.is_empty() {
            return Err(EngineError::invalid_input("order requires at least one line item"));
        }

        let mut line_totals = Vec::with_capacity(items.len());
        let mut subtotal_cents: i64 = 0;

        for (idx, item) in items.iter().enumerate() {
            if item.quantity == 0 {
                return Err(EngineError::invalid_input(format!(
                    "line item {} has zero quantity",
                    idx
                )));
            }
            if item.unit_price_cents < 0 {
                return Err(EngineError::invalid_input(format!(
                    "line item {} has negative unit price",
                    idx
                )));
            }

            let total = (item.quantity as i64)
                .checked_mul(item.unit_price_cents)
                .ok_or_else(|| {
                    EngineError::invalid_input(format!("line item {} total overflows", idx))
                })?;
            subtotal_cents = subtotal_cents.checked_add(total).ok_or_else(|| {
                EngineError::invalid_input("order subtotal overflows".to_string())
            })?;
            line_totals.push(total);
        }

        // Half-up rounding on the fee only
        let platform_fee_cents = (subtotal_cents as f64 * self.fee_rate).round() as i64;
        let total_cents = subtotal_cents + platform_fee_cents;

        Ok(PricingQuote {
            line_totals,
            subtotal_cents,
            platform_fee_cents,
            total_cents,
        })
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FEE_RATE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: u32, unit_price_cents: i64) -> LineItemRequest {
        LineItemRequest {
            deliverable_type: "SPONSORED_POST".to_string(),
            platform: "INSTAGRAM".to_string(),
            quantity,
            unit_price_cents,
            description: None,
        }
    }

    #[test]
    fn test_quote_totals() {
        let engine = PricingEngine::new(0.15);
        let quote = engine.price(&[line(2, 15000), line(1, 30000)]).unwrap();

        assert_eq!(quote.line_totals, vec![30000, 30000]);
        assert_eq!(quote.subtotal_cents, 60000);
        assert_eq!(quote.platform_fee_cents, 9000);
        assert_eq!(quote.total_cents, 69000);
    }

    #[test]
    fn test_fee_rounds_half_up() {
        let engine = PricingEngine::new(0.15);
        // 10 * 0.15 = 1.5, rounds up to 2
        let quote = engine.price(&[line(1, 10)]).unwrap();
        assert_eq!(quote.platform_fee_cents, 2);
        assert_eq!(quote.total_cents, 12);

        // 9 * 0.15 = 1.35, rounds down to 1
        let quote = engine.price(&[line(1, 9)]).unwrap();
        assert_eq!(quote.platform_fee_cents, 1);
    }

    #[test]
    fn test_zero_price_line_is_valid() {
        let engine = PricingEngine::default();
        let quote = engine.price(&[line(3, 0)]).unwrap();
        assert_eq!(quote.subtotal_cents, 0);
        assert_eq!(quote.platform_fee_cents, 0);
        assert_eq!(quote.total_cents, 0);
    }

    #[test]
    fn test_empty_line_items_rejected() {
        let engine = PricingEngine::default();
        let result = engine.price(&[]);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let engine = PricingEngine::default();
        let result = engine.price(&[line(0, 1000)]);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }

    #[test]
    fn test_negative_unit_price_rejected() {
        let engine = PricingEngine::default();
        let result = engine.price(&[line(1, -500)]);
        assert!(matches!(result, Err(EngineError::InvalidInput(_))));
    }
}
