// 🧾 Withholding Tax - Pure calculator consumed by the withdrawal flow
//
// The calculator has no side effects and never touches storage; the
// withdrawal processor invokes it BEFORE entering its transaction.

use serde::{Deserialize, Serialize};

use crate::entities::seller::TaxCategory;
use crate::error::{LedgerError, Result};
use crate::money::Money;

/// Result of a withholding computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxAssessment {
    pub withholding_tax: Money,
    /// Rate in basis points (500 = 5%).
    pub rate_bp: u32,
    pub amount_paid_to_seller: Money,
}

pub trait TaxCalculator {
    fn compute(&self, amount: Money, category: TaxCategory) -> Result<TaxAssessment>;
}

/// Flat per-category rates. Withholding rounds down to the pesewa; the
/// seller keeps the remainder.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FlatRateTaxCalculator {
    pub standard_rate_bp: u32,
}

impl Default for FlatRateTaxCalculator {
    fn default() -> Self {
        // 5% withholding for standard registered sellers.
        FlatRateTaxCalculator { standard_rate_bp: 500 }
    }
}

impl TaxCalculator for FlatRateTaxCalculator {
    fn compute(&self, amount: Money, category: TaxCategory) -> Result<TaxAssessment> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(format!(
                "cannot assess tax on non-positive amount {}",
                amount
            )));
        }
        let rate_bp = match category {
            TaxCategory::Standard => self.standard_rate_bp,
            TaxCategory::Exempt => 0,
        };
        let withholding_tax = amount * rate_bp as Money / 10_000;
        Ok(TaxAssessment {
            withholding_tax,
            rate_bp,
            amount_paid_to_seller: amount - withholding_tax,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_five_percent() {
        // GHS 400.00 at 5% -> GHS 20.00 withheld, GHS 380.00 paid.
        let calc = FlatRateTaxCalculator::default();
        let a = calc.compute(40_000, TaxCategory::Standard).unwrap();
        assert_eq!(a.withholding_tax, 2_000);
        assert_eq!(a.rate_bp, 500);
        assert_eq!(a.amount_paid_to_seller, 38_000);
    }

    #[test]
    fn test_exempt_pays_full_amount() {
        let calc = FlatRateTaxCalculator::default();
        let a = calc.compute(40_000, TaxCategory::Exempt).unwrap();
        assert_eq!(a.withholding_tax, 0);
        assert_eq!(a.amount_paid_to_seller, 40_000);
    }

    #[test]
    fn test_rounds_down_to_pesewa() {
        let calc = FlatRateTaxCalculator::default();
        // 5% of 99 pesewas is 4.95; withholding truncates to 4.
        let a = calc.compute(99, TaxCategory::Standard).unwrap();
        assert_eq!(a.withholding_tax, 4);
        assert_eq!(a.amount_paid_to_seller, 95);
    }

    #[test]
    fn test_rejects_non_positive() {
        let calc = FlatRateTaxCalculator::default();
        assert!(calc.compute(0, TaxCategory::Standard).is_err());
        assert!(calc.compute(-5, TaxCategory::Standard).is_err());
    }
}
