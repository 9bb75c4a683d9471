//! VAT breakdown of tax-inclusive amounts.

use rust_decimal::Decimal;

/// Net/tax split of one tax-inclusive amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaxBreakdown {
    pub net: Decimal,
    pub tax: Decimal,
    /// Rate in percent.
    pub rate: Decimal,
}

/// Split a tax-inclusive subtotal into its net and tax parts:
/// `net = subtotal / (1 + rate/100)`, `tax = subtotal - net`.
pub fn split_inclusive(subtotal: Decimal, rate_percent: Decimal) -> TaxBreakdown {
    let divisor = Decimal::ONE + rate_percent / Decimal::from(100);
    let net = subtotal / divisor;
    TaxBreakdown {
        net,
        tax: subtotal - net,
        rate: rate_percent,
    }
}
