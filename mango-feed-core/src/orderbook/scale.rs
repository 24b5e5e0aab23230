//! Native lot units to UI decimal units
//!
//! Book and fill prices are quote lots per base lot; quantities are base
//! lots. Converting to human units needs both lot sizes and both token
//! decimals:
//!
//! ```text
//! ui_price    = price * quote_lot * 10^base_decimals / (base_lot * 10^quote_decimals)
//! ui_quantity = quantity * base_lot / 10^base_decimals
//! ```

use rust_decimal::Decimal;

use crate::core::errors::ConfigError;
use crate::data::perp_market::PerpMarket;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketScale {
    base_lot_size: i64,
    quote_lot_size: i64,
    base_decimals: u8,
    quote_decimals: u8,
}

impl MarketScale {
    pub fn new(
        base_lot_size: i64,
        quote_lot_size: i64,
        base_decimals: u8,
        quote_decimals: u8,
    ) -> Result<Self, ConfigError> {
        if base_lot_size <= 0 {
            return Err(ConfigError::Invalid {
                field: "base_lot_size",
                reason: format!("must be positive, got {base_lot_size}"),
            });
        }
        if quote_lot_size <= 0 {
            return Err(ConfigError::Invalid {
                field: "quote_lot_size",
                reason: format!("must be positive, got {quote_lot_size}"),
            });
        }
        if base_decimals > 18 || quote_decimals > 18 {
            return Err(ConfigError::Invalid {
                field: "decimals",
                reason: format!("at most 18 supported, got {base_decimals}/{quote_decimals}"),
            });
        }
        Ok(Self {
            base_lot_size,
            quote_lot_size,
            base_decimals,
            quote_decimals,
        })
    }

    /// Lot sizes from a decoded market account
    pub fn from_market(
        market: &PerpMarket,
        base_decimals: u8,
        quote_decimals: u8,
    ) -> Result<Self, ConfigError> {
        Self::new(
            market.base_lot_size,
            market.quote_lot_size,
            base_decimals,
            quote_decimals,
        )
    }

    /// `None` only if the intermediate exceeds Decimal's 96-bit mantissa
    pub fn price_to_ui(&self, native_price: u64) -> Option<Decimal> {
        let numerator = Decimal::from(native_price)
            .checked_mul(Decimal::from(self.quote_lot_size))?
            .checked_mul(pow10(self.base_decimals))?;
        let denominator = Decimal::from(self.base_lot_size).checked_mul(pow10(self.quote_decimals))?;
        numerator.checked_div(denominator).map(|d| d.normalize())
    }

    pub fn quantity_to_ui(&self, native_quantity: u64) -> Option<Decimal> {
        Decimal::from(native_quantity)
            .checked_mul(Decimal::from(self.base_lot_size))?
            .checked_div(pow10(self.base_decimals))
            .map(|d| d.normalize())
    }
}

fn pow10(exp: u8) -> Decimal {
    Decimal::from(10u64.pow(exp as u32))
}
