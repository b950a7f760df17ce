use serde::{Deserialize, Serialize};

/// Order direction from the user's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn is_buy(self) -> bool {
        matches!(self, Side::Buy)
    }

    /// The book side a taker of this direction consumes.
    pub fn taker_side(self) -> &'static str {
        match self {
            Side::Buy => "asks",
            Side::Sell => "bids",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buy" | "long" => Ok(Side::Buy),
            "sell" | "short" => Ok(Side::Sell),
            other => Err(format!("invalid side '{other}', expected buy or sell")),
        }
    }
}

/// Format a price for the wire: at most 6 decimals, trailing zeros trimmed.
/// Tick-size alignment is left to the venue.
pub fn format_price(price: f64) -> String {
    let s = format!("{price:.6}");
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Format a size to the market's size decimals.
pub fn format_size(size: f64, sz_decimals: u32) -> String {
    format!("{size:.prec$}", prec = sz_decimals as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_formatting_trims_trailing_zeros() {
        assert_eq!(format_price(431.5), "431.5");
        assert_eq!(format_price(431.575), "431.575");
        assert_eq!(format_price(0.000001), "0.000001");
        assert_eq!(format_price(100.0), "100");
        assert_eq!(format_price(0.0), "0");
    }

    #[test]
    fn price_formatting_rounds_to_six_decimals() {
        assert_eq!(format_price(431.1234567), "431.123457");
        // re-serializing a clean 6-decimal value is stable
        let px = format_price(435.815);
        assert_eq!(format_price(px.parse::<f64>().unwrap()), px);
    }

    #[test]
    fn size_formatting_uses_market_decimals() {
        assert_eq!(format_size(3.0, 3), "3.000");
        assert_eq!(format_size(0.1234, 2), "0.12");
    }

    #[test]
    fn side_parses_aliases() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("LONG".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("short".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
    }
}
