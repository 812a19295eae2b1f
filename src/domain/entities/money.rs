use serde::{Deserialize, Serialize};

/// Fixed-point ruble amount stored as kopecks.
///
/// The gateway signs the formatted amount string, so formatting must be
/// byte-exact and deterministic. All formatting is integer math; floats
/// never touch an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn from_kopecks(kopecks: i64) -> Self {
        Self(kopecks)
    }

    pub const fn from_rubles(rubles: i64) -> Self {
        Self(rubles * 100)
    }

    pub const fn kopecks(&self) -> i64 {
        self.0
    }

    /// `"199.00"` — the format signed on redirect/one-time endpoints.
    pub fn format_2dp(&self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }

    /// `"199.000000"` — the format the recurring-charge endpoint mandates.
    pub fn format_6dp(&self) -> String {
        format!("{}.{:02}0000", self.0 / 100, self.0 % 100)
    }

    /// JSON number for the fiscal receipt: `199`, `1` or `199.5` — no
    /// trailing zeros, matching what the fiscalization endpoint accepts.
    pub fn to_json_number(&self) -> serde_json::Number {
        if self.0 % 100 == 0 {
            serde_json::Number::from(self.0 / 100)
        } else if self.0 % 10 == 0 {
            // one decimal digit suffices
            serde_json::Number::from_f64((self.0 / 10) as f64 / 10.0)
                .expect("kopeck amount is always finite")
        } else {
            serde_json::Number::from_f64(self.0 as f64 / 100.0)
                .expect("kopeck amount is always finite")
        }
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format_2dp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_2dp_is_byte_exact() {
        assert_eq!(Money::from_rubles(199).format_2dp(), "199.00");
        assert_eq!(Money::from_rubles(1).format_2dp(), "1.00");
        assert_eq!(Money::from_kopecks(19950).format_2dp(), "199.50");
        assert_eq!(Money::from_kopecks(5).format_2dp(), "0.05");
    }

    #[test]
    fn format_6dp_is_byte_exact() {
        assert_eq!(Money::from_rubles(199).format_6dp(), "199.000000");
        assert_eq!(Money::from_kopecks(19999).format_6dp(), "199.990000");
    }

    #[test]
    fn json_number_has_no_trailing_zeros() {
        assert_eq!(Money::from_rubles(199).to_json_number().to_string(), "199");
        assert_eq!(Money::from_rubles(1).to_json_number().to_string(), "1");
        assert_eq!(
            Money::from_kopecks(19950).to_json_number().to_string(),
            "199.5"
        );
    }
}
