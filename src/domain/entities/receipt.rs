use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;

use crate::{
    application::app_error::{AppError, AppResult},
    domain::entities::money::Money,
};

/// Tax scheme tag for the fiscal receipt.
const SNO: &str = "usn_income";

/// Characters left untouched by JS `encodeURIComponent`, which is what the
/// gateway decodes the `Receipt` field with. The encoded string takes part
/// in the signature, so the escape set must match exactly.
const RECEIPT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReceiptItem {
    pub name: String,
    pub quantity: u32,
    pub sum: serde_json::Number,
    pub payment_method: String,
    pub payment_object: String,
    pub tax: String,
}

/// Immutable fiscal-receipt payload (54-FZ). Serialization is
/// deterministic — serde keeps struct field order — because the encoded
/// string participates in the outbound signature.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Receipt {
    pub sno: String,
    pub items: Vec<ReceiptItem>,
}

impl Receipt {
    /// Build a one-line-item receipt and check it against the charge
    /// amount. A sum that disagrees with `amount` is rejected here, before
    /// any network dispatch.
    pub fn build(amount: Money, description: &str) -> AppResult<Receipt> {
        let receipt = Receipt {
            sno: SNO.to_string(),
            items: vec![ReceiptItem {
                name: description.to_string(),
                quantity: 1,
                sum: amount.to_json_number(),
                payment_method: "full_payment".to_string(),
                payment_object: "service".to_string(),
                tax: "none".to_string(),
            }],
        };
        receipt.validate_against(amount)?;
        Ok(receipt)
    }

    /// The item sum must equal the charge amount exactly — same numeric
    /// value, no rounding drift.
    pub fn validate_against(&self, amount: Money) -> AppResult<()> {
        let expected = amount.to_json_number();
        match self.items.first() {
            Some(item) if item.sum == expected => Ok(()),
            Some(item) => Err(AppError::ReceiptMismatch(format!(
                "receipt sum {} != charge amount {}",
                item.sum, expected
            ))),
            None => Err(AppError::ReceiptMismatch("receipt has no items".into())),
        }
    }

    /// Canonical JSON; two calls with identical inputs match byte for byte.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("receipt serialization is infallible")
    }

    /// URL-encoded JSON as transmitted in the `Receipt` form field and
    /// inserted into the signature base.
    pub fn encoded(&self) -> String {
        utf8_percent_encode(&self.to_json(), RECEIPT_ENCODE_SET).to_string()
    }
}
