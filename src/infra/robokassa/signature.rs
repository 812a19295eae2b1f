//! Robokassa MD5 signature engine.
//!
//! The gateway defines a different signature base per endpoint and payment
//! phase. Rather than string concatenation at every call site, the variants
//! form a closed enum consumed by one signing function, so field order and
//! password selection live in exactly one place.

use md5::{Digest, Md5};
use secrecy::{ExposeSecret, SecretString};

use crate::application::app_error::{AppError, AppResult};

/// Placeholder substituted for the password segment in logged bases.
const MASKED_PASSWORD: &str = "[PASSWORD_HIDDEN]";

/// Which signature base to build. Each variant names the fields that are
/// signed; fields transmitted in the request body but excluded from the
/// base (PreviousInvoiceID, Description, Recurring, IsTest) do not appear
/// here at all.
#[derive(Debug, Clone)]
pub enum SignatureVariant<'a> {
    /// Outbound one-time/parent redirect payment, signed with password #1:
    /// `MerchantLogin:OutSum:InvId[:EncodedReceipt]:Password1[:Shp_k=v...]`
    Payment {
        merchant_login: &'a str,
        out_sum: &'a str,
        inv_id: i64,
        /// URL-encoded receipt JSON, inserted before the password.
        receipt: Option<&'a str>,
        /// Custom `Shp_*` parameters; appended after the password, sorted
        /// lexicographically by the full `key=value` string.
        shp: &'a [(String, String)],
    },
    /// Outbound server-to-server child charge, signed with password #2:
    /// `MerchantLogin:OutSum:InvoiceID:Password2`. Never carries a receipt.
    RecurringCharge {
        merchant_login: &'a str,
        out_sum: &'a str,
        invoice_id: i64,
    },
    /// Inbound result callback, signed with password #2:
    /// `OutSum:InvId:Password2[:Shp_k=v...]`
    Callback {
        out_sum: &'a str,
        inv_id: i64,
        shp: &'a [(String, String)],
    },
}

/// A computed signature plus the base string with the password masked, for
/// debug payloads and logs. The digest itself is always computed from the
/// real password.
#[derive(Debug, Clone)]
pub struct SignedValue {
    pub value: String,
    pub masked_base: String,
}

fn sorted_shp_pairs(shp: &[(String, String)]) -> Vec<String> {
    let mut pairs: Vec<String> = shp
        .iter()
        .map(|(k, v)| format!("{}={}", k, v.trim()))
        .collect();
    pairs.sort();
    pairs
}

impl SignatureVariant<'_> {
    /// Ordered base parts with the password's position marked by `None`.
    fn parts(&self) -> Vec<Option<String>> {
        match self {
            SignatureVariant::Payment {
                merchant_login,
                out_sum,
                inv_id,
                receipt,
                shp,
            } => {
                let mut parts = vec![
                    Some(merchant_login.to_string()),
                    Some(out_sum.to_string()),
                    Some(inv_id.to_string()),
                ];
                if let Some(receipt) = receipt {
                    parts.push(Some(receipt.to_string()));
                }
                parts.push(None);
                parts.extend(sorted_shp_pairs(shp).into_iter().map(Some));
                parts
            }
            SignatureVariant::RecurringCharge {
                merchant_login,
                out_sum,
                invoice_id,
            } => vec![
                Some(merchant_login.to_string()),
                Some(out_sum.to_string()),
                Some(invoice_id.to_string()),
                None,
            ],
            SignatureVariant::Callback {
                out_sum,
                inv_id,
                shp,
            } => {
                let mut parts = vec![Some(out_sum.to_string()), Some(inv_id.to_string()), None];
                parts.extend(sorted_shp_pairs(shp).into_iter().map(Some));
                parts
            }
        }
    }

    fn join(&self, password: &str) -> String {
        self.parts()
            .into_iter()
            .map(|part| part.unwrap_or_else(|| password.trim().to_string()))
            .collect::<Vec<_>>()
            .join(":")
    }
}

/// Compute the lowercase 32-hex MD5 signature for a variant.
///
/// Fails fast if the digest does not have the expected shape — that would
/// be an implementation defect and must never reach the wire.
pub fn sign(variant: &SignatureVariant<'_>, password: &SecretString) -> AppResult<SignedValue> {
    let base = variant.join(password.expose_secret());
    let digest = hex::encode(Md5::digest(base.as_bytes()));

    if digest.len() != 32 || !digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()) {
        return Err(AppError::Internal(format!(
            "malformed signature digest of length {}",
            digest.len()
        )));
    }

    Ok(SignedValue {
        value: digest,
        masked_base: variant.join(MASKED_PASSWORD),
    })
}

/// Verify a candidate signature against the recomputed one. Comparison is
/// over lowercased hex.
pub fn verify(
    variant: &SignatureVariant<'_>,
    password: &SecretString,
    candidate: &str,
) -> AppResult<bool> {
    let signed = sign(variant, password)?;
    Ok(signed.value == candidate.trim().to_lowercase())
}
