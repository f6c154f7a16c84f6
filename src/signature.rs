// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Provider payment signatures.
//!
//! The provider signs `"<order_id>|<payment_id>"` with HMAC-SHA256 keyed by
//! the merchant secret and sends the lowercase hex digest back through the
//! client.

use crate::base::{OrderId, PaymentId};
use crate::BookingError;
use constant_time_eq::constant_time_eq;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Expected hex signature for an order/payment pair.
///
/// # Errors
///
/// Returns [`BookingError::Internal`] if the MAC cannot be keyed with `secret`.
pub fn sign(order_id: &OrderId, payment_id: &PaymentId, secret: &str) -> Result<String, BookingError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| BookingError::internal(format!("signature key rejected: {e}")))?;
    mac.update(order_id.as_str().as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_str().as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a provider signature. Hex case is ignored.
///
/// # Errors
///
/// Propagates [`sign`] failures; a signature is never accepted without a
/// computed digest to compare against.
pub fn verify(
    order_id: &OrderId,
    payment_id: &PaymentId,
    signature: &str,
    secret: &str,
) -> Result<bool, BookingError> {
    let expected = sign(order_id, payment_id, secret)?;
    let provided = signature.trim().to_ascii_lowercase();
    Ok(constant_time_eq(expected.as_bytes(), provided.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_hmac_vector() {
        let order = OrderId::from("The quick brown fox");
        let payment = PaymentId::from("jumps over the lazy dog");
        let mut mac = HmacSha256::new_from_slice(b"key").unwrap();
        mac.update(b"The quick brown fox|jumps over the lazy dog");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(sign(&order, &payment, "key").unwrap(), expected);
        assert_eq!(expected.len(), 64);
    }

    #[test]
    fn verify_accepts_own_signature() {
        let order = OrderId::from("order_9A33XWu170gUtm");
        let payment = PaymentId::from("pay_29QQoUBi66xm2f");
        let signature = sign(&order, &payment, "secret").unwrap();

        assert!(verify(&order, &payment, &signature, "secret").unwrap());
        assert!(verify(&order, &payment, &signature.to_uppercase(), "secret").unwrap());
    }

    #[test]
    fn verify_rejects_tampering() {
        let order = OrderId::from("order_1");
        let payment = PaymentId::from("pay_1");
        let signature = sign(&order, &payment, "secret").unwrap();

        assert!(!verify(&order, &PaymentId::from("pay_2"), &signature, "secret").unwrap());
        assert!(!verify(&OrderId::from("order_2"), &payment, &signature, "secret").unwrap());
        assert!(!verify(&order, &payment, &signature, "other-secret").unwrap());
        assert!(!verify(&order, &payment, "", "secret").unwrap());
        assert!(!verify(&order, &payment, &signature[..63], "secret").unwrap());
    }

    #[test]
    fn keys_of_any_length_are_accepted() {
        let order = OrderId::from("order_1");
        let payment = PaymentId::from("pay_1");
        let long_key = "k".repeat(200);

        for key in ["", "k", long_key.as_str()] {
            let signature = sign(&order, &payment, key).unwrap();
            assert_eq!(signature.len(), 64);
            assert!(verify(&order, &payment, &signature, key).unwrap());
        }
    }
}
