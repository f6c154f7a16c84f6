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

//! Payment transaction attempts.
//!
//! One row per provider order:
//! - [`Pending`] → [`Success`] (signature verified)
//! - [`Pending`] → [`Failed`] (signature mismatch)
//!
//! [`Pending`]: TransactionStatus::Pending
//! [`Success`]: TransactionStatus::Success
//! [`Failed`]: TransactionStatus::Failed

use crate::base::{BookingId, OrderId, PaymentId, TransactionId};
use crate::booking::PaymentMethod;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const SIGNATURE_MISMATCH: &str = "SIGNATURE_MISMATCH";
pub const REFUND_REVIEW_REQUIRED: &str = "REFUND_REVIEW_REQUIRED";
pub const DUPLICATE_PAYMENT: &str = "DUPLICATE_PAYMENT";
pub const AMOUNT_MISMATCH: &str = "AMOUNT_MISMATCH";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: TransactionId,
    pub booking_id: BookingId,
    pub payment_method: PaymentMethod,
    pub payment_status: TransactionStatus,
    pub amount: Decimal,
    pub currency: String,
    pub order_id: OrderId,
    pub payment_id: Option<PaymentId>,
    pub signature: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn pending(
        id: TransactionId,
        booking_id: BookingId,
        order_id: OrderId,
        amount: Decimal,
        currency: String,
        now: DateTime<Utc>,
    ) -> Self {
        PaymentTransaction {
            id,
            booking_id,
            payment_method: PaymentMethod::Razorpay,
            payment_status: TransactionStatus::Pending,
            amount,
            currency,
            order_id,
            payment_id: None,
            signature: None,
            error_code: None,
            error_description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.payment_status == TransactionStatus::Success
    }

    /// True when this transaction already succeeded with `payment_id`.
    pub fn settled_by(&self, payment_id: &PaymentId) -> bool {
        self.is_settled() && self.payment_id.as_ref() == Some(payment_id)
    }

    pub(crate) fn mark_success(&mut self, payment_id: PaymentId, signature: String, now: DateTime<Utc>) {
        self.payment_status = TransactionStatus::Success;
        self.payment_id = Some(payment_id);
        self.signature = Some(signature);
        self.error_code = None;
        self.error_description = None;
        self.updated_at = now;
    }

    pub(crate) fn mark_failed(
        &mut self,
        payment_id: PaymentId,
        signature: String,
        error_code: &str,
        description: &str,
        now: DateTime<Utc>,
    ) {
        self.payment_status = TransactionStatus::Failed;
        self.record_attempt(payment_id, signature, error_code, description, now);
    }

    /// Keeps the transaction pending but records why it could not be applied.
    pub(crate) fn flag_for_review(
        &mut self,
        payment_id: PaymentId,
        signature: String,
        error_code: &str,
        description: &str,
        now: DateTime<Utc>,
    ) {
        self.record_attempt(payment_id, signature, error_code, description, now);
    }

    fn record_attempt(
        &mut self,
        payment_id: PaymentId,
        signature: String,
        error_code: &str,
        description: &str,
        now: DateTime<Utc>,
    ) {
        self.payment_id = Some(payment_id);
        self.signature = Some(signature);
        self.error_code = Some(error_code.to_string());
        self.error_description = Some(description.to_string());
        self.updated_at = now;
    }
}
