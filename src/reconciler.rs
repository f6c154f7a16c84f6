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

//! Payment reconciliation.
//!
//! [`PaymentReconciler`] creates provider orders for bookings and applies the
//! provider's signed confirmation to the ledger exactly once. The provider
//! order id is the idempotency boundary: every decision in [`verify`] is
//! taken under the booking's room lock, so racing confirmations for the same
//! order observe each other's outcome.
//!
//! Verification outcomes:
//!
//! | Signature | Order / booking state | Result |
//! |-----------|-----------------------|--------|
//! | any | order already settled by the same payment | replayed success |
//! | invalid | booking already paid | `InvalidSignature`, nothing written |
//! | invalid | otherwise | `InvalidSignature`, order FAILED, payment FAILED |
//! | valid | order settled by another payment | `Conflict`, nothing written |
//! | valid | booking paid through another order | `Conflict`, order flagged `DUPLICATE_PAYMENT` |
//! | valid | booking terminal | `Conflict`, order flagged `REFUND_REVIEW_REQUIRED` |
//! | valid | order amount differs from booking total | `Conflict`, order flagged `AMOUNT_MISMATCH` |
//! | valid | otherwise | order SUCCESS, payment SUCCESS, PENDING booking CONFIRMED |
//!
//! [`verify`]: PaymentReconciler::verify

use crate::base::{BookingId, OrderId, PaymentId};
use crate::booking::{Booking, BookingStatus, PaymentMethod, PaymentStatus};
use crate::clock::Clock;
use crate::gateway::{OrderRequest, PaymentGateway};
use crate::ledger::{BookingChange, ReservationLedger};
use crate::money::to_minor_units;
use crate::notify::{BookingEvent, EventKind, Notifier};
use crate::signature;
use crate::transaction::{
    PaymentTransaction, AMOUNT_MISMATCH, DUPLICATE_PAYMENT, REFUND_REVIEW_REQUIRED, SIGNATURE_MISMATCH,
};
use crate::BookingError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SIGNATURE_MISMATCH_DESCRIPTION: &str = "Razorpay signature verification failed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub booking_id: BookingId,
    pub order_id: OrderId,
    pub key_id: String,
    pub amount_minor_units: i64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
}

/// Signed confirmation relayed by the client after checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPayment {
    pub booking_id: BookingId,
    pub provider_order_id: OrderId,
    pub provider_payment_id: PaymentId,
    pub provider_signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub booking_id: BookingId,
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    /// True when the order had already been settled by this payment
    pub already_verified: bool,
}

enum Settlement {
    Settled {
        change: BookingChange,
        already_verified: bool,
    },
    Refused {
        change: BookingChange,
        error: BookingError,
    },
}

pub struct PaymentReconciler {
    ledger: Arc<ReservationLedger>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl PaymentReconciler {
    pub fn new(
        ledger: Arc<ReservationLedger>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        PaymentReconciler {
            ledger,
            gateway,
            notifier,
            clock,
        }
    }

    /// Creates a provider order for the booking's total.
    ///
    /// The provider is called without any ledger lock held. The order is only
    /// recorded once the provider has confirmed it, after re-checking under
    /// the room lock that the booking is still payable at the same amount.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] - Unknown booking.
    /// - [`BookingError::Conflict`] - Booking is terminal, already paid, or changed meanwhile.
    /// - [`BookingError::InvalidInput`] - Total is not exactly representable in minor units.
    /// - [`BookingError::GatewayUnavailable`] / [`BookingError::GatewayRejected`] - Provider failure.
    pub async fn create_order(&self, booking_id: BookingId) -> Result<OrderCreated, BookingError> {
        let booking = self
            .ledger
            .get_booking(booking_id)
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;
        ensure_payable(&booking)?;

        let currency = self.gateway.currency().to_string();
        let amount_minor_units = to_minor_units(booking.total_amount, &currency)?;
        let receipt = format!(
            "booking-{}-{}",
            booking_id,
            self.clock.now().timestamp_millis()
        );
        let request = OrderRequest::new(booking_id, amount_minor_units, &currency, receipt);

        let order = self.gateway.create_order(&request).await.inspect_err(|e| {
            tracing::warn!(booking_id = %booking_id, error = %e, "payment order creation failed");
        })?;

        let now = self.clock.now();
        let transaction_id = self.ledger.next_transaction_id();
        let quoted_amount = booking.total_amount;
        let change = self.ledger.with_booking(booking_id, |scope| {
            let current = scope
                .booking(booking_id)
                .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;
            ensure_payable(current)?;
            if current.total_amount != quoted_amount {
                return Err(BookingError::Conflict(format!(
                    "booking {booking_id} total changed while the payment order was created"
                )));
            }

            scope.record_pending_transaction(PaymentTransaction::pending(
                transaction_id,
                booking_id,
                order.order_id.clone(),
                quoted_amount,
                currency.clone(),
                now,
            ))?;
            scope.update_booking(booking_id, now, |booking| {
                booking.payment_method = Some(PaymentMethod::Razorpay);
                booking.payment_reference = Some(order.order_id.to_string());
                if booking.payment_status == PaymentStatus::Failed {
                    booking.payment_status = PaymentStatus::Pending;
                }
                Ok(())
            })
        });
        let change = change.inspect_err(|e| {
            tracing::warn!(
                booking_id = %booking_id,
                order_id = %order.order_id,
                error = %e,
                "provider order created but not recorded"
            );
        })?;

        tracing::info!(
            booking_id = %booking_id,
            order_id = %order.order_id,
            amount_minor_units,
            currency = %currency,
            "payment order created"
        );
        Ok(OrderCreated {
            booking_id,
            order_id: order.order_id,
            key_id: self.gateway.key_id().to_string(),
            amount_minor_units,
            currency,
            payment_method: PaymentMethod::Razorpay,
            payment_status: change.after.payment_status,
            booking_status: change.after.booking_status,
        })
    }

    /// Applies a signed provider confirmation.
    ///
    /// Every call that reaches a verdict emits one notification carrying the
    /// booking's previous statuses.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidInput`] - Blank identifiers or signature.
    /// - [`BookingError::NotFound`] - Unknown order, or order belongs to another booking.
    /// - [`BookingError::InvalidSignature`] - Signature mismatch.
    /// - [`BookingError::Conflict`] - Valid payment that cannot be applied to the booking.
    pub fn verify(&self, request: VerifyPayment) -> Result<PaymentVerification, BookingError> {
        let VerifyPayment {
            booking_id,
            provider_order_id: order_id,
            provider_payment_id: payment_id,
            provider_signature: provided_signature,
        } = request;
        if order_id.as_str().trim().is_empty()
            || payment_id.as_str().trim().is_empty()
            || provided_signature.trim().is_empty()
        {
            return Err(BookingError::InvalidInput(
                "providerOrderId, providerPaymentId and providerSignature are required".to_string(),
            ));
        }

        let signature_valid = signature::verify(
            &order_id,
            &payment_id,
            &provided_signature,
            self.gateway.key_secret(),
        )?;
        let now = self.clock.now();

        let settlement = self.ledger.with_booking(booking_id, |scope| {
            let transaction = scope
                .transaction(&order_id)
                .filter(|t| t.booking_id == booking_id)
                .ok_or_else(|| order_not_found(booking_id, &order_id))?;
            let booking = scope
                .booking(booking_id)
                .cloned()
                .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))?;
            let unchanged = BookingChange {
                before: booking.clone(),
                after: booking.clone(),
            };

            if transaction.settled_by(&payment_id) {
                return Ok(Settlement::Settled {
                    change: unchanged,
                    already_verified: true,
                });
            }

            let already_paid = booking.payment_status == PaymentStatus::Success
                || scope.transactions_for(booking_id).iter().any(PaymentTransaction::is_settled);

            if !signature_valid {
                if already_paid {
                    return Ok(Settlement::Refused {
                        change: unchanged,
                        error: BookingError::InvalidSignature,
                    });
                }
                let change = scope.update_booking(booking_id, now, |booking| {
                    if booking.payment_status == PaymentStatus::Pending {
                        booking.apply_payment_status(PaymentStatus::Failed)?;
                    }
                    Ok(())
                })?;
                scope.update_transaction(&order_id, |t| {
                    t.mark_failed(
                        payment_id.clone(),
                        provided_signature.clone(),
                        SIGNATURE_MISMATCH,
                        SIGNATURE_MISMATCH_DESCRIPTION,
                        now,
                    );
                })?;
                return Ok(Settlement::Refused {
                    change,
                    error: BookingError::InvalidSignature,
                });
            }

            if transaction.is_settled() {
                return Ok(Settlement::Refused {
                    change: unchanged,
                    error: BookingError::Conflict(format!(
                        "payment order {order_id} was already settled by another payment"
                    )),
                });
            }

            if already_paid {
                scope.update_transaction(&order_id, |t| {
                    t.flag_for_review(
                        payment_id.clone(),
                        provided_signature.clone(),
                        DUPLICATE_PAYMENT,
                        "booking already paid through another order",
                        now,
                    );
                })?;
                return Ok(Settlement::Refused {
                    change: unchanged,
                    error: BookingError::Conflict(format!(
                        "booking {booking_id} is already paid; payment {payment_id} requires refund review"
                    )),
                });
            }

            if booking.is_terminal() || booking.payment_status == PaymentStatus::Refunded {
                scope.update_transaction(&order_id, |t| {
                    t.flag_for_review(
                        payment_id.clone(),
                        provided_signature.clone(),
                        REFUND_REVIEW_REQUIRED,
                        "booking can no longer be paid",
                        now,
                    );
                })?;
                return Ok(Settlement::Refused {
                    change: unchanged,
                    error: BookingError::Conflict(format!(
                        "booking {booking_id} is {}; payment {payment_id} requires refund review",
                        booking.booking_status
                    )),
                });
            }

            if transaction.amount != booking.total_amount {
                let quoted = transaction.amount;
                scope.update_transaction(&order_id, |t| {
                    t.flag_for_review(
                        payment_id.clone(),
                        provided_signature.clone(),
                        AMOUNT_MISMATCH,
                        "order amount no longer matches the booking total",
                        now,
                    );
                })?;
                return Ok(Settlement::Refused {
                    change: unchanged,
                    error: BookingError::Conflict(format!(
                        "payment order {order_id} was for {quoted} but booking {booking_id} now totals {}",
                        booking.total_amount
                    )),
                });
            }

            let change = scope.update_booking(booking_id, now, |booking| {
                booking.apply_payment_status(PaymentStatus::Success)?;
                booking.payment_method = Some(PaymentMethod::Razorpay);
                booking.payment_reference = Some(payment_id.to_string());
                Ok(())
            })?;
            scope.update_transaction(&order_id, |t| {
                t.mark_success(payment_id.clone(), provided_signature.clone(), now);
            })?;
            Ok(Settlement::Settled {
                change,
                already_verified: false,
            })
        })?;

        match settlement {
            Settlement::Settled {
                change,
                already_verified,
            } => {
                if already_verified {
                    tracing::debug!(booking_id = %booking_id, order_id = %order_id, "payment already verified");
                } else {
                    tracing::info!(
                        booking_id = %booking_id,
                        order_id = %order_id,
                        payment_id = %payment_id,
                        booking_status = %change.after.booking_status,
                        "payment verified"
                    );
                }
                self.notifier.notify(&BookingEvent::new(
                    EventKind::PaymentVerified,
                    &change.before,
                    change.after.clone(),
                ));
                Ok(verification(&change.after, order_id, payment_id, already_verified))
            }
            Settlement::Refused { change, error } => {
                tracing::warn!(
                    booking_id = %booking_id,
                    order_id = %order_id,
                    payment_id = %payment_id,
                    error = %error,
                    "payment verification refused"
                );
                self.notifier.notify(&BookingEvent::new(
                    EventKind::PaymentFailed,
                    &change.before,
                    change.after,
                ));
                Err(error)
            }
        }
    }
}

/// Orders may only be created for live, unpaid bookings.
fn ensure_payable(booking: &Booking) -> Result<(), BookingError> {
    if booking.is_terminal() {
        return Err(BookingError::Conflict(format!(
            "booking {} is {} and cannot be paid",
            booking.id, booking.booking_status
        )));
    }
    match booking.payment_status {
        PaymentStatus::Pending | PaymentStatus::Failed => Ok(()),
        status => Err(BookingError::Conflict(format!(
            "booking {} payment is already {status}",
            booking.id
        ))),
    }
}

fn order_not_found(booking_id: BookingId, order_id: &OrderId) -> BookingError {
    BookingError::NotFound(format!("payment order {order_id} for booking {booking_id}"))
}

fn verification(
    booking: &Booking,
    order_id: OrderId,
    payment_id: PaymentId,
    already_verified: bool,
) -> PaymentVerification {
    PaymentVerification {
        booking_id: booking.id,
        order_id,
        payment_id,
        payment_status: booking.payment_status,
        booking_status: booking.booking_status,
        already_verified,
    }
}
