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

//! Booking records and the booking/payment state machines.
//!
//! Booking status transitions:
//!
//! ```text
//!  PENDING ──► CONFIRMED ──► COMPLETED
//!     │            │    └──► NO_SHOW
//!     └──► CANCELLED ◄┘
//! ```
//!
//! CANCELLED, COMPLETED and NO_SHOW are terminal. Payment status is tracked
//! independently but coupled to the booking status through the rules in
//! [`Booking::apply_payment_status`] and [`Booking::transition_to`]:
//!
//! - payment SUCCESS while PENDING promotes the booking to CONFIRMED
//! - payment REFUNDED while CONFIRMED demotes the booking to CANCELLED
//! - entering CANCELLED with a successful payment marks it REFUNDED
//!
//! # Example
//!
//! ```
//! use stay_ledger_rs::{BookingStatus, PaymentStatus};
//!
//! assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Confirmed));
//! assert!(!BookingStatus::Cancelled.can_transition_to(BookingStatus::Confirmed));
//! assert!(BookingStatus::Confirmed.is_active());
//! assert_ne!(PaymentStatus::Success, PaymentStatus::Refunded);
//! ```

use crate::base::{BookingId, HotelId, RoomId, UserId};
use crate::overlap::DateRange;
use crate::BookingError;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Completed,
        BookingStatus::NoShow,
    ];

    /// Active bookings block overlapping reservations on the same room.
    pub fn is_active(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Manual transition table. `current == next` is always allowed.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;

        if self == next {
            return true;
        }
        match self {
            Pending => matches!(next, Confirmed | Cancelled),
            Confirmed => matches!(next, Completed | Cancelled | NoShow),
            Cancelled | Completed | NoShow => false,
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::NoShow => "NO_SHOW",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Success,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Razorpay,
}

/// A booking that has passed validation but has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub user_id: UserId,
    pub hotel_id: HotelId,
    pub room_id: RoomId,
    pub range: DateRange,
    pub number_of_guests: u32,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A room reservation.
///
/// Bookings are never removed; cancellation is a status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub hotel_id: HotelId,
    pub room_id: RoomId,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub number_of_guests: u32,
    pub total_amount: Decimal,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: Option<PaymentMethod>,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn from_new(id: BookingId, new: NewBooking) -> Self {
        Booking {
            id,
            user_id: new.user_id,
            hotel_id: new.hotel_id,
            room_id: new.room_id,
            check_in_date: new.range.check_in(),
            check_out_date: new.range.check_out(),
            number_of_guests: new.number_of_guests,
            total_amount: new.total_amount,
            booking_status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            payment_reference: None,
            created_at: new.created_at,
            updated_at: new.created_at,
        }
    }

    pub fn range(&self) -> DateRange {
        DateRange::from_ordered(self.check_in_date, self.check_out_date)
    }

    pub fn is_active(&self) -> bool {
        self.booking_status.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.booking_status.is_terminal()
    }

    /// Fails with [`BookingError::IllegalState`] once the booking is terminal.
    pub fn ensure_mutable(&self) -> Result<(), BookingError> {
        if self.is_terminal() {
            return Err(BookingError::IllegalState(format!(
                "booking {} is {} and can no longer be modified",
                self.id, self.booking_status
            )));
        }
        Ok(())
    }

    pub(crate) fn assert_invariants(&self) {
        debug_assert!(
            self.check_in_date < self.check_out_date,
            "Invariant violated: booking {} has an empty date range",
            self.id
        );
        debug_assert!(
            self.total_amount >= Decimal::ZERO,
            "Invariant violated: booking {} has a negative total: {}",
            self.id,
            self.total_amount
        );
        debug_assert!(
            self.payment_status != PaymentStatus::Success
                || matches!(
                    self.booking_status,
                    BookingStatus::Confirmed | BookingStatus::Completed | BookingStatus::NoShow
                ),
            "Invariant violated: booking {} is {} with a successful payment",
            self.id,
            self.booking_status
        );
    }

    /// Applies a booking status change from the transition table.
    ///
    /// Entering CANCELLED with a successful payment marks the payment REFUNDED;
    /// the refund itself is reconciled elsewhere.
    pub fn transition_to(&mut self, next: BookingStatus) -> Result<(), BookingError> {
        if !self.booking_status.can_transition_to(next) {
            return Err(BookingError::InvalidTransition {
                from: self.booking_status,
                to: next,
            });
        }
        self.booking_status = next;
        if next == BookingStatus::Cancelled && self.payment_status == PaymentStatus::Success {
            self.payment_status = PaymentStatus::Refunded;
        }
        Ok(())
    }

    /// Applies a payment status change together with its booking side effects.
    pub fn apply_payment_status(&mut self, next: PaymentStatus) -> Result<(), BookingError> {
        if next == PaymentStatus::Success && self.booking_status == BookingStatus::Cancelled {
            return Err(BookingError::IllegalState(format!(
                "booking {} is CANCELLED and cannot be marked as paid",
                self.id
            )));
        }

        self.payment_status = next;
        match (next, self.booking_status) {
            (PaymentStatus::Success, BookingStatus::Pending) => {
                self.booking_status = BookingStatus::Confirmed;
            }
            (PaymentStatus::Refunded, BookingStatus::Confirmed) => {
                self.booking_status = BookingStatus::Cancelled;
            }
            _ => {}
        }
        Ok(())
    }

    /// Cancels the booking.
    ///
    /// Returns `Ok(false)` when the booking was already cancelled.
    pub fn cancel(&mut self) -> Result<bool, BookingError> {
        match self.booking_status {
            BookingStatus::Cancelled => Ok(false),
            BookingStatus::Completed | BookingStatus::NoShow => {
                Err(BookingError::IllegalState(format!(
                    "cannot cancel a {} booking",
                    self.booking_status
                )))
            }
            BookingStatus::Pending | BookingStatus::Confirmed => {
                self.transition_to(BookingStatus::Cancelled)?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn booking(status: BookingStatus, payment: PaymentStatus) -> Booking {
        let created_at = DateTime::<Utc>::UNIX_EPOCH;
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
        )
        .unwrap();
        let mut booking = Booking::from_new(
            BookingId(1),
            NewBooking {
                user_id: UserId(1),
                hotel_id: HotelId(1),
                room_id: RoomId(10),
                range,
                number_of_guests: 2,
                total_amount: dec!(300),
                created_at,
            },
        );
        booking.booking_status = status;
        booking.payment_status = payment;
        booking
    }

    #[test]
    fn new_booking_starts_pending() {
        let b = booking(BookingStatus::Pending, PaymentStatus::Pending);
        assert_eq!(b.created_at, b.updated_at);
        assert_eq!(b.check_in_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert!(b.is_active());
        b.assert_invariants();
    }

    #[test]
    fn terminal_states_allow_no_transitions() {
        for terminal in [
            BookingStatus::Cancelled,
            BookingStatus::Completed,
            BookingStatus::NoShow,
        ] {
            for next in BookingStatus::ALL {
                assert_eq!(terminal.can_transition_to(next), terminal == next);
            }
        }
    }

    #[test]
    fn payment_success_promotes_pending() {
        let mut b = booking(BookingStatus::Pending, PaymentStatus::Pending);
        b.apply_payment_status(PaymentStatus::Success).unwrap();
        assert_eq!(b.booking_status, BookingStatus::Confirmed);
        b.assert_invariants();
    }

    #[test]
    fn refund_demotes_confirmed() {
        let mut b = booking(BookingStatus::Confirmed, PaymentStatus::Success);
        b.apply_payment_status(PaymentStatus::Refunded).unwrap();
        assert_eq!(b.booking_status, BookingStatus::Cancelled);
    }

    #[test]
    fn refund_on_completed_keeps_status() {
        let mut b = booking(BookingStatus::Completed, PaymentStatus::Success);
        b.apply_payment_status(PaymentStatus::Refunded).unwrap();
        assert_eq!(b.booking_status, BookingStatus::Completed);
    }

    #[test]
    fn cancelled_booking_cannot_be_marked_paid() {
        let mut b = booking(BookingStatus::Cancelled, PaymentStatus::Failed);
        let result = b.apply_payment_status(PaymentStatus::Success);
        assert!(matches!(result, Err(BookingError::IllegalState(_))));
        assert_eq!(b.payment_status, PaymentStatus::Failed);
    }

    #[test]
    fn cancel_paid_booking_marks_refund() {
        let mut b = booking(BookingStatus::Confirmed, PaymentStatus::Success);
        assert_eq!(b.cancel(), Ok(true));
        assert_eq!(b.booking_status, BookingStatus::Cancelled);
        assert_eq!(b.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut b = booking(BookingStatus::Cancelled, PaymentStatus::Refunded);
        assert_eq!(b.cancel(), Ok(false));
        assert_eq!(b.payment_status, PaymentStatus::Refunded);
    }

    #[test]
    fn cancel_rejects_completed_and_no_show() {
        for status in [BookingStatus::Completed, BookingStatus::NoShow] {
            let mut b = booking(status, PaymentStatus::Success);
            assert!(matches!(b.cancel(), Err(BookingError::IllegalState(_))));
            assert_eq!(b.booking_status, status);
        }
    }

    #[test]
    fn manual_cancel_of_paid_booking_refunds() {
        let mut b = booking(BookingStatus::Confirmed, PaymentStatus::Success);
        b.transition_to(BookingStatus::Cancelled).unwrap();
        assert_eq!(b.payment_status, PaymentStatus::Refunded);
        b.assert_invariants();
    }

    #[test]
    fn statuses_serialize_in_screaming_case() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::NoShow).unwrap(),
            "\"NO_SHOW\""
        );
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Refunded).unwrap(),
            "\"REFUNDED\""
        );
        assert_eq!(BookingStatus::NoShow.to_string(), "NO_SHOW");
    }
}
