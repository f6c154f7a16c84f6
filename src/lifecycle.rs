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

//! Booking lifecycle.
//!
//! [`BookingLifecycle`] validates requests against the catalog and drives the
//! booking state machine through the [`ReservationLedger`]. Catalog lookups
//! happen before any room lock is taken; the overlap check and the write
//! happen together inside the room's [`RoomScope`](crate::ledger::RoomScope).
//!
//! # Operations
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | [`create`](BookingLifecycle::create) | New PENDING booking, total = nights × nightly price |
//! | [`modify`](BookingLifecycle::modify) | New dates/guests, total recomputed |
//! | [`set_status`](BookingLifecycle::set_status) | Manual booking/payment status change |
//! | [`cancel`](BookingLifecycle::cancel) | CANCELLED, refund flagged if paid |

use crate::base::{BookingId, HotelId, RoomId, UserId};
use crate::booking::{Booking, BookingStatus, NewBooking, PaymentStatus};
use crate::catalog::Catalog;
use crate::clock::Clock;
use crate::ledger::ReservationLedger;
use crate::money::stay_total;
use crate::notify::{BookingEvent, EventKind, Notifier};
use crate::overlap::DateRange;
use crate::BookingError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBooking {
    pub user_id: UserId,
    pub hotel_id: HotelId,
    pub room_id: RoomId,
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
    pub number_of_guests: u32,
}

/// Partial update; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifyBooking {
    pub check_in_date: Option<NaiveDate>,
    pub check_out_date: Option<NaiveDate>,
    pub number_of_guests: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub booking_status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingFilter {
    pub user_id: Option<UserId>,
    pub hotel_id: Option<HotelId>,
    pub room_id: Option<RoomId>,
    pub booking_status: Option<BookingStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub check_in_from: Option<NaiveDate>,
    pub check_out_to: Option<NaiveDate>,
    pub page: Option<usize>,
    pub size: Option<usize>,
}

impl BookingFilter {
    fn matches(&self, booking: &Booking) -> bool {
        self.user_id.is_none_or(|id| booking.user_id == id)
            && self.hotel_id.is_none_or(|id| booking.hotel_id == id)
            && self.room_id.is_none_or(|id| booking.room_id == id)
            && self.booking_status.is_none_or(|s| booking.booking_status == s)
            && self.payment_status.is_none_or(|s| booking.payment_status == s)
            && self.check_in_from.is_none_or(|d| booking.check_in_date >= d)
            && self.check_out_to.is_none_or(|d| booking.check_out_date <= d)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub content: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total_elements: usize,
    pub total_pages: usize,
    pub first: bool,
    pub last: bool,
}

pub struct BookingLifecycle {
    ledger: Arc<ReservationLedger>,
    catalog: Arc<dyn Catalog>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
}

impl BookingLifecycle {
    pub fn new(
        ledger: Arc<ReservationLedger>,
        catalog: Arc<dyn Catalog>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        BookingLifecycle {
            ledger,
            catalog,
            notifier,
            clock,
        }
    }

    pub fn ledger(&self) -> &Arc<ReservationLedger> {
        &self.ledger
    }

    /// Creates a PENDING booking.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidInput`] - No guests, bad dates, or room not in hotel.
    /// - [`BookingError::NotFound`] - Unknown user, hotel or room.
    /// - [`BookingError::Conflict`] - Room unavailable or already booked for an overlapping stay.
    pub fn create(&self, request: CreateBooking) -> Result<Booking, BookingError> {
        if request.number_of_guests == 0 {
            return Err(BookingError::InvalidInput(
                "numberOfGuests must be greater than 0".to_string(),
            ));
        }
        let range = validate_stay(
            request.check_in_date,
            request.check_out_date,
            self.clock.today(),
        )?;

        let user = self
            .catalog
            .find_user(request.user_id)
            .ok_or_else(|| BookingError::NotFound(format!("user {}", request.user_id)))?;
        let hotel = self
            .catalog
            .find_hotel(request.hotel_id)
            .ok_or_else(|| BookingError::NotFound(format!("hotel {}", request.hotel_id)))?;
        let room = self
            .catalog
            .find_room(request.room_id)
            .ok_or_else(|| BookingError::NotFound(format!("room {}", request.room_id)))?;

        if room.hotel_id != hotel.id {
            return Err(BookingError::InvalidInput(format!(
                "room {} does not belong to hotel {}",
                room.id, hotel.id
            )));
        }
        if !room.available {
            return Err(BookingError::Conflict(format!(
                "room {} is marked unavailable",
                room.id
            )));
        }

        let new = NewBooking {
            user_id: user.id,
            hotel_id: hotel.id,
            room_id: room.id,
            range,
            number_of_guests: request.number_of_guests,
            total_amount: stay_total(room.price, &range)?,
            created_at: self.clock.now(),
        };
        let booking = self
            .ledger
            .with_room(room.id, |scope| scope.insert_booking(new))
            .inspect_err(|e| {
                tracing::warn!(room_id = %room.id, error = %e, "booking rejected");
            })?;

        tracing::info!(
            booking_id = %booking.id,
            room_id = %booking.room_id,
            check_in = %booking.check_in_date,
            check_out = %booking.check_out_date,
            total_amount = %booking.total_amount,
            "booking created"
        );
        self.notifier.notify(&BookingEvent::created(booking.clone()));
        Ok(booking)
    }

    /// Changes dates and/or guest count and recomputes the total from the
    /// room's current price.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] - Unknown booking or its room vanished from the catalog.
    /// - [`BookingError::IllegalState`] - Booking is terminal.
    /// - [`BookingError::InvalidInput`] - Bad dates or guest count.
    /// - [`BookingError::Conflict`] - New range overlaps another active booking.
    pub fn modify(&self, id: BookingId, request: ModifyBooking) -> Result<Booking, BookingError> {
        if request.number_of_guests == Some(0) {
            return Err(BookingError::InvalidInput(
                "numberOfGuests must be greater than 0".to_string(),
            ));
        }

        let current = self.get(id)?;
        current.ensure_mutable()?;
        let room = self
            .catalog
            .find_room(current.room_id)
            .ok_or_else(|| BookingError::NotFound(format!("room {}", current.room_id)))?;

        let today = self.clock.today();
        let now = self.clock.now();
        let change = self.ledger.with_booking(id, |scope| {
            scope.update_booking(id, now, |booking| {
                // Re-checked under the lock: a concurrent cancel may have won.
                booking.ensure_mutable()?;

                let check_in = request.check_in_date.unwrap_or(booking.check_in_date);
                let check_out = request.check_out_date.unwrap_or(booking.check_out_date);
                let range = validate_stay(check_in, check_out, today)?;

                booking.check_in_date = range.check_in();
                booking.check_out_date = range.check_out();
                if let Some(guests) = request.number_of_guests {
                    booking.number_of_guests = guests;
                }
                booking.total_amount = stay_total(room.price, &range)?;
                Ok(())
            })
        })?;

        if change.changed() {
            tracing::info!(
                booking_id = %id,
                check_in = %change.after.check_in_date,
                check_out = %change.after.check_out_date,
                total_amount = %change.after.total_amount,
                "booking modified"
            );
            self.notifier
                .notify(&BookingEvent::new(EventKind::Updated, &change.before, change.after.clone()));
        }
        Ok(change.after)
    }

    /// Manual status change.
    ///
    /// The payment status is applied first, with its coupling rules, and the
    /// booking status transition is then validated against the result.
    ///
    /// # Errors
    ///
    /// - [`BookingError::InvalidInput`] - Neither status given.
    /// - [`BookingError::NotFound`] - Unknown booking.
    /// - [`BookingError::InvalidTransition`] - Booking status change not in the table.
    /// - [`BookingError::IllegalState`] - Marking a cancelled booking as paid.
    pub fn set_status(&self, id: BookingId, update: StatusUpdate) -> Result<Booking, BookingError> {
        if update.booking_status.is_none() && update.payment_status.is_none() {
            return Err(BookingError::InvalidInput(
                "at least one of bookingStatus or paymentStatus is required".to_string(),
            ));
        }

        let now = self.clock.now();
        let change = self.ledger.with_booking(id, |scope| {
            scope.update_booking(id, now, |booking| {
                if let Some(payment_status) = update.payment_status {
                    booking.apply_payment_status(payment_status)?;
                }
                if let Some(booking_status) = update.booking_status {
                    booking.transition_to(booking_status)?;
                }
                Ok(())
            })
        })?;

        if change.changed() {
            tracing::info!(
                booking_id = %id,
                from_booking_status = %change.before.booking_status,
                booking_status = %change.after.booking_status,
                from_payment_status = %change.before.payment_status,
                payment_status = %change.after.payment_status,
                "booking status changed"
            );
            self.notifier.notify(&BookingEvent::new(
                EventKind::StatusChanged,
                &change.before,
                change.after.clone(),
            ));
        }
        Ok(change.after)
    }

    /// Cancels a booking. Cancelling a cancelled booking succeeds without effect.
    ///
    /// # Errors
    ///
    /// - [`BookingError::NotFound`] - Unknown booking.
    /// - [`BookingError::IllegalState`] - Booking is COMPLETED or NO_SHOW.
    pub fn cancel(&self, id: BookingId) -> Result<Booking, BookingError> {
        let now = self.clock.now();
        let change = self.ledger.with_booking(id, |scope| {
            scope.update_booking(id, now, |booking| booking.cancel().map(|_| ()))
        })?;

        if change.changed() {
            tracing::info!(
                booking_id = %id,
                payment_status = %change.after.payment_status,
                "booking cancelled"
            );
            self.notifier.notify(&BookingEvent::new(
                EventKind::Cancelled,
                &change.before,
                change.after.clone(),
            ));
        } else {
            tracing::debug!(booking_id = %id, "booking already cancelled");
        }
        Ok(change.after)
    }

    pub fn get(&self, id: BookingId) -> Result<Booking, BookingError> {
        self.ledger
            .get_booking(id)
            .ok_or_else(|| BookingError::NotFound(format!("booking {id}")))
    }

    /// Filtered page of bookings ordered by id.
    pub fn list(&self, filter: &BookingFilter) -> Page<Booking> {
        let size = filter.size.unwrap_or(20).clamp(1, MAX_PAGE_SIZE);
        let page = filter.page.unwrap_or(0);

        let matching: Vec<Booking> = self
            .ledger
            .bookings()
            .into_iter()
            .filter(|b| filter.matches(b))
            .collect();
        let total_elements = matching.len();
        let total_pages = total_elements.div_ceil(size);
        let content = matching.into_iter().skip(page.saturating_mul(size)).take(size).collect();

        Page {
            content,
            page,
            size,
            total_elements,
            total_pages,
            first: page == 0,
            last: page.saturating_add(1) >= total_pages,
        }
    }
}

/// Check-in not in the past and check-out after check-in.
fn validate_stay(
    check_in: NaiveDate,
    check_out: NaiveDate,
    today: NaiveDate,
) -> Result<DateRange, BookingError> {
    if check_in < today {
        return Err(BookingError::InvalidInput(
            "checkInDate cannot be in the past".to_string(),
        ));
    }
    DateRange::new(check_in, check_out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, month, day).unwrap()
    }

    #[test]
    fn stay_may_start_today() {
        let today = date(6, 1);
        assert!(validate_stay(date(6, 1), date(6, 2), today).is_ok());
        assert!(validate_stay(date(5, 31), date(6, 2), today).is_err());
        assert!(validate_stay(date(6, 2), date(6, 2), today).is_err());
    }

    #[test]
    fn filter_matches_on_every_field() {
        let filter = BookingFilter {
            room_id: Some(RoomId(10)),
            check_in_from: Some(date(6, 1)),
            ..BookingFilter::default()
        };
        let json = serde_json::json!({
            "id": 1, "user_id": 1, "hotel_id": 1, "room_id": 10,
            "check_in_date": "2024-06-01", "check_out_date": "2024-06-04",
            "number_of_guests": 2, "total_amount": "300",
            "booking_status": "PENDING", "payment_status": "PENDING",
            "payment_method": null, "payment_reference": null,
            "created_at": "2024-05-01T00:00:00Z", "updated_at": "2024-05-01T00:00:00Z"
        });
        let mut booking: Booking = serde_json::from_value(json).unwrap();
        assert!(filter.matches(&booking));

        booking.room_id = RoomId(11);
        assert!(!filter.matches(&booking));
    }
}
