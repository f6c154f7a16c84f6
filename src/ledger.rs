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

//! Reservation ledger.
//!
//! The [`ReservationLedger`] is the single source of truth for bookings and
//! payment transactions. Every mutating sequence runs inside a [`RoomScope`]:
//! a critical section holding the lock of one room's booking set. The
//! overlap check, the write that depends on it, and any payment transaction
//! update for a booking of that room all happen under that one lock.
//!
//! # Thread Safety
//!
//! Rooms are stored in a [`DashMap`] of `Arc<Mutex<_>>`. Distinct rooms are
//! processed in parallel; operations on the same room are serialized.
//!
//! Lock order is always room first, then transaction log shard. Map shard
//! guards are never held while waiting on a room lock.

use crate::base::{BookingId, OrderId, RoomId, TransactionId};
use crate::booking::{Booking, NewBooking};
use crate::overlap::{DateRange, OverlapGuard};
use crate::transaction::PaymentTransaction;
use crate::transaction_log::TransactionLog;
use crate::BookingError;
use chrono::{DateTime, NaiveDate, Utc};
use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Bookings of a single room, ordered by id.
#[derive(Debug, Default)]
struct RoomBookings {
    bookings: BTreeMap<BookingId, Booking>,
}

/// Before/after snapshots of a committed booking update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingChange {
    pub before: Booking,
    pub after: Booking,
}

impl BookingChange {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Persisted store of bookings and payment transactions.
pub struct ReservationLedger {
    rooms: DashMap<RoomId, Arc<Mutex<RoomBookings>>>,
    /// Room of each booking; a booking never moves between rooms.
    booking_rooms: DashMap<BookingId, RoomId>,
    transactions: TransactionLog,
    next_booking_id: AtomicU64,
    next_transaction_id: AtomicU64,
}

impl ReservationLedger {
    pub fn new() -> Self {
        ReservationLedger {
            rooms: DashMap::new(),
            booking_rooms: DashMap::new(),
            transactions: TransactionLog::new(),
            next_booking_id: AtomicU64::new(1),
            next_transaction_id: AtomicU64::new(1),
        }
    }

    fn room(&self, room_id: RoomId) -> Arc<Mutex<RoomBookings>> {
        // Clone the Arc so the shard guard is released before locking the room.
        self.rooms
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(RoomBookings::default())))
            .clone()
    }

    /// Runs `f` while holding the lock on `room_id`'s booking set.
    pub fn with_room<R, F>(&self, room_id: RoomId, f: F) -> Result<R, BookingError>
    where
        F: FnOnce(&mut RoomScope<'_>) -> Result<R, BookingError>,
    {
        let room = self.room(room_id);
        let guard = room.lock();
        let mut scope = RoomScope {
            room_id,
            room: guard,
            ledger: self,
        };
        f(&mut scope)
    }

    /// Runs `f` while holding the lock on the room owning `booking_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] if the booking does not exist.
    pub fn with_booking<R, F>(&self, booking_id: BookingId, f: F) -> Result<R, BookingError>
    where
        F: FnOnce(&mut RoomScope<'_>) -> Result<R, BookingError>,
    {
        let room_id = self.room_of(booking_id)?;
        self.with_room(room_id, f)
    }

    fn room_of(&self, booking_id: BookingId) -> Result<RoomId, BookingError> {
        self.booking_rooms
            .get(&booking_id)
            .map(|room| *room)
            .ok_or_else(|| booking_not_found(booking_id))
    }

    /// Checks whether `[check_in, check_out)` collides with an active booking
    /// on `room_id`.
    ///
    /// The answer is only a snapshot; writers must re-check inside a
    /// [`RoomScope`] before committing.
    pub fn has_conflict(
        &self,
        room_id: RoomId,
        check_in: NaiveDate,
        check_out: NaiveDate,
        exclude: Option<BookingId>,
    ) -> Result<bool, BookingError> {
        let range = DateRange::new(check_in, check_out)?;
        self.with_room(room_id, |scope| Ok(scope.has_conflict(&range, exclude)))
    }

    pub fn get_booking(&self, booking_id: BookingId) -> Option<Booking> {
        self.with_booking(booking_id, |scope| {
            scope
                .booking(booking_id)
                .cloned()
                .ok_or_else(|| booking_not_found(booking_id))
        })
        .ok()
    }

    /// Snapshot of every booking, ordered by id.
    pub fn bookings(&self) -> Vec<Booking> {
        let rooms: Vec<Arc<Mutex<RoomBookings>>> =
            self.rooms.iter().map(|room| room.value().clone()).collect();

        let mut bookings: Vec<Booking> = rooms
            .iter()
            .flat_map(|room| room.lock().bookings.values().cloned().collect::<Vec<_>>())
            .collect();
        bookings.sort_by_key(|b| b.id);
        bookings
    }

    pub fn booking_count(&self) -> usize {
        self.booking_rooms.len()
    }

    pub fn transaction(&self, order_id: &OrderId) -> Option<PaymentTransaction> {
        self.transactions.get(order_id)
    }

    pub fn transactions_for(&self, booking_id: BookingId) -> Vec<PaymentTransaction> {
        self.transactions.for_booking(booking_id)
    }

    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    pub fn next_transaction_id(&self) -> TransactionId {
        TransactionId(self.next_transaction_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ReservationLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Critical section over one room's bookings.
///
/// Obtained through [`ReservationLedger::with_room`] or
/// [`ReservationLedger::with_booking`]. Every write re-validates the
/// no-overlap invariant before it is stored.
pub struct RoomScope<'a> {
    room_id: RoomId,
    room: MutexGuard<'a, RoomBookings>,
    ledger: &'a ReservationLedger,
}

impl RoomScope<'_> {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn booking(&self, booking_id: BookingId) -> Option<&Booking> {
        self.room.bookings.get(&booking_id)
    }

    pub fn has_conflict(&self, range: &DateRange, exclude: Option<BookingId>) -> bool {
        OverlapGuard::has_conflict(self.room.bookings.values(), self.room_id, range, exclude)
    }

    fn ensure_no_overlap(
        &self,
        range: &DateRange,
        exclude: Option<BookingId>,
    ) -> Result<(), BookingError> {
        match OverlapGuard::find_conflict(self.room.bookings.values(), self.room_id, range, exclude)
        {
            Some(existing) => Err(BookingError::Conflict(format!(
                "room {} is already booked for {} to {} (booking {})",
                self.room_id,
                range.check_in(),
                range.check_out(),
                existing
            ))),
            None => Ok(()),
        }
    }

    /// Stores a new PENDING booking.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Conflict`] if an active booking on this room
    /// overlaps the requested range.
    pub fn insert_booking(&mut self, new: NewBooking) -> Result<Booking, BookingError> {
        debug_assert_eq!(new.room_id, self.room_id, "booking inserted into the wrong room");
        self.ensure_no_overlap(&new.range, None)?;

        let id = BookingId(self.ledger.next_booking_id.fetch_add(1, Ordering::Relaxed));
        let booking = Booking::from_new(id, new);
        booking.assert_invariants();

        self.room.bookings.insert(id, booking.clone());
        self.ledger.booking_rooms.insert(id, self.room_id);
        Ok(booking)
    }

    /// Applies `f` to a copy of the booking and commits it if the result is
    /// still consistent.
    ///
    /// `updated_at` is stamped with `now` only when something changed, so a
    /// no-op update leaves the ledger untouched. Errors from `f` and overlap
    /// conflicts discard the copy.
    pub fn update_booking<F>(
        &mut self,
        booking_id: BookingId,
        now: DateTime<Utc>,
        f: F,
    ) -> Result<BookingChange, BookingError>
    where
        F: FnOnce(&mut Booking) -> Result<(), BookingError>,
    {
        let before = self
            .booking(booking_id)
            .cloned()
            .ok_or_else(|| booking_not_found(booking_id))?;

        let mut after = before.clone();
        f(&mut after)?;
        debug_assert_eq!(after.id, before.id, "booking id is immutable");
        debug_assert_eq!(after.room_id, before.room_id, "booking room is immutable");

        if after == before {
            return Ok(BookingChange { before, after });
        }
        if after.is_active() {
            self.ensure_no_overlap(&after.range(), Some(booking_id))?;
        }

        after.updated_at = now;
        after.assert_invariants();
        self.room.bookings.insert(booking_id, after.clone());
        Ok(BookingChange { before, after })
    }

    pub fn transaction(&self, order_id: &OrderId) -> Option<PaymentTransaction> {
        self.ledger.transactions.get(order_id)
    }

    pub fn transactions_for(&self, booking_id: BookingId) -> Vec<PaymentTransaction> {
        self.ledger.transactions.for_booking(booking_id)
    }

    /// # Errors
    ///
    /// Returns [`BookingError::Conflict`] if the provider order is already recorded.
    pub fn record_pending_transaction(
        &mut self,
        transaction: PaymentTransaction,
    ) -> Result<(), BookingError> {
        debug_assert!(
            self.room.bookings.contains_key(&transaction.booking_id),
            "transaction recorded outside its booking's room scope"
        );
        self.ledger.transactions.insert(transaction)
    }

    /// # Errors
    ///
    /// Returns [`BookingError::NotFound`] if no transaction exists for `order_id`.
    pub fn update_transaction<R, F>(&mut self, order_id: &OrderId, f: F) -> Result<R, BookingError>
    where
        F: FnOnce(&mut PaymentTransaction) -> R,
    {
        let mut transaction = self
            .ledger
            .transactions
            .get_mut(order_id)
            .ok_or_else(|| BookingError::NotFound(format!("payment order {order_id}")))?;
        debug_assert!(
            self.room.bookings.contains_key(&transaction.booking_id),
            "transaction updated outside its booking's room scope"
        );
        Ok(f(transaction.value_mut()))
    }
}

fn booking_not_found(booking_id: BookingId) -> BookingError {
    BookingError::NotFound(format!("booking {booking_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{HotelId, UserId};
    use crate::booking::BookingStatus;
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn new_booking(room: u64, from: u32, to: u32) -> NewBooking {
        NewBooking {
            user_id: UserId(1),
            hotel_id: HotelId(1),
            room_id: RoomId(room),
            range: DateRange::new(date(from), date(to)).unwrap(),
            number_of_guests: 2,
            total_amount: dec!(100) * rust_decimal::Decimal::from(to - from),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn insert(ledger: &ReservationLedger, room: u64, from: u32, to: u32) -> Result<Booking, BookingError> {
        ledger.with_room(RoomId(room), |scope| scope.insert_booking(new_booking(room, from, to)))
    }

    #[test]
    fn ids_are_sequential() {
        let ledger = ReservationLedger::new();
        assert_eq!(insert(&ledger, 10, 1, 4).unwrap().id, BookingId(1));
        assert_eq!(insert(&ledger, 11, 1, 4).unwrap().id, BookingId(2));
        assert_eq!(ledger.booking_count(), 2);
    }

    #[test]
    fn insert_rejects_overlap() {
        let ledger = ReservationLedger::new();
        insert(&ledger, 10, 1, 4).unwrap();
        assert!(matches!(insert(&ledger, 10, 3, 5), Err(BookingError::Conflict(_))));
        assert!(insert(&ledger, 10, 4, 6).is_ok());
        assert_eq!(ledger.booking_count(), 2);
    }

    #[test]
    fn has_conflict_reports_snapshot() {
        let ledger = ReservationLedger::new();
        let booking = insert(&ledger, 10, 1, 4).unwrap();
        assert!(ledger.has_conflict(RoomId(10), date(2), date(3), None).unwrap());
        assert!(!ledger.has_conflict(RoomId(10), date(2), date(3), Some(booking.id)).unwrap());
        assert!(ledger.has_conflict(RoomId(10), date(3), date(3), None).is_err());
    }

    #[test]
    fn noop_update_does_not_touch_timestamp() {
        let ledger = ReservationLedger::new();
        let booking = insert(&ledger, 10, 1, 4).unwrap();

        let change = ledger
            .with_booking(booking.id, |scope| {
                scope.update_booking(booking.id, Utc::now(), |_| Ok(()))
            })
            .unwrap();
        assert!(!change.changed());
        assert_eq!(ledger.get_booking(booking.id).unwrap().updated_at, booking.updated_at);
    }

    #[test]
    fn failed_update_is_discarded() {
        let ledger = ReservationLedger::new();
        let booking = insert(&ledger, 10, 1, 4).unwrap();

        let result = ledger.with_booking(booking.id, |scope| {
            scope.update_booking(booking.id, Utc::now(), |b| {
                b.number_of_guests = 9;
                b.transition_to(BookingStatus::Completed)
            })
        });
        assert!(matches!(result, Err(BookingError::InvalidTransition { .. })));
        assert_eq!(ledger.get_booking(booking.id).unwrap(), booking);
    }

    #[test]
    fn cancelled_booking_frees_the_room() {
        let ledger = ReservationLedger::new();
        let booking = insert(&ledger, 10, 1, 4).unwrap();
        ledger
            .with_booking(booking.id, |scope| {
                scope.update_booking(booking.id, Utc::now(), |b| b.cancel().map(|_| ()))
            })
            .unwrap();
        assert!(insert(&ledger, 10, 2, 3).is_ok());
    }

    #[test]
    fn unknown_booking_is_not_found() {
        let ledger = ReservationLedger::new();
        assert!(ledger.get_booking(BookingId(42)).is_none());
        let result = ledger.with_booking(BookingId(42), |_| Ok(()));
        assert!(matches!(result, Err(BookingError::NotFound(_))));
    }

    #[test]
    fn duplicate_transaction_is_rejected_under_room_scope() {
        let ledger = ReservationLedger::new();
        let booking = insert(&ledger, 10, 1, 4).unwrap();
        let order = OrderId::from("order_1");

        ledger
            .with_booking(booking.id, |scope| {
                let id = ledger.next_transaction_id();
                scope.record_pending_transaction(PaymentTransaction::pending(
                    id,
                    booking.id,
                    order.clone(),
                    dec!(300),
                    "INR".into(),
                    Utc::now(),
                ))
            })
            .unwrap();

        let second = ledger.with_booking(booking.id, |scope| {
            scope.record_pending_transaction(PaymentTransaction::pending(
                TransactionId(99),
                booking.id,
                order.clone(),
                dec!(300),
                "INR".into(),
                Utc::now(),
            ))
        });
        assert!(matches!(second, Err(BookingError::Conflict(_))));
        assert_eq!(ledger.transactions_for(booking.id).len(), 1);
    }
}
