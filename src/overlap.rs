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

//! Date ranges and the room overlap predicate.
//!
//! Stays are half-open `[check_in, check_out)` intervals: a guest checking out
//! on the 4th does not block a guest checking in on the 4th.

use crate::base::{BookingId, RoomId};
use crate::booking::Booking;
use crate::BookingError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A non-empty half-open range of nights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    check_in: NaiveDate,
    check_out: NaiveDate,
}

impl DateRange {
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidInput`] unless `check_out` is after `check_in`.
    pub fn new(check_in: NaiveDate, check_out: NaiveDate) -> Result<Self, BookingError> {
        if check_out <= check_in {
            return Err(BookingError::InvalidInput(
                "checkOutDate must be after checkInDate".to_string(),
            ));
        }
        Ok(DateRange {
            check_in,
            check_out,
        })
    }

    /// Builds a range from dates already validated on the way into the ledger.
    pub(crate) fn from_ordered(check_in: NaiveDate, check_out: NaiveDate) -> Self {
        debug_assert!(check_in < check_out, "stored booking has an empty range");
        DateRange {
            check_in,
            check_out,
        }
    }

    pub fn check_in(&self) -> NaiveDate {
        self.check_in
    }

    pub fn check_out(&self) -> NaiveDate {
        self.check_out
    }

    /// Number of nights; always positive.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days()
    }

    /// `a1 < b2 && b1 < a2`
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.check_in < other.check_out && other.check_in < self.check_out
    }
}

/// Decides whether a candidate stay collides with active bookings on a room.
///
/// The guard is a pure predicate. The ledger evaluates it inside the room's
/// lock scope, in the same critical section as the write that follows.
pub struct OverlapGuard;

impl OverlapGuard {
    /// Returns the first active booking on `room_id` that overlaps `range`,
    /// ignoring `exclude`.
    pub fn find_conflict<'a, I>(
        bookings: I,
        room_id: RoomId,
        range: &DateRange,
        exclude: Option<BookingId>,
    ) -> Option<BookingId>
    where
        I: IntoIterator<Item = &'a Booking>,
    {
        bookings
            .into_iter()
            .filter(|b| b.room_id == room_id)
            .filter(|b| Some(b.id) != exclude)
            .filter(|b| b.is_active())
            .find(|b| b.range().overlaps(range))
            .map(|b| b.id)
    }

    pub fn has_conflict<'a, I>(
        bookings: I,
        room_id: RoomId,
        range: &DateRange,
        exclude: Option<BookingId>,
    ) -> bool
    where
        I: IntoIterator<Item = &'a Booking>,
    {
        Self::find_conflict(bookings, room_id, range, exclude).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{HotelId, UserId};
    use crate::booking::{BookingStatus, NewBooking};
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn range(from: u32, to: u32) -> DateRange {
        DateRange::new(date(from), date(to)).unwrap()
    }

    fn booking(id: u64, room: u64, from: u32, to: u32, status: BookingStatus) -> Booking {
        let mut b = Booking::from_new(
            BookingId(id),
            NewBooking {
                user_id: UserId(1),
                hotel_id: HotelId(1),
                room_id: RoomId(room),
                range: range(from, to),
                number_of_guests: 1,
                total_amount: dec!(100),
                created_at: DateTime::<Utc>::UNIX_EPOCH,
            },
        );
        b.booking_status = status;
        b
    }

    #[test]
    fn empty_and_inverted_ranges_are_rejected() {
        assert!(DateRange::new(date(4), date(4)).is_err());
        assert!(DateRange::new(date(5), date(4)).is_err());
        assert_eq!(range(1, 4).nights(), 3);
    }

    #[test]
    fn touching_ranges_do_not_overlap() {
        assert!(!range(1, 4).overlaps(&range(4, 6)));
        assert!(!range(4, 6).overlaps(&range(1, 4)));
    }

    #[test]
    fn overlapping_ranges() {
        assert!(range(1, 4).overlaps(&range(3, 5)));
        assert!(range(3, 5).overlaps(&range(1, 4)));
        assert!(range(1, 10).overlaps(&range(3, 4)));
        assert!(range(1, 4).overlaps(&range(1, 4)));
    }

    #[test]
    fn only_active_bookings_block() {
        let bookings = vec![
            booking(1, 10, 1, 4, BookingStatus::Cancelled),
            booking(2, 10, 1, 4, BookingStatus::Completed),
            booking(3, 10, 1, 4, BookingStatus::NoShow),
        ];
        assert!(!OverlapGuard::has_conflict(&bookings, RoomId(10), &range(2, 3), None));

        let bookings = vec![booking(4, 10, 1, 4, BookingStatus::Confirmed)];
        assert!(OverlapGuard::has_conflict(&bookings, RoomId(10), &range(2, 3), None));
    }

    #[test]
    fn other_rooms_do_not_block() {
        let bookings = vec![booking(1, 11, 1, 4, BookingStatus::Pending)];
        assert!(!OverlapGuard::has_conflict(&bookings, RoomId(10), &range(1, 4), None));
    }

    #[test]
    fn excluded_booking_is_ignored() {
        let bookings = vec![
            booking(1, 10, 1, 4, BookingStatus::Pending),
            booking(2, 10, 6, 8, BookingStatus::Pending),
        ];
        assert_eq!(
            OverlapGuard::find_conflict(&bookings, RoomId(10), &range(2, 5), Some(BookingId(1))),
            None
        );
        assert_eq!(
            OverlapGuard::find_conflict(&bookings, RoomId(10), &range(2, 7), Some(BookingId(1))),
            Some(BookingId(2))
        );
    }
}
