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

//! Property-based tests for the reservation engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! booking operations.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use stay_ledger_rs::money::to_minor_units;
use stay_ledger_rs::*;
use std::sync::Arc;

const ROOMS: u64 = 3;

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn day(offset: u64) -> NaiveDate {
    base_date() + Days::new(offset)
}

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Nightly price from 0.01 to 100000.00.
fn arb_price() -> impl Strategy<Value = Decimal> {
    (1i64..=10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

#[derive(Debug, Clone)]
enum Op {
    Create { room: u64, start: u64, nights: u64 },
    Modify { index: usize, start: u64, nights: u64 },
    Cancel { index: usize },
    SetStatus { index: usize, status: BookingStatus },
}

fn arb_status() -> impl Strategy<Value = BookingStatus> {
    prop::sample::select(BookingStatus::ALL.to_vec())
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..ROOMS, 0u64..30, 1u64..7)
            .prop_map(|(room, start, nights)| Op::Create { room, start, nights }),
        2 => (any::<usize>(), 0u64..30, 1u64..7)
            .prop_map(|(index, start, nights)| Op::Modify { index, start, nights }),
        1 => any::<usize>().prop_map(|index| Op::Cancel { index }),
        1 => (any::<usize>(), arb_status())
            .prop_map(|(index, status)| Op::SetStatus { index, status }),
    ]
}

// =============================================================================
// Helpers
// =============================================================================

fn lifecycle(prices: &[Decimal]) -> BookingLifecycle {
    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.add_hotel(Hotel {
        id: HotelId(1),
        name: "Seaside".into(),
    });
    catalog.add_user(User {
        id: UserId(1),
        email: "guest@example.com".into(),
    });
    for (room, price) in prices.iter().enumerate() {
        catalog.add_room(Room {
            id: RoomId(room as u64),
            hotel_id: HotelId(1),
            price: *price,
            available: true,
        });
    }

    BookingLifecycle::new(
        Arc::new(ReservationLedger::new()),
        catalog,
        Arc::new(MemoryNotifier::new()),
        Arc::new(FixedClock::at_date(base_date())),
    )
}

fn active_overlaps(bookings: &[Booking]) -> Vec<(BookingId, BookingId)> {
    let active: Vec<&Booking> = bookings.iter().filter(|b| b.is_active()).collect();
    let mut overlaps = Vec::new();
    for (i, a) in active.iter().enumerate() {
        for b in &active[i + 1..] {
            if a.room_id == b.room_id && a.range().overlaps(&b.range()) {
                overlaps.push((a.id, b.id));
            }
        }
    }
    overlaps
}

fn expected_total(price: Decimal, booking: &Booking) -> Decimal {
    let nights = (booking.check_out_date - booking.check_in_date).num_days();
    price * Decimal::from(nights)
}

// =============================================================================
// Ledger Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Active bookings on a room never overlap, whatever the operation order.
    #[test]
    fn active_bookings_never_overlap(ops in prop::collection::vec(arb_op(), 1..60)) {
        let prices = vec![Decimal::new(10000, 2); ROOMS as usize];
        let lifecycle = lifecycle(&prices);
        let mut ids: Vec<BookingId> = Vec::new();

        for op in ops {
            match op {
                Op::Create { room, start, nights } => {
                    let result = lifecycle.create(CreateBooking {
                        user_id: UserId(1),
                        hotel_id: HotelId(1),
                        room_id: RoomId(room),
                        check_in_date: day(start),
                        check_out_date: day(start + nights),
                        number_of_guests: 1,
                    });
                    if let Ok(booking) = result {
                        ids.push(booking.id);
                    }
                }
                Op::Modify { index, start, nights } if !ids.is_empty() => {
                    let _ = lifecycle.modify(ids[index % ids.len()], ModifyBooking {
                        check_in_date: Some(day(start)),
                        check_out_date: Some(day(start + nights)),
                        number_of_guests: None,
                    });
                }
                Op::Cancel { index } if !ids.is_empty() => {
                    let _ = lifecycle.cancel(ids[index % ids.len()]);
                }
                Op::SetStatus { index, status } if !ids.is_empty() => {
                    let _ = lifecycle.set_status(ids[index % ids.len()], StatusUpdate {
                        booking_status: Some(status),
                        payment_status: None,
                    });
                }
                _ => {}
            }

            let bookings = lifecycle.ledger().bookings();
            prop_assert!(active_overlaps(&bookings).is_empty(), "{:?}", active_overlaps(&bookings));
        }
    }

    /// A cancelled booking never blocks a later create on the same range.
    #[test]
    fn cancelled_range_is_reusable(start in 0u64..30, nights in 1u64..7) {
        let lifecycle = lifecycle(&[Decimal::ONE_HUNDRED]);
        let request = CreateBooking {
            user_id: UserId(1),
            hotel_id: HotelId(1),
            room_id: RoomId(0),
            check_in_date: day(start),
            check_out_date: day(start + nights),
            number_of_guests: 1,
        };

        let first = lifecycle.create(request.clone()).unwrap();
        prop_assert!(matches!(lifecycle.create(request.clone()), Err(BookingError::Conflict(_))));
        lifecycle.cancel(first.id).unwrap();
        prop_assert!(lifecycle.create(request).is_ok());
    }
}

// =============================================================================
// Money Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Totals are exactly price × nights after create and after modify.
    #[test]
    fn total_is_exact_price_times_nights(
        price in arb_price(),
        start in 0u64..30,
        nights in 1u64..30,
        new_nights in 1u64..30,
    ) {
        let lifecycle = lifecycle(&[price]);
        let booking = lifecycle.create(CreateBooking {
            user_id: UserId(1),
            hotel_id: HotelId(1),
            room_id: RoomId(0),
            check_in_date: day(start),
            check_out_date: day(start + nights),
            number_of_guests: 2,
        }).unwrap();
        prop_assert_eq!(booking.total_amount, expected_total(price, &booking));

        let modified = lifecycle.modify(booking.id, ModifyBooking {
            check_out_date: Some(day(start + new_nights)),
            ..ModifyBooking::default()
        }).unwrap();
        prop_assert_eq!(modified.total_amount, expected_total(price, &modified));
        prop_assert_eq!(modified.total_amount, price * Decimal::from(new_nights));
    }

    /// Two-decimal amounts convert exactly to paise.
    #[test]
    fn two_decimal_amounts_convert_exactly(cents in 0i64..=1_000_000_000_000i64) {
        let amount = Decimal::new(cents, 2);
        prop_assert_eq!(to_minor_units(amount, "INR").unwrap(), cents);
        prop_assert_eq!(to_minor_units(amount, "USD").unwrap(), cents);
    }

    /// Sub-paise remainders are refused instead of rounded.
    #[test]
    fn sub_minor_unit_amounts_are_refused(mills in 0i64..=1_000_000_000i64) {
        prop_assume!(mills % 10 != 0);
        let amount = Decimal::new(mills, 3);
        prop_assert!(matches!(to_minor_units(amount, "INR"), Err(BookingError::InvalidInput(_))));
    }

    /// Half-open overlap agrees with a night-by-night comparison.
    #[test]
    fn overlap_matches_shared_nights(
        a_start in 0u64..20, a_len in 1u64..6,
        b_start in 0u64..20, b_len in 1u64..6,
    ) {
        let a = DateRange::new(day(a_start), day(a_start + a_len)).unwrap();
        let b = DateRange::new(day(b_start), day(b_start + b_len)).unwrap();
        let shared = (a_start..a_start + a_len).any(|n| (b_start..b_start + b_len).contains(&n));

        prop_assert_eq!(a.overlaps(&b), shared);
        prop_assert_eq!(a.overlaps(&b), b.overlaps(&a));
    }
}
