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

//! # Stay Ledger
//!
//! Room reservation engine: overlap-safe booking lifecycle coupled to a
//! payment state machine, and exactly-once reconciliation of signed payment
//! provider confirmations.
//!
//! ## Core Components
//!
//! - [`ReservationLedger`]: Bookings and payment transactions behind per-room lock scopes
//! - [`OverlapGuard`]: Half-open date range conflict detection
//! - [`BookingLifecycle`]: Create, modify, status change and cancel
//! - [`PaymentGateway`]: Provider order creation ([`RazorpayGateway`])
//! - [`PaymentReconciler`]: Order creation and signature verification
//! - [`BookingError`]: Error taxonomy shared by every operation
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//! use stay_ledger_rs::*;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(InMemoryCatalog::new());
//! catalog.add_hotel(Hotel { id: HotelId(1), name: "Seaside".into() });
//! catalog.add_room(Room { id: RoomId(10), hotel_id: HotelId(1), price: dec!(100), available: true });
//! catalog.add_user(User { id: UserId(7), email: "guest@example.com".into() });
//!
//! let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
//! let lifecycle = BookingLifecycle::new(
//!     Arc::new(ReservationLedger::new()),
//!     catalog,
//!     Arc::new(TracingNotifier),
//!     Arc::new(FixedClock::at_date(today)),
//! );
//!
//! let booking = lifecycle
//!     .create(CreateBooking {
//!         user_id: UserId(7),
//!         hotel_id: HotelId(1),
//!         room_id: RoomId(10),
//!         check_in_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
//!         check_out_date: NaiveDate::from_ymd_opt(2024, 6, 4).unwrap(),
//!         number_of_guests: 2,
//!     })
//!     .unwrap();
//! assert_eq!(booking.total_amount, dec!(300));
//! assert_eq!(booking.booking_status, BookingStatus::Pending);
//! ```
//!
//! ## Thread Safety
//!
//! Writers on different rooms proceed in parallel. Writers on the same room
//! are serialized by that room's lock, which covers the overlap check and the
//! write it guards. No lock is held while the payment provider is called.

mod base;
pub mod booking;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod ledger;
pub mod lifecycle;
pub mod money;
pub mod notify;
pub mod overlap;
pub mod reconciler;
pub mod signature;
pub mod transaction;
mod transaction_log;

pub use base::{BookingId, HotelId, OrderId, PaymentId, RoomId, TransactionId, UserId};
pub use booking::{Booking, BookingStatus, NewBooking, PaymentMethod, PaymentStatus};
pub use catalog::{Catalog, CatalogSeed, Hotel, InMemoryCatalog, Room, User};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{GatewayConfig, ServerConfig};
pub use error::BookingError;
pub use gateway::{GatewayError, GatewayOrder, OrderRequest, PaymentGateway, RazorpayGateway};
pub use ledger::{BookingChange, ReservationLedger, RoomScope};
pub use lifecycle::{BookingFilter, BookingLifecycle, CreateBooking, ModifyBooking, Page, StatusUpdate};
pub use notify::{BookingEvent, EventKind, MemoryNotifier, Notifier, TracingNotifier};
pub use overlap::{DateRange, OverlapGuard};
pub use reconciler::{OrderCreated, PaymentReconciler, PaymentVerification, VerifyPayment};
pub use transaction::{PaymentTransaction, TransactionStatus};
pub use transaction_log::TransactionLog;
