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

//! Booking state change notifications.
//!
//! Every event carries the booking as committed together with the statuses it
//! had before the operation, so downstream delivery can tell what changed
//! without re-reading the ledger. Delivery is fire-and-forget from the
//! engine's point of view.

use crate::booking::{Booking, BookingStatus, PaymentStatus};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Updated,
    StatusChanged,
    Cancelled,
    PaymentVerified,
    PaymentFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingEvent {
    pub kind: EventKind,
    pub booking: Booking,
    pub previous_booking_status: BookingStatus,
    pub previous_payment_status: PaymentStatus,
}

impl BookingEvent {
    pub fn new(kind: EventKind, before: &Booking, booking: Booking) -> Self {
        BookingEvent {
            kind,
            booking,
            previous_booking_status: before.booking_status,
            previous_payment_status: before.payment_status,
        }
    }

    /// Event for a freshly created booking.
    pub fn created(booking: Booking) -> Self {
        BookingEvent {
            kind: EventKind::Created,
            previous_booking_status: booking.booking_status,
            previous_payment_status: booking.payment_status,
            booking,
        }
    }

    pub fn booking_status_changed(&self) -> bool {
        self.previous_booking_status != self.booking.booking_status
    }

    pub fn payment_status_changed(&self) -> bool {
        self.previous_payment_status != self.booking.payment_status
    }
}

/// Receives booking events.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &BookingEvent);
}

/// Logs every event; the default sink when no delivery channel is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, event: &BookingEvent) {
        let booking = &event.booking;
        tracing::info!(
            booking_id = %booking.id,
            user_id = %booking.user_id,
            kind = ?event.kind,
            booking_status = %booking.booking_status,
            payment_status = %booking.payment_status,
            previous_booking_status = %event.previous_booking_status,
            previous_payment_status = %event.previous_payment_status,
            booking_status_changed = event.booking_status_changed(),
            payment_status_changed = event.payment_status_changed(),
            "booking event"
        );
    }
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    events: Mutex<Vec<BookingEvent>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BookingEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    pub fn last(&self) -> Option<BookingEvent> {
        self.events.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, event: &BookingEvent) {
        self.events.lock().push(event.clone());
    }
}
