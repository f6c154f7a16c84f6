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

//! Payment transaction store with a unique provider order index.
//!
//! Provides a concurrent map that rejects a second row for the same provider
//! order id, mirroring a unique constraint on `provider_order_id`.

use crate::BookingError;
use crate::base::{BookingId, OrderId};
use crate::transaction::PaymentTransaction;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use dashmap::mapref::one::RefMut;

/// Payment transactions keyed by provider order id.
#[derive(Debug, Default)]
pub struct TransactionLog {
    transactions: DashMap<OrderId, PaymentTransaction>,
}

impl TransactionLog {
    pub fn new() -> Self {
        Self {
            transactions: DashMap::new(),
        }
    }

    /// Adds a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::Conflict`] if a transaction for the same
    /// provider order already exists.
    pub fn insert(&self, transaction: PaymentTransaction) -> Result<(), BookingError> {
        // Entry API keeps check-and-insert atomic per shard
        match self.transactions.entry(transaction.order_id.clone()) {
            Entry::Occupied(existing) => Err(BookingError::Conflict(format!(
                "payment order {} is already recorded for booking {}",
                existing.key(),
                existing.get().booking_id
            ))),
            Entry::Vacant(entry) => {
                entry.insert(transaction);
                Ok(())
            }
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<PaymentTransaction> {
        self.transactions.get(order_id).map(|tx| tx.clone())
    }

    /// Callers must hold the owning booking's room lock.
    pub(crate) fn get_mut(
        &self,
        order_id: &OrderId,
    ) -> Option<RefMut<'_, OrderId, PaymentTransaction>> {
        self.transactions.get_mut(order_id)
    }

    /// All attempts for a booking, oldest first.
    pub fn for_booking(&self, booking_id: BookingId) -> Vec<PaymentTransaction> {
        let mut attempts: Vec<PaymentTransaction> = self
            .transactions
            .iter()
            .filter(|tx| tx.booking_id == booking_id)
            .map(|tx| tx.value().clone())
            .collect();
        attempts.sort_by_key(|tx| tx.id);
        attempts
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::TransactionId;
    use chrono::{DateTime, Utc};
    use rust_decimal_macros::dec;

    fn tx(id: u64, booking: u64, order: &str) -> PaymentTransaction {
        PaymentTransaction::pending(
            TransactionId(id),
            BookingId(booking),
            OrderId::from(order),
            dec!(100),
            "INR".to_string(),
            DateTime::<Utc>::UNIX_EPOCH,
        )
    }

    #[test]
    fn duplicate_order_is_rejected() {
        let log = TransactionLog::new();
        log.insert(tx(1, 1, "order_a")).unwrap();
        let result = log.insert(tx(2, 2, "order_a"));
        assert!(matches!(result, Err(BookingError::Conflict(_))));
        assert_eq!(log.len(), 1);
        assert_eq!(log.get(&OrderId::from("order_a")).unwrap().booking_id, BookingId(1));
    }

    #[test]
    fn attempts_are_listed_per_booking_in_order() {
        let log = TransactionLog::new();
        log.insert(tx(3, 1, "order_c")).unwrap();
        log.insert(tx(1, 1, "order_a")).unwrap();
        log.insert(tx(2, 2, "order_b")).unwrap();

        let ids: Vec<_> = log.for_booking(BookingId(1)).iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TransactionId(1), TransactionId(3)]);
        assert!(log.for_booking(BookingId(9)).is_empty());
    }
}
