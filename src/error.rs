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

//! Error types for booking and payment processing.

use crate::booking::BookingStatus;
use thiserror::Error;
use uuid::Uuid;

/// Booking, ledger and payment reconciliation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// Request is malformed or violates a validation rule
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Referenced booking, catalog entity or payment order does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Overlapping booking, unavailable room, or a state that forbids the operation
    #[error("conflict: {0}")]
    Conflict(String),

    /// Requested booking status change is not in the transition table
    #[error("invalid booking status transition: {from} -> {to}")]
    InvalidTransition { from: BookingStatus, to: BookingStatus },

    /// Booking is in a terminal state for the requested mutation
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// Provider signature does not match the expected HMAC
    #[error("invalid payment signature")]
    InvalidSignature,

    /// Payment provider unreachable, timed out, or answered with a server error
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Payment provider rejected the request
    #[error("payment gateway rejected the request: {0}")]
    GatewayRejected(String),

    /// Unexpected failure; details are only in the server log
    #[error("internal error (correlation id {correlation_id})")]
    Internal { correlation_id: Uuid },
}

impl BookingError {
    /// Creates an opaque internal error and logs `context` under a fresh correlation id.
    pub fn internal(context: impl std::fmt::Display) -> Self {
        let correlation_id = Uuid::new_v4();
        tracing::error!(%correlation_id, "{context}");
        BookingError::Internal { correlation_id }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::InvalidInput(_) => "INVALID_INPUT",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::Conflict(_) => "CONFLICT",
            BookingError::InvalidTransition { .. } => "INVALID_TRANSITION",
            BookingError::IllegalState(_) => "ILLEGAL_STATE",
            BookingError::InvalidSignature => "INVALID_SIGNATURE",
            BookingError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            BookingError::GatewayRejected(_) => "GATEWAY_REJECTED",
            BookingError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn correlation_id(&self) -> Option<Uuid> {
        match self {
            BookingError::Internal { correlation_id } => Some(*correlation_id),
            _ => None,
        }
    }
}
