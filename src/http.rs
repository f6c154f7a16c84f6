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

//! REST surface.
//!
//! | Method | Path | Success |
//! |--------|------|---------|
//! | POST | `/bookings` | 201 booking |
//! | GET | `/bookings` | 200 page of bookings |
//! | GET | `/bookings/{id}` | 200 booking |
//! | PUT | `/bookings/{id}` | 200 booking |
//! | PUT | `/bookings/{id}/status` | 200 booking |
//! | PUT | `/bookings/{id}/cancel` | 200 booking |
//! | POST | `/payments/orders` | 201 order |
//! | POST | `/payments/verify` | 200 verification |

use crate::base::BookingId;
use crate::booking::Booking;
use crate::lifecycle::{BookingFilter, BookingLifecycle, CreateBooking, ModifyBooking, Page, StatusUpdate};
use crate::reconciler::{OrderCreated, PaymentReconciler, PaymentVerification, VerifyPayment};
use crate::BookingError;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    pub correlation_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub booking_id: BookingId,
}

#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<BookingLifecycle>,
    pub reconciler: Arc<PaymentReconciler>,
}

pub struct AppError(BookingError);

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError(err)
    }
}

pub fn status_of(error: &BookingError) -> StatusCode {
    match error {
        BookingError::InvalidInput(_)
        | BookingError::InvalidTransition { .. }
        | BookingError::InvalidSignature
        | BookingError::GatewayRejected(_) => StatusCode::BAD_REQUEST,
        BookingError::NotFound(_) => StatusCode::NOT_FOUND,
        BookingError::Conflict(_) | BookingError::IllegalState(_) => StatusCode::CONFLICT,
        BookingError::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
        BookingError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            status_of(&self.0),
            Json(ErrorResponse {
                error: self.0.to_string(),
                code: self.0.code().to_string(),
                correlation_id: self.0.correlation_id(),
            }),
        )
            .into_response()
    }
}

async fn create_booking(
    State(state): State<AppState>,
    Json(request): Json<CreateBooking>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.lifecycle.create(request)?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn list_bookings(
    State(state): State<AppState>,
    Query(filter): Query<BookingFilter>,
) -> Json<Page<Booking>> {
    Json(state.lifecycle.list(&filter))
}

async fn get_booking(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.lifecycle.get(BookingId(id))?))
}

async fn modify_booking(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(request): Json<ModifyBooking>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.lifecycle.modify(BookingId(id), request)?))
}

async fn set_booking_status(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.lifecycle.set_status(BookingId(id), update)?))
}

async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.lifecycle.cancel(BookingId(id))?))
}

async fn create_payment_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderCreated>), AppError> {
    let order = state.reconciler.create_order(request.booking_id).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn verify_payment(
    State(state): State<AppState>,
    Json(request): Json<VerifyPayment>,
) -> Result<Json<PaymentVerification>, AppError> {
    Ok(Json(state.reconciler.verify(request)?))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/bookings", post(create_booking).get(list_bookings))
        .route("/bookings/{id}", get(get_booking).put(modify_booking))
        .route("/bookings/{id}/status", put(set_booking_status))
        .route("/bookings/{id}/cancel", put(cancel_booking))
        .route("/payments/orders", post(create_payment_order))
        .route("/payments/verify", post(verify_payment))
        .with_state(state)
}
