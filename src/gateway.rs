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

//! Payment provider adapter.
//!
//! [`PaymentGateway`] is the only outbound network call the engine makes. It
//! is invoked with no ledger lock held. [`RazorpayGateway`] speaks the
//! provider's `POST /v1/orders` contract over `reqwest`.

use crate::base::{BookingId, OrderId};
use crate::config::GatewayConfig;
use crate::BookingError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order creation request in the provider's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderRequest {
    /// Amount in the currency's minor unit (paise, cents, ...)
    pub amount: i64,
    pub currency: String,
    /// Merchant receipt; doubles as the idempotency key
    pub receipt: String,
    pub notes: OrderNotes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderNotes {
    pub booking_id: String,
}

impl OrderRequest {
    pub fn new(booking_id: BookingId, amount: i64, currency: &str, receipt: String) -> Self {
        OrderRequest {
            amount,
            currency: currency.to_string(),
            receipt,
            notes: OrderNotes {
                booking_id: booking_id.to_string(),
            },
        }
    }

    pub fn idempotency_key(&self) -> &str {
        &self.receipt
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayOrder {
    pub order_id: OrderId,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// Network failure, timeout or 5xx
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),

    /// 4xx from the provider
    #[error("payment provider rejected the order with status {status}")]
    Rejected { status: u16, body: String },

    /// 2xx without a usable order id
    #[error("payment provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

impl From<GatewayError> for BookingError {
    fn from(error: GatewayError) -> Self {
        match error {
            GatewayError::Unavailable(_) | GatewayError::InvalidResponse(_) => {
                BookingError::GatewayUnavailable(error.to_string())
            }
            GatewayError::Rejected { status, .. } => {
                BookingError::GatewayRejected(format!("provider answered {status}"))
            }
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key handed to the client for checkout.
    fn key_id(&self) -> &str;

    /// Merchant secret used to verify provider signatures.
    fn key_secret(&self) -> &str;

    fn currency(&self) -> &str;

    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError>;
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
}

pub struct RazorpayGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl RazorpayGateway {
    /// # Errors
    ///
    /// Returns [`BookingError::Internal`] if the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn new(config: GatewayConfig) -> Result<Self, BookingError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BookingError::internal(format!("failed to build http client: {e}")))?;
        Ok(RazorpayGateway { client, config })
    }

    fn orders_url(&self) -> String {
        format!("{}/v1/orders", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    fn key_id(&self) -> &str {
        &self.config.key_id
    }

    fn key_secret(&self) -> &str {
        &self.config.key_secret
    }

    fn currency(&self) -> &str {
        &self.config.currency
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder, GatewayError> {
        let response = self
            .client
            .post(self.orders_url())
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(receipt = %request.receipt, error = %e, "payment provider unreachable");
                GatewayError::Unavailable(e.to_string())
            })?;

        let status = response.status();
        if status.is_server_error() {
            tracing::warn!(receipt = %request.receipt, %status, "payment provider failed");
            return Err(GatewayError::Unavailable(format!("provider answered {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(receipt = %request.receipt, %status, %body, "payment provider rejected order");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        if order.id.trim().is_empty() {
            return Err(GatewayError::InvalidResponse("empty order id".to_string()));
        }

        tracing::debug!(receipt = %request.receipt, order_id = %order.id, "payment order created");
        Ok(GatewayOrder {
            order_id: OrderId(order.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_request_wire_shape() {
        let request = OrderRequest::new(BookingId(42), 30000, "INR", "booking-42-1717200000000".into());
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "amount": 30000,
                "currency": "INR",
                "receipt": "booking-42-1717200000000",
                "notes": { "booking_id": "42" }
            })
        );
        assert_eq!(request.idempotency_key(), "booking-42-1717200000000");
    }

    #[test]
    fn gateway_errors_map_to_booking_errors() {
        assert_eq!(
            BookingError::from(GatewayError::Unavailable("timeout".into())).code(),
            "GATEWAY_UNAVAILABLE"
        );
        assert_eq!(
            BookingError::from(GatewayError::InvalidResponse("no id".into())).code(),
            "GATEWAY_UNAVAILABLE"
        );
        let rejected = BookingError::from(GatewayError::Rejected {
            status: 400,
            body: "{\"error\":{\"code\":\"BAD_REQUEST_ERROR\"}}".into(),
        });
        assert_eq!(rejected, BookingError::GatewayRejected("provider answered 400".into()));
    }

    #[test]
    fn orders_url_tolerates_trailing_slash() {
        let gateway =
            RazorpayGateway::new(GatewayConfig::new("key", "secret").with_base_url("http://localhost:1/"))
                .unwrap();
        assert_eq!(gateway.orders_url(), "http://localhost:1/v1/orders");
    }
}
