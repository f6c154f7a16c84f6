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

//! Runtime configuration.

use crate::BookingError;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_CURRENCY: &str = "INR";
pub const DEFAULT_BASE_URL: &str = "https://api.razorpay.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Payment provider credentials and endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub currency: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn new(key_id: impl Into<String>, key_secret: impl Into<String>) -> Self {
        GatewayConfig {
            key_id: key_id.into(),
            key_secret: key_secret.into(),
            currency: DEFAULT_CURRENCY.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the currency; blank falls back to INR.
    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = normalize_currency(currency);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// # Errors
    ///
    /// Returns [`BookingError::Internal`] when the credentials are blank or
    /// the currency is not a three-letter code.
    pub fn validate(&self) -> Result<(), BookingError> {
        if self.key_id.trim().is_empty() || self.key_secret.trim().is_empty() {
            return Err(BookingError::internal(
                "payment gateway key id and secret must be configured",
            ));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(BookingError::internal(format!(
                "payment gateway currency {:?} is not an ISO 4217 code",
                self.currency
            )));
        }
        if self.timeout.is_zero() {
            return Err(BookingError::internal("payment gateway timeout must be positive"));
        }
        Ok(())
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &"<redacted>")
            .field("currency", &self.currency)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub gateway: GatewayConfig,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), BookingError> {
        self.gateway.validate()
    }
}

fn normalize_currency(currency: &str) -> String {
    let currency = currency.trim();
    if currency.is_empty() {
        DEFAULT_CURRENCY.to_string()
    } else {
        currency.to_ascii_uppercase()
    }
}
