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

use clap::Parser;
use stay_ledger_rs::http::{AppState, create_router};
use stay_ledger_rs::{
    BookingLifecycle, GatewayConfig, InMemoryCatalog, PaymentReconciler, RazorpayGateway,
    ReservationLedger, ServerConfig, SystemClock, TracingNotifier,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Stay Ledger - Room reservation and payment reconciliation server
///
/// Serves the booking and payment REST API. Hotels, rooms and users are
/// loaded from a JSON catalog file and held in memory.
#[derive(Parser, Debug)]
#[command(name = "stay-ledger")]
#[command(about = "Room reservation and payment reconciliation server", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "STAY_BIND", default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// JSON file with the hotels, rooms and users to serve
    #[arg(long, env = "STAY_CATALOG")]
    catalog: PathBuf,

    /// Payment provider public key id
    #[arg(long, env = "RAZORPAY_KEY_ID")]
    key_id: String,

    /// Payment provider key secret
    #[arg(long, env = "RAZORPAY_KEY_SECRET", hide_env_values = true)]
    key_secret: String,

    /// ISO 4217 currency for payment orders
    #[arg(long, env = "RAZORPAY_CURRENCY", default_value = "INR")]
    currency: String,

    /// Payment provider API base URL
    #[arg(long, env = "RAZORPAY_BASE_URL", default_value = "https://api.razorpay.com")]
    base_url: String,

    /// Payment provider request timeout in seconds
    #[arg(long, env = "RAZORPAY_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,
}

impl Args {
    fn into_config(self) -> (ServerConfig, PathBuf) {
        let config = ServerConfig {
            bind: self.bind,
            gateway: GatewayConfig::new(self.key_id, self.key_secret)
                .with_currency(&self.currency)
                .with_base_url(self.base_url)
                .with_timeout(Duration::from_secs(self.timeout_secs)),
        };
        (config, self.catalog)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let (config, catalog_path) = Args::parse().into_config();
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {}", e);
        process::exit(1);
    }

    let gateway = match RazorpayGateway::new(config.gateway.clone()) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            eprintln!("Error creating payment gateway: {}", e);
            process::exit(1);
        }
    };

    let ledger = Arc::new(ReservationLedger::new());
    let catalog = match InMemoryCatalog::load(&catalog_path) {
        Ok(catalog) => Arc::new(catalog),
        Err(e) => {
            eprintln!("Error loading catalog: {}", e);
            process::exit(1);
        }
    };
    tracing::info!(path = %catalog_path.display(), rooms = catalog.room_count(), "catalog loaded");
    let notifier = Arc::new(TracingNotifier);
    let clock = Arc::new(SystemClock);

    let state = AppState {
        lifecycle: Arc::new(BookingLifecycle::new(
            ledger.clone(),
            catalog,
            notifier.clone(),
            clock.clone(),
        )),
        reconciler: Arc::new(PaymentReconciler::new(ledger, gateway, notifier, clock)),
    };

    let listener = match TcpListener::bind(config.bind).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Error binding {}: {}", config.bind, e);
            process::exit(1);
        }
    };
    tracing::info!(bind = %config.bind, gateway = ?config.gateway, "stay ledger listening");

    if let Err(e) = axum::serve(listener, create_router(state)).await {
        eprintln!("Server error: {}", e);
        process::exit(1);
    }
}
