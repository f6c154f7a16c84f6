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

//! Read-only view of the hotel catalog.
//!
//! Hotel, room and user records are owned by the catalog service; the engine
//! only looks them up by id. The server seeds an [`InMemoryCatalog`] from a
//! JSON file shaped like [`CatalogSeed`]:
//!
//! ```json
//! {
//!   "hotels": [{ "id": 1, "name": "Seaside" }],
//!   "rooms": [{ "id": 10, "hotel_id": 1, "price": "2500.00", "available": true }],
//!   "users": [{ "id": 7, "email": "guest@example.com" }]
//! }
//! ```
//!
//! Prices are decimal strings.

use crate::base::{HotelId, RoomId, UserId};
use crate::BookingError;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub hotel_id: HotelId,
    /// Nightly price.
    pub price: Decimal,
    /// Whether the room is open for new bookings at all.
    pub available: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: HotelId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
}

/// Catalog lookups consumed by the booking lifecycle.
pub trait Catalog: Send + Sync {
    fn find_room(&self, id: RoomId) -> Option<Room>;
    fn find_hotel(&self, id: HotelId) -> Option<Hotel>;
    fn find_user(&self, id: UserId) -> Option<User>;
}

/// Catalog held in memory, used by the server binary and tests.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    rooms: DashMap<RoomId, Room>,
    hotels: DashMap<HotelId, Hotel>,
    users: DashMap<UserId, User>,
}

/// Catalog records loaded at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub hotels: Vec<Hotel>,
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub users: Vec<User>,
}

impl CatalogSeed {
    /// Rooms must belong to a listed hotel and carry a non-negative price.
    pub fn validate(&self) -> Result<(), BookingError> {
        let hotels: HashSet<HotelId> = self.hotels.iter().map(|h| h.id).collect();
        for room in &self.rooms {
            if !hotels.contains(&room.hotel_id) {
                return Err(BookingError::InvalidInput(format!(
                    "room {} references unknown hotel {}",
                    room.id, room.hotel_id
                )));
            }
            if room.price < Decimal::ZERO {
                return Err(BookingError::InvalidInput(format!(
                    "room {} has a negative price",
                    room.id
                )));
            }
        }
        Ok(())
    }
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: CatalogSeed) -> Result<Self, BookingError> {
        seed.validate()?;
        let catalog = Self::new();
        seed.hotels.into_iter().for_each(|h| catalog.add_hotel(h));
        seed.rooms.into_iter().for_each(|r| catalog.add_room(r));
        seed.users.into_iter().for_each(|u| catalog.add_user(u));
        Ok(catalog)
    }

    /// Parses a JSON [`CatalogSeed`].
    ///
    /// # Errors
    ///
    /// Returns [`BookingError::InvalidInput`] for malformed JSON or a seed
    /// that fails [`CatalogSeed::validate`].
    pub fn from_json(json: &str) -> Result<Self, BookingError> {
        let seed: CatalogSeed = serde_json::from_str(json)
            .map_err(|e| BookingError::InvalidInput(format!("catalog: {e}")))?;
        Self::from_seed(seed)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, BookingError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .map_err(|e| BookingError::InvalidInput(format!("catalog {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn add_hotel(&self, hotel: Hotel) {
        self.hotels.insert(hotel.id, hotel);
    }

    pub fn add_room(&self, room: Room) {
        self.rooms.insert(room.id, room);
    }

    pub fn add_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    /// Returns `false` if the room does not exist.
    pub fn set_room_price(&self, id: RoomId, price: Decimal) -> bool {
        match self.rooms.get_mut(&id) {
            Some(mut room) => {
                room.price = price;
                true
            }
            None => false,
        }
    }

    /// Returns `false` if the room does not exist.
    pub fn set_room_available(&self, id: RoomId, available: bool) -> bool {
        match self.rooms.get_mut(&id) {
            Some(mut room) => {
                room.available = available;
                true
            }
            None => false,
        }
    }
}

impl Catalog for InMemoryCatalog {
    fn find_room(&self, id: RoomId) -> Option<Room> {
        self.rooms.get(&id).map(|room| room.clone())
    }

    fn find_hotel(&self, id: HotelId) -> Option<Hotel> {
        self.hotels.get(&id).map(|hotel| hotel.clone())
    }

    fn find_user(&self, id: UserId) -> Option<User> {
        self.users.get(&id).map(|user| user.clone())
    }
}
