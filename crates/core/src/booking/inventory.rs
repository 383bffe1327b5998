use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

/// How long an unpaid booking is held.
pub const BOOKING_HOLD_HOURS: i64 = 2;
/// Longest stay the desk will price or book.
pub const MAX_NIGHTS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Room {
    pub id: &'static str,
    pub name: &'static str,
    pub beds: u32,
    pub lounge: bool,
    pub price: u32,
    pub breakfast: bool,
    pub max_guests: u32,
    pub inventory: u32,
}

static ROOMS: LazyLock<Vec<Room>> = LazyLock::new(|| {
    vec![
        Room {
            id: "deluxe-two-bed",
            name: "Deluxe Two Bed",
            beds: 2,
            lounge: false,
            price: 5600,
            breakfast: true,
            max_guests: 3,
            inventory: 5,
        },
        Room {
            id: "deluxe-lounge",
            name: "Deluxe Lounge",
            beds: 2,
            lounge: true,
            price: 8200,
            breakfast: true,
            max_guests: 4,
            inventory: 4,
        },
        Room {
            id: "family-suite",
            name: "Family Suite",
            beds: 3,
            lounge: true,
            price: 9800,
            breakfast: true,
            max_guests: 6,
            inventory: 2,
        },
    ]
});

impl Room {
    pub fn stay_price(&self, nights: u32) -> u64 {
        u64::from(self.price) * u64::from(nights)
    }
}

pub fn rooms() -> &'static [Room] {
    &ROOMS
}

pub fn room(id: &str) -> Option<&'static Room> {
    ROOMS.iter().find(|room| room.id == id)
}

/// Rooms that fit `guests` and match the optional bed and lounge preferences.
pub fn find_rooms(guests: u32, beds: Option<u32>, lounge: Option<bool>) -> Vec<&'static Room> {
    ROOMS
        .iter()
        .filter(|room| room.max_guests >= guests)
        .filter(|room| beds.is_none_or(|beds| beds == 0 || room.beds == beds))
        .filter(|room| lounge.is_none_or(|lounge| room.lounge == lounge))
        .filter(|room| room.inventory > 0)
        .collect()
}

#[derive(Debug, Clone)]
pub struct Booking {
    pub guest_name: String,
    pub room_id: String,
    pub expires_at: DateTime<Utc>,
}

/// In-process booking ledger shared by every call.
#[derive(Debug, Default)]
pub struct BookingStore {
    bookings: Mutex<HashMap<String, Booking>>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `room` for `guest_name` and return the new booking id.
    pub fn create(&self, guest_name: &str, room: &Room) -> String {
        let booking_id = new_booking_id();
        let booking = Booking {
            guest_name: guest_name.to_string(),
            room_id: room.id.to_string(),
            expires_at: Utc::now() + Duration::hours(BOOKING_HOLD_HOURS),
        };
        tracing::info!(booking_id = %booking_id, room = room.id, "booking created");
        self.bookings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(booking_id.clone(), booking);
        booking_id
    }

    pub fn get(&self, booking_id: &str) -> Option<Booking> {
        self.bookings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(booking_id)
            .cloned()
    }
}

fn new_booking_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("RP-{}", hex[..6].to_uppercase())
}
