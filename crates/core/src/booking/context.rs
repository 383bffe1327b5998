use super::inventory::{self, MAX_NIGHTS, Room};
use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());
static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{1,2})-(\d{1,2})").unwrap());
static MONTH_DAY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2})[/-](\d{1,2})").unwrap());
static SLASH_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{1,2}/\d{1,2}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Availability,
    Booking,
    Pricing,
}

/// A room offered to the caller, with the price for the requested stay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomOffer {
    #[serde(flatten)]
    pub room: Room,
    pub total_price: u64,
}

/// Slot values gathered over the call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BookingContext {
    pub intent: Option<Intent>,
    pub check_in: Option<String>,
    pub nights: Option<u32>,
    pub guests: Option<u32>,
    pub beds: Option<u32>,
    pub lounge: Option<bool>,
    pub available_rooms: Vec<RoomOffer>,
    pub selected_room: Option<String>,
    pub guest_name: Option<String>,
    pub booking_id: Option<String>,
}

impl BookingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge whatever slot values can be picked out of one caller utterance.
    pub fn update_from_text(&mut self, text: &str) {
        self.update_from_text_on(text, Utc::now().date_naive());
    }

    pub(crate) fn update_from_text_on(&mut self, text: &str, today: NaiveDate) {
        let lower = text.to_lowercase();

        if self.intent.is_none() {
            self.intent = if lower.contains("availability") || lower.contains("available") {
                Some(Intent::Availability)
            } else if ["book", "reserve", "confirm"].iter().any(|w| lower.contains(w)) {
                Some(Intent::Booking)
            } else if lower.contains("price") || lower.contains("rate") {
                Some(Intent::Pricing)
            } else {
                None
            };
        }

        if ["guest", "people", "person"].iter().any(|w| lower.contains(w)) {
            if let Some(guests) = first_integer(&lower) {
                self.guests = Some(guests);
            }
        }

        let mut beds = None;
        if lower.contains("single") {
            beds = Some(1);
        }
        if ["double", "two bed", "twin"].iter().any(|w| lower.contains(w)) {
            beds = Some(2);
        }
        if beds.is_some() {
            self.beds = beds;
        }

        if lower.contains("lounge") {
            self.lounge = Some(true);
        }
        if lower.contains("no lounge") || lower.contains("without lounge") {
            self.lounge = Some(false);
        }

        if let Some((_, rest)) = lower.split_once("name is") {
            if let Some(word) = rest.split_whitespace().next() {
                let word = word.trim_matches(|c: char| !c.is_alphanumeric());
                if !word.is_empty() {
                    self.guest_name = Some(title_case(word));
                }
            }
        }

        // A bare `M-D` is only read as a date when the caller says "date".
        let mentions_date = lower.contains("date")
            || SLASH_DATE.is_match(&lower)
            || ISO_DATE.is_match(&lower);
        if mentions_date {
            if let Some(check_in) = parse_check_in(&lower, today) {
                self.check_in = Some(check_in.format("%Y-%m-%d").to_string());
            }
        }

        if lower.contains("night") {
            match first_integer(&lower) {
                Some(nights) if nights <= MAX_NIGHTS => self.nights = Some(nights),
                Some(nights) => tracing::debug!(nights, "ignoring stay longer than {MAX_NIGHTS} nights"),
                None => {}
            }
        }

        if let Some(room) = inventory::rooms()
            .iter()
            .find(|room| lower.contains(room.id) || lower.contains(&room.name.to_lowercase()))
        {
            self.selected_room = Some(room.id.to_string());
        }
    }

    /// Rooms matching the current slots, priced for the requested nights.
    pub fn compute_availability(&self) -> Vec<RoomOffer> {
        let nights = self.nights.unwrap_or(1).max(1);
        inventory::find_rooms(self.guests.unwrap_or(1), self.beds, self.lounge)
            .into_iter()
            .map(|room| RoomOffer {
                room: room.clone(),
                total_price: room.stay_price(nights),
            })
            .collect()
    }
}

fn first_integer(text: &str) -> Option<u32> {
    INTEGER
        .captures(text)
        .and_then(|captures| captures[1].parse().ok())
        .filter(|value| *value > 0)
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `YYYY-MM-DD`, or `M/D` / `M-D` rolled over to next year once it has passed.
fn parse_check_in(text: &str, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(captures) = ISO_DATE.captures(text) {
        return NaiveDate::from_ymd_opt(
            captures[1].parse().ok()?,
            captures[2].parse().ok()?,
            captures[3].parse().ok()?,
        );
    }
    let captures = MONTH_DAY.captures(text)?;
    let month: u32 = captures[1].parse().ok()?;
    let day: u32 = captures[2].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(today.year(), month, day)?;
    if date < today {
        NaiveDate::from_ymd_opt(today.year() + 1, month, day)
    } else {
        Some(date)
    }
}
