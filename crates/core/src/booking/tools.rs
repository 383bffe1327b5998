use super::context::BookingContext;
use super::inventory::{self, BookingStore, MAX_NIGHTS};
use concierge_types::{FunctionTool, Tool};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub const GET_AVAILABILITY: &str = "get_availability";
pub const CHOOSE_ROOM: &str = "choose_room";
pub const FINALIZE_BOOKING: &str = "finalize_booking";

#[derive(Debug, Deserialize)]
struct GetAvailabilityArgs {
    guests: u32,
    #[serde(default)]
    beds: Option<u32>,
    #[serde(default)]
    lounge: Option<bool>,
    #[serde(default)]
    nights: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChooseRoomArgs {
    room_id: String,
}

#[derive(Debug, Deserialize)]
struct FinalizeBookingArgs {
    guest_name: String,
    room_id: String,
}

/// The tool set declared to the model.
pub fn declarations() -> Vec<Tool> {
    vec![
        Tool::function(FunctionTool::new(
            GET_AVAILABILITY,
            "List available rooms given guest count, beds, and lounge preference.",
            json!({
                "type": "object",
                "properties": {
                    "guests": {"type": "integer", "description": "Number of guests."},
                    "beds": {
                        "type": "integer",
                        "description": "Beds requested (1 for single, 2 for double/twin).",
                        "nullable": true
                    },
                    "lounge": {
                        "type": "boolean",
                        "description": "Whether lounge access is requested.",
                        "nullable": true
                    },
                    "nights": {
                        "type": "integer",
                        "description": "Number of nights, 1 to 30.",
                        "nullable": true
                    }
                },
                "required": ["guests"]
            }),
        )),
        Tool::function(FunctionTool::new(
            CHOOSE_ROOM,
            "Select a room by id after presenting options.",
            json!({
                "type": "object",
                "properties": {
                    "room_id": {"type": "string", "description": "Room id to select."}
                },
                "required": ["room_id"]
            }),
        )),
        Tool::function(FunctionTool::new(
            FINALIZE_BOOKING,
            "Confirm booking with guest name and selected room id.",
            json!({
                "type": "object",
                "properties": {
                    "guest_name": {"type": "string", "description": "Guest full name."},
                    "room_id": {"type": "string", "description": "Selected room id."}
                },
                "required": ["guest_name", "room_id"]
            }),
        )),
    ]
}

/// Executes the booking tools against a call's [`BookingContext`].
///
/// Every outcome, including bad arguments and unknown tool names, is a JSON
/// value meant to be fed back to the model as a tool result.
#[derive(Debug, Clone, Default)]
pub struct BookingDesk {
    store: Arc<BookingStore>,
}

impl BookingDesk {
    pub fn new(store: Arc<BookingStore>) -> Self {
        Self { store }
    }

    pub fn declarations(&self) -> Vec<Tool> {
        declarations()
    }

    pub fn store(&self) -> &BookingStore {
        &self.store
    }

    pub fn invoke(&self, context: &mut BookingContext, name: &str, arguments: &str) -> Value {
        let arguments = if arguments.trim().is_empty() {
            "{}"
        } else {
            arguments
        };
        let result = match name {
            GET_AVAILABILITY => parse(name, arguments)
                .map(|args: GetAvailabilityArgs| self.get_availability(context, args)),
            CHOOSE_ROOM => {
                parse(name, arguments).map(|args: ChooseRoomArgs| self.choose_room(context, args))
            }
            FINALIZE_BOOKING => parse(name, arguments)
                .map(|args: FinalizeBookingArgs| self.finalize_booking(context, args)),
            _ => Err(json!({"error": format!("Unknown tool {name}")})),
        };
        result.unwrap_or_else(|error| error)
    }

    fn get_availability(&self, context: &mut BookingContext, args: GetAvailabilityArgs) -> Value {
        if let Some(nights) = args.nights.filter(|n| !(1..=MAX_NIGHTS).contains(n)) {
            tracing::warn!(nights, "availability requested for an unsupported stay length");
            return json!({
                "error": format!("Stays must be between 1 and {MAX_NIGHTS} nights"),
                "context": context,
            });
        }
        context.guests = Some(args.guests);
        if args.beds.is_some() {
            context.beds = args.beds;
        }
        if args.lounge.is_some() {
            context.lounge = args.lounge;
        }
        if args.nights.is_some() {
            context.nights = args.nights;
        }
        context.available_rooms = context.compute_availability();
        json!({
            "available_rooms": context.available_rooms,
            "context": context,
        })
    }

    fn choose_room(&self, context: &mut BookingContext, args: ChooseRoomArgs) -> Value {
        let picked = inventory::room(&args.room_id);
        if picked.is_some() {
            context.selected_room = Some(args.room_id);
        }
        json!({
            "selected_room": picked,
            "context": context,
        })
    }

    fn finalize_booking(&self, context: &mut BookingContext, args: FinalizeBookingArgs) -> Value {
        context.guest_name = Some(args.guest_name);
        context.selected_room = Some(args.room_id);
        self.finalize(context).unwrap_or_else(|| {
            json!({
                "error": "Failed to create booking",
                "context": context,
            })
        })
    }

    fn finalize(&self, context: &mut BookingContext) -> Option<Value> {
        let guest_name = context.guest_name.clone().filter(|name| !name.is_empty())?;
        let room = inventory::room(context.selected_room.as_deref()?)?;

        let booking_id = self.store.create(&guest_name, room);
        context.booking_id = Some(booking_id.clone());

        let nights = context.nights.unwrap_or(1);
        Some(json!({
            "booking_id": booking_id,
            "guest_name": guest_name,
            "room_id": room.id,
            "room_name": room.name,
            "beds": room.beds,
            "lounge": room.lounge,
            "breakfast": room.breakfast,
            "price_per_night": room.price,
            "nights": nights,
            "total_price": room.stay_price(nights),
            "check_in": context.check_in.as_deref().unwrap_or("TBD"),
            "max_guests": room.max_guests,
        }))
    }
}

fn parse<T: for<'de> Deserialize<'de>>(name: &str, arguments: &str) -> Result<T, Value> {
    serde_json::from_str(arguments).map_err(|e| {
        tracing::warn!(tool = name, "invalid tool arguments: {}", e);
        json!({"error": format!("Invalid arguments for {name}: {e}")})
    })
}
