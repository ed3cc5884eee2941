#![allow(dead_code)]

use ride_reliability::Engine;
use serde_json::{json, Map, Value};
use std::path::PathBuf;

pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

pub fn engine() -> Engine {
    Engine::load(
        &fixture("booking_model.json"),
        &fixture("booking_model.meta.json"),
    )
    .expect("fixture artifact loads")
}

pub fn object(v: Value) -> Map<String, Value> {
    v.as_object().cloned().expect("object literal")
}

/// Rainy, thin supply, long airport run booked at short notice.
pub fn scenario_a() -> Value {
    json!({
        "hour_of_day": 22, "day_of_week": 5, "month": 12,
        "drivers_nearby": 2, "local_demand_score": 0.9, "is_raining": 1,
        "lead_time_minutes": 20, "trip_distance_km": 30.5, "is_airport_trip": 1
    })
}

/// Dry, plenty of drivers, short city hop.
pub fn scenario_b() -> Value {
    json!({
        "hour_of_day": 11, "day_of_week": 2, "month": 4,
        "drivers_nearby": 15, "local_demand_score": 0.3, "is_raining": 0,
        "lead_time_minutes": 45, "trip_distance_km": 3, "is_airport_trip": 0
    })
}
