//! Turning a success probability into something a booking flow can act on.
//!
//! Reasons are rule-of-thumb annotations over the request, not an
//! attribution of the model's output.

use serde::Serialize;
use std::fmt;

use crate::contract::BookingRequest;

pub const HIGH_THRESHOLD: f64 = 0.8;
pub const MEDIUM_THRESHOLD: f64 = 0.5;

/// Below this many nearby drivers supply is considered thin.
pub const LOW_DRIVER_DENSITY: u32 = 5;
pub const LONG_TRIP_KM: f64 = 25.0;
/// Airport trips are only flagged when the model is not confident.
pub const AIRPORT_CONFIDENCE: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Bucket {
    High,
    Medium,
    Low,
}

impl Bucket {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lower bounds are inclusive: 0.8 is High, 0.5 is Medium.
pub fn bucket(probability: f64) -> Bucket {
    if probability >= HIGH_THRESHOLD {
        Bucket::High
    } else if probability >= MEDIUM_THRESHOLD {
        Bucket::Medium
    } else {
        Bucket::Low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    HeavyRainReported,
    LowDriverDensity,
    LongTripDistance,
    HighDemandAirportRoute,
}

impl ReasonCode {
    /// Evaluation order; also the order codes appear in a response.
    pub const ALL: [ReasonCode; 4] = [
        Self::HeavyRainReported,
        Self::LowDriverDensity,
        Self::LongTripDistance,
        Self::HighDemandAirportRoute,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HeavyRainReported => "heavy_rain_reported",
            Self::LowDriverDensity => "low_driver_density",
            Self::LongTripDistance => "long_trip_distance",
            Self::HighDemandAirportRoute => "high_demand_airport_route",
        }
    }

    fn applies(self, req: &BookingRequest, probability: f64) -> bool {
        match self {
            Self::HeavyRainReported => req.is_raining,
            Self::LowDriverDensity => req.drivers_nearby < LOW_DRIVER_DENSITY,
            Self::LongTripDistance => req.trip_distance_km > LONG_TRIP_KM,
            Self::HighDemandAirportRoute => req.is_airport_trip && probability < AIRPORT_CONFIDENCE,
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every rule is checked independently; no rule masks another.
pub fn explain(req: &BookingRequest, probability: f64) -> Vec<ReasonCode> {
    ReasonCode::ALL
        .into_iter()
        .filter(|code| code.applies(req, probability))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub probability: f64,
    pub bucket: Bucket,
    pub reasons: Vec<ReasonCode>,
}

impl Prediction {
    pub fn decide(req: &BookingRequest, probability: f64) -> Self {
        Self {
            probability,
            bucket: bucket(probability),
            reasons: explain(req, probability),
        }
    }
}
