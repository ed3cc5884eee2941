//! Feature contract: the one place that knows which features the scorer
//! consumes, what each one may hold, and the order they are fed in.
//!
//! Callers send an unordered named mapping. The scorer consumes a positional
//! vector. [`validate`] is the only bridge between the two, and it walks
//! [`FEATURE_ORDER`] to build the vector, so the payload's key order never
//! reaches the model.

use serde_json::{Map, Value};

use crate::error::{FieldIssue, FieldProblem, ValidationError};

/// Bumped whenever `FEATURE_ORDER`, a domain, or an encoding changes.
/// Artifacts carry the version they were fit against in their metadata.
pub const CONTRACT_VERSION: u32 = 1;

pub const FEATURE_COUNT: usize = 9;

/// Canonical column order, shared with the fitting pipeline through the
/// artifact metadata (`feat_list`).
pub const FEATURE_ORDER: [Feature; FEATURE_COUNT] = [
    Feature::HourOfDay,
    Feature::DayOfWeek,
    Feature::Month,
    Feature::DriversNearby,
    Feature::LocalDemandScore,
    Feature::IsRaining,
    Feature::LeadTimeMinutes,
    Feature::TripDistanceKm,
    Feature::IsAirportTrip,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    HourOfDay,
    DayOfWeek,
    Month,
    DriversNearby,
    LocalDemandScore,
    IsRaining,
    LeadTimeMinutes,
    TripDistanceKm,
    IsAirportTrip,
}

impl Feature {
    pub const fn name(self) -> &'static str {
        match self {
            Self::HourOfDay => "hour_of_day",
            Self::DayOfWeek => "day_of_week",
            Self::Month => "month",
            Self::DriversNearby => "drivers_nearby",
            Self::LocalDemandScore => "local_demand_score",
            Self::IsRaining => "is_raining",
            Self::LeadTimeMinutes => "lead_time_minutes",
            Self::TripDistanceKm => "trip_distance_km",
            Self::IsAirportTrip => "is_airport_trip",
        }
    }

    pub const fn domain(self) -> Domain {
        match self {
            Self::HourOfDay => Domain::IntRange { min: 0, max: 23 },
            Self::DayOfWeek => Domain::IntRange { min: 0, max: 6 },
            Self::Month => Domain::IntRange { min: 1, max: 12 },
            Self::DriversNearby | Self::LeadTimeMinutes => Domain::Count,
            Self::LocalDemandScore => Domain::UnitInterval,
            Self::TripDistanceKm => Domain::NonNegative,
            Self::IsRaining | Self::IsAirportTrip => Domain::Flag,
        }
    }

    /// Column index in the canonical vector.
    pub fn position(self) -> usize {
        FEATURE_ORDER
            .iter()
            .position(|f| *f == self)
            .unwrap_or_else(|| unreachable!("{:?} missing from FEATURE_ORDER", self))
    }
}

pub fn feature_names() -> Vec<&'static str> {
    FEATURE_ORDER.iter().map(|f| f.name()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    IntRange { min: i64, max: i64 },
    /// Non-negative integer.
    Count,
    UnitInterval,
    /// Non-negative real.
    NonNegative,
    /// Boolean carried as 0/1.
    Flag,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Coerced {
    Int(u64),
    Real(f64),
    Flag(bool),
}

impl Domain {
    fn label(self) -> &'static str {
        match self {
            Self::IntRange { min: 0, max: 23 } => "0..=23",
            Self::IntRange { min: 0, max: 6 } => "0..=6",
            Self::IntRange { min: 1, max: 12 } => "1..=12",
            Self::IntRange { .. } => "bounded integer",
            Self::Count => ">= 0",
            Self::UnitInterval => "0.0..=1.0",
            Self::NonNegative => ">= 0.0",
            Self::Flag => "{0, 1}",
        }
    }

    fn expected_type(self) -> &'static str {
        match self {
            Self::IntRange { .. } | Self::Count => "integer",
            Self::UnitInterval | Self::NonNegative => "number",
            Self::Flag => "0/1 or boolean",
        }
    }

    fn coerce(self, raw: &Value) -> Result<Coerced, FieldProblem> {
        let wrong_type = FieldProblem::WrongType {
            expected: self.expected_type(),
        };
        let out_of_domain = FieldProblem::OutOfDomain {
            domain: self.label(),
        };

        match self {
            Self::IntRange { min, max } => {
                let n = integral(raw).ok_or(wrong_type)?;
                if n < min as f64 || n > max as f64 {
                    return Err(out_of_domain);
                }
                Ok(Coerced::Int(n as u64))
            }
            Self::Count => {
                let n = integral(raw).ok_or(wrong_type)?;
                if n < 0.0 || n > f64::from(u32::MAX) {
                    return Err(out_of_domain);
                }
                Ok(Coerced::Int(n as u64))
            }
            Self::UnitInterval | Self::NonNegative => {
                let x = raw.as_f64().ok_or(wrong_type)?;
                let upper = if self == Self::UnitInterval { 1.0 } else { f64::INFINITY };
                if !x.is_finite() || x < 0.0 || x > upper {
                    return Err(out_of_domain);
                }
                Ok(Coerced::Real(x))
            }
            Self::Flag => {
                if let Value::Bool(b) = raw {
                    return Ok(Coerced::Flag(*b));
                }
                match integral(raw).ok_or(wrong_type)? {
                    n if n == 0.0 => Ok(Coerced::Flag(false)),
                    n if n == 1.0 => Ok(Coerced::Flag(true)),
                    _ => Err(out_of_domain),
                }
            }
        }
    }
}

/// Whole-valued JSON number (`5` or `5.0`), as f64 so negatives survive
/// long enough to be reported as out of domain.
fn integral(raw: &Value) -> Option<f64> {
    let n = raw.as_number()?;
    if let Some(i) = n.as_i64() {
        return Some(i as f64);
    }
    if let Some(u) = n.as_u64() {
        return Some(u as f64);
    }
    n.as_f64().filter(|x| x.is_finite() && x.fract() == 0.0)
}

/// Typed, in-domain booking request. Rule-based explanations read these
/// native values rather than the f32 vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookingRequest {
    pub hour_of_day: u8,
    pub day_of_week: u8,
    pub month: u8,
    pub drivers_nearby: u32,
    pub local_demand_score: f64,
    pub is_raining: bool,
    pub lead_time_minutes: u32,
    pub trip_distance_km: f64,
    pub is_airport_trip: bool,
}

impl BookingRequest {
    /// Smallest in-domain request; used to warm the scorer at startup.
    pub const fn baseline() -> Self {
        Self {
            hour_of_day: 0,
            day_of_week: 0,
            month: 1,
            drivers_nearby: 0,
            local_demand_score: 0.0,
            is_raining: false,
            lead_time_minutes: 0,
            trip_distance_km: 0.0,
            is_airport_trip: false,
        }
    }

    /// Model encoding of one feature (booleans as 0.0/1.0).
    pub fn encoded(&self, feature: Feature) -> f32 {
        match feature {
            Feature::HourOfDay => f32::from(self.hour_of_day),
            Feature::DayOfWeek => f32::from(self.day_of_week),
            Feature::Month => f32::from(self.month),
            Feature::DriversNearby => self.drivers_nearby as f32,
            Feature::LocalDemandScore => self.local_demand_score as f32,
            Feature::IsRaining => flag(self.is_raining),
            Feature::LeadTimeMinutes => self.lead_time_minutes as f32,
            Feature::TripDistanceKm => self.trip_distance_km as f32,
            Feature::IsAirportTrip => flag(self.is_airport_trip),
        }
    }

    pub fn to_vector(&self) -> FeatureVector {
        FeatureVector(FEATURE_ORDER.map(|f| self.encoded(f)))
    }
}

fn flag(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Model input, positionally ordered by [`FEATURE_ORDER`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; FEATURE_COUNT]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn get(&self, feature: Feature) -> f32 {
        self.0[feature.position()]
    }

    pub fn named(&self) -> impl Iterator<Item = (&'static str, f32)> + '_ {
        FEATURE_ORDER.iter().map(|f| f.name()).zip(self.0.iter().copied())
    }
}

/// Output of [`validate`]: the typed request for explanations and the
/// canonical vector for scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedBooking {
    pub request: BookingRequest,
    pub vector: FeatureVector,
}

/// Validate an untrusted payload against the contract.
///
/// Every offending field is reported, not just the first. Field names must
/// match exactly; unrecognized keys are ignored but never stand in for a
/// missing feature.
pub fn validate(raw: &Map<String, Value>) -> Result<ValidatedBooking, ValidationError> {
    let mut values = [Coerced::Int(0); FEATURE_COUNT];
    let mut issues = Vec::new();

    for (slot, feature) in FEATURE_ORDER.iter().enumerate() {
        let problem = match raw.get(feature.name()) {
            None => FieldProblem::Missing,
            Some(v) => match feature.domain().coerce(v) {
                Ok(c) => {
                    values[slot] = c;
                    continue;
                }
                Err(p) => p,
            },
        };
        issues.push(FieldIssue {
            field: feature.name().to_string(),
            problem,
        });
    }

    for key in raw.keys() {
        if !FEATURE_ORDER.iter().any(|f| f.name() == key) {
            tracing::debug!(field = %key, "ignoring unrecognized booking field");
        }
    }

    if !issues.is_empty() {
        return Err(ValidationError { issues });
    }

    let int = |f: Feature| match values[f.position()] {
        Coerced::Int(n) => n,
        other => unreachable!("{:?} coerced to {:?}", f, other),
    };
    let real = |f: Feature| match values[f.position()] {
        Coerced::Real(x) => x,
        other => unreachable!("{:?} coerced to {:?}", f, other),
    };
    let boolean = |f: Feature| match values[f.position()] {
        Coerced::Flag(b) => b,
        other => unreachable!("{:?} coerced to {:?}", f, other),
    };

    // Range checks above bound every narrowing cast here.
    let request = BookingRequest {
        hour_of_day: int(Feature::HourOfDay) as u8,
        day_of_week: int(Feature::DayOfWeek) as u8,
        month: int(Feature::Month) as u8,
        drivers_nearby: int(Feature::DriversNearby) as u32,
        local_demand_score: real(Feature::LocalDemandScore),
        is_raining: boolean(Feature::IsRaining),
        lead_time_minutes: int(Feature::LeadTimeMinutes) as u32,
        trip_distance_km: real(Feature::TripDistanceKm),
        is_airport_trip: boolean(Feature::IsAirportTrip),
    };

    Ok(ValidatedBooking {
        request,
        vector: request.to_vector(),
    })
}

/// Convenience for callers holding an arbitrary JSON value (e.g. an HTTP body).
pub fn validate_value(raw: &Value) -> Result<ValidatedBooking, ValidationError> {
    match raw.as_object() {
        Some(map) => validate(map),
        None => Err(ValidationError {
            issues: vec![FieldIssue {
                field: "<body>".to_string(),
                problem: FieldProblem::NotAnObject,
            }],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> Map<String, Value> {
        v.as_object().cloned().expect("object literal")
    }

    fn good() -> Map<String, Value> {
        payload(json!({
            "hour_of_day": 22, "day_of_week": 5, "month": 12,
            "drivers_nearby": 2, "local_demand_score": 0.9, "is_raining": 1,
            "lead_time_minutes": 20, "trip_distance_km": 30.5, "is_airport_trip": 1
        }))
    }

    #[test]
    fn order_constant_has_unique_names() {
        let names = feature_names();
        let mut dedup = names.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), FEATURE_COUNT);
        assert_eq!(names[0], "hour_of_day");
        assert_eq!(names[FEATURE_COUNT - 1], "is_airport_trip");
    }

    #[test]
    fn position_matches_order() {
        for (i, f) in FEATURE_ORDER.iter().enumerate() {
            assert_eq!(f.position(), i);
        }
    }

    #[test]
    fn vector_follows_canonical_order() {
        let v = validate(&good()).unwrap().vector;
        assert_eq!(
            v.as_slice(),
            &[22.0, 5.0, 12.0, 2.0, 0.9, 1.0, 20.0, 30.5, 1.0]
        );
    }

    #[test]
    fn booleans_and_integral_floats_accepted() {
        let mut p = good();
        p.insert("is_raining".into(), json!(false));
        p.insert("is_airport_trip".into(), json!(true));
        p.insert("month".into(), json!(3.0));
        let ok = validate(&p).unwrap();
        assert!(!ok.request.is_raining);
        assert!(ok.request.is_airport_trip);
        assert_eq!(ok.request.month, 3);
    }

    #[test]
    fn every_bad_field_reported() {
        let mut p = good();
        p.remove("month");
        p.insert("hour_of_day".into(), json!(24));
        p.insert("local_demand_score".into(), json!("high"));
        p.insert("is_raining".into(), json!(2));
        p.insert("drivers_nearby".into(), json!(-1));
        p.insert("day_of_week".into(), json!(1.5));

        let err = validate(&p).unwrap_err();
        assert_eq!(
            err.fields(),
            vec![
                "hour_of_day",
                "day_of_week",
                "month",
                "drivers_nearby",
                "local_demand_score",
                "is_raining"
            ]
        );
        assert_eq!(err.missing_fields(), vec!["month"]);
        assert_eq!(
            err.issues[0].problem,
            FieldProblem::OutOfDomain { domain: "0..=23" }
        );
        assert_eq!(
            err.issues[1].problem,
            FieldProblem::WrongType { expected: "integer" }
        );
    }

    #[test]
    fn misspelled_field_is_not_a_substitute() {
        let mut p = good();
        let v = p.remove("trip_distance_km").unwrap();
        p.insert("trip_distance".into(), v);
        let err = validate(&p).unwrap_err();
        assert_eq!(err.missing_fields(), vec!["trip_distance_km"]);
    }

    #[test]
    fn null_is_a_type_error_not_a_default() {
        let mut p = good();
        p.insert("lead_time_minutes".into(), Value::Null);
        let err = validate(&p).unwrap_err();
        assert_eq!(err.fields(), vec!["lead_time_minutes"]);
        assert!(err.missing_fields().is_empty());
    }

    #[test]
    fn non_object_body_rejected() {
        let err = validate_value(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(err.issues[0].problem, FieldProblem::NotAnObject);
    }

    #[test]
    fn baseline_round_trips_through_validate() {
        let b = BookingRequest::baseline();
        let p = payload(json!({
            "hour_of_day": 0, "day_of_week": 0, "month": 1,
            "drivers_nearby": 0, "local_demand_score": 0.0, "is_raining": 0,
            "lead_time_minutes": 0, "trip_distance_km": 0.0, "is_airport_trip": 0
        }));
        assert_eq!(validate(&p).unwrap().request, b);
    }
}
