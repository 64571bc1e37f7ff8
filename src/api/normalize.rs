// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Response-shape normalization.
//!
//! The API has returned its lists in several envelopes over time: a bare
//! array, `{ "result": [...] }`, `{ "data": [...] }`, and for flight plans an
//! object holding `flightPlanItems` whose procedure entries nest further items
//! under `children`. Everything here maps those shapes onto core types and
//! never fails: malformed elements are skipped and an unrecognized envelope
//! yields an empty list.

use chrono::{DateTime, Utc};
use flightdeck_core::{Airport, AtcFacility, Flight, TrackPoint};
use log::debug;
use serde_json::Value;

const ENVELOPE_KEYS: [&str; 2] = ["result", "data"];

/// Find the item list inside any supported envelope.
pub fn items(value: &Value) -> &[Value] {
    match value {
        Value::Array(items) => items,
        Value::Object(map) => ENVELOPE_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .map(items)
            .find(|found| !found.is_empty())
            .unwrap_or(&[]),
        _ => &[],
    }
}

pub fn flights(value: &Value) -> Vec<Flight> {
    collect(value, "flight", flight)
}

pub fn airports(value: &Value) -> Vec<Airport> {
    collect(value, "airport", airport)
}

/// Flown history, in whatever order the API returned it.
pub fn route_points(value: &Value) -> Vec<TrackPoint> {
    collect(value, "route point", track_point)
}

/// Flight-plan waypoints flattened depth-first. Procedure entries contribute
/// their children rather than their own placeholder location.
pub fn flight_plan_points(value: &Value) -> Vec<TrackPoint> {
    let root = unwrap_result(value);
    let plan_items = root
        .get("flightPlanItems")
        .and_then(Value::as_array)
        .map_or_else(|| items(root), Vec::as_slice);

    let mut points = Vec::new();
    flatten_plan(plan_items, &mut points);
    points
}

fn unwrap_result(value: &Value) -> &Value {
    ENVELOPE_KEYS
        .iter()
        .find_map(|key| value.get(*key).filter(|inner| inner.is_object()))
        .unwrap_or(value)
}

fn flatten_plan(plan_items: &[Value], points: &mut Vec<TrackPoint>) {
    for item in plan_items {
        match item.get("children").and_then(Value::as_array) {
            Some(children) if !children.is_empty() => flatten_plan(children, points),
            _ => match plan_point(item) {
                Some(point) => points.push(point),
                None => debug!("Skipping flight plan item without a location: {}", item),
            },
        }
    }
}

fn collect<T>(value: &Value, what: &str, parse: fn(&Value) -> Option<T>) -> Vec<T> {
    let items = items(value);
    let parsed: Vec<T> = items.iter().filter_map(parse).collect();
    if parsed.len() < items.len() {
        debug!("Skipped {} malformed {} entries", items.len() - parsed.len(), what);
    }
    parsed
}

fn number(item: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| item.get(*key).and_then(Value::as_f64))
}

fn text(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| item.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn count(item: &Value, count_key: &str, list_key: &str) -> u32 {
    let counted = item.get(count_key).and_then(Value::as_u64);
    let listed = item.get(list_key).and_then(Value::as_array).map(|a| a.len() as u64);
    u32::try_from(counted.or(listed).unwrap_or(0)).unwrap_or(u32::MAX)
}

fn timestamp(item: &Value, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|key| match item.get(*key)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}

fn flight(item: &Value) -> Option<Flight> {
    let id = text(item, &["flightId", "id"])?;
    let mut flight = Flight::new(
        id,
        number(item, &["latitude", "lat"])?,
        number(item, &["longitude", "lon", "lng"])?,
    );
    flight.callsign = text(item, &["callsign"]);
    flight.username = text(item, &["username"]);
    flight.aircraft_id = text(item, &["aircraftId"]);
    flight.livery_id = text(item, &["liveryId"]);
    flight.altitude_ft = number(item, &["altitude"]).unwrap_or(0.0);
    flight.speed_kts = number(item, &["speed", "groundSpeed"]).unwrap_or(0.0);
    flight.heading_deg = number(item, &["heading", "track"]).unwrap_or(0.0);
    flight.vertical_speed_fpm = number(item, &["verticalSpeed"]).unwrap_or(0.0);
    flight.last_report = timestamp(item, &["lastReport"]);
    Some(flight)
}

fn airport(item: &Value) -> Option<Airport> {
    let mut airport = Airport::new(text(item, &["airportIcao", "icao"])?);
    airport.name = text(item, &["airportName", "name"]);
    airport.latitude = number(item, &["latitude"]);
    airport.longitude = number(item, &["longitude"]);
    airport.inbound_count = count(item, "inboundFlightsCount", "inboundFlights");
    airport.outbound_count = count(item, "outboundFlightsCount", "outboundFlights");
    airport.facilities = item
        .get("atcFacilities")
        .and_then(Value::as_array)
        .map(|list| list.iter().map(facility).collect())
        .unwrap_or_default();
    Some(airport)
}

fn facility(item: &Value) -> AtcFacility {
    let facility_type = match item.get("type") {
        Some(Value::Number(n)) => facility_name(n.as_u64()).to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => "Unknown".to_string(),
    };
    AtcFacility {
        facility_type,
        username: text(item, &["username"]),
        frequency_id: text(item, &["frequencyId"]),
        latitude: number(item, &["latitude"]),
        longitude: number(item, &["longitude"]),
    }
}

fn facility_name(code: Option<u64>) -> &'static str {
    match code {
        Some(0) => "Ground",
        Some(1) => "Tower",
        Some(2) => "Unicom",
        Some(3) => "Clearance",
        Some(4) => "Approach",
        Some(5) => "Departure",
        Some(6) => "Center",
        Some(7) => "ATIS",
        _ => "Unknown",
    }
}

fn track_point(item: &Value) -> Option<TrackPoint> {
    let point = TrackPoint::new(
        number(item, &["latitude", "lat"])?,
        number(item, &["longitude", "lon", "lng"])?,
        number(item, &["altitude"]).unwrap_or(0.0),
    );
    Some(match timestamp(item, &["date", "timestamp"]) {
        Some(t) => point.with_timestamp(t.timestamp_millis()),
        None => point,
    })
}

fn plan_point(item: &Value) -> Option<TrackPoint> {
    let location = item.get("location").unwrap_or(item);
    let latitude = number(location, &["latitude"])?;
    let longitude = number(location, &["longitude"])?;
    // Negative altitude marks "no altitude constraint"
    let altitude = number(location, &["altitude"]).unwrap_or(0.0).max(0.0);
    Some(TrackPoint::new(latitude, longitude, altitude))
}
