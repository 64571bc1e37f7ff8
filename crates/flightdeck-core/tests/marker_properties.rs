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

use chrono::{DateTime, Duration, Utc};
use flightdeck_core::{
    Airport, Flight, MarkerConfig, MarkerHandle, MarkerReconciler, RecordingSurface, SurfaceCommand,
};

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_750_000_000, 0).unwrap()
}

fn at(seconds: i64) -> DateTime<Utc> {
    t0() + Duration::try_seconds(seconds).unwrap()
}

fn flight(id: &str, lon: f64) -> Flight {
    let mut flight = Flight::new(id, 47.0, lon);
    flight.altitude_ft = 12000.0;
    flight.speed_kts = 280.0;
    flight.heading_deg = 45.0;
    flight
}

fn snapshot(ids: &[&str]) -> Vec<Flight> {
    ids.iter()
        .enumerate()
        .map(|(i, id)| flight(id, -122.0 + i as f64 * 0.1))
        .collect()
}

fn handle(reconciler: &MarkerReconciler<Flight>, key: &str) -> MarkerHandle {
    reconciler.registry().get(key).expect("marker registered").handle
}

#[test]
fn test_absent_marker_removed_after_max_miss_count() {
    let config = MarkerConfig::default();
    let max_miss = config.max_miss_count;
    let mut reconciler = MarkerReconciler::new(config);
    let mut surface = RecordingSurface::new();

    reconciler.reconcile(snapshot(&["A", "B", "C"]), at(0), &mut surface);
    let b_handle = handle(&reconciler, "B");
    let c_handle = handle(&reconciler, "C");

    for poll in 1..=i64::from(max_miss) {
        assert!(reconciler.registry().contains("A"), "A removed too early at poll {poll}");
        let report = reconciler.reconcile(snapshot(&["B", "C", "D"]), at(poll * 15), &mut surface);
        assert!(report.updated.contains(&"B".to_string()));
        assert!(report.updated.contains(&"C".to_string()));
    }

    assert!(!reconciler.registry().contains("A"));
    assert_eq!(surface.creates_for("A"), 1);
    assert_eq!(surface.creates_for("D"), 1);
    assert_eq!(surface.creates_for("B"), 1);
    assert_eq!(handle(&reconciler, "B"), b_handle);
    assert_eq!(handle(&reconciler, "C"), c_handle);
    assert_eq!(surface.live_keys(), vec!["B", "C", "D"]);
}

#[test]
fn test_reappearing_marker_resets_miss_count() {
    let mut reconciler = MarkerReconciler::new(MarkerConfig::default());
    let mut surface = RecordingSurface::new();

    reconciler.reconcile(snapshot(&["A", "B"]), at(0), &mut surface);
    reconciler.reconcile(snapshot(&["B"]), at(15), &mut surface);
    reconciler.reconcile(snapshot(&["B"]), at(30), &mut surface);
    assert_eq!(reconciler.registry().get("A").map(|e| e.miss_count), Some(2));

    reconciler.reconcile(snapshot(&["A", "B"]), at(45), &mut surface);
    assert_eq!(reconciler.registry().get("A").map(|e| e.miss_count), Some(0));
    assert_eq!(surface.creates_for("A"), 1);
}

#[test]
fn test_selected_marker_survives_gap_until_protection_expires() {
    let config = MarkerConfig::default();
    let max_miss = i64::from(config.max_miss_count);
    let window = config.protection_window_secs;
    let mut reconciler = MarkerReconciler::new(config);
    let mut surface = RecordingSurface::new();

    reconciler.reconcile(snapshot(&["A", "B"]), at(0), &mut surface);
    let last_known = reconciler.registry().get("A").unwrap().entity.clone();
    reconciler.select("A", at(1), &mut surface);
    reconciler.deselect(&mut surface);

    // Absent for more polls than the miss threshold, all inside the window
    let step = (window - 2) / (max_miss + 1);
    for poll in 1..=max_miss + 1 {
        let report = reconciler.reconcile(snapshot(&["B"]), at(1 + poll * step), &mut surface);
        assert_eq!(report.retained, vec!["A".to_string()]);
        let entry = reconciler.registry().get("A").expect("protected marker kept");
        assert_eq!(entry.entity, last_known);
        assert_eq!(entry.miss_count, 0);
    }

    // Past expiry normal miss counting resumes
    let after = 1 + window;
    for poll in 0..max_miss {
        assert!(reconciler.registry().contains("A"));
        reconciler.reconcile(snapshot(&["B"]), at(after + poll * 15), &mut surface);
    }
    assert!(!reconciler.registry().contains("A"));
    assert_eq!(surface.creates_for("A"), 1);
}

#[test]
fn test_selected_marker_is_kept_while_selected() {
    let mut reconciler = MarkerReconciler::new(MarkerConfig::default());
    let mut surface = RecordingSurface::new();

    reconciler.reconcile(snapshot(&["A"]), at(0), &mut surface);
    reconciler.select("A", at(0), &mut surface);

    for poll in 1..20 {
        reconciler.reconcile(Vec::new(), at(poll * 15), &mut surface);
    }
    assert!(reconciler.registry().contains("A"));

    reconciler.deselect(&mut surface);
    for poll in 20..23 {
        reconciler.reconcile(Vec::new(), at(poll * 15), &mut surface);
    }
    assert!(!reconciler.registry().contains("A"));
}

#[test]
fn test_unchanged_snapshot_twice_has_no_churn() {
    let mut reconciler = MarkerReconciler::new(MarkerConfig::default());
    let mut surface = RecordingSurface::new();

    let first = reconciler.reconcile(snapshot(&["A", "B", "C"]), at(0), &mut surface);
    assert!(first.has_churn());
    surface.take_commands();

    let second = reconciler.reconcile(snapshot(&["A", "B", "C"]), at(15), &mut surface);
    assert!(!second.has_churn());
    assert_eq!(second.updated.len(), 3);
    assert!(surface
        .commands()
        .iter()
        .all(|c| matches!(c, SurfaceCommand::Update { .. })));
}

#[test]
fn test_batched_and_single_pass_reach_same_state() {
    let polls: Vec<Vec<Flight>> = vec![
        snapshot(&["A", "B", "C", "D", "E", "F", "G"]),
        snapshot(&["B", "C", "E", "H"]),
        snapshot(&["C", "E", "H", "I", "J"]),
        snapshot(&["C", "J"]),
        snapshot(&["C", "J", "K"]),
    ];

    let mut single = MarkerReconciler::new(MarkerConfig::default());
    let mut single_surface = RecordingSurface::new();
    let mut batched = MarkerReconciler::new(MarkerConfig::default());
    let mut batched_surface = RecordingSurface::new();

    for (i, poll) in polls.into_iter().enumerate() {
        let now = at(i as i64 * 15);
        if i == 1 {
            single.select("C", now, &mut single_surface);
            batched.select("C", now, &mut batched_surface);
        }

        single.reconcile(poll.clone(), now, &mut single_surface);

        let mut pass = batched.begin_pass(poll, now);
        let mut chunks = 0;
        while !batched.advance(&mut pass, &mut batched_surface, 2) {
            chunks += 1;
        }
        assert!(pass.is_finished());
        assert!(chunks <= 3);
    }

    assert_eq!(single.registry().keys(), batched.registry().keys());
    for key in single.registry().keys() {
        let a = single.registry().get(&key).unwrap();
        let b = batched.registry().get(&key).unwrap();
        assert_eq!(a.entity, b.entity, "entity differs for {key}");
        assert_eq!(a.appearance, b.appearance, "appearance differs for {key}");
        assert_eq!(a.miss_count, b.miss_count, "miss count differs for {key}");
        assert_eq!(a.protected_until, b.protected_until);
    }
    assert_eq!(single_surface.live_keys(), batched_surface.live_keys());
}

#[test]
fn test_abandoned_pass_removes_nothing() {
    let mut reconciler = MarkerReconciler::new(MarkerConfig {
        max_miss_count: 1,
        ..Default::default()
    });
    let mut surface = RecordingSurface::new();
    reconciler.reconcile(snapshot(&["A", "B"]), at(0), &mut surface);

    let mut pass = reconciler.begin_pass(snapshot(&["C", "D", "E"]), at(15));
    assert!(!reconciler.advance(&mut pass, &mut surface, 1));
    reconciler.abandon(&mut pass);

    assert!(reconciler.advance(&mut pass, &mut surface, 10));
    assert!(reconciler.registry().contains("A"));
    assert!(reconciler.registry().contains("B"));
    assert!(reconciler.registry().contains("C"));
    assert!(!reconciler.registry().contains("D"));
}

#[test]
fn test_new_pass_supersedes_unfinished_one() {
    let mut reconciler = MarkerReconciler::new(MarkerConfig::default());
    let mut surface = RecordingSurface::new();

    let mut stale = reconciler.begin_pass(snapshot(&["A", "B", "C"]), at(0));
    assert!(!reconciler.advance(&mut stale, &mut surface, 1));

    let report = reconciler.reconcile(snapshot(&["X"]), at(15), &mut surface);
    assert_eq!(report.created, vec!["X".to_string()]);

    // The stale pass can no longer touch the registry
    assert!(reconciler.advance(&mut stale, &mut surface, 10));
    assert!(!reconciler.registry().contains("B"));
    assert!(!reconciler.registry().contains("C"));
}

#[test]
fn test_surface_failure_does_not_abort_pass() {
    let mut reconciler = MarkerReconciler::new(MarkerConfig::default());
    let mut surface = RecordingSurface::new();
    surface.fail_key("B");

    let report = reconciler.reconcile(snapshot(&["A", "B", "C"]), at(0), &mut surface);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "B");
    assert_eq!(report.created, vec!["A".to_string(), "C".to_string()]);
    assert!(!reconciler.registry().contains("B"));

    // Retried on the next poll once the surface recovers
    surface.heal_key("B");
    let report = reconciler.reconcile(snapshot(&["A", "B", "C"]), at(15), &mut surface);
    assert_eq!(report.created, vec!["B".to_string()]);
}

#[test]
fn test_appearance_is_rederived_after_gap() {
    let mut reconciler = MarkerReconciler::new(MarkerConfig::default());
    let mut surface = RecordingSurface::new();

    let mut taxiing = flight("A", -122.0);
    taxiing.altitude_ft = 10.0;
    taxiing.speed_kts = 12.0;
    reconciler.reconcile(vec![taxiing], at(0), &mut surface);
    assert!(reconciler.registry().get("A").unwrap().appearance.on_ground);

    reconciler.reconcile(Vec::new(), at(15), &mut surface);
    reconciler.reconcile(vec![flight("A", -121.9)], at(30), &mut surface);
    let appearance = &reconciler.registry().get("A").unwrap().appearance;
    assert!(!appearance.on_ground);
    assert!((appearance.rotation_deg - 45.0).abs() < f64::EPSILON);
}

#[test]
fn test_airports_reconcile_by_icao() {
    let mut reconciler = MarkerReconciler::new(MarkerConfig::default());
    let mut surface = RecordingSurface::new();

    let mut ksfo = Airport::new("KSFO");
    ksfo.latitude = Some(37.62);
    ksfo.longitude = Some(-122.38);
    let nowhere = Airport::new("XXXX");

    let report = reconciler.reconcile(vec![ksfo.clone(), nowhere], at(0), &mut surface);
    assert_eq!(report.created, vec!["KSFO".to_string()]);
    assert_eq!(report.skipped_invalid, 1);

    ksfo.inbound_count = 4;
    let report = reconciler.reconcile(vec![ksfo], at(30), &mut surface);
    assert_eq!(report.updated, vec!["KSFO".to_string()]);
    assert_eq!(reconciler.registry().get("KSFO").unwrap().entity.inbound_count, 4);
}

#[test]
fn test_airport_with_huge_traffic_counts_reconciles() {
    let mut reconciler = MarkerReconciler::new(MarkerConfig::default());
    let mut surface = RecordingSurface::new();

    let mut klax = Airport::new("KLAX");
    klax.latitude = Some(33.94);
    klax.longitude = Some(-118.41);
    klax.inbound_count = u32::MAX;
    klax.outbound_count = 1;
    let mut ksfo = Airport::new("KSFO");
    ksfo.latitude = Some(37.62);
    ksfo.longitude = Some(-122.38);

    let report = reconciler.reconcile(vec![klax, ksfo], at(0), &mut surface);
    assert_eq!(report.created, vec!["KLAX".to_string(), "KSFO".to_string()]);
    assert!(report.failed.is_empty());
}

