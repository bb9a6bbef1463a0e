use flate2::Compression;
use flate2::write::GzEncoder;
use geo_demand::analytics::types::{KpiMetrics, Recommendation};
use geo_demand::config::{BoundingBox, CoordinateBounds, EngineConfig, SequencingPolicy};
use geo_demand::engine::Engine;
use geo_demand::error::EngineError;
use geo_demand::ingest::RawProbe;
use geo_demand::parser::parse_probes;
use geo_demand::store::GridStore;
use std::collections::HashSet;
use std::io::Write;

fn engine() -> Engine {
    Engine::new(GridStore::new_arc(), EngineConfig::default()).expect("default config is valid")
}

fn scenario_engine() -> Engine {
    let probes = parse_probes(include_bytes!("fixtures/scenario.csv")).expect("Failed to parse fixture");
    let engine = engine();
    engine.ingest(&probes);
    engine
}

fn trips(engine: &Engine) -> Vec<u64> {
    engine.grid().iter().map(|c| c.cell.trips).collect()
}

#[test]
fn test_full_pipeline_kpis() {
    let probes = parse_probes(include_bytes!("fixtures/scenario.csv")).unwrap();
    let engine = engine();
    let result = engine.ingest(&probes);

    assert_eq!(result.rows_ingested, 15);
    assert_eq!(result.valid_rows, 15);
    assert_eq!(result.vehicles, 3);
    assert_eq!(result.total_grid_cells, 2);
    assert_eq!(result.filtered_errors, 0);

    let kpis = engine.kpis();
    assert_eq!(kpis.total_trips, 15);
    assert!((kpis.avg_speed - 94.0 / 15.0).abs() < 1e-9);
    assert_eq!(kpis.coverage, 0.0);
    assert_eq!(kpis.eta, 19.1);
    assert_eq!(kpis.pickup_dist, 2.0);
    assert_eq!(kpis.anomalies_per_1k, 0.0);
}

#[test]
fn test_grid_cells_carry_means_and_centers() {
    let engine = scenario_engine();
    let mut grid = engine.grid();
    grid.sort_by_key(|c| c.cell.trips);

    assert_eq!(grid.len(), 2);
    assert_eq!((grid[0].cell.trips, grid[0].cell.avg_spd, grid[0].cell.wait_proxy), (7, 2.0, 7));
    assert_eq!((grid[1].cell.trips, grid[1].cell.avg_spd, grid[1].cell.wait_proxy), (8, 10.0, 0));
    assert!((grid[1].lat - 51.128).abs() < 0.01);
    assert!((grid[1].lng - 71.430).abs() < 0.01);

    let json = serde_json::to_value(&grid[0]).unwrap();
    assert_eq!(json["h3"], grid[0].cell.cell.to_string());
    assert_eq!(json["avgSpd"], 2.0);
    assert!(json.get("lastUpdated").is_some());
}

#[test]
fn test_trajectories_follow_sequence_order() {
    let engine = scenario_engine();
    let snapshot = engine.store().snapshot();

    let veh3 = &snapshot.trajectories["veh-3"];
    let seqs: Vec<i64> = veh3.points.iter().map(|p| p.seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3, 4]);
    assert_eq!(veh3.total_distance, 0.0);
    assert_eq!(veh3.total_duration, 4.0);

    let veh2 = &snapshot.trajectories["veh-2"];
    assert!(veh2.total_distance > 4.0 && veh2.total_distance < 5.0);
}

#[test]
fn test_invalid_rows_are_counted_not_fatal() {
    let probes = parse_probes(include_bytes!("fixtures/invalid_rows.csv")).unwrap();
    let result = engine().ingest(&probes);

    assert_eq!(result.rows_ingested, 8);
    assert_eq!(result.valid_rows, 2);
    assert_eq!(result.filtered_errors, 6);
    assert_eq!(result.rejected.coordinates, 2);
    assert_eq!(result.rejected.speed, 2);
    assert_eq!(result.rejected.vehicle_id, 1);
    assert_eq!(result.rejected.sequence, 1);
    assert_eq!(result.vehicles, 1);
}

#[test]
fn test_empty_batch_leaves_empty_store() {
    let probes = parse_probes(include_bytes!("fixtures/header_only.csv")).unwrap();
    assert!(probes.is_empty());

    let engine = scenario_engine();
    let result = engine.ingest(&probes);

    assert_eq!(result.valid_rows, 0);
    assert_eq!(result.vehicles, 0);
    assert_eq!(result.total_grid_cells, 0);
    assert!(!engine.status().has_data);
    assert_eq!(engine.kpis(), KpiMetrics::default());
}

#[test]
fn test_all_invalid_batch() {
    let probes = vec![RawProbe::default(), RawProbe::new("", 51.1, 71.4, 10.0, 0)];
    let engine = engine();
    let result = engine.ingest(&probes);

    assert_eq!(result.valid_rows, 0);
    assert_eq!(result.vehicles, 0);
    assert_eq!(result.total_grid_cells, 0);
    assert_eq!(result.filtered_errors, 2);
}

#[test]
fn test_gzipped_batch() {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(include_bytes!("fixtures/scenario.csv")).unwrap();
    let compressed = encoder.finish().unwrap();

    let probes = parse_probes(&compressed).unwrap();
    assert_eq!(probes.len(), 15);
    assert_eq!(engine().ingest(&probes).total_grid_cells, 2);
}

#[test]
fn test_reingest_replaces_state() {
    let engine = scenario_engine();
    engine.ingest(&[RawProbe::new("solo", 51.2, 71.5, 30.0, 0)]);

    let status = engine.status();
    assert_eq!(status.grid_size, 1);
    assert_eq!(status.trajectories_size, 1);
    assert_eq!(status.grid_keys.len(), 1);
    assert_eq!(trips(&engine), vec![1]);
}

#[test]
fn test_recommendations_with_k_above_cell_count() {
    let engine = scenario_engine();
    let recs = engine.recommendations(51.14, 71.45, 10);

    assert_eq!(recs.len(), 2);
    assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
    let unique: HashSet<String> = recs.iter().map(|r| r.forecast.cell.to_string()).collect();
    assert_eq!(unique.len(), 2);
    assert!(recs.iter().all(|r| r.eta_gain_minutes >= 0.0));
}

#[test]
fn test_forecast_ranks_by_demand() {
    let engine = scenario_engine();
    let top = engine.forecast(1);

    assert_eq!(top.len(), 1);
    assert_eq!(top[0].demand_pred, 8.0);
    assert!((top[0].lo - 6.4).abs() < 1e-9);
    assert!((top[0].hi - 9.6).abs() < 1e-9);
}

#[test]
fn test_simulation_never_mutates_live_grid() {
    let engine = scenario_engine();
    let before = trips(&engine);

    let targets: Vec<Recommendation> = engine
        .recommendations(0.0, 0.0, 2)
        .into_iter()
        .filter(|r| r.forecast.demand_pred == 7.0)
        .collect();
    let result = engine.run_simulation(&targets, 0.5).unwrap();

    assert_eq!(result.relocated_trips, 4);
    assert_eq!(result.kpi_before.total_trips, 15);
    assert_eq!(result.kpi_after.total_trips, 15);
    assert_eq!(result.kpi_before.demand_supply_gap, 0.5);
    assert_eq!(result.kpi_after.demand_supply_gap, 3.5);
    assert_eq!(result.delta.demand_supply_gap, 3.0);
    assert_eq!(trips(&engine), before);
}

#[test]
fn test_simulation_without_donors_is_noop() {
    let engine = scenario_engine();
    let all = engine.recommendations(0.0, 0.0, 5);
    let result = engine.run_simulation(&all, 0.1).unwrap();

    assert_eq!(result.relocated_trips, 0);
    assert_eq!(result.kpi_after, result.kpi_before);
    assert!(result.message.is_some());
}

#[test]
fn test_simulation_preconditions() {
    let engine = engine();
    assert_eq!(engine.run_simulation(&[], 0.1), Err(EngineError::EmptyGrid));

    let engine = scenario_engine();
    assert_eq!(engine.run_simulation(&[], 0.0), Err(EngineError::InvalidShare(0.0)));
}

#[test]
fn test_region_bounds_from_config_file() {
    let path = format!("{}/geo_demand_it_config.json", std::env::temp_dir().display());
    std::fs::write(&path, r#"{ "validation": { "bounds": { "region": {
        "min_lat": 50.5, "max_lat": 52.0, "min_lng": 70.5, "max_lng": 72.5 } } },
        "sequencing": "recorded" }"#)
    .unwrap();

    let config = EngineConfig::load(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(config.validation.bounds, CoordinateBounds::Region(BoundingBox::OPERATING_REGION));
    assert_eq!(config.sequencing, SequencingPolicy::Recorded);

    let engine = Engine::new(GridStore::new_arc(), config).unwrap();
    let result = engine.ingest(&[
        RawProbe::new("in", 51.1, 71.4, 10.0, 0),
        RawProbe::new("out", 40.7, -74.0, 10.0, 0),
    ]);
    assert_eq!(result.valid_rows, 1);
    assert_eq!(result.rejected.coordinates, 1);
}

#[test]
fn test_safety_scan_all_clear_on_scenario() {
    let report = scenario_engine().safety_scan();
    assert_eq!(report.summary.total, 0);
    assert_eq!(report.summary.safety_score, 100.0);
    assert!(report.recommendations[0].starts_with("All clear"));
}
