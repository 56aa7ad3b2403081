use std::fs;

use courier_client::{ArenaMap, ClientConfig, run};
use courier_runtime::TeamMode;

/// One row split by a wall: `B...#...B`, one parcel on each side.
const SPLIT_ROW: &str = r#"{
    "width": 9,
    "height": 1,
    "tiles": [[2], [3], [3], [3], [0], [3], [3], [3], [2]],
    "config": {
        "PARCELS_MAX": 0,
        "PARCEL_DECADING_INTERVAL": "infinite",
        "CLOCK": 100,
        "AGENTS_OBSERVATION_DISTANCE": 5,
        "PARCELS_OBSERVATION_DISTANCE": 5
    },
    "starts": [{"x": 3, "y": 0}, {"x": 5, "y": 0}],
    "parcels": [
        {"id": "west", "x": 1, "y": 0, "reward": 12},
        {"id": "east", "x": 7, "y": 0, "reward": 9}
    ]
}"#;

fn load_map() -> ArenaMap {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("split.json");
    fs::write(&path, SPLIT_ROW).expect("write map");
    ArenaMap::load(&path).expect("map loads")
}

#[tokio::test(start_paused = true)]
async fn solo_session_delivers_the_reachable_parcel() {
    let config = ClientConfig {
        mode: TeamMode::Solo,
        ticks: Some(30),
        seed: 11,
        ..ClientConfig::default()
    };
    let summary = run(&config, load_map()).await.expect("session runs");

    assert_eq!(summary.ticks, 30);
    assert_eq!(summary.scores, vec![12.0]);
}

#[tokio::test(start_paused = true)]
async fn duo_session_delivers_on_both_sides_of_the_wall() {
    let config = ClientConfig {
        mode: TeamMode::Duo,
        ticks: Some(30),
        seed: 5,
        ..ClientConfig::default()
    };
    let summary = run(&config, load_map()).await.expect("session runs");

    assert_eq!(summary.scores, vec![12.0, 9.0]);
    assert_eq!(summary.total(), 21.0);
}

#[test]
fn missing_map_file_is_reported_with_its_path() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("nowhere.json");
    let error = ArenaMap::load(&path).unwrap_err();
    assert!(format!("{error:#}").contains("nowhere.json"));
}
