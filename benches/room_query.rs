//! Performance benchmarks for room search and settings filters

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use game_master::placement::InMemoryFleet;
use game_master::store::{InMemoryRoomStore, NewRoom, RoomQuery, RoomStore, SettingsFilter};
use game_master::types::{GeoPoint, Host, Region, Settings, SlotRequest};
use serde_json::{json, Value};
use std::sync::Arc;

const REGIONS: u64 = 4;
const ROOMS: u64 = 2_000;

fn room_settings(i: u64) -> Settings {
    let map = ["dust", "nuke", "train", "inferno"][(i % 4) as usize];
    json!({
        "map": map,
        "skill": i % 50,
        "ranked": i % 3 == 0,
    })
    .as_object()
    .cloned()
    .unwrap_or_default()
}

/// A store with rooms spread over every region, each one partly filled
async fn create_bench_store() -> InMemoryRoomStore {
    let fleet = Arc::new(InMemoryFleet::new());
    for id in 1..=REGIONS {
        fleet
            .add_region(Region {
                id,
                name: format!("region-{}", id),
                location: GeoPoint::new(10.0 * id as f64, 5.0 * id as f64),
                default: id == 1,
                settings: Value::Null,
            })
            .unwrap();
        fleet
            .add_host(Host::new(id, &format!("host-{}", id), "10.0.0.1", id))
            .unwrap();
    }

    let store = InMemoryRoomStore::new(fleet);
    for i in 0..ROOMS {
        let region = i % REGIONS + 1;
        store
            .create_room(
                NewRoom {
                    gamespace: "gs".to_string(),
                    game_name: "arena".to_string(),
                    game_version: "1.0".to_string(),
                    game_server_id: 1,
                    region_id: region,
                    host_id: region,
                    deployment_id: 1,
                    max_players: 8,
                    settings: room_settings(i),
                },
                &[SlotRequest::new(&format!("owner-{}", i), "t")],
            )
            .await
            .unwrap();
    }
    store
}

fn bench_settings_filter(c: &mut Criterion) {
    let filter = SettingsFilter::parse(&json!({
        "map": "nuke",
        "skill": {"@func": ">=", "@value": 20},
        "ranked": false,
    }))
    .unwrap();
    let settings: Vec<Settings> = (0..100).map(room_settings).collect();

    c.bench_function("settings_filter_100_rooms", |b| {
        b.iter(|| {
            black_box(
                settings
                    .iter()
                    .filter(|s| filter.matches(s))
                    .count(),
            )
        })
    });
}

fn bench_list_rooms(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = rt.block_on(create_bench_store());

    let query = RoomQuery::new("gs", "arena", "1.0")
        .host_active(true)
        .free_slots(2)
        .regions_order(vec![3, 1, 2, 4])
        .filter(SettingsFilter::parse(&json!({"map": "train"})).unwrap())
        .limit(50);

    c.bench_function("list_rooms_filtered", |b| {
        b.iter(|| rt.block_on(async { black_box(store.list_rooms(&query).await) }))
    });
}

fn bench_find_and_reserve(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("find_and_reserve_party_of_4", |b| {
        b.iter_batched(
            || rt.block_on(create_bench_store()),
            |store| {
                rt.block_on(async {
                    let query = RoomQuery::new("gs", "arena", "1.0")
                        .host_active(true)
                        .free_slots(4)
                        .regions_order(vec![2, 1, 3, 4]);
                    let members: Vec<SlotRequest> = (0..4)
                        .map(|i| SlotRequest::new(&format!("member-{}", i), "t"))
                        .collect();
                    black_box(store.find_and_reserve(&query, &members).await)
                })
            },
            criterion::BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_settings_filter,
    bench_list_rooms,
    bench_find_and_reserve
);
criterion_main!(benches);
