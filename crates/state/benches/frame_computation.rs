use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use railview_core::{BBox, CityId, Coordinate, ScopeDefinition, ScopeId, VehiclePosition};
use railview_state::{FrameComputer, ScopeFrameStore, ScopeStoreConfig};

fn build_store(scope_count: usize) -> Arc<ScopeFrameStore> {
    let store = Arc::new(ScopeFrameStore::new(ScopeStoreConfig::default()));
    let city = CityId::new("nyc").unwrap();

    for i in 0..scope_count {
        let south = 40.5 + (i as f64) * 0.01;
        let bbox = BBox::new(south, -74.1, south + 0.05, -73.9).normalized().unwrap();
        let def = ScopeDefinition {
            id: ScopeId::derive(&city, &bbox),
            city_id: city.clone(),
            bbox,
            created_at: Utc::now(),
        };
        store.upsert_scope(def, None).unwrap();
    }

    store
}

fn build_vehicles(count: usize) -> HashMap<String, VehiclePosition> {
    (0..count)
        .map(|i| {
            let id = format!("V{i}");
            let position = VehiclePosition {
                id: id.clone(),
                coordinate: Coordinate {
                    lat: 40.5 + (i % 100) as f64 * 0.003,
                    lng: -74.05 + (i % 50) as f64 * 0.002,
                },
                updated_at: Utc::now(),
                trip_id: None,
                route_id: None,
                bearing: None,
                speed_mps: None,
                status: None,
            };
            (id, position)
        })
        .collect()
}

fn bench_compute_frames(c: &mut Criterion) {
    let city = CityId::new("nyc").unwrap();

    for (scopes, vehicles) in [(10, 500), (50, 2_000)] {
        let store = build_store(scopes);
        let computer = FrameComputer::new(store);
        let fleet = build_vehicles(vehicles);

        c.bench_function(&format!("compute_frames/{scopes}_scopes_{vehicles}_vehicles"), |b| {
            b.iter_batched(
                || fleet.clone(),
                |fleet| {
                    computer
                        .compute_frames(&city, &fleet, |s| s.city_id == city)
                        .unwrap()
                },
                BatchSize::SmallInput,
            )
        });
    }
}

criterion_group!(benches, bench_compute_frames);
criterion_main!(benches);
