use criterion::{criterion_group, criterion_main, Criterion};
use persistence::{Gateway, MemoryStore};
use sim_core::{AssetId, EconomyConfig, EquipmentId};
use sim_econ::SeededRng;
use sim_runtime::{run_seconds, SchedulerConfig, SimulationEngine};

fn bench_hour(c: &mut Criterion) {
    let (mut engine, _) = SimulationEngine::initialize(
        EconomyConfig::default(),
        Gateway::new(MemoryStore::new()),
        SeededRng::new(42),
    );
    let price = rust_decimal::Decimal::new(300, 0);
    engine.buy_equipment(EquipmentId::GpuBasic, price).unwrap();
    for asset in AssetId::ALL {
        engine.set_mining(asset, true).unwrap();
    }
    let cfg = SchedulerConfig::default();
    let start = chrono::DateTime::<chrono::Utc>::from_timestamp(1_700_000_000, 0).unwrap();
    c.bench_function("simulated_hour", |b| {
        b.iter(|| {
            let _ = run_seconds(&mut engine, &cfg, 3_600, start);
        })
    });
}

criterion_group!(benches, bench_hour);
criterion_main!(benches);
