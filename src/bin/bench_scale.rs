use life_gen::lifegen::{LifeGen, RUN_FOREVER};
use rand::RngCore;
use rand::SeedableRng;
use std::time::Instant;

fn bench_lifegen(size: i64, density: f64, iterations: u64) -> anyhow::Result<(f64, usize, usize)> {
    let mut engine = LifeGen::new();
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED_1234_ABCD_EF01);
    let threshold = (u64::MAX as f64 * density) as u64;

    for y in 0..size {
        for x in 0..size {
            if rng.next_u64() <= threshold {
                engine.add_cell(x, y, 0)?;
            }
        }
    }
    let seeded = engine.cell_count();

    engine.set_run_for(RUN_FOREVER, None);
    let start = Instant::now();
    for _ in 0..iterations {
        engine.next_gen();
    }
    let duration = start.elapsed();

    let total_ms = duration.as_secs_f64() * 1000.0;
    Ok((total_ms, seeded, engine.cell_count()))
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let scales: &[(i64, u64)] = &[(16, 200), (32, 100), (64, 50), (96, 20), (128, 10)];

    println!(
        "{:<10} {:>8} {:>8} {:>8} {:>12} {:>10}",
        "Grid", "Seeded", "Final", "Iters", "Total(ms)", "Avg(ms)"
    );
    println!("{}", "-".repeat(62));

    for &(size, iters) in scales {
        let (total_ms, seeded, fin) = bench_lifegen(size, 0.35, iters)?;
        let avg_ms = total_ms / iters as f64;
        println!(
            "{:<10} {:>8} {:>8} {:>8} {:>12.1} {:>10.4}",
            format!("{}x{}", size, size),
            seeded,
            fin,
            iters,
            total_ms,
            avg_ms
        );
    }
    Ok(())
}
