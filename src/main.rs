#[cfg(feature = "mimalloc-global")]
#[global_allocator]
static GLOBAL_ALLOCATOR: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Instant;

use anyhow::{Context, bail};
use life_gen::lifegen::{LifeGen, LifeGenConfig};
use life_gen::pattern;
use rand::RngCore;
use rand::SeedableRng;

const SEED: u64 = 0x5EED_1234_ABCD_EF01;

#[derive(Debug)]
struct MainArgs {
    size: i64,
    density: f64,
    generations: u64,
    config: LifeGenConfig,
}

fn parse_args() -> anyhow::Result<MainArgs> {
    let args: Vec<String> = std::env::args().collect();
    parse_args_from(&args)
}

fn next_arg<'a>(args: &'a [String], i: usize, flag: &str) -> anyhow::Result<&'a str> {
    args.get(i)
        .map(String::as_str)
        .with_context(|| format!("{flag} requires a value"))
}

fn parse_args_from(args: &[String]) -> anyhow::Result<MainArgs> {
    let mut parsed = MainArgs {
        size: 64,
        density: 0.35,
        generations: 100,
        config: LifeGenConfig::default(),
    };
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--size" => {
                i += 1;
                parsed.size = next_arg(args, i, "--size")?
                    .parse()
                    .context("--size requires an integer")?;
            }
            "--density" => {
                i += 1;
                parsed.density = next_arg(args, i, "--density")?
                    .parse()
                    .context("--density requires a number")?;
            }
            "--generations" => {
                i += 1;
                parsed.generations = next_arg(args, i, "--generations")?
                    .parse()
                    .context("--generations requires a positive integer")?;
            }
            "--notify-threads" => {
                i += 1;
                let n: usize = next_arg(args, i, "--notify-threads")?
                    .parse()
                    .context("--notify-threads requires a positive integer")?;
                parsed.config = parsed.config.notify_threads(n);
            }
            other => bail!(
                "unknown argument: {other}\nusage: life-gen [--size N] [--density F] [--generations N] [--notify-threads N]"
            ),
        }
        i += 1;
    }
    if !(0.0..=1.0).contains(&parsed.density) {
        bail!("--density must be within 0..=1");
    }
    if parsed.generations == 0 {
        bail!("--generations must be at least 1");
    }
    Ok(parsed)
}

fn seed_random_soup(engine: &mut LifeGen, size: i64, density: f64) -> anyhow::Result<usize> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(SEED);
    let threshold = (u64::MAX as f64 * density) as u64;
    let mut coords = Vec::new();
    for y in 0..size {
        for x in 0..size {
            if rng.next_u64() <= threshold {
                coords.extend_from_slice(&[x, y]);
            }
        }
    }
    let (cx, cy) = pattern::coords_centre(&coords);
    Ok(engine.add_cells_at_offset(-cx, -cy, 0, &coords)?)
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = parse_args()?;

    let mut engine = LifeGen::with_config(args.config)?;
    let seeded = seed_random_soup(&mut engine, args.size, args.density)?;
    println!(
        "Seeded {seeded} cells in a {0}x{0} soup (density {1})",
        args.size, args.density
    );

    let peak = Arc::new(AtomicU64::new(0));
    let peak_cb = Arc::clone(&peak);
    engine.on_generation_done(move |report| {
        peak_cb.fetch_max(report.cell_count as u64, Ordering::Relaxed);
    });

    let (done_tx, done_rx) = mpsc::channel();
    engine.set_run_for(
        args.generations,
        Some(Box::new(move |lg: &LifeGen| {
            if done_tx.send((lg.generation(), lg.cell_count())).is_err() {
                log::warn!("stop report dropped at generation {}", lg.generation());
            }
        })),
    );

    let start = Instant::now();
    let mut step_total = std::time::Duration::ZERO;
    while engine.next_gen() {
        step_total += engine.generation_time();
        let generation = engine.generation();
        if generation % 10 == 0 {
            log::info!(
                "Generation {generation}: {} cells, {:?}/step",
                engine.cell_count(),
                engine.generation_time()
            );
        }
    }
    let wall = start.elapsed();

    let (stopped_at, final_cells) = done_rx
        .try_recv()
        .context("run finished without firing the stop callback")?;
    let (min_x, min_y, max_x, max_y) = engine.bounds();
    let avg_ms = step_total.as_secs_f64() * 1000.0 / stopped_at.max(1) as f64;

    println!("\n--- Summary ({stopped_at} generations) ---");
    println!("Cells: {final_cells} (peak reported {})", peak.load(Ordering::Relaxed));
    println!("Bounds: ({min_x}, {min_y}) .. ({max_x}, {max_y})");
    println!(
        "Step time: {:.3} ms total, {avg_ms:.6} ms/gen | wall {:.3} ms",
        step_total.as_secs_f64() * 1000.0,
        wall.as_secs_f64() * 1000.0
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::parse_args_from;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("life-gen")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_without_flags() {
        let parsed = parse_args_from(&args(&[])).unwrap();
        assert_eq!(parsed.size, 64);
        assert_eq!(parsed.generations, 100);
        assert!(parsed.config.notify_threads.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let parsed = parse_args_from(&args(&[
            "--size",
            "16",
            "--density",
            "0.5",
            "--generations",
            "3",
            "--notify-threads",
            "2",
        ]))
        .unwrap();
        assert_eq!(parsed.size, 16);
        assert_eq!(parsed.density, 0.5);
        assert_eq!(parsed.generations, 3);
        assert_eq!(parsed.config.notify_threads, Some(2));
    }

    #[test]
    fn zero_generations_is_rejected() {
        let err = parse_args_from(&args(&["--generations", "0"])).unwrap_err();
        assert!(err.to_string().contains("--generations"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(parse_args_from(&args(&["--density", "1.5"])).is_err());
        assert!(parse_args_from(&args(&["--size"])).is_err());
        assert!(parse_args_from(&args(&["--frobnicate"])).is_err());
    }
}
