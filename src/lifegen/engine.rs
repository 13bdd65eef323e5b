use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::LifeGenError;
use super::key;
use super::ledger::DeadCellLedger;
use super::store::{Cell, CellMut, CellStore, Cells};

/// `set_run_for` count that never runs out.
pub const RUN_FOREVER: u64 = u64::MAX;

/// Tag bit marking a cell as selected.
pub const SELECT_MODE_MASK: u32 = 0b0000_0001;
/// Tag bits selecting a cell's colour class.
pub const COLOUR_MODE_MASK: u32 = 0b0000_0011;

/// Tag given to cells born during a step.
const BIRTH_TAG: u32 = 0;

/// Neighbor offsets in the order `count_near` probes them.
const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Summary of a finished step, handed to the generation-done callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GenerationReport {
    pub generation: u64,
    pub cell_count: usize,
    pub elapsed: Duration,
}

pub type OnStopped = Box<dyn FnOnce(&LifeGen) + Send>;
pub type OnGenerationDone = Arc<dyn Fn(GenerationReport) + Send + Sync>;

/// Configuration for a LifeGen engine instance.
///
/// Use `LifeGenConfig::default()` for defaults, or customise individual
/// knobs via the builder methods.
#[derive(Clone, Debug, Default)]
pub struct LifeGenConfig {
    /// Threads in a dedicated pool for generation-done callbacks.
    /// `None` dispatches onto rayon's global pool.
    pub notify_threads: Option<usize>,
    /// Initial arena capacity of each generation buffer.
    /// `None` uses `DEFAULT_STORE_CAPACITY`.
    pub store_capacity: Option<usize>,
}

const DEFAULT_STORE_CAPACITY: usize = 1_024;

impl LifeGenConfig {
    /// Dispatch callbacks on a dedicated pool of `n` threads.
    pub fn notify_threads(mut self, n: usize) -> Self {
        self.notify_threads = Some(n.max(1));
        self
    }

    /// Pre-size both generation buffers.
    pub fn store_capacity(mut self, cells: usize) -> Self {
        self.store_capacity = Some(cells);
        self
    }
}

fn resolve_store_capacity(config: &LifeGenConfig) -> usize {
    config.store_capacity.unwrap_or(DEFAULT_STORE_CAPACITY)
}

fn resolve_notify_pool(config: &LifeGenConfig) -> Result<Option<rayon::ThreadPool>, LifeGenError> {
    let Some(threads) = config.notify_threads else {
        return Ok(None);
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("lifegen-notify-{i}"))
        .build()?;
    Ok(Some(pool))
}

/// Double-buffered Life engine over two ordered cell stores.
///
/// Stepping and mutation take `&mut self`; share an engine across threads
/// behind a `Mutex`.
pub struct LifeGen {
    stores: [CellStore; 2],
    current: usize,
    generation: u64,
    last_step: Duration,
    run_for: u64,
    on_stopped: Option<OnStopped>,
    on_gen_done: Option<OnGenerationDone>,
    notify_pool: Option<rayon::ThreadPool>,
    ledger: DeadCellLedger,
}

impl Default for LifeGen {
    fn default() -> Self {
        Self::new()
    }
}

impl LifeGen {
    pub fn new() -> Self {
        Self::from_parts(DEFAULT_STORE_CAPACITY, None)
    }

    /// Create an engine with explicit configuration.
    pub fn with_config(config: LifeGenConfig) -> Result<Self, LifeGenError> {
        let pool = resolve_notify_pool(&config)?;
        Ok(Self::from_parts(resolve_store_capacity(&config), pool))
    }

    fn from_parts(capacity: usize, notify_pool: Option<rayon::ThreadPool>) -> Self {
        Self {
            stores: [
                CellStore::with_capacity(capacity),
                CellStore::with_capacity(capacity),
            ],
            current: 0,
            generation: 0,
            last_step: Duration::ZERO,
            run_for: 0,
            on_stopped: None,
            on_gen_done: None,
            notify_pool,
            ledger: DeadCellLedger::with_capacity(capacity),
        }
    }

    /// Register a callback fired after every step. It runs on a rayon
    /// worker and never delays the step that triggered it.
    pub fn on_generation_done<F>(&mut self, f: F)
    where
        F: Fn(GenerationReport) + Send + Sync + 'static,
    {
        self.on_gen_done = Some(Arc::new(f));
    }

    pub fn clear_generation_done(&mut self) {
        self.on_gen_done = None;
    }

    #[inline]
    fn current_store(&self) -> &CellStore {
        &self.stores[self.current]
    }

    #[inline]
    fn current_store_mut(&mut self) -> &mut CellStore {
        &mut self.stores[self.current]
    }

    /// Index (0 or 1) of the buffer holding the current generation.
    pub fn current_gen_id(&self) -> usize {
        self.current
    }

    /// Advance one generation if the engine is running.
    /// Returns `true` when a step was taken.
    pub fn next_gen(&mut self) -> bool {
        if self.run_for == 0 {
            return false;
        }
        let start = Instant::now();

        let cur = self.current;
        let next = 1 - cur;
        let [a, b] = &mut self.stores;
        let (current, target) = if cur == 0 { (&mut *a, b) } else { (&mut *b, a) };
        let ledger = &mut self.ledger;

        current.rebuild_midpoint();
        ledger.begin_step();
        ledger.reserve_for(current.len());
        target.clear();

        for cell in current.iter() {
            let (x, y) = cell.coords();
            let mut count = 0;
            for (dx, dy) in NEIGHBOR_OFFSETS {
                if current.contains_or_record(x + dx, y + dy, ledger) {
                    count += 1;
                }
            }
            if count == 2 || count == 3 {
                target.insert_key(cell.key(), x, y, cell.tag());
            }
        }
        let survivors = target.len();
        log::trace!(
            "gen {}: {} survivors, {} dead candidates",
            self.generation,
            survivors,
            ledger.len()
        );

        let mut clipped = 0usize;
        for (x, y) in ledger.iter() {
            if births_here(current, x, y) {
                if key::in_cell_range(x, y) {
                    target.insert_key(key::key_of(x, y), x, y, BIRTH_TAG);
                } else {
                    clipped += 1;
                }
            }
        }
        if clipped > 0 {
            log::warn!("gen {}: dropped {clipped} births at the grid edge", self.generation);
        }

        current.clear();
        self.current = next;
        self.generation += 1;
        self.last_step = start.elapsed();

        let cell_count = self.stores[next].len();
        log::debug!(
            "gen {} done: {} cells ({} born) in {:?}",
            self.generation,
            cell_count,
            cell_count - survivors,
            self.last_step
        );

        if self.run_for != RUN_FOREVER {
            self.run_for -= 1;
            if self.run_for == 0 {
                log::info!("run stopped at generation {}", self.generation);
                if let Some(on_stopped) = self.on_stopped.take() {
                    on_stopped(&*self);
                }
            }
        }

        if let Some(cb) = &self.on_gen_done {
            let report = GenerationReport {
                generation: self.generation,
                cell_count,
                elapsed: self.last_step,
            };
            let cb = Arc::clone(cb);
            match &self.notify_pool {
                Some(pool) => pool.spawn(move || cb(report)),
                None => rayon::spawn(move || cb(report)),
            }
        }
        true
    }

    /// Live neighbors of `(x, y)` in the current generation.
    pub fn count_near(&self, x: i64, y: i64) -> usize {
        let store = self.current_store();
        NEIGHBOR_OFFSETS
            .iter()
            .filter(|(dx, dy)| store.contains(x.saturating_add(*dx), y.saturating_add(*dy)))
            .count()
    }

    /// Run for `n` generations, then call `on_stopped` once.
    /// `n == 0` stops the engine without firing the previous callback.
    pub fn set_run_for(&mut self, n: u64, on_stopped: Option<OnStopped>) {
        self.run_for = n;
        self.on_stopped = on_stopped;
    }

    pub fn run_for(&self) -> u64 {
        self.run_for
    }

    pub fn is_running(&self) -> bool {
        self.run_for > 0
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Wall time of the most recent step.
    pub fn generation_time(&self) -> Duration {
        self.last_step
    }

    pub fn cell_count(&self) -> usize {
        self.current_store().len()
    }

    /// Drop both generations and zero all counters.
    pub fn reset(&mut self) {
        for store in &mut self.stores {
            store.clear();
        }
        self.current = 0;
        self.generation = 0;
        self.last_step = Duration::ZERO;
        self.run_for = 0;
        self.on_stopped = None;
    }

    pub fn add_cell(&mut self, x: i64, y: i64, tag: u32) -> Result<bool, LifeGenError> {
        self.current_store_mut().insert(x, y, tag)
    }

    /// Add every `(x, y)` pair of a flat coordinate list.
    pub fn add_cells(&mut self, coords: &[i64], tag: u32) -> Result<usize, LifeGenError> {
        self.add_cells_at_offset(0, 0, tag, coords)
    }

    /// Add every `(x, y)` pair of `coords` shifted by `(dx, dy)`.
    ///
    /// The whole batch is checked before anything is inserted. Returns the
    /// number of cells that were not already live.
    pub fn add_cells_at_offset(
        &mut self,
        dx: i64,
        dy: i64,
        tag: u32,
        coords: &[i64],
    ) -> Result<usize, LifeGenError> {
        if coords.len() % 2 != 0 {
            return Err(LifeGenError::OddCoordinateCount(coords.len()));
        }
        let mut shifted = Vec::with_capacity(coords.len() / 2);
        for pair in coords.chunks_exact(2) {
            let (x, y) = (pair[0], pair[1]);
            let (Some(sx), Some(sy)) = (x.checked_add(dx), y.checked_add(dy)) else {
                return Err(LifeGenError::CoordinateOutOfRange { x, y });
            };
            shifted.push((key::check_cell(sx, sy)?, sx, sy));
        }

        let store = self.current_store_mut();
        let mut added = 0;
        for (k, x, y) in shifted {
            if store.insert_key(k, x, y, tag) {
                added += 1;
            }
        }
        Ok(added)
    }

    pub fn remove_cell(&mut self, x: i64, y: i64) -> bool {
        self.current_store_mut().remove(x, y)
    }

    /// Remove every cell whose tag fully matches `mask`.
    /// Returns the number of cells removed.
    pub fn remove_cells_with_mode(&mut self, mask: u32) -> usize {
        let before = self.cell_count();
        let kept = self.current_store().filter_keep(|c| !c.matches_mode(mask));
        let removed = before - kept.len();
        self.stores[self.current] = kept;
        removed
    }

    /// Set every cell's tag to `value`.
    pub fn clear_mode(&mut self, value: u32) {
        self.current_store_mut().visit_mut(|mut cell| {
            cell.set_tag(value);
            true
        });
    }

    /// Flat `x, y, x, y, ...` list of cells whose tag fully matches `mask`.
    pub fn list_cells_with_mode(&self, mask: u32) -> Vec<i64> {
        self.cells()
            .filter(|c| c.matches_mode(mask))
            .flat_map(|c| [c.x(), c.y()])
            .collect()
    }

    pub fn count_cells(&self) -> usize {
        self.cell_count()
    }

    pub fn count_cells_with_mode(&self, mask: u32) -> usize {
        self.cells().filter(|c| c.matches_mode(mask)).count()
    }

    /// Call `found` for every live cell inside the closed rectangle spanned
    /// by the two corners, in key order.
    pub fn cells_in_bounds<F: FnMut(CellMut<'_>)>(
        &mut self,
        x1: i64,
        y1: i64,
        x2: i64,
        y2: i64,
        mut found: F,
    ) {
        let (min_x, max_x) = (x1.min(x2), x1.max(x2));
        let (min_y, max_y) = (y1.min(y2), y1.max(y2));
        self.current_store_mut().visit_mut(|cell| {
            if cell.x() > max_x {
                return false;
            }
            if cell.x() >= min_x && (min_y..=max_y).contains(&cell.y()) {
                found(cell);
            }
            true
        });
    }

    /// OR `bits` into the tag of every cell in the rectangle.
    pub fn set_mode_in_bounds(&mut self, x1: i64, y1: i64, x2: i64, y2: i64, bits: u32) {
        self.cells_in_bounds(x1, y1, x2, y2, |mut cell| {
            let tag = cell.tag();
            cell.set_tag(tag | bits);
        });
    }

    /// `(min_x, min_y, max_x, max_y)` of the live cells, all zero when empty.
    pub fn bounds(&self) -> (i64, i64, i64, i64) {
        let mut cells = self.cells();
        let Some(first) = cells.next() else {
            return (0, 0, 0, 0);
        };
        let (mut min_x, mut min_y) = first.coords();
        let (mut max_x, mut max_y) = (min_x, min_y);
        for cell in cells {
            let (x, y) = cell.coords();
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        (min_x, min_y, max_x, max_y)
    }

    pub fn get_cell(&self, x: i64, y: i64) -> Option<&Cell> {
        self.current_store().get(x, y)
    }

    pub fn is_alive(&self, x: i64, y: i64) -> bool {
        self.current_store().contains(x, y)
    }

    /// First cell of the current generation in key order.
    pub fn root_cell(&self) -> Option<&Cell> {
        self.current_store().first()
    }

    pub fn cells(&self) -> Cells<'_> {
        self.current_store().iter()
    }

    /// Visit the current generation until `f` returns `false`.
    pub fn visit_all_cells<F: FnMut(&Cell) -> bool>(&self, f: F) -> bool {
        self.current_store().visit(f)
    }

    pub fn visit_all_cells_mut<F: FnMut(CellMut<'_>) -> bool>(&mut self, f: F) -> bool {
        self.current_store_mut().visit_mut(f)
    }
}

/// Exactly three live neighbors, giving up as soon as a fourth is seen.
#[inline]
fn births_here(store: &CellStore, x: i64, y: i64) -> bool {
    let mut count = 0;
    for (dx, dy) in NEIGHBOR_OFFSETS {
        if store.contains(x + dx, y + dy) {
            count += 1;
            if count > 3 {
                return false;
            }
        }
    }
    count == 3
}

impl fmt::Display for LifeGen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.current_store(), f)
    }
}

impl fmt::Debug for LifeGen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifeGen")
            .field("current", &self.current)
            .field("generation", &self.generation)
            .field("cells", &self.cell_count())
            .field("run_for", &self.run_for)
            .field("last_step", &self.last_step)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, mpsc};
    use std::time::Duration;

    use super::{LifeGen, LifeGenConfig, RUN_FOREVER, SELECT_MODE_MASK};
    use crate::lifegen::error::LifeGenError;
    use crate::lifegen::key::{MAX_COORD, MIN_COORD};

    fn seeded(coords: &[i64]) -> LifeGen {
        let mut engine = LifeGen::new();
        engine.add_cells(coords, 0).expect("seed in range");
        engine
    }

    #[test]
    fn idle_engine_does_not_step() {
        let mut engine = seeded(&[0, 0, 1, 0, 2, 0]);
        assert!(!engine.is_running());
        assert!(!engine.next_gen());
        assert_eq!(engine.generation(), 0);
        assert_eq!(engine.to_string(), "0,0 1,0 2,0");
    }

    #[test]
    fn step_swaps_buffers_and_clears_old_one() {
        let mut engine = seeded(&[0, 0, 1, 0, 2, 0]);
        engine.set_run_for(RUN_FOREVER, None);
        assert_eq!(engine.current_gen_id(), 0);
        assert!(engine.next_gen());
        assert_eq!(engine.current_gen_id(), 1);
        assert!(engine.stores[0].is_empty());
        assert_eq!(engine.to_string(), "1,-1 1,0 1,1");
        assert_eq!(engine.run_for(), RUN_FOREVER);
    }

    #[test]
    fn survivors_keep_their_tag_births_start_untagged() {
        let mut engine = LifeGen::new();
        engine.add_cells(&[0, 0, 1, 0, 2, 0], SELECT_MODE_MASK).unwrap();
        engine.set_run_for(1, None);
        engine.next_gen();
        assert_eq!(engine.get_cell(1, 0).map(|c| c.tag()), Some(SELECT_MODE_MASK));
        assert_eq!(engine.get_cell(1, 1).map(|c| c.tag()), Some(0));
        assert_eq!(engine.get_cell(1, -1).map(|c| c.tag()), Some(0));
    }

    #[test]
    fn births_past_grid_edge_are_dropped() {
        let mut engine = LifeGen::new();
        // Vertical blinker hugging the right edge; its horizontal phase
        // would need x = MAX_COORD + 1.
        let x = MAX_COORD;
        engine.add_cells(&[x, 0, x, 1, x, 2], 0).unwrap();
        engine.set_run_for(1, None);
        engine.next_gen();
        assert_eq!(engine.count_cells(), 2);
        assert!(engine.is_alive(x - 1, 1));
        assert!(engine.is_alive(x, 1));
    }

    #[test]
    fn add_cells_at_offset_is_all_or_nothing() {
        let mut engine = LifeGen::new();
        let err = engine
            .add_cells_at_offset(0, 0, 0, &[0, 0, MIN_COORD - 1, 0])
            .unwrap_err();
        assert!(matches!(err, LifeGenError::CoordinateOutOfRange { .. }));
        assert_eq!(engine.count_cells(), 0);

        let err = engine.add_cells(&[1, 2, 3], 0).unwrap_err();
        assert!(matches!(err, LifeGenError::OddCoordinateCount(3)));

        let err = engine.add_cells_at_offset(i64::MAX, 0, 0, &[1, 1]).unwrap_err();
        assert!(matches!(err, LifeGenError::CoordinateOutOfRange { x: 1, y: 1 }));
    }

    #[test]
    fn reset_zeroes_everything() {
        let mut engine = seeded(&[0, 0, 1, 0, 2, 0]);
        engine.set_run_for(5, None);
        engine.next_gen();
        engine.reset();
        assert_eq!(engine.generation(), 0);
        assert_eq!(engine.cell_count(), 0);
        assert_eq!(engine.current_gen_id(), 0);
        assert!(!engine.is_running());
        assert_eq!(engine.generation_time(), Duration::ZERO);
        assert_eq!(engine.to_string(), "None");
    }

    #[test]
    fn stop_callback_sees_final_generation() {
        let mut engine = seeded(&[0, 0, 1, 0, 0, 1, 1, 1]);
        let (tx, rx) = mpsc::channel();
        engine.set_run_for(
            2,
            Some(Box::new(move |lg: &LifeGen| {
                tx.send((lg.generation(), lg.is_running())).unwrap();
            })),
        );
        engine.next_gen();
        assert!(rx.try_recv().is_err());
        engine.next_gen();
        assert_eq!(rx.try_recv().unwrap(), (2, false));
    }

    #[test]
    fn generation_done_runs_on_dedicated_pool() {
        let mut engine =
            LifeGen::with_config(LifeGenConfig::default().notify_threads(1).store_capacity(16))
                .expect("notify pool");
        engine.add_cells(&[0, 0, 1, 0, 2, 0], 0).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::channel();
        let seen = Arc::clone(&calls);
        engine.on_generation_done(move |report| {
            seen.fetch_add(1, Ordering::SeqCst);
            let name = std::thread::current().name().map(str::to_owned);
            tx.send((report, name)).unwrap();
        });
        engine.set_run_for(3, None);
        while engine.next_gen() {}

        let mut gens = Vec::new();
        for _ in 0..3 {
            let (report, name) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
            assert_eq!(report.cell_count, 3);
            assert_eq!(name.as_deref(), Some("lifegen-notify-0"));
            gens.push(report.generation);
        }
        gens.sort_unstable();
        assert_eq!(gens, vec![1, 2, 3]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn cells_in_bounds_accepts_corners_in_any_order() {
        let mut engine = seeded(&[0, 0, 2, 2, 3, -1, 5, 5, -1, 1]);
        let mut inside = Vec::new();
        engine.cells_in_bounds(3, 3, 0, -1, |c| inside.push(c.coords()));
        assert_eq!(inside, vec![(0, 0), (2, 2), (3, -1)]);

        engine.set_mode_in_bounds(-1, -1, 0, 1, SELECT_MODE_MASK);
        assert_eq!(engine.list_cells_with_mode(SELECT_MODE_MASK), vec![-1, 1, 0, 0]);
    }

    #[test]
    fn removing_by_mode_keeps_configured_capacity() {
        let mut engine =
            LifeGen::with_config(LifeGenConfig::default().store_capacity(8_192)).unwrap();
        engine.add_cells(&[0, 0, 1, 1, 2, 2], 0).unwrap();
        engine.set_mode_in_bounds(0, 0, 1, 1, SELECT_MODE_MASK);

        assert_eq!(engine.remove_cells_with_mode(SELECT_MODE_MASK), 2);
        assert_eq!(engine.to_string(), "2,2");
        assert!(engine.stores[engine.current_gen_id()].capacity() >= 8_192);
    }

    #[test]
    fn debug_output_names_counters() {
        let engine = seeded(&[4, 4]);
        let dbg = format!("{engine:?}");
        assert!(dbg.contains("generation: 0"));
        assert!(dbg.contains("cells: 1"));
    }
}
