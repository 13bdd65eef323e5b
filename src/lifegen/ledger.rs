//! Per-step record of empty positions next to live cells.
//!
//! Open-addressed linear-probing set for `(i64, i64)` keys with an
//! insertion-ordered side list for iteration. Slots are lazily cleared with
//! an epoch stamp, so each step starts a fresh ledger without touching the
//! whole backing array.

const LOAD_NUM: usize = 3;
const LOAD_DEN: usize = 4;

#[derive(Clone, Copy)]
struct Slot {
    x: i64,
    y: i64,
    stamp: u32,
}

impl Slot {
    const EMPTY: Self = Self {
        x: 0,
        y: 0,
        stamp: 0,
    };
}

#[inline(always)]
fn coord_hash(x: i64, y: i64) -> u64 {
    const MX: u64 = 0x517c_c1b7_2722_0a95;
    const MY: u64 = 0x6c62_272e_07bb_0142;
    let hx = (x as u64).wrapping_mul(MX);
    let hy = (y as u64).wrapping_mul(MY);
    hx ^ hy.rotate_right(32)
}

pub struct DeadCellLedger {
    slots: Vec<Slot>,
    mask: usize,
    stamp: u32,
    order: Vec<(i64, i64)>,
}

impl Default for DeadCellLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadCellLedger {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(cap: usize) -> Self {
        let slots = slot_count_for(cap);
        Self {
            slots: vec![Slot::EMPTY; slots],
            mask: slots - 1,
            stamp: 1,
            order: Vec::with_capacity(cap),
        }
    }

    /// Forget every recorded position.
    #[inline]
    pub fn begin_step(&mut self) {
        self.order.clear();
        self.stamp = self.stamp.wrapping_add(1);
        if self.stamp == 0 {
            self.stamp = 1;
            for slot in &mut self.slots {
                slot.stamp = 0;
            }
        }
    }

    /// Size the table for `live_cells` live cells, each with up to 8 empty
    /// neighbors.
    #[inline]
    pub fn reserve_for(&mut self, live_cells: usize) {
        let needed = slot_count_for(live_cells.saturating_mul(8));
        if needed > self.slots.len() {
            self.resize(needed);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Recorded positions in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        self.order.iter().copied()
    }

    #[inline(always)]
    fn needs_grow(&self) -> bool {
        self.order.len() * LOAD_DEN >= self.slots.len() * LOAD_NUM
    }

    fn resize(&mut self, new_slots: usize) {
        debug_assert!(new_slots.is_power_of_two());
        self.slots = vec![Slot::EMPTY; new_slots];
        self.mask = new_slots - 1;
        let stamp = self.stamp;
        for &(x, y) in &self.order {
            let mut pos = coord_hash(x, y) as usize & self.mask;
            while self.slots[pos].stamp == stamp {
                pos = (pos + 1) & self.mask;
            }
            self.slots[pos] = Slot { x, y, stamp };
        }
    }

    /// Record an empty position.
    /// Returns `true` if newly recorded, `false` if already present.
    #[inline]
    pub fn record(&mut self, x: i64, y: i64) -> bool {
        if self.needs_grow() {
            self.resize((self.slots.len() * 2).max(16));
        }

        let mask = self.mask;
        let mut pos = coord_hash(x, y) as usize & mask;
        loop {
            let slot = &mut self.slots[pos];
            if slot.stamp != self.stamp {
                *slot = Slot {
                    x,
                    y,
                    stamp: self.stamp,
                };
                self.order.push((x, y));
                return true;
            }
            if slot.x == x && slot.y == y {
                return false;
            }
            pos = (pos + 1) & mask;
        }
    }
}

fn slot_count_for(keys: usize) -> usize {
    keys.saturating_mul(LOAD_DEN)
        .div_ceil(LOAD_NUM)
        .next_power_of_two()
        .max(16)
}

#[cfg(test)]
mod tests {
    use super::DeadCellLedger;

    #[test]
    fn dedups_within_step_and_resets_across_steps() {
        let mut ledger = DeadCellLedger::new();
        ledger.begin_step();
        assert!(ledger.record(1, 2));
        assert!(!ledger.record(1, 2));
        assert!(ledger.record(-5, 9));
        assert_eq!(ledger.len(), 2);

        ledger.begin_step();
        assert!(ledger.is_empty());
        assert!(ledger.record(1, 2));
        assert!(!ledger.record(1, 2));
        assert_eq!(ledger.iter().collect::<Vec<_>>(), vec![(1, 2)]);
    }

    #[test]
    fn grows_past_initial_capacity_and_keeps_order() {
        let mut ledger = DeadCellLedger::with_capacity(8);
        ledger.begin_step();
        for i in 0..10_000i64 {
            assert!(ledger.record(i, -i));
        }
        for i in 0..10_000i64 {
            assert!(!ledger.record(i, -i));
        }
        assert_eq!(ledger.len(), 10_000);
        assert!(ledger.iter().enumerate().all(|(i, p)| p == (i as i64, -(i as i64))));
    }

    #[test]
    fn reserve_keeps_current_entries() {
        let mut ledger = DeadCellLedger::with_capacity(4);
        ledger.begin_step();
        ledger.record(3, 3);
        ledger.reserve_for(1_000);
        assert!(!ledger.record(3, 3));
        assert!(ledger.record(4, 4));
    }
}
