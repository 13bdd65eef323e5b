//! Arena-backed ordered cell store, one per generation buffer.
//!
//! Cells live in a `Vec<Cell>` and are chained by `u32` slot indices kept in
//! a parallel `links` vector, in strictly ascending key order. Removed slots
//! go onto a free list and are reused by later inserts. `NIL` terminates the
//! chain.

use std::fmt;

use super::error::LifeGenError;
use super::key;
use super::ledger::DeadCellLedger;

const NIL: u32 = u32::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct CellIdx(pub(crate) u32);

impl CellIdx {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A live grid position with a caller-defined tag bitmask.
#[derive(Clone, Debug)]
pub struct Cell {
    x: i64,
    y: i64,
    key: i64,
    tag: u32,
}

impl Cell {
    #[inline]
    pub fn x(&self) -> i64 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> i64 {
        self.y
    }

    #[inline]
    pub fn coords(&self) -> (i64, i64) {
        (self.x, self.y)
    }

    #[inline]
    pub fn key(&self) -> i64 {
        self.key
    }

    #[inline]
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// True when every bit of `mask` is set in the tag.
    #[inline]
    pub fn matches_mode(&self, mask: u32) -> bool {
        self.tag & mask == mask
    }
}

/// Mutable view of a stored cell. Only the tag can be changed; position
/// and key stay fixed while the cell is in a store.
///
/// ```compile_fail
/// use life_gen::LifeGen;
///
/// let mut engine = LifeGen::new();
/// engine.add_cell(0, 0, 0).unwrap();
/// let root = engine.root_cell().cloned().unwrap();
/// engine.visit_all_cells_mut(|cell| {
///     *cell = root.clone();
///     true
/// });
/// ```
pub struct CellMut<'a> {
    cell: &'a mut Cell,
}

impl CellMut<'_> {
    #[inline]
    pub fn x(&self) -> i64 {
        self.cell.x
    }

    #[inline]
    pub fn y(&self) -> i64 {
        self.cell.y
    }

    #[inline]
    pub fn coords(&self) -> (i64, i64) {
        self.cell.coords()
    }

    #[inline]
    pub fn key(&self) -> i64 {
        self.cell.key
    }

    #[inline]
    pub fn tag(&self) -> u32 {
        self.cell.tag
    }

    #[inline]
    pub fn set_tag(&mut self, tag: u32) {
        self.cell.tag = tag;
    }

    #[inline]
    pub fn matches_mode(&self, mask: u32) -> bool {
        self.cell.matches_mode(mask)
    }
}

pub struct CellStore {
    slots: Vec<Cell>,
    /// `links[i]` is the slot after `slots[i]` in key order.
    links: Vec<u32>,
    head: u32,
    tail: u32,
    /// Lookup hint near the median key. Reset to `NIL` on every insert/remove.
    midpoint: u32,
    free_list: Vec<CellIdx>,
    len: usize,
}

impl Default for CellStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CellStore {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            slots: Vec::with_capacity(cap),
            links: Vec::with_capacity(cap),
            head: NIL,
            tail: NIL,
            midpoint: NIL,
            free_list: Vec::new(),
            len: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Cell slots the arena can hold without reallocating.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// First cell in key order.
    pub fn first(&self) -> Option<&Cell> {
        self.slot(self.head)
    }

    pub fn midpoint(&self) -> Option<&Cell> {
        self.slot(self.midpoint)
    }

    #[inline(always)]
    fn slot(&self, idx: u32) -> Option<&Cell> {
        if idx == NIL {
            None
        } else {
            Some(&self.slots[idx as usize])
        }
    }

    fn alloc(&mut self, cell: Cell, next: u32) -> u32 {
        if let Some(recycled) = self.free_list.pop() {
            self.slots[recycled.index()] = cell;
            self.links[recycled.index()] = next;
            recycled.0
        } else {
            let idx = self.slots.len() as u32;
            debug_assert!(idx != NIL, "cell arena exhausted");
            self.slots.push(cell);
            self.links.push(next);
            idx
        }
    }

    /// Insert a live cell. Returns `Ok(false)` if the position is already
    /// live; the existing cell's tag is left untouched.
    pub fn insert(&mut self, x: i64, y: i64, tag: u32) -> Result<bool, LifeGenError> {
        let key = key::check_cell(x, y)?;
        Ok(self.insert_key(key, x, y, tag))
    }

    /// Ordered insert of a pre-validated key.
    pub(crate) fn insert_key(&mut self, key: i64, x: i64, y: i64, tag: u32) -> bool {
        let cell = Cell { x, y, key, tag };

        if self.head == NIL {
            let idx = self.alloc(cell, NIL);
            self.head = idx;
            self.tail = idx;
        } else if key > self.slots[self.tail as usize].key {
            let idx = self.alloc(cell, NIL);
            self.links[self.tail as usize] = idx;
            self.tail = idx;
        } else {
            // key <= tail key, so the scan always stops on a real cell.
            let mut prev = NIL;
            let mut cur = self.head;
            loop {
                let k = self.slots[cur as usize].key;
                if k == key {
                    return false;
                }
                if k > key {
                    break;
                }
                prev = cur;
                cur = self.links[cur as usize];
            }
            let idx = self.alloc(cell, cur);
            if prev == NIL {
                self.head = idx;
            } else {
                self.links[prev as usize] = idx;
            }
        }

        self.len += 1;
        self.midpoint = NIL;
        true
    }

    #[inline(always)]
    fn scan_start(&self, key: i64) -> u32 {
        if self.midpoint != NIL && self.slots[self.midpoint as usize].key <= key {
            self.midpoint
        } else {
            self.head
        }
    }

    fn find_key(&self, key: i64) -> Option<u32> {
        let mut cur = self.scan_start(key);
        while cur != NIL {
            let k = self.slots[cur as usize].key;
            if k == key {
                return Some(cur);
            }
            if k > key {
                return None;
            }
            cur = self.links[cur as usize];
        }
        None
    }

    /// Plain lookup.
    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        match key::try_key_of(x, y) {
            Some(k) => self.find_key(k).is_some(),
            None => false,
        }
    }

    /// Lookup that records a miss into `ledger`.
    #[inline]
    pub fn contains_or_record(&self, x: i64, y: i64, ledger: &mut DeadCellLedger) -> bool {
        if self.contains(x, y) {
            true
        } else {
            ledger.record(x, y);
            false
        }
    }

    pub fn get(&self, x: i64, y: i64) -> Option<&Cell> {
        let k = key::try_key_of(x, y)?;
        self.find_key(k).map(|idx| &self.slots[idx as usize])
    }

    pub fn get_mut(&mut self, x: i64, y: i64) -> Option<CellMut<'_>> {
        let k = key::try_key_of(x, y)?;
        let idx = self.find_key(k)?;
        Some(CellMut {
            cell: &mut self.slots[idx as usize],
        })
    }

    /// Recompute the lookup hint: the first cell whose key is at least
    /// halfway between the head and tail keys.
    pub fn rebuild_midpoint(&mut self) {
        self.midpoint = NIL;
        if self.len < 2 {
            return;
        }
        let low = self.slots[self.head as usize].key as i128;
        let high = self.slots[self.tail as usize].key as i128;
        let mid = (low + (high - low) / 2) as i64;

        let mut cur = self.head;
        while cur != NIL {
            if self.slots[cur as usize].key >= mid {
                self.midpoint = cur;
                return;
            }
            cur = self.links[cur as usize];
        }
    }

    pub fn remove(&mut self, x: i64, y: i64) -> bool {
        let Some(target) = key::try_key_of(x, y) else {
            return false;
        };

        let mut prev = NIL;
        let mut cur = self.head;
        while cur != NIL {
            let k = self.slots[cur as usize].key;
            if k > target {
                return false;
            }
            let next = self.links[cur as usize];
            if k == target {
                if prev == NIL {
                    self.head = next;
                } else {
                    self.links[prev as usize] = next;
                }
                if self.tail == cur {
                    self.tail = prev;
                }
                self.links[cur as usize] = NIL;
                self.free_list.push(CellIdx(cur));
                self.len -= 1;
                self.midpoint = NIL;
                return true;
            }
            prev = cur;
            cur = next;
        }
        false
    }

    /// Visit cells in key order until `f` returns `false`.
    /// Returns `false` if the visit was cut short.
    pub fn visit<F: FnMut(&Cell) -> bool>(&self, mut f: F) -> bool {
        self.iter().all(|cell| f(cell))
    }

    /// Like [`visit`](Self::visit) but lets `f` retag cells.
    pub fn visit_mut<F: FnMut(CellMut<'_>) -> bool>(&mut self, mut f: F) -> bool {
        let mut cur = self.head;
        while cur != NIL {
            let next = self.links[cur as usize];
            let cell = CellMut {
                cell: &mut self.slots[cur as usize],
            };
            if !f(cell) {
                return false;
            }
            cur = next;
        }
        true
    }

    /// Build a compacted store holding clones of the cells `keep` accepts.
    /// The new arena is sized like this one's.
    pub fn filter_keep<F: FnMut(&Cell) -> bool>(&self, mut keep: F) -> CellStore {
        let mut out = CellStore::with_capacity(self.capacity().max(self.len));
        for cell in self.iter().filter(|c| keep(c)) {
            // Source order is ascending, so every insert is a tail append.
            out.insert_key(cell.key, cell.x, cell.y, cell.tag);
        }
        out
    }

    /// Drop every cell, keeping the arena allocation for reuse.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.links.clear();
        self.free_list.clear();
        self.head = NIL;
        self.tail = NIL;
        self.midpoint = NIL;
        self.len = 0;
    }

    pub fn iter(&self) -> Cells<'_> {
        Cells {
            slots: &self.slots,
            links: &self.links,
            cur: self.head,
        }
    }
}

/// Key-ordered iterator over a [`CellStore`].
pub struct Cells<'a> {
    slots: &'a [Cell],
    links: &'a [u32],
    cur: u32,
}

impl<'a> Iterator for Cells<'a> {
    type Item = &'a Cell;

    #[inline]
    fn next(&mut self) -> Option<&'a Cell> {
        if self.cur == NIL {
            return None;
        }
        let i = self.cur as usize;
        self.cur = self.links[i];
        Some(&self.slots[i])
    }
}

impl<'a> IntoIterator for &'a CellStore {
    type Item = &'a Cell;
    type IntoIter = Cells<'a>;

    fn into_iter(self) -> Cells<'a> {
        self.iter()
    }
}

/// `x,y x,y ...` in key order, or `None` when empty.
impl fmt::Display for CellStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("None");
        }
        for (i, cell) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{},{}", cell.x, cell.y)?;
        }
        Ok(())
    }
}
