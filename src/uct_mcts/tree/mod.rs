// Copyright 2019 Karl Sundequist Blomdahl <karl.sundequist.blomdahl@gmail.com>
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The shared search tree: a fixed-capacity table of nodes addressed by
//! position hash, with per-node atomic statistics so that many worker
//! threads can read and back-propagate through the same node without
//! taking a lock.
//!
//! Structural mutation -- allocating a node into a free slot, or freeing
//! every slot unreachable from a new root -- only ever happens while the
//! caller holds an [`ExpandGuard`]. Everything else (selecting the best
//! child, applying virtual loss, back-propagating a result) works through
//! plain atomics and never touches the guard.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU16, AtomicU32, Ordering};
use std::sync::Mutex;

use go_board::{Color, Move};

/// Fixed-point scale applied to floating point results before they are
/// folded into an atomic `win_sum`. `win_sum as f32 / WIN_SCALE` recovers
/// the accumulated value.
const WIN_SCALE: f32 = 1_000_000.0;

fn to_fixed(value: f32) -> u32 {
    (value.clamp(0.0, 1.0) * WIN_SCALE) as u32
}

fn from_fixed(value: u32) -> f32 {
    value as f32 / WIN_SCALE
}

/// A proof that the caller is holding the tree's single expand mutex.
/// [`NodePool::allocate_empty`] and [`NodePool::clear_non_reachable`] take
/// this token instead of locking internally, so the locking discipline is
/// visible in the type signature rather than merely documented.
pub struct ExpandGuard<'a>(#[allow(dead_code)] std::sync::MutexGuard<'a, ()>);

/// One candidate move out of a node, with its own visit/win statistics and
/// a pointer to the child node once it has been expanded.
pub struct Child {
    pub mv: Move,
    move_count: AtomicU32,
    win_sum: AtomicU32,
    /// `-1` until expanded, otherwise the slot index of the child node.
    /// Written with `Release` ordering exactly once, after the child's
    /// node has been fully initialized, so an `Acquire` load here
    /// happens-before any read of that node's fields.
    expanded_child_index: AtomicI32,
    pub prior_score: f32,
    in_widening_set: AtomicBool,
    is_forced_open: AtomicBool,
    pub is_laddered: bool
}

impl Child {
    fn new(mv: Move, prior_score: f32, is_laddered: bool) -> Self {
        Self {
            mv,
            move_count: AtomicU32::new(0),
            win_sum: AtomicU32::new(0),
            expanded_child_index: AtomicI32::new(-1),
            prior_score,
            in_widening_set: AtomicBool::new(false),
            is_forced_open: AtomicBool::new(false),
            is_laddered
        }
    }

    pub fn move_count(&self) -> u32 {
        self.move_count.load(Ordering::Relaxed)
    }

    pub fn win_rate(&self) -> f32 {
        let count = self.move_count();

        if count == 0 {
            0.5
        } else {
            from_fixed(self.win_sum.load(Ordering::Relaxed)) / count as f32
        }
    }

    pub fn expanded_slot(&self) -> Option<usize> {
        let index = self.expanded_child_index.load(Ordering::Acquire);

        if index < 0 { None } else { Some(index as usize) }
    }

    pub(crate) fn set_expanded_slot(&self, slot: usize) {
        self.expanded_child_index.store(slot as i32, Ordering::Release);
    }

    pub fn is_in_widening_set(&self) -> bool {
        self.in_widening_set.load(Ordering::Relaxed)
    }

    pub fn admit_to_widening_set(&self) {
        self.in_widening_set.store(true, Ordering::Relaxed);
    }

    pub fn is_forced_open(&self) -> bool {
        self.is_forced_open.load(Ordering::Relaxed)
    }

    pub fn force_open(&self) {
        self.is_forced_open.store(true, Ordering::Relaxed);
    }

    /// Applies virtual loss: a phantom visit with a phantom loss, so that
    /// other threads descending concurrently see this child as less
    /// attractive until the real result is back-propagated.
    pub fn add_virtual_loss(&self) {
        self.move_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Undoes a virtual loss and folds in the real outcome, as a single
    /// call made once the rollout/evaluation has returned. `value` is the
    /// result from the point of view of the player to move at this child.
    pub fn update(&self, value: f32) {
        self.win_sum.fetch_add(to_fixed(value), Ordering::Relaxed);
    }
}

/// A point's per-node ownership tally, used to derive ownership and
/// criticality statistics once enough playouts have passed through.
pub struct PointStat {
    owner_count: [AtomicU32; 3],
    seki: AtomicBool
}

impl PointStat {
    fn new() -> Self {
        Self {
            owner_count: [AtomicU32::new(0), AtomicU32::new(0), AtomicU32::new(0)],
            seki: AtomicBool::new(false)
        }
    }

    /// `owner` is `0` (black), `1` (white), or `2` (neither / dame).
    pub fn record(&self, owner: usize) {
        self.owner_count[owner].fetch_add(1, Ordering::Relaxed);
    }

    pub fn counts(&self) -> (u32, u32, u32) {
        (
            self.owner_count[0].load(Ordering::Relaxed),
            self.owner_count[1].load(Ordering::Relaxed),
            self.owner_count[2].load(Ordering::Relaxed)
        )
    }

    /// Ownership in `[-1, 1]` from black's perspective, ignoring the dame
    /// count so that contested points pull the figure toward zero without
    /// needing a separate normalization pass.
    pub fn ownership(&self) -> f32 {
        let (black, white, _) = self.counts();
        let total = black + white;

        if total == 0 {
            0.0
        } else {
            (black as f32 - white as f32) / total as f32
        }
    }

    /// Criticality: peaks at `1.0` when ownership is maximally contested
    /// (`ownership() == 0`) and falls to `0.0` at either extreme.
    pub fn criticality(&self) -> f32 {
        let owner = (self.ownership() + 1.0) / 2.0;

        4.0 * owner * (1.0 - owner)
    }

    pub fn mark_seki(&self) {
        self.seki.store(true, Ordering::Relaxed);
    }

    pub fn is_seki(&self) -> bool {
        self.seki.load(Ordering::Relaxed)
    }
}

/// One position in the search tree. Reachable only through a [`NodePool`]
/// slot index; the node never moves once created, so indices remain valid
/// for the lifetime of a `generate_move` call.
pub struct Node {
    hash: u64,
    color: Color,
    ply: u16,
    live: bool,
    move_count: AtomicU32,
    win_sum: AtomicU32,
    width: AtomicU16,
    pub children: Vec<Child>,
    pub points: Vec<PointStat>,
    /// The per-node mutex guarding the compound "pick best child, then add
    /// virtual loss to it" operation described in the concurrency model.
    /// It does not guard the atomics themselves -- those remain safe to
    /// read and write without it.
    select_mutex: Mutex<()>
}

impl Node {
    fn empty() -> Self {
        Self {
            hash: 0,
            color: Color::Black,
            ply: 0,
            live: false,
            move_count: AtomicU32::new(0),
            win_sum: AtomicU32::new(0),
            width: AtomicU16::new(0),
            children: Vec::new(),
            points: Vec::new(),
            select_mutex: Mutex::new(())
        }
    }

    fn init(&mut self, hash: u64, color: Color, ply: u16, candidates: Vec<(Move, f32, bool)>, num_points: usize) {
        self.hash = hash;
        self.color = color;
        self.ply = ply;
        self.live = true;
        self.move_count = AtomicU32::new(0);
        self.win_sum = AtomicU32::new(0);
        self.width = AtomicU16::new(0);
        self.children = candidates.into_iter()
            .map(|(mv, prior, laddered)| Child::new(mv, prior, laddered))
            .collect();
        self.points = (0..num_points).map(|_| PointStat::new()).collect();
    }

    pub fn hash(&self) -> u64 { self.hash }
    pub fn color(&self) -> Color { self.color }
    pub fn ply(&self) -> u16 { self.ply }
    pub fn is_live(&self) -> bool { self.live }

    pub fn move_count(&self) -> u32 {
        self.move_count.load(Ordering::Relaxed)
    }

    pub fn win_rate(&self) -> f32 {
        let count = self.move_count();

        if count == 0 {
            0.5
        } else {
            from_fixed(self.win_sum.load(Ordering::Relaxed)) / count as f32
        }
    }

    pub fn width(&self) -> u16 {
        self.width.load(Ordering::Relaxed)
    }

    pub fn set_width(&self, width: u16) {
        self.width.store(width, Ordering::Relaxed);
    }

    pub fn add_virtual_loss(&self) {
        self.move_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update(&self, value: f32) {
        self.win_sum.fetch_add(to_fixed(value), Ordering::Relaxed);
    }

    /// Locks the selection mutex for the duration of `f`, which should pick
    /// a child and apply virtual loss to it and to `self` before returning.
    pub fn with_select_lock<T>(&self, f: impl FnOnce() -> T) -> T {
        let _guard = self.select_mutex.lock().expect("node select mutex poisoned");

        f()
    }
}

/// The fixed-capacity node table, addressed by position hash via open
/// addressing with linear probing. Doubles as the transposition directory:
/// there is no separate hash-to-slot structure, `find`/`allocate_empty`
/// probe this table directly.
pub struct NodePool {
    slots: Vec<UnsafeCell<Node>>,
    expand_mutex: Mutex<()>
}

// Safety: every slot is only ever mutated in place (full re-`init`, or
// `live` flipped to `false`) while the caller holds `expand_mutex` via an
// `ExpandGuard`, and `clear_non_reachable` only frees slots already proven
// unreachable from the new root, so no live reference can observe a torn
// write. All other access goes through the node's own atomics.
unsafe impl Sync for NodePool {}

impl NodePool {
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| UnsafeCell::new(Node::empty())).collect();

        Self { slots, expand_mutex: Mutex::new(()) }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn lock_expand(&self) -> ExpandGuard<'_> {
        ExpandGuard(self.expand_mutex.lock().expect("expand mutex poisoned"))
    }

    /// Borrows the node at `slot`. Callers must only pass slots they
    /// obtained from `find`, `allocate_empty`, or a child's
    /// `expanded_slot()` -- i.e. slots known to be live.
    pub fn node(&self, slot: usize) -> &Node {
        unsafe { &*self.slots[slot].get() }
    }

    fn probe(&self, hash: u64) -> impl Iterator<Item = usize> + '_ {
        let capacity = self.slots.len();
        let start = (hash as usize) % capacity;

        (0..capacity).map(move |i| (start + i) % capacity)
    }

    /// Looks for a live node matching `(hash, color, ply)`. Lock-free: slot
    /// occupancy only changes under the expand guard, and publishes via
    /// `live` with the same acquire/release discipline as `expanded_slot`.
    pub fn find(&self, hash: u64, color: Color, ply: u16) -> Option<usize> {
        for slot in self.probe(hash) {
            let node = self.node(slot);

            if !node.is_live() {
                return None;
            }

            if node.hash() == hash && node.color() == color && node.ply() == ply {
                return Some(slot);
            }
        }

        None
    }

    /// Claims the first free slot on `hash`'s probe sequence and
    /// initializes it with `candidates`. Returns `None` if the table is
    /// full. Must be called while holding `guard`.
    pub fn allocate_empty(
        &self,
        _guard: &ExpandGuard<'_>,
        hash: u64,
        color: Color,
        ply: u16,
        candidates: Vec<(Move, f32, bool)>,
        num_points: usize
    ) -> Option<usize> {
        for slot in self.probe(hash) {
            let node = unsafe { &mut *self.slots[slot].get() };

            if !node.is_live() {
                node.init(hash, color, ply, candidates, num_points);

                return Some(slot);
            }
        }

        None
    }

    /// Frees every slot not reachable from `root` by following
    /// `expanded_slot()` pointers, so that `allocate_empty` can reuse them
    /// for the next search. Must be called while holding `guard`, and only
    /// when no worker thread is concurrently descending the tree.
    pub fn clear_non_reachable(&self, _guard: &ExpandGuard<'_>, root: Option<usize>) {
        let mut reachable = vec![false; self.slots.len()];
        let mut stack = Vec::new();

        if let Some(root) = root {
            stack.push(root);
        }

        while let Some(slot) = stack.pop() {
            if reachable[slot] {
                continue;
            }

            reachable[slot] = true;

            let node = self.node(slot);

            for child in &node.children {
                if let Some(child_slot) = child.expanded_slot() {
                    stack.push(child_slot);
                }
            }
        }

        for (slot, flag) in reachable.iter().enumerate() {
            if !flag {
                let node = unsafe { &mut *self.slots[slot].get() };

                node.live = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use go_board::Point;

    fn candidates() -> Vec<(Move, f32, bool)> {
        vec![(Move::Pass, 0.1, false), (Move::Place(Point::from_xy(0, 0, 9)), 0.9, false)]
    }

    #[test]
    fn allocate_then_find_round_trips() {
        let pool = NodePool::new(64);
        let guard = pool.lock_expand();
        let slot = pool.allocate_empty(&guard, 1234, Color::Black, 0, candidates(), 81).unwrap();

        assert_eq!(pool.find(1234, Color::Black, 0), Some(slot));
        assert_eq!(pool.node(slot).children.len(), 2);
    }

    #[test]
    fn expanding_a_child_is_visible_to_find_via_parent() {
        let pool = NodePool::new(64);
        let guard = pool.lock_expand();
        let root = pool.allocate_empty(&guard, 1, Color::Black, 0, candidates(), 81).unwrap();
        let child = pool.allocate_empty(&guard, 2, Color::White, 1, candidates(), 81).unwrap();

        pool.node(root).children[0].set_expanded_slot(child);

        assert_eq!(pool.node(root).children[0].expanded_slot(), Some(child));
    }

    #[test]
    fn clear_non_reachable_frees_unrelated_slots() {
        let pool = NodePool::new(64);
        let guard = pool.lock_expand();
        let root = pool.allocate_empty(&guard, 1, Color::Black, 0, candidates(), 81).unwrap();
        let orphan = pool.allocate_empty(&guard, 99, Color::Black, 5, candidates(), 81).unwrap();

        pool.clear_non_reachable(&guard, Some(root));

        assert!(pool.node(root).is_live());
        assert!(!pool.node(orphan).is_live());
    }

    #[test]
    fn virtual_loss_and_update_round_trip_through_atomics() {
        let pool = NodePool::new(8);
        let guard = pool.lock_expand();
        let slot = pool.allocate_empty(&guard, 1, Color::Black, 0, candidates(), 81).unwrap();
        let node = pool.node(slot);

        node.add_virtual_loss();
        node.update(1.0);

        assert_eq!(node.move_count(), 1);
        assert!((node.win_rate() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn criticality_is_zero_when_unanimous() {
        let stat = PointStat::new();

        for _ in 0..10 {
            stat.record(0);
        }

        assert_eq!(stat.criticality(), 0.0);
        assert!((stat.ownership() - 1.0).abs() < 1e-6);
    }
}
