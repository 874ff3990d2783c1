//! Memoized set, run and meld enumeration.
//!
//! Three tables, each keyed by something that fully determines its value:
//! run patterns by (suit rank mask, wild count), set patterns by (per-suit
//! counts of one rank, wild count), and melds by (whole hand, objective).
//! A cached answer is therefore always the answer the uncached functions in
//! [`crate::generation`] would give.

use crate::generation::{
    Melds, Pool, RunPattern, RunShape, SetPattern, SetShape, run_patterns, set_patterns,
};
use crate::{Hand, Meld, Objective, Run, Set, Suit, ranks};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Every card instance of a hand, as codes in card order. Two hands with
/// equal signatures are equal multisets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandSignature(Vec<u8>);

impl HandSignature {
    pub fn of(hand: &Hand) -> Self {
        HandSignature(hand.cards().map(u8::from).collect())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LutStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Default)]
struct Tables {
    sets: HashMap<SetShape, Arc<[SetPattern]>>,
    runs: HashMap<RunShape, Arc<[RunPattern]>>,
    melds: HashMap<(HandSignature, Objective), Arc<[Meld]>>,
}

impl Tables {
    fn entries(&self) -> usize {
        self.sets.len() + self.runs.len() + self.melds.len()
    }

    fn clear(&mut self) {
        self.sets.clear();
        self.runs.clear();
        self.melds.clear();
    }
}

fn collect_sets(hand: &Hand, mut patterns: impl FnMut(SetShape) -> Arc<[SetPattern]>) -> Vec<Set> {
    let mut sets = Vec::new();
    for rank in ranks() {
        let shape = SetShape::of(hand, rank);
        sets.extend(patterns(shape).iter().map(|p| p.materialize(rank)));
    }
    sets
}

fn collect_runs(hand: &Hand, mut patterns: impl FnMut(RunShape) -> Arc<[RunPattern]>) -> Vec<Run> {
    let mut runs = Vec::new();
    for suit in Suit::ALL {
        let shape = RunShape::of(hand, suit);
        runs.extend(patterns(shape).iter().map(|p| p.materialize(suit)));
    }
    runs
}

fn combine(hand: &Hand, objective: Objective, sets: Vec<Set>, runs: Vec<Run>) -> Arc<[Meld]> {
    let mut melds: Vec<Meld> = Melds::new(sets, runs, objective, Pool::of(hand)).collect();
    melds.sort_unstable();
    log::debug!("computed {} melds for {objective} from {hand}", melds.len());
    melds.into()
}

/// Melds served from a cached table, in canonical order.
#[derive(Debug, Clone)]
pub struct CachedMelds {
    melds: Arc<[Meld]>,
    cursor: usize,
}

impl CachedMelds {
    fn new(melds: Arc<[Meld]>) -> Self {
        CachedMelds { melds, cursor: 0 }
    }
}

impl Iterator for CachedMelds {
    type Item = Meld;

    fn next(&mut self) -> Option<Meld> {
        let meld = self.melds.get(self.cursor)?.clone();
        self.cursor += 1;
        Some(meld)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.melds.len() - self.cursor;
        (left, Some(left))
    }
}

impl ExactSizeIterator for CachedMelds {}

/// Single-owner cache. Pass one to [`lut_iter_melds`] for every hand of a
/// simulation and the shape tables fill up after a handful of deals.
#[derive(Default)]
pub struct Lut {
    tables: Tables,
    hits: u64,
    misses: u64,
}

impl Lut {
    pub fn new() -> Self {
        Self::default()
    }

    fn set_patterns(&mut self, shape: SetShape) -> Arc<[SetPattern]> {
        match self.tables.sets.get(&shape) {
            Some(patterns) => {
                self.hits += 1;
                patterns.clone()
            }
            None => {
                self.misses += 1;
                let patterns: Arc<[SetPattern]> = set_patterns(shape).into();
                self.tables.sets.insert(shape, patterns.clone());
                patterns
            }
        }
    }

    fn run_patterns(&mut self, shape: RunShape) -> Arc<[RunPattern]> {
        match self.tables.runs.get(&shape) {
            Some(patterns) => {
                self.hits += 1;
                patterns.clone()
            }
            None => {
                self.misses += 1;
                let patterns: Arc<[RunPattern]> = run_patterns(shape).into();
                self.tables.runs.insert(shape, patterns.clone());
                patterns
            }
        }
    }

    /// Same sets as [`crate::iter_sets`], in the same order.
    pub fn iter_sets(&mut self, hand: &Hand) -> std::vec::IntoIter<Set> {
        collect_sets(hand, |shape| self.set_patterns(shape)).into_iter()
    }

    /// Same runs as [`crate::iter_runs`], in the same order.
    pub fn iter_runs(&mut self, hand: &Hand) -> std::vec::IntoIter<Run> {
        collect_runs(hand, |shape| self.run_patterns(shape)).into_iter()
    }

    /// Same melds as [`crate::iter_melds`], sorted canonically.
    pub fn iter_melds(&mut self, hand: &Hand, objective: Objective) -> CachedMelds {
        let key = (HandSignature::of(hand), objective);
        if let Some(melds) = self.tables.melds.get(&key) {
            self.hits += 1;
            return CachedMelds::new(melds.clone());
        }
        self.misses += 1;
        let sets = match objective.sets() {
            0 => Vec::new(),
            _ => collect_sets(hand, |shape| self.set_patterns(shape)),
        };
        let runs = match objective.runs() {
            0 => Vec::new(),
            _ => collect_runs(hand, |shape| self.run_patterns(shape)),
        };
        let melds = combine(hand, objective, sets, runs);
        self.tables.melds.insert(key, melds.clone());
        CachedMelds::new(melds)
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn stats(&self) -> LutStats {
        LutStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.tables.entries(),
        }
    }
}

/// Melds for `hand` under `objective`, served from `cache` when possible.
pub fn lut_iter_melds(cache: &mut Lut, hand: &Hand, objective: Objective) -> CachedMelds {
    cache.iter_melds(hand, objective)
}

/// A [`Lut`] that can be shared between threads.
///
/// Lookups hold the read lock only. Misses are computed with no lock held
/// and inserted afterwards; when two threads race on the same key the first
/// insert wins and both answers are equal anyway.
#[derive(Default)]
pub struct SharedLut {
    tables: RwLock<Tables>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SharedLut {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, hit: bool) {
        let counter = if hit { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn set_patterns(&self, shape: SetShape) -> Arc<[SetPattern]> {
        let cached = self.tables.read().sets.get(&shape).cloned();
        self.record(cached.is_some());
        if let Some(patterns) = cached {
            return patterns;
        }
        let patterns: Arc<[SetPattern]> = set_patterns(shape).into();
        self.tables.write().sets.entry(shape).or_insert(patterns).clone()
    }

    fn run_patterns(&self, shape: RunShape) -> Arc<[RunPattern]> {
        let cached = self.tables.read().runs.get(&shape).cloned();
        self.record(cached.is_some());
        if let Some(patterns) = cached {
            return patterns;
        }
        let patterns: Arc<[RunPattern]> = run_patterns(shape).into();
        self.tables.write().runs.entry(shape).or_insert(patterns).clone()
    }

    pub fn iter_melds(&self, hand: &Hand, objective: Objective) -> CachedMelds {
        let key = (HandSignature::of(hand), objective);
        let cached = self.tables.read().melds.get(&key).cloned();
        self.record(cached.is_some());
        if let Some(melds) = cached {
            return CachedMelds::new(melds);
        }
        let sets = match objective.sets() {
            0 => Vec::new(),
            _ => collect_sets(hand, |shape| self.set_patterns(shape)),
        };
        let runs = match objective.runs() {
            0 => Vec::new(),
            _ => collect_runs(hand, |shape| self.run_patterns(shape)),
        };
        let melds = combine(hand, objective, sets, runs);
        let melds = self.tables.write().melds.entry(key).or_insert(melds).clone();
        CachedMelds::new(melds)
    }

    pub fn clear(&self) {
        self.tables.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn stats(&self) -> LutStats {
        LutStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.tables.read().entries(),
        }
    }
}
