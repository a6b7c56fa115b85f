// imports
use crate::error::{Error, Result};
use crate::symbols::{SymbolId, SymbolTable};

use std::collections::HashMap;
use std::io::BufRead;
use std::sync::OnceLock;
use log::{debug, info, warn};
use ndarray::Array1;
use ndarray_stats::EntropyExt;

/// Tokens longer than this (in characters) make the whole triple invalid.
pub const MAX_TOKEN_LEN: usize = 50;

/// Aggregated distribution of one entity over its partners.
#[derive(Debug, Default)]
pub struct Profile {
    pub sum: f64,
    pub sum_square: f64,
    partners: HashMap<SymbolId, f64>,
    entropy: OnceLock<f64>,
}

impl Profile {

    /// Adds `weight` to the partner's cell and to both running totals.
    /// Returns true when the partner was already present, the weights are
    /// then summed.
    pub fn add(&mut self, partner: SymbolId, weight: f64) -> bool {
        self.sum += weight;
        self.sum_square += weight * weight;
        let mut repeated = true;
        let cell = self.partners.entry(partner).or_insert_with(|| {
            repeated = false;
            0.0
        });
        *cell += weight;
        repeated
    }

    pub fn weight(&self, partner: SymbolId) -> Option<f64> {
        self.partners.get(&partner).copied()
    }

    pub fn partners(&self) -> impl Iterator<Item = (SymbolId, f64)> + '_ {
        self.partners.iter().map(|(p, w)| (*p, *w))
    }

    pub fn len(&self) -> usize {
        self.partners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partners.is_empty()
    }

    /// Shannon entropy (natural log) of the partner distribution, computed
    /// on first use and cached. Safe to call from several workers once the
    /// index is frozen.
    pub fn entropy(&self) -> f64 {
        *self.entropy.get_or_init(|| {
            let total = self.sum;
            let probs: Array1<f64> = self.partners.values().map(|w| w / total).collect();
            // a single partner yields -0.0
            probs.entropy().map(|h| h + 0.0).unwrap_or(0.0)
        })
    }
}


/// Entity id -> profile. Mutable while ingesting, shared read-only after.
#[derive(Debug, Default)]
pub struct ProfileIndex {
    profiles: HashMap<SymbolId, Profile>,
}

impl ProfileIndex {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate(&mut self, entity: SymbolId, partner: SymbolId, weight: f64) -> bool {
        self.profiles.entry(entity).or_default().add(partner, weight)
    }

    pub fn get(&self, entity: SymbolId) -> Option<&Profile> {
        self.profiles.get(&entity)
    }

    /// Lookup that must succeed: a miss means the intermediate data is broken.
    pub fn profile(&self, entity: SymbolId, role: &'static str) -> Result<&Profile> {
        self.profiles.get(&entity).ok_or(Error::MissingProfile { role, id: entity })
    }

    /// Entity ids in ascending order, the unit list for the workers.
    pub fn ids(&self) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = self.profiles.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}


#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: usize,
    pub accepted: usize,
    pub malformed: usize,
    pub too_long: usize,
    pub repeated: usize,
}

/// Everything built from one triples file: a shared symbol table, the
/// target-keyed and context-keyed indices and the grand total N.
#[derive(Debug, Default)]
pub struct ProfileTables {
    pub symbols: SymbolTable,
    pub targets: ProfileIndex,
    pub contexts: ProfileIndex,
    pub total: f64,
    pub stats: IngestStats,
}

impl ProfileTables {

    pub fn new() -> Self {
        Self::default()
    }

    fn parse_line(line: &str) -> Option<(&str, &str, f64)> {
        let mut fields = line.trim_end_matches(['\n', '\r']).split('\t');
        let target = fields.next()?;
        let context = fields.next()?;
        let count = fields.next()?.trim().parse::<f64>().ok().filter(|c| c.is_finite())?;
        if fields.next().is_some() || target.is_empty() || context.is_empty() {
            return None;
        }
        Some((target, context, count))
    }

    /// Records one triple in both indices.
    pub fn insert(&mut self, target: &str, context: &str, count: f64) {
        let id_t = self.symbols.intern(target);
        let id_c = self.symbols.intern(context);
        if self.targets.accumulate(id_t, id_c, count) {
            warn!("repeated entry {}-{}, weights summed", target, context);
            self.stats.repeated += 1;
        }
        self.contexts.accumulate(id_c, id_t, count);
        self.total += count;
        self.stats.accepted += 1;
    }

    fn accumulate(&mut self, line: &str, max_token_len: usize) {
        self.stats.lines += 1;
        if line.trim().is_empty() {
            return;
        }
        let (target, context, count) = match Self::parse_line(line) {
            Some(triple) => triple,
            None => {
                warn!("format problem at line {}, ignored", self.stats.lines);
                self.stats.malformed += 1;
                return;
            }
        };

        let (t_len, c_len) = (target.chars().count(), context.chars().count());
        if t_len > max_token_len || c_len > max_token_len {
            warn!("ignore (\"{}\",\"{}\"), word length ({},{}) => max is {}",
                target, context, t_len, c_len, max_token_len);
            self.stats.too_long += 1;
            return;
        }

        self.insert(target, context, count);
    }

    /// Single sequential pass over a triples stream.
    pub fn load<R: BufRead>(reader: R, max_token_len: usize) -> Result<ProfileTables> {
        let mut tables = ProfileTables::new();
        for line in reader.lines() {
            tables.accumulate(&line?, max_token_len);
        }
        info!("read {} triples: {} targets, {} contexts, {} symbols, N = {}",
            tables.stats.accepted, tables.targets.len(), tables.contexts.len(), tables.symbols.len(), tables.total);
        debug!("ingest statistics {:?}", tables.stats);
        Ok(tables)
    }

    pub fn name(&self, id: SymbolId) -> Result<&str> {
        self.symbols.name(id).ok_or(Error::MissingSymbol(id))
    }
}
