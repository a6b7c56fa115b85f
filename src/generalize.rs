// imports
use crate::config::GeneralizeParams;
use crate::error::{Error, Result};
use crate::files::{self, Sink};
use crate::filter::Filter;
use crate::profiles::Profile;
use crate::symbols::SymbolId;
use crate::tabular::{column_index, LoadedProfiles, Record};
use crate::work;

use std::fmt::Write as _;
use std::io::{BufRead, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use log::{info, warn};

/// Keep condition on the chosen score column. Only one kind per run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreGate {
    /// similarity score >= threshold
    AtLeast(f64),
    /// distance score <= threshold
    AtMost(f64),
}

impl ScoreGate {
    pub fn passes(&self, score: f64) -> bool {
        match *self {
            ScoreGate::AtLeast(threshold) => score >= threshold,
            ScoreGate::AtMost(threshold) => score <= threshold,
        }
    }
}

/// Contexts of `donor` that `receiver` never saw, with the donor's weight
/// scaled by `sum(receiver) / sum(donor)`. Empty unless the donor has the
/// larger mass; the direction is never reversed.
pub fn unseen_contexts(donor: &Profile, receiver: &Profile) -> Vec<(SymbolId, f64)> {
    if donor.sum <= receiver.sum {
        return Vec::new();
    }
    let norm = receiver.sum / donor.sum;
    donor.partners()
        .filter(|(context, _)| receiver.weight(*context).is_none())
        .map(|(context, weight)| (context, weight * norm))
        .collect()
}


/// The generalization stage over frozen profiles.
pub struct Generalize<'a> {
    profiles: &'a LoadedProfiles,
    targets: &'a Filter,
    neighbors: &'a Filter,
    contexts: &'a Filter,
    gate: ScoreGate,
    score_column: usize,
    malformed: AtomicUsize,
}

impl<'a> Generalize<'a> {

    pub fn new(profiles: &'a LoadedProfiles,
        targets: &'a Filter,
        neighbors: &'a Filter,
        contexts: &'a Filter,
        gate: ScoreGate,
        score_column: usize) -> Self {
        Self { profiles, targets, neighbors, contexts, gate, score_column, malformed: AtomicUsize::new(0) }
    }

    fn should_generalize(&self, pair: &Record) -> bool {
        self.targets.keeps(pair.target) && self.neighbors.keeps(pair.context) && self.gate.passes(pair.score)
    }

    /// Synthetic triples for one similarity row (target, neighbor, score).
    pub fn rows_for(&self, line: &str) -> Result<String> {
        let mut rows = String::new();
        if line.trim().is_empty() {
            return Ok(rows);
        }
        // in a similarity row the "context" columns hold the neighbor
        let pair = match Record::parse(line, self.score_column) {
            Some(pair) => pair,
            None => {
                warn!("format problem in similarity line \"{}\", ignored", line);
                self.malformed.fetch_add(1, Ordering::Relaxed);
                return Ok(rows);
            }
        };
        if !self.should_generalize(&pair) {
            return Ok(rows);
        }

        let index = &self.profiles.index;
        let donor = index.profile(pair.id_target, "target")?;
        let receiver = index.profile(pair.id_context, "neighbor")?;
        for (context, weight) in unseen_contexts(donor, receiver) {
            let name = self.profiles.context_name(context)?;
            if self.contexts.keeps(name) {
                let _ = writeln!(rows, "{}\t{}\t{:.6}", pair.context, name, weight);
            }
        }
        Ok(rows)
    }

    pub fn malformed(&self) -> usize {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Fans the similarity rows out to the workers, one line per claim.
    pub fn write_all<R, W>(&self, lines: R, threads: usize, sink: &Sink<W>) -> Result<usize>
    where
        R: Iterator<Item = std::io::Result<String>> + Send,
        W: Write + Send,
    {
        work::distribute("pairs", lines, None, threads, |line| {
            let rows = self.rows_for(&line?)?;
            sink.emit(&rows)
        })
    }

    /// The generalization stage: similarity and profile files in, synthetic
    /// (and optionally original) triples out.
    pub fn run<W: Write + Send>(params: &GeneralizeParams, out: W) -> Result<W> {
        let targets = Filter::load(params.targets_file.as_deref())?;
        let neighbors = Filter::load(params.neighbors_file.as_deref())?;
        let contexts = Filter::load(params.contexts_file.as_deref())?;
        let sink = Sink::new(out);

        info!("reading input profiles into index...");
        let reader = files::open_lines(&params.profiles_file)?;
        let profiles = LoadedProfiles::load(reader, "f_tc", &params.profiles_file, |r| {
            if params.include_originals {
                sink.emit(&format!("{}\t{}\t{:.6}\n", r.target, r.context, r.score))?;
            }
            Ok(true)
        })?;

        info!("generalizing...");
        let mut lines = files::open_lines(&params.similarity_file)?.lines();
        let header = match lines.next() {
            Some(header) => header?,
            None => return Err(Error::EmptyFile(params.similarity_file.clone())),
        };
        let score_column = column_index(&header, &params.score, &params.similarity_file)?;

        let stage = Generalize::new(&profiles, &targets, &neighbors, &contexts, params.gate, score_column);
        let processed = stage.write_all(lines, params.threads, &sink)?;
        if stage.malformed() > 0 {
            warn!("{} malformed similarity lines skipped", stage.malformed());
        }
        info!("finished, {} pairs read", processed);
        sink.finish()
    }
}
