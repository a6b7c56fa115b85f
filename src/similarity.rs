// imports
use crate::config::SimilarityParams;
use crate::error::{Error, Result};
use crate::files::{self, Sink};
use crate::filter::Filter;
use crate::profiles::Profile;
use crate::symbols::SymbolId;
use crate::tabular::LoadedProfiles;
use crate::work;

use std::fmt::{self, Display, Write as _};
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Weight of the second distribution in the skew divergence smoothing.
pub const ALPHA: f64 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeasureKind {
    Similarity,
    Distance,
    Random,
}

/// The measures in the canonical column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measure {
    Cosine,
    WJaccard,
    Lin,
    L1,
    L2,
    Jsd,
    Random,
    Askew,
}

impl Measure {

    pub const ALL: [Measure; 8] = [
        Measure::Cosine, Measure::WJaccard, Measure::Lin, Measure::L1,
        Measure::L2, Measure::Jsd, Measure::Random, Measure::Askew,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Measure::Cosine => "cosine",
            Measure::WJaccard => "wjaccard",
            Measure::Lin => "lin",
            Measure::L1 => "l1",
            Measure::L2 => "l2",
            Measure::Jsd => "jsd",
            Measure::Random => "random",
            Measure::Askew => "askew",
        }
    }

    pub fn kind(&self) -> MeasureKind {
        match self {
            Measure::Cosine | Measure::WJaccard | Measure::Lin => MeasureKind::Similarity,
            Measure::L1 | Measure::L2 | Measure::Jsd | Measure::Askew => MeasureKind::Distance,
            Measure::Random => MeasureKind::Random,
        }
    }
}

impl FromStr for Measure {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Measure::ALL.iter()
            .find(|m| m.name() == s)
            .copied()
            .ok_or_else(|| Error::config(format!("invalid similarity score: {}", s)))
    }
}


/// Selected measures, always kept in canonical order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureSet {
    selected: Vec<Measure>,
}

impl MeasureSet {

    pub fn all() -> Self {
        Self { selected: Measure::ALL.to_vec() }
    }

    /// Colon-separated list of names. Unknown names are warned and ignored,
    /// a list without any valid name is rejected.
    pub fn parse(list: &str) -> Result<Self> {
        let mut wanted = Vec::new();
        for name in list.split(':').filter(|n| !n.is_empty()) {
            match name.parse::<Measure>() {
                Ok(measure) => {
                    info!("will calculate score: {}", name);
                    wanted.push(measure);
                }
                Err(_) => warn!("invalid similarity score: {}, ignored", name),
            }
        }
        if wanted.is_empty() {
            return Err(Error::config(format!("no valid score name in \"{}\"", list)));
        }
        let selected = Measure::ALL.iter().copied().filter(|m| wanted.contains(m)).collect();
        Ok(Self { selected })
    }

    pub fn iter(&self) -> impl Iterator<Item = Measure> + '_ {
        self.selected.iter().copied()
    }

    pub fn needs_distances(&self) -> bool {
        self.iter().any(|m| m.kind() == MeasureKind::Distance)
    }

    pub fn header(&self) -> String {
        let mut header = String::from("target\tid_target\tneighbor\tid_neighbor");
        for m in self.iter() {
            header.push('\t');
            header.push_str(m.name());
        }
        header
    }
}

impl Display for MeasureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|m| m.name()).collect();
        write!(f, "{}", names.join(":"))
    }
}


/// Which of the two rows printed for a computed pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// (first, second): skew of the first profile against the second.
    Forward,
    /// (second, first)
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SimilarityScores {
    pub cosine: f64,
    pub wjaccard: f64,
    pub lin: f64,
    pub l1: f64,
    pub l2: f64,
    pub jsd: f64,
    pub random: f64,
    pub askew1: f64,
    pub askew2: f64,
}

impl SimilarityScores {

    pub fn value(&self, measure: Measure, direction: Direction) -> f64 {
        match measure {
            Measure::Cosine => self.cosine,
            Measure::WJaccard => self.wjaccard,
            Measure::Lin => self.lin,
            Measure::L1 => self.l1,
            Measure::L2 => self.l2,
            Measure::Jsd => self.jsd,
            Measure::Random => self.random,
            Measure::Askew => match direction {
                Direction::Forward => self.askew1,
                Direction::Backward => self.askew2,
            },
        }
    }
}


/// Alpha-skew smoothing `a * ln(a / (alpha*b + (1-alpha)*a))`, zero for a = 0.
///
/// Inputs above 1 are not probabilities; the first such input is warned
/// about once per instance, the value is computed anyway.
#[derive(Debug)]
pub struct SkewSmoothing {
    alpha: f64,
    warned: AtomicBool,
}

impl SkewSmoothing {

    pub fn new(alpha: f64) -> Self {
        Self { alpha, warned: AtomicBool::new(false) }
    }

    pub fn askew(&self, a: f64, b: f64) -> f64 {
        if a == 0.0 {
            return 0.0;
        }
        if (a > 1.0 || b > 1.0) && !self.warned.swap(true, Ordering::Relaxed) {
            warn!("relative entropy requires probabilities, got {} and {}", a, b);
        }
        a * (a / (self.alpha * b + (1.0 - self.alpha) * a)).ln()
    }

    #[cfg(test)]
    pub fn warned(&self) -> bool {
        self.warned.load(Ordering::Relaxed)
    }
}

impl Default for SkewSmoothing {
    fn default() -> Self {
        SkewSmoothing::new(ALPHA)
    }
}


/// Pairwise profile comparison over the union of both supports.
#[derive(Debug, Default)]
pub struct Comparator {
    skew: SkewSmoothing,
}

impl Comparator {

    pub fn new(alpha: f64) -> Self {
        Self { skew: SkewSmoothing::new(alpha) }
    }

    /// Computes every measure between `p1` and `p2`. With `distances` false
    /// the distance fields stay zero. `random` is carried into the result.
    pub fn compare(&self, p1: &Profile, p2: &Profile, distances: bool, random: f64) -> SimilarityScores {
        let mut r = SimilarityScores { random, ..Default::default() };
        let mut sumsum = 0.0;

        for (context, v1) in p1.partners() {
            match p2.weight(context) {
                Some(v2) => {
                    sumsum += v1 + v2;
                    r.cosine += v1 * v2;
                    if distances {
                        let absdiff = (v1 - v2).abs();
                        r.l1 += absdiff;
                        r.l2 += absdiff * absdiff;
                        r.askew1 += self.skew.askew(v1, v2);
                        r.askew2 += self.skew.askew(v2, v1);
                        let avg = (v1 + v2) / 2.0;
                        r.jsd += self.skew.askew(v1, avg) + self.skew.askew(v2, avg);
                    }
                }
                None if distances => {
                    r.askew1 += self.skew.askew(v1, 0.0);
                    r.jsd += self.skew.askew(v1, v1 / 2.0);
                    r.l1 += v1;
                    r.l2 += v1 * v1;
                }
                None => {}
            }
        }

        // contexts only p2 has, needed by the distances only
        if distances {
            for (context, v2) in p2.partners() {
                if p1.weight(context).is_none() {
                    r.askew2 += self.skew.askew(v2, 0.0);
                    r.jsd += self.skew.askew(v2, v2 / 2.0);
                    r.l1 += v2;
                    r.l2 += v2 * v2;
                }
            }
            r.l2 = r.l2.sqrt();
        }

        r.cosine /= p1.sum_square.sqrt() * p2.sum_square.sqrt();
        r.lin = sumsum / (p1.sum + p2.sum);
        r.wjaccard = (sumsum / 2.0) / (p1.sum + p2.sum - sumsum / 2.0);
        r
    }
}


/// Row filter: similarities must reach `similarity`, distances must not
/// exceed `distance`. Absent thresholds filter nothing.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Thresholds {
    pub similarity: Option<f64>,
    pub distance: Option<f64>,
}

impl Thresholds {

    pub fn keeps(&self, scores: &SimilarityScores, measures: &MeasureSet, direction: Direction) -> bool {
        measures.iter().all(|m| {
            let value = scores.value(m, direction);
            match (m.kind(), self.similarity, self.distance) {
                (MeasureKind::Similarity, Some(t), _) => value >= t,
                (MeasureKind::Distance, _, Some(t)) => value <= t,
                _ => true,
            }
        })
    }
}


/// The similarity stage over a frozen set of loaded profiles.
pub struct Similarity<'a> {
    profiles: &'a LoadedProfiles,
    measures: &'a MeasureSet,
    thresholds: Thresholds,
    targets: &'a Filter,
    neighbors: &'a Filter,
    comparator: Comparator,
    seed: Option<u64>,
}

impl<'a> Similarity<'a> {

    pub fn new(profiles: &'a LoadedProfiles,
        measures: &'a MeasureSet,
        thresholds: Thresholds,
        targets: &'a Filter,
        neighbors: &'a Filter,
        seed: Option<u64>) -> Self {
        Self { profiles, measures, thresholds, targets, neighbors, comparator: Comparator::new(ALPHA), seed }
    }

    fn write_row(&self, out: &mut String, scores: &SimilarityScores, direction: Direction,
        (t, id_t): (&str, SymbolId), (n, id_n): (&str, SymbolId)) {
        if !self.thresholds.keeps(scores, self.measures, direction) {
            return;
        }
        let _ = write!(out, "{}\t{}\t{}\t{}", t, id_t, n, id_n);
        for m in self.measures.iter() {
            let _ = write!(out, "\t{:.10}", scores.value(m, direction));
        }
        out.push('\n');
    }

    /// Rows for `id1` against every lower id in `ids`, both directions.
    pub fn rows_for(&self, id1: SymbolId, ids: &[SymbolId]) -> Result<String> {
        let index = &self.profiles.index;
        let p1 = index.profile(id1, "target")?;
        let name1 = self.profiles.target_name(id1)?;
        let distances = self.measures.needs_distances();
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(id1 as u64)),
            None => StdRng::from_entropy(),
        };

        let mut rows = String::new();
        for &id2 in ids.iter().take_while(|id2| **id2 < id1) {
            let name2 = self.profiles.target_name(id2)?;
            let forward = self.targets.keeps(name1) && self.neighbors.keeps(name2);
            let backward = self.targets.keeps(name2) && self.neighbors.keeps(name1);
            if !forward && !backward {
                continue;
            }
            let p2 = index.profile(id2, "target")?;
            let scores = self.comparator.compare(p1, p2, distances, rng.gen::<f64>());
            if forward {
                self.write_row(&mut rows, &scores, Direction::Forward, (name1, id1), (name2, id2));
            }
            if backward {
                self.write_row(&mut rows, &scores, Direction::Backward, (name2, id2), (name1, id1));
            }
        }
        Ok(rows)
    }

    pub fn write_all<W: Write + Send>(&self, threads: usize, sink: &Sink<W>) -> Result<usize> {
        sink.emit(&(self.measures.header() + "\n"))?;
        let ids = self.profiles.index.ids();
        work::distribute("targets", ids.iter().copied(), Some(ids.len()), threads, |id1| {
            let rows = self.rows_for(id1, &ids)?;
            sink.emit(&rows)
        })
    }

    /// The similarity stage: association file in, similarity file out.
    pub fn run<W: Write + Send>(params: &SimilarityParams, out: W) -> Result<W> {
        let targets = Filter::load(params.targets_file.as_deref())?;
        let neighbors = Filter::load(params.neighbors_file.as_deref())?;
        let contexts = Filter::load(params.contexts_file.as_deref())?;

        info!("reading input file into lists...");
        let reader = files::open_lines(&params.profiles_file)?;
        let profiles = LoadedProfiles::load(reader, &params.association, &params.profiles_file, |r| {
            Ok(params.assoc_threshold.map_or(true, |t| r.score >= t)
                && contexts.keeps(r.context)
                && (targets.keeps(r.target) || neighbors.keeps(r.target)))
        })?;

        info!("calculating similarities...");
        let sink = Sink::new(out);
        let stage = Similarity::new(&profiles, &params.measures, params.thresholds, &targets, &neighbors, params.seed);
        let processed = stage.write_all(params.threads, &sink)?;
        info!("finished, {} targets processed", processed);
        sink.finish()
    }
}
