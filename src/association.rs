// imports
use crate::config::ProfileParams;
use crate::error::{Error, Result};
use crate::files::{self, Sink};
use crate::profiles::{ProfileIndex, ProfileTables};
use crate::symbols::SymbolId;
use crate::work;

use std::fmt::Write as _;
use std::io::Write;
use std::str::FromStr;
use log::info;

/// Column names of the association file, in order.
pub const HEADER: [&str; 18] = [
    "target", "id_target", "context", "id_context", "f_tc", "f_t", "f_c",
    "cond_prob", "pmi", "npmi", "lmi", "tscore", "zscore", "dice", "chisquare",
    "loglike", "entropy_target", "entropy_context",
];

/// `a * ln(b)` with the 0 * ln(0) = 0 limit made explicit.
pub fn prodlog(a: f64, b: f64) -> f64 {
    if a != 0.0 { a * b.ln() } else { 0.0 }
}

fn expected(x: f64, y: f64, n: f64) -> f64 {
    x * y / n
}

/// 2x2 contingency data of one (target, context) pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contingency {
    pub joint: f64,
    pub target: f64,
    pub context: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssociationScores {
    pub cond_prob: f64,
    pub pmi: f64,
    pub npmi: f64,
    pub lmi: f64,
    pub tscore: f64,
    pub zscore: f64,
    pub dice: f64,
    pub chisquare: f64,
    pub loglike: f64,
}

impl Contingency {

    /// Observed and expected counts of the cells (t,c) (t,!c) (!t,c) (!t,!c).
    pub fn cells(&self) -> [(f64, f64); 4] {
        let Contingency { joint, target, context, total: n } = *self;
        [
            (joint, expected(target, context, n)),
            (target - joint, expected(target, n - context, n)),
            (context - joint, expected(n - target, context, n)),
            (n - target - context + joint, expected(n - target, n - context, n)),
        ]
    }

    /// Expected values of exactly zero are not guarded, the resulting
    /// non-finite scores are printed as they are.
    pub fn scores(&self) -> AssociationScores {
        let cells = self.cells();
        let (joint, e_joint) = cells[0];
        let pmi = joint.ln() - e_joint.ln();

        AssociationScores {
            cond_prob: joint / self.target,
            pmi,
            npmi: pmi / (self.total.ln() - joint.ln()),
            lmi: joint * pmi,
            tscore: (joint - e_joint) / joint.sqrt(),
            zscore: (joint - e_joint) / e_joint.sqrt(),
            dice: 2.0 * joint / (self.target + self.context),
            chisquare: cells.iter().map(|(o, e)| (o - e).powi(2) / e).sum(),
            loglike: 2.0 * cells.iter().map(|(o, e)| prodlog(*o, o / e)).sum::<f64>(),
        }
    }
}


/// Which index plays the target role when rows are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Target,
    Context,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Target,
    Context,
    Both,
}

impl Orientation {
    pub fn views(&self) -> &'static [View] {
        match self {
            Orientation::Target => &[View::Target],
            Orientation::Context => &[View::Context],
            Orientation::Both => &[View::Target, View::Context],
        }
    }
}

impl FromStr for Orientation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "target" => Ok(Orientation::Target),
            "context" => Ok(Orientation::Context),
            "both" => Ok(Orientation::Both),
            _ => Err(Error::config(format!("unknown orientation {}, use target, context or both", s))),
        }
    }
}


/// One output row, already oriented.
#[derive(Debug, Clone, PartialEq)]
pub struct PairAssociation<'a> {
    pub target: &'a str,
    pub id_target: SymbolId,
    pub context: &'a str,
    pub id_context: SymbolId,
    pub counts: Contingency,
    pub entropy_target: f64,
    pub entropy_context: f64,
}

impl PairAssociation<'_> {

    pub fn write_row(&self, out: &mut String) {
        let s = self.counts.scores();
        // writing into a String cannot fail
        let _ = writeln!(out,
            "{}\t{}\t{}\t{}\t{:.2}\t{:.2}\t{:.2}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}\t{:.6}",
            self.target, self.id_target, self.context, self.id_context,
            self.counts.joint, self.counts.target, self.counts.context,
            s.cond_prob, s.pmi, s.npmi, s.lmi, s.tscore, s.zscore, s.dice, s.chisquare, s.loglike,
            self.entropy_target, self.entropy_context);
    }
}


pub struct Associations {}

impl Associations {

    fn indices(tables: &ProfileTables, view: View) -> (&ProfileIndex, &ProfileIndex, &'static str) {
        match view {
            View::Target => (&tables.targets, &tables.contexts, "context"),
            View::Context => (&tables.contexts, &tables.targets, "target"),
        }
    }

    /// All rows of one entity in the given view, in the entity's partner order.
    pub fn rows_for(tables: &ProfileTables, view: View, entity: SymbolId) -> Result<String> {
        let (own, partners, partner_role) = Associations::indices(tables, view);
        let role = match view { View::Target => "target", View::Context => "context" };
        let profile = own.profile(entity, role)?;
        let name = tables.name(entity)?;
        let entropy = profile.entropy();

        let mut rows = String::new();
        for (partner, joint) in profile.partners() {
            let partner_profile = partners.profile(partner, partner_role)?;
            let pair = PairAssociation {
                target: name,
                id_target: entity,
                context: tables.name(partner)?,
                id_context: partner,
                counts: Contingency {
                    joint,
                    target: profile.sum,
                    context: partner_profile.sum,
                    total: tables.total,
                },
                entropy_target: entropy,
                entropy_context: partner_profile.entropy(),
            };
            pair.write_row(&mut rows);
        }
        Ok(rows)
    }

    /// Header plus every row of the requested orientation, fanned out over
    /// the index entries.
    pub fn write_all<W: Write + Send>(tables: &ProfileTables,
        orientation: Orientation,
        threads: usize,
        sink: &Sink<W>) -> Result<usize> {

        sink.emit(&(HEADER.join("\t") + "\n"))?;

        let mut units: Vec<(View, SymbolId)> = Vec::new();
        for view in orientation.views() {
            let (own, _, _) = Associations::indices(tables, *view);
            units.extend(own.ids().into_iter().map(|id| (*view, id)));
        }

        let total = units.len();
        work::distribute("entities", units.into_iter(), Some(total), threads, |(view, entity)| {
            let rows = Associations::rows_for(tables, view, entity)?;
            sink.emit(&rows)
        })
    }

    /// The profiles stage: triples in, association file out.
    pub fn run<W: Write + Send>(params: &ProfileParams, out: W) -> Result<W> {
        info!("reading input file into index...");
        let reader = files::open_lines(&params.triples_file)?;
        let tables = ProfileTables::load(reader, params.max_token_len)?;

        info!("calculating association scores...");
        let sink = Sink::new(out);
        let processed = Associations::write_all(&tables, params.orientation, params.threads, &sink)?;
        info!("finished, {} entities processed ({} targets, {} contexts)",
            processed, tables.targets.len(), tables.contexts.len());
        sink.finish()
    }
}


#[cfg(test)]
mod tests {

    use super::{prodlog, Associations, Contingency, Orientation, View, HEADER};
    use crate::files::Sink;
    use crate::profiles::{ProfileTables, MAX_TOKEN_LEN};
    use std::io::Cursor;

    const EPS: f64 = 1e-9;

    fn tables(input: &str) -> ProfileTables {
        ProfileTables::load(Cursor::new(input.to_string()), MAX_TOKEN_LEN).unwrap()
    }

    #[test]
    fn prodlog_limit() {
        assert_eq!(prodlog(0.0, 0.0), 0.0);
        assert_eq!(prodlog(0.0, f64::NAN), 0.0);
        assert!((prodlog(2.0, std::f64::consts::E) - 2.0).abs() < EPS);
    }

    #[test]
    fn scores_match_hand_computation() {
        // cat-animal in the cat/dog example: f(t,c)=5 f(t)=8 f(c)=9 N=18
        let counts = Contingency { joint: 5.0, target: 8.0, context: 9.0, total: 18.0 };
        let s = counts.scores();
        let pmi = (5.0f64 / 4.0).ln();

        assert!((s.cond_prob - 0.625).abs() < EPS);
        assert!((s.pmi - pmi).abs() < EPS);
        assert!((s.npmi - pmi / (18f64.ln() - 5f64.ln())).abs() < EPS);
        assert!((s.lmi - 5.0 * pmi).abs() < EPS);
        assert!((s.dice - 10.0 / 17.0).abs() < EPS);
        assert!((s.tscore - 1.0 / 5f64.sqrt()).abs() < EPS);
        assert!((s.zscore - 0.5).abs() < EPS);
        assert!((s.chisquare - 0.9).abs() < EPS);
        let ll = 2.0 * (5.0 * (5.0f64 / 4.0).ln() + 3.0 * (3.0f64 / 4.0).ln()
            + 4.0 * (4.0f64 / 5.0).ln() + 6.0 * (6.0f64 / 5.0).ln());
        assert!((s.loglike - ll).abs() < EPS);
    }

    #[test]
    fn empty_cell_keeps_loglike_finite() {
        // the target has a single partner, so f(t,!c) = 0
        let counts = Contingency { joint: 2.0, target: 2.0, context: 3.0, total: 4.0 };
        let s = counts.scores();
        assert!(s.loglike.is_finite());
        assert!(s.chisquare.is_finite());
    }

    #[test]
    fn zero_expectation_is_not_hidden() {
        // a single target: N - f(t) = 0, so two expected cells are zero
        let counts = Contingency { joint: 2.0, target: 5.0, context: 2.0, total: 5.0 };
        let s = counts.scores();
        assert!(!s.chisquare.is_finite());
        assert!(s.loglike.is_finite());
    }

    #[test]
    fn orientation_parsing() {
        assert_eq!("both".parse::<Orientation>().unwrap(), Orientation::Both);
        assert!("sideways".parse::<Orientation>().is_err());
    }

    fn fields(row: &str) -> Vec<String> {
        row.split('\t').map(|s| s.to_string()).collect()
    }

    #[test]
    fn rows_pair_ids_and_entropies_per_view() {
        let t = tables("cat\tanimal\t5\ncat\tpet\t3\ndog\tanimal\t4\n");
        let cat = t.symbols.get("cat").unwrap();
        let animal = t.symbols.get("animal").unwrap();

        let target_rows = Associations::rows_for(&t, View::Target, cat).unwrap();
        let row = target_rows.lines().find(|r| r.contains("animal")).unwrap();
        let f = fields(row);
        assert_eq!(f.len(), HEADER.len());
        assert_eq!(f[0], "cat");
        assert_eq!(f[2], "animal");
        assert_eq!(f[4..7], ["5.00", "8.00", "9.00"]);
        let cat_entropy = t.targets.get(cat).unwrap().entropy();
        let animal_entropy = t.contexts.get(animal).unwrap().entropy();
        assert_eq!(f[16], format!("{:.6}", cat_entropy));
        assert_eq!(f[17], format!("{:.6}", animal_entropy));

        let context_rows = Associations::rows_for(&t, View::Context, animal).unwrap();
        let row = context_rows.lines().find(|r| r.contains("cat")).unwrap();
        let f = fields(row);
        assert_eq!(f[0], "animal");
        assert_eq!(f[1], animal.to_string());
        assert_eq!(f[2], "cat");
        assert_eq!(f[4..7], ["5.00", "9.00", "8.00"]);
        assert_eq!(f[16], format!("{:.6}", animal_entropy));
        assert_eq!(f[17], format!("{:.6}", cat_entropy));
    }

    #[test]
    fn single_partner_entropy_prints_unsigned_zero() {
        let t = tables("cat\tanimal\t5\ndog\tanimal\t4\ndog\tpet\t6\n");
        let cat = t.symbols.get("cat").unwrap();
        let dog = t.symbols.get("dog").unwrap();

        let cat_rows = Associations::rows_for(&t, View::Target, cat).unwrap();
        let f = fields(cat_rows.trim_end());
        assert_eq!(f[16], "0.000000");

        // pet is only seen with dog
        let dog_rows = Associations::rows_for(&t, View::Target, dog).unwrap();
        let row = dog_rows.lines().find(|r| r.contains("pet")).unwrap();
        assert_eq!(fields(row)[17], "0.000000");
    }

    #[test]
    fn both_orientations_emit_twice() {
        let t = tables("cat\tanimal\t5\ncat\tpet\t3\ndog\tanimal\t4\ndog\tpet\t6\n");
        for (orientation, expected_rows) in [(Orientation::Target, 4), (Orientation::Both, 8)] {
            for threads in [1, 3] {
                let sink = Sink::new(Vec::new());
                Associations::write_all(&t, orientation, threads, &sink).unwrap();
                let out = String::from_utf8(sink.finish().unwrap()).unwrap();
                let mut lines = out.lines();
                assert_eq!(lines.next().unwrap(), HEADER.join("\t"));
                assert_eq!(lines.count(), expected_rows);
            }
        }
    }
}
