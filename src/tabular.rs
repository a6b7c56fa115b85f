// imports
use crate::error::{Error, Result};
use crate::profiles::ProfileIndex;
use crate::symbols::SymbolId;

use std::collections::HashMap;
use std::io::BufRead;
use log::{info, warn};

/// The first four columns (two names, two ids) can never be used as scores.
pub const ID_COLUMNS: usize = 4;

/// Finds the column called `name` in a tab-separated header line.
pub fn column_index(header: &str, name: &str, file: &str) -> Result<usize> {
    let header = header.trim_end_matches(['\n', '\r']);
    match header.split('\t').position(|column| column == name) {
        Some(index) if index >= ID_COLUMNS => {
            info!("using column named: {} (field {})", name, index);
            Ok(index)
        }
        _ => Err(Error::MissingColumn { name: name.to_string(), file: file.to_string() }),
    }
}

/// The identifying columns of a row plus the selected score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Record<'a> {
    pub target: &'a str,
    pub id_target: SymbolId,
    pub context: &'a str,
    pub id_context: SymbolId,
    pub score: f64,
}

impl<'a> Record<'a> {

    /// `None` when the line is too short or a number does not parse.
    pub fn parse(line: &'a str, score_column: usize) -> Option<Record<'a>> {
        let fields: Vec<&str> = line.trim_end_matches(['\n', '\r']).split('\t').collect();
        if fields.len() <= score_column || fields.len() < ID_COLUMNS {
            return None;
        }
        Some(Record {
            target: fields[0],
            id_target: fields[1].trim().parse().ok()?,
            context: fields[2],
            id_context: fields[3].trim().parse().ok()?,
            score: fields[score_column].trim().parse().ok()?,
        })
    }
}


#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadStats {
    pub lines: usize,
    pub stored: usize,
    pub malformed: usize,
}

/// Profiles read back from an association file, keyed by the ids written
/// in the file so they match the ids of every later stage.
#[derive(Debug, Default)]
pub struct LoadedProfiles {
    pub index: ProfileIndex,
    targets: HashMap<SymbolId, String>,
    contexts: HashMap<SymbolId, String>,
    pub stats: LoadStats,
}

fn remember(names: &mut HashMap<SymbolId, String>, id: SymbolId, name: &str, role: &str) {
    match names.get(&id) {
        Some(known) if known != name => {
            warn!("{} id {} names both \"{}\" and \"{}\", keeping the first", role, id, known, name);
        }
        Some(_) => {}
        None => {
            names.insert(id, name.to_string());
        }
    }
}

impl LoadedProfiles {

    /// Reads the header, locates `score_column`, then feeds every parsed row
    /// to `visit`; rows for which it returns true are stored with the score
    /// as weight.
    pub fn load<R, F>(reader: R, score_column: &str, file: &str, mut visit: F) -> Result<LoadedProfiles>
    where
        R: BufRead,
        F: FnMut(&Record) -> Result<bool>,
    {
        let mut lines = reader.lines();
        let header = match lines.next() {
            Some(header) => header?,
            None => return Err(Error::EmptyFile(file.to_string())),
        };
        let column = column_index(&header, score_column, file)?;

        let mut loaded = LoadedProfiles::default();
        for line in lines {
            let line = line?;
            loaded.stats.lines += 1;
            if line.trim().is_empty() {
                continue;
            }
            let record = match Record::parse(&line, column) {
                Some(record) => record,
                None => {
                    // header is line 1
                    warn!("format problem at line {} of {}", loaded.stats.lines + 1, file);
                    loaded.stats.malformed += 1;
                    continue;
                }
            };
            if visit(&record)? {
                remember(&mut loaded.targets, record.id_target, record.target, "target");
                remember(&mut loaded.contexts, record.id_context, record.context, "context");
                if loaded.index.accumulate(record.id_target, record.id_context, record.score) {
                    warn!("repeated entry {}-{} in {}, weights summed", record.target, record.context, file);
                }
                loaded.stats.stored += 1;
            }
        }
        info!("loaded {} profiles ({} pairs) from {}", loaded.index.len(), loaded.stats.stored, file);
        Ok(loaded)
    }

    pub fn target_name(&self, id: SymbolId) -> Result<&str> {
        self.targets.get(&id).map(|s| s.as_str()).ok_or(Error::MissingProfile { role: "target", id })
    }

    pub fn context_name(&self, id: SymbolId) -> Result<&str> {
        self.contexts.get(&id).map(|s| s.as_str()).ok_or(Error::MissingProfile { role: "context", id })
    }
}


#[cfg(test)]
mod tests {

    use super::{column_index, LoadedProfiles, Record};
    use crate::error::Error;
    use std::io::Cursor;

    const HEADER: &str = "target\tid_target\tcontext\tid_context\tf_tc\tcond_prob";

    #[test]
    fn finds_columns_by_name() {
        assert_eq!(column_index(HEADER, "f_tc", "f").unwrap(), 4);
        assert_eq!(column_index(&format!("{}\n", HEADER), "cond_prob", "f").unwrap(), 5);
        assert!(matches!(column_index(HEADER, "pmi", "f"), Err(Error::MissingColumn { .. })));
        // identifier columns are never scores
        assert!(column_index(HEADER, "id_context", "f").is_err());
    }

    #[test]
    fn parses_records() {
        let r = Record::parse("cat\t0\tanimal\t1\t5.00\t0.625", 5).unwrap();
        assert_eq!((r.target, r.id_target, r.context, r.id_context), ("cat", 0, "animal", 1));
        assert_eq!(r.score, 0.625);
        assert!(Record::parse("cat\tx\tanimal\t1\t5.00\t0.625", 5).is_none());
        assert!(Record::parse("cat\t0\tanimal\t1\t5.00", 5).is_none());
    }

    #[test]
    fn loads_selected_rows_with_file_ids() {
        let input = format!("{}\ncat\t7\tanimal\t2\t5.00\t0.625\ncat\t7\tpet\t3\t3.00\t0.375\nbroken\ndog\t9\tanimal\t2\t4.00\t0.4\n", HEADER);
        let loaded = LoadedProfiles::load(Cursor::new(input), "cond_prob", "f", |r| Ok(r.target != "dog")).unwrap();
        assert_eq!(loaded.stats.stored, 2);
        assert_eq!(loaded.stats.malformed, 1);
        let cat = loaded.index.get(7).unwrap();
        assert!((cat.sum - 1.0).abs() < 1e-12);
        assert_eq!(cat.weight(3), Some(0.375));
        assert!(loaded.index.get(9).is_none());
        assert_eq!(loaded.target_name(7).unwrap(), "cat");
        assert_eq!(loaded.context_name(2).unwrap(), "animal");
    }

    #[test]
    fn unknown_column_is_fatal() {
        let input = format!("{}\ncat\t7\tanimal\t2\t5.00\t0.625\n", HEADER);
        let result = LoadedProfiles::load(Cursor::new(input), "dice", "f", |_| Ok(true));
        assert!(matches!(result, Err(Error::MissingColumn { .. })));
    }

    #[test]
    fn empty_file_is_reported_as_such() {
        let result = LoadedProfiles::load(Cursor::new(""), "f_tc", "profiles.tsv", |_| Ok(true));
        assert!(matches!(result, Err(Error::EmptyFile(ref file)) if file == "profiles.tsv"));
    }
}
