// imports
use crate::association::Orientation;
use crate::error::{Error, Result};
use crate::generalize::ScoreGate;
use crate::profiles::MAX_TOKEN_LEN;
use crate::similarity::{MeasureSet, Thresholds};

use std::fmt::{self, Display};
use std::fs::File;
use std::io::BufReader;
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct ProfileParams {
    pub triples_file: String,
    pub max_token_len: usize,
    pub orientation: Orientation,
    pub threads: usize,
    pub output_file: Option<String>,
}

impl Display for ProfileParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "profile parameters:
        triples_file: {}
        max_token_len: {}
        orientation: {:?}
        threads: {}
        output_file: {:?}",
        self.triples_file, self.max_token_len, self.orientation, self.threads, self.output_file)
    }
}

#[derive(Clone, Debug)]
pub struct SimilarityParams {
    pub profiles_file: String,
    pub association: String,
    pub measures: MeasureSet,
    pub targets_file: Option<String>,
    pub neighbors_file: Option<String>,
    pub contexts_file: Option<String>,
    pub assoc_threshold: Option<f64>,
    pub thresholds: Thresholds,
    pub seed: Option<u64>,
    pub threads: usize,
    pub output_file: Option<String>,
}

impl Display for SimilarityParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "similarity parameters:
        profiles_file: {}
        association: {}
        scores: {}
        targets_file: {:?}
        neighbors_file: {:?}
        contexts_file: {:?}
        assoc_threshold: {:?}
        sim_threshold: {:?}
        dist_threshold: {:?}
        seed: {:?}
        threads: {}
        output_file: {:?}",
        self.profiles_file, self.association, self.measures, self.targets_file, self.neighbors_file,
        self.contexts_file, self.assoc_threshold, self.thresholds.similarity, self.thresholds.distance,
        self.seed, self.threads, self.output_file)
    }
}

#[derive(Clone, Debug)]
pub struct GeneralizeParams {
    pub similarity_file: String,
    pub profiles_file: String,
    pub score: String,
    pub targets_file: Option<String>,
    pub neighbors_file: Option<String>,
    pub contexts_file: Option<String>,
    pub gate: ScoreGate,
    pub include_originals: bool,
    pub threads: usize,
    pub output_file: Option<String>,
}

impl Display for GeneralizeParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "generalization parameters:
        similarity_file: {}
        profiles_file: {}
        score: {}
        targets_file: {:?}
        neighbors_file: {:?}
        contexts_file: {:?}
        gate: {:?}
        include_originals: {}
        threads: {}
        output_file: {:?}",
        self.similarity_file, self.profiles_file, self.score, self.targets_file, self.neighbors_file,
        self.contexts_file, self.gate, self.include_originals, self.threads, self.output_file)
    }
}

/// One configured run of one of the three stages.
#[derive(Clone, Debug)]
pub enum Stage {
    Profiles(ProfileParams),
    Similarity(SimilarityParams),
    Generalize(GeneralizeParams),
}

impl Stage {
    pub fn output_file(&self) -> Option<&str> {
        match self {
            Stage::Profiles(p) => p.output_file.as_deref(),
            Stage::Similarity(p) => p.output_file.as_deref(),
            Stage::Generalize(p) => p.output_file.as_deref(),
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Profiles(p) => Display::fmt(p, f),
            Stage::Similarity(p) => Display::fmt(p, f),
            Stage::Generalize(p) => Display::fmt(p, f),
        }
    }
}


// typed accessors over the json object, absent keys give None

fn required_str(json: &Value, key: &str) -> Result<String> {
    optional_str(json, key)?.ok_or_else(|| Error::config(format!("{} was not supplied through json", key)))
}

fn optional_str(json: &Value, key: &str) -> Result<Option<String>> {
    match json.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_str()
            .map(|s| Some(s.to_owned()))
            .ok_or_else(|| Error::config(format!("given {} is not a string", key))),
    }
}

fn optional_f64(json: &Value, key: &str) -> Result<Option<f64>> {
    match json.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_f64()
            .map(Some)
            .ok_or_else(|| Error::config(format!("given {} is not numeric", key))),
    }
}

fn optional_u64(json: &Value, key: &str) -> Result<Option<u64>> {
    match json.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_u64()
            .map(Some)
            .ok_or_else(|| Error::config(format!("given {} is not a non-negative integer", key))),
    }
}

fn optional_bool(json: &Value, key: &str) -> Result<Option<bool>> {
    match json.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_bool()
            .map(Some)
            .ok_or_else(|| Error::config(format!("given {} is not boolean", key))),
    }
}

fn threads(json: &Value, default: usize) -> Result<usize> {
    match optional_u64(json, "threads")? {
        Some(0) => Err(Error::config("threads requires a positive integer")),
        Some(n) => Ok(n as usize),
        None => Ok(default),
    }
}

pub struct Config {
    stage: Stage,
}

impl Config {

    pub fn get_stage(&self) -> Stage {
        self.stage.clone()
    }

    /// Expects the program name followed by the path to a json file.
    pub fn new(args: &[String]) -> Result<Config> {
        if args.len() != 2 {
            return Err(Error::config("input should be a path to json file only"));
        }
        let f = BufReader::new(File::open(&args[1])?);
        let json: Value = serde_json::from_reader(f)?;
        Config::from_json(&json)
    }

    pub fn from_json(json: &Value) -> Result<Config> {
        let stage = match required_str(json, "stage")?.as_str() {
            "profiles" => Stage::Profiles(Config::profile_params(json)?),
            "similarity" => Stage::Similarity(Config::similarity_params(json)?),
            "generalize" => Stage::Generalize(Config::generalize_params(json)?),
            other => return Err(Error::config(format!(
                "unknown stage {}, use profiles, similarity or generalize", other))),
        };
        Ok(Self { stage })
    }

    fn profile_params(json: &Value) -> Result<ProfileParams> {
        let orientation = match optional_str(json, "orientation")? {
            Some(orientation) => orientation.parse()?,
            None => Orientation::Target,
        };
        let max_token_len = match optional_u64(json, "max_token_len")? {
            Some(0) => return Err(Error::config("max_token_len must be positive")),
            Some(n) => n as usize,
            None => MAX_TOKEN_LEN,
        };
        Ok(ProfileParams {
            triples_file: required_str(json, "triples_file")?,
            max_token_len,
            orientation,
            threads: threads(json, 1)?,
            output_file: optional_str(json, "output_file")?,
        })
    }

    fn similarity_params(json: &Value) -> Result<SimilarityParams> {
        let measures = match optional_str(json, "scores")? {
            Some(list) => MeasureSet::parse(&list)?,
            None => MeasureSet::all(),
        };
        Ok(SimilarityParams {
            profiles_file: required_str(json, "profiles_file")?,
            association: optional_str(json, "association")?.unwrap_or_else(|| "cond_prob".to_string()),
            measures,
            targets_file: optional_str(json, "targets_file")?,
            neighbors_file: optional_str(json, "neighbors_file")?,
            contexts_file: optional_str(json, "contexts_file")?,
            assoc_threshold: optional_f64(json, "assoc_threshold")?,
            thresholds: Thresholds {
                similarity: optional_f64(json, "sim_threshold")?,
                distance: optional_f64(json, "dist_threshold")?,
            },
            seed: optional_u64(json, "seed")?,
            threads: threads(json, 8)?,
            output_file: optional_str(json, "output_file")?,
        })
    }

    fn generalize_params(json: &Value) -> Result<GeneralizeParams> {
        let gate = match (optional_f64(json, "sim_threshold")?, optional_f64(json, "dist_threshold")?) {
            (Some(t), None) => ScoreGate::AtLeast(t),
            (None, Some(t)) => ScoreGate::AtMost(t),
            (Some(_), Some(_)) => return Err(Error::config("only one of sim_threshold or dist_threshold can be specified")),
            (None, None) => return Err(Error::config("one of sim_threshold or dist_threshold is required")),
        };
        Ok(GeneralizeParams {
            similarity_file: required_str(json, "similarity_file")?,
            profiles_file: required_str(json, "profiles_file")?,
            score: optional_str(json, "score")?.unwrap_or_else(|| "cosine".to_string()),
            targets_file: optional_str(json, "targets_file")?,
            neighbors_file: optional_str(json, "neighbors_file")?,
            contexts_file: optional_str(json, "contexts_file")?,
            gate,
            include_originals: optional_bool(json, "include_originals")?.unwrap_or(false),
            threads: threads(json, 1)?,
            output_file: optional_str(json, "output_file")?,
        })
    }
}
