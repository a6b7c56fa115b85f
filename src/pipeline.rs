// imports
use crate::association::Associations;
use crate::config::{Config, Stage};
use crate::error::Result;
use crate::files;
use crate::generalize::Generalize;
use crate::similarity::Similarity;

use std::env;
use std::io::Write;
use std::time::Instant;
use log::info;

pub struct Pipeline {}

impl Pipeline {

    // runs one stage per invocation -
    // -> configuration of arguments
    // -> the selected stage, writing to the output file or stdout

    pub fn run() -> Result<()> {

        info!("entering program...");
        let args: Vec<String> = env::args().collect();

        info!("building parameters...");
        let stage = Config::new(&args)?.get_stage();
        info!("{}", stage);

        let out = files::open_output(stage.output_file())?;
        Pipeline::run_stage(&stage, out)?;
        Ok(())
    }

    /// Runs `stage` writing into `out`, which is handed back flushed.
    pub fn run_stage<W: Write + Send>(stage: &Stage, out: W) -> Result<W> {
        let timer = Instant::now();
        let out = match stage {
            Stage::Profiles(params) => Associations::run(params, out)?,
            Stage::Similarity(params) => Similarity::run(params, out)?,
            Stage::Generalize(params) => Generalize::run(params, out)?,
        };
        info!("stage done, took {} seconds ...", timer.elapsed().as_secs());
        Ok(out)
    }
}


#[cfg(test)]
mod tests {

    use super::Pipeline;
    use crate::config::{Config, Stage};
    use serde_json::{json, Value};
    use std::fs;
    use std::path::Path;

    fn stage(json: Value) -> Stage {
        Config::from_json(&json).unwrap().get_stage()
    }

    fn run(json: Value) -> String {
        let out = Pipeline::run_stage(&stage(json), Vec::new()).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn path(dir: &Path, name: &str) -> String {
        dir.join(name).to_str().unwrap().to_string()
    }

    #[test]
    fn triples_to_similarities() {
        let dir = tempfile::tempdir().unwrap();
        let triples = path(dir.path(), "triples.tsv");
        let profiles = path(dir.path(), "profiles.tsv");
        fs::write(&triples, "cat\tanimal\t5\ncat\tpet\t3\ndog\tanimal\t4\ndog\tpet\t6\n").unwrap();

        let assoc = run(json!({"stage": "profiles", "triples_file": triples}));
        let mut lines = assoc.lines();
        assert!(lines.next().unwrap().starts_with("target\tid_target\tcontext\tid_context\tf_tc"));
        assert_eq!(lines.count(), 4);
        assert!(assoc.contains("cat\t0\tanimal\t1\t5.00\t"));
        assert!(assoc.contains("dog\t3\tpet\t2\t6.00\t"));
        fs::write(&profiles, &assoc).unwrap();

        let sims = run(json!({
            "stage": "similarity", "profiles_file": profiles,
            "association": "f_tc", "scores": "cosine", "threads": 2
        }));
        assert_eq!(sims, "target\tid_target\tneighbor\tid_neighbor\tcosine\n\
            dog\t3\tcat\t0\t0.9037378389\n\
            cat\t0\tdog\t3\t0.9037378389\n");
    }

    #[test]
    fn triples_to_generalized_triples() {
        let dir = tempfile::tempdir().unwrap();
        let triples = path(dir.path(), "triples.tsv");
        let profiles = path(dir.path(), "profiles.tsv");
        let similarities = path(dir.path(), "sims.tsv");
        fs::write(&triples, "cat\tanimal\t3\ncat\tpet\t3\ncat\ttoy\t2\nkitten\tanimal\t2\nkitten\tpet\t1\n").unwrap();

        fs::write(&profiles, run(json!({"stage": "profiles", "triples_file": triples}))).unwrap();
        fs::write(&similarities, run(json!({
            "stage": "similarity", "profiles_file": profiles, "association": "f_tc", "scores": "cosine:l1"
        }))).unwrap();

        let generalized = run(json!({
            "stage": "generalize", "similarity_file": similarities, "profiles_file": profiles,
            "sim_threshold": 0.5
        }));
        assert_eq!(generalized, "kitten\ttoy\t0.750000\n");

        // gated on the distance column instead, with the originals echoed
        let generalized = run(json!({
            "stage": "generalize", "similarity_file": similarities, "profiles_file": profiles,
            "score": "l1", "dist_threshold": 10.0, "include_originals": true
        }));
        assert_eq!(generalized.lines().count(), 6);
        assert!(generalized.contains("cat\tanimal\t3.000000\n"));
        assert!(generalized.contains("kitten\tpet\t1.000000\n"));
        assert!(generalized.ends_with("kitten\ttoy\t0.750000\n"));
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let triples = path(dir.path(), "absent.tsv");
        let result = Pipeline::run_stage(&stage(json!({"stage": "profiles", "triples_file": triples})), Vec::new());
        assert!(result.is_err());
    }
}
