use crate::error::Result;

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::sync::Mutex;
use flate2::read::GzDecoder;

/// Opens a text file for line reading, decompressing `.gz` files on the fly.
pub fn open_lines(file_path: &str) -> Result<Box<dyn BufRead + Send>> {
    let f = File::open(file_path)?;
    if file_path.ends_with(".gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(f))))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

/// The stage output: a file when configured, stdout otherwise.
pub fn open_output(file_path: Option<&str>) -> Result<Box<dyn Write + Send>> {
    match file_path {
        Some(path) => Ok(Box::new(BufWriter::new(File::create(path)?))),
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

/// Output shared by all workers. Each call writes a whole block of rows
/// under the lock, rows of one unit therefore stay contiguous.
pub struct Sink<W: Write> {
    out: Mutex<W>,
}

impl<W: Write> Sink<W> {

    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }

    pub fn emit(&self, rows: &str) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        out.write_all(rows.as_bytes())?;
        Ok(())
    }

    pub fn finish(self) -> Result<W> {
        let mut out = self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner());
        out.flush()?;
        Ok(out)
    }
}


#[cfg(test)]
mod tests {

    use super::{open_lines, Sink};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{BufRead, Write};

    #[test]
    fn reads_gzipped_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triples.gz");
        let mut writer = GzEncoder::new(std::fs::File::create(&path).unwrap(), Compression::default());
        writer.write_all(b"cat\tanimal\t5\ncat\tpet\t3\n").unwrap();
        writer.finish().unwrap();

        let lines: Vec<String> = open_lines(path.to_str().unwrap()).unwrap()
            .lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["cat\tanimal\t5", "cat\tpet\t3"]);
    }

    #[test]
    fn sink_keeps_blocks_whole() {
        let sink = Sink::new(Vec::new());
        sink.emit("a\t1\nb\t2\n").unwrap();
        sink.emit("").unwrap();
        sink.emit("c\t3\n").unwrap();
        let out = sink.finish().unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\t1\nb\t2\nc\t3\n");
    }
}
