// ============================================================
// Layer 4 — Sentence Loader
// ============================================================
// Reads labelled sentences from a tab-separated file in the
// GLUE / SST-2 layout:
//
//   sentence<TAB>label
//   a gorgeous , witty , seductive movie .<TAB>1
//   the plot is nothing but boilerplate clichés<TAB>0
//
// The label is the LAST tab-separated field so sentences may
// themselves contain tabs. A first line whose label field is
// not an integer is treated as a header and skipped. Malformed
// rows are logged and skipped rather than failing the load.

use anyhow::{Context, Result};
use std::{fs, path::Path};

use crate::domain::sentence::LabeledSentence;
use crate::domain::traits::SentenceSource;

pub struct TsvLoader {
    path: String,
}

impl TsvLoader {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl SentenceSource for TsvLoader {
    fn load_all(&self) -> Result<Vec<LabeledSentence>> {
        let path = Path::new(&self.path);
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Cannot read dataset '{}'", path.display()))?;

        let sentences = parse_tsv(&raw);
        tracing::info!("Loaded {} labelled sentences from '{}'", sentences.len(), self.path);
        Ok(sentences)
    }
}

/// Parse TSV content into labelled sentences.
pub fn parse_tsv(raw: &str) -> Vec<LabeledSentence> {
    let mut out = Vec::new();

    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let Some((text, label)) = line.rsplit_once('\t') else {
            tracing::warn!("Skipping line {}: no tab separator", line_no + 1);
            continue;
        };

        match label.trim().parse::<usize>() {
            Ok(label) if !text.trim().is_empty() => {
                out.push(LabeledSentence::new(text.trim(), label));
            }
            Ok(_) => tracing::warn!("Skipping line {}: empty sentence", line_no + 1),
            // Header row
            Err(_) if line_no == 0 => {
                tracing::debug!("Skipping header row '{}'", line);
            }
            Err(e) => {
                tracing::warn!("Skipping line {}: bad label '{}': {}", line_no + 1, label, e);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_with_header() {
        let raw = "sentence\tlabel\ngreat fun\t1\nawful\t0\n";
        let s = parse_tsv(raw);
        assert_eq!(s, vec![LabeledSentence::new("great fun", 1), LabeledSentence::new("awful", 0)]);
    }

    #[test]
    fn test_label_is_last_field() {
        let s = parse_tsv("left\tright side\t1\n");
        assert_eq!(s, vec![LabeledSentence::new("left\tright side", 1)]);
    }

    #[test]
    fn test_bad_rows_skipped() {
        let raw = "ok\t1\nno separator here\n\t0\nfine\tx\nlast\t0\r\n";
        let s = parse_tsv(raw);
        assert_eq!(s, vec![LabeledSentence::new("ok", 1), LabeledSentence::new("last", 0)]);
    }

    #[test]
    fn test_load_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "sentence\tlabel").unwrap();
        writeln!(f, "a witty film\t1").unwrap();
        let loader = TsvLoader::new(f.path().to_string_lossy().to_string());
        let s = loader.load_all().unwrap();
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].label, 1);
    }

    #[test]
    fn test_missing_file_is_error() {
        let loader = TsvLoader::new("/definitely/not/here.tsv");
        assert!(loader.load_all().is_err());
    }
}
