//! Derived annotations: canonical single values picked out of set annotations.
//!
//! Each derivation reads one or two stored annotations of a source file and
//! stores a new annotation with exactly one value per token. The aggregator
//! consumes these as already-canonical columns.

use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::annotation::{AnnotationSet, SelectionRule, suppress_if};
use crate::error::{Error, Result};
use crate::source::{AnnotationSink, AnnotationSource};

pub const COMPLEMGRAM_BEST: &str = "stats_export.complemgram_best";
pub const SENSE_BEST: &str = "stats_export.sense_best";
pub const BASEFORM_FIRST: &str = "stats_export.baseform_first";
pub const LEMGRAM_FIRST: &str = "stats_export.lemgram_first";
pub const COMPLEMGRAM_BEST_COND: &str = "stats_export.complemgram_best_cond";
pub const DATE: &str = "stats_export.date";

#[derive(Debug, Clone, PartialEq)]
pub enum Derivation {
    /// Pick one value out of each token's set.
    Select {
        input: String,
        rule: SelectionRule,
        scored: bool,
    },
    /// Keep `value` only where `companion` is empty.
    SuppressIf { value: String, companion: String },
    /// Copy span-level values onto tokens. `parent` holds, per token, the
    /// index of the enclosing span in `spans` (empty outside any span).
    ProjectSpan { spans: String, parent: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivedAnnotation {
    pub output: String,
    pub description: &'static str,
    pub derivation: Derivation,
}

/// Names of the stored set annotations the standard derivations read.
#[derive(Debug, Clone, Copy)]
pub struct DerivationInputs<'a> {
    pub complemgram: &'a str,
    pub sense: &'a str,
    pub baseform: &'a str,
    pub lemgram: &'a str,
}

/// The derivations the frequency-list variants depend on, in dependency order.
pub fn standard_derivations(inputs: &DerivationInputs<'_>) -> Vec<DerivedAnnotation> {
    vec![
        DerivedAnnotation {
            output: COMPLEMGRAM_BEST.into(),
            description: "Compound analysis with the highest score",
            derivation: Derivation::Select {
                input: inputs.complemgram.into(),
                rule: SelectionRule::Best,
                scored: true,
            },
        },
        DerivedAnnotation {
            output: SENSE_BEST.into(),
            description: "Sense with the highest score",
            derivation: Derivation::Select {
                input: inputs.sense.into(),
                rule: SelectionRule::Best,
                scored: true,
            },
        },
        DerivedAnnotation {
            output: BASEFORM_FIRST.into(),
            description: "First baseform from a set of baseforms",
            derivation: Derivation::Select {
                input: inputs.baseform.into(),
                rule: SelectionRule::First,
                scored: false,
            },
        },
        DerivedAnnotation {
            output: LEMGRAM_FIRST.into(),
            description: "First lemgram from a set of lemgrams",
            derivation: Derivation::Select {
                input: inputs.lemgram.into(),
                rule: SelectionRule::First,
                scored: false,
            },
        },
        DerivedAnnotation {
            output: COMPLEMGRAM_BEST_COND.into(),
            description: "Best compound analysis for tokens lacking a sense",
            derivation: Derivation::SuppressIf {
                value: COMPLEMGRAM_BEST.into(),
                companion: inputs.sense.into(),
            },
        },
    ]
}

/// Give every token the value of the span it sits in, e.g. a text's date.
pub fn span_projection(spans: &str, parent: &str) -> DerivedAnnotation {
    DerivedAnnotation {
        output: DATE.into(),
        description: "Date of the text each token belongs to",
        derivation: Derivation::ProjectSpan {
            spans: spans.into(),
            parent: parent.into(),
        },
    }
}

/// Look up each token's span value through its parent index.
pub fn project_values(
    source_file: &str,
    parent_name: &str,
    spans: &[String],
    parents: &[String],
) -> Result<Vec<String>> {
    parents
        .iter()
        .enumerate()
        .map(|(position, parent)| {
            let parent = parent.trim();
            if parent.is_empty() {
                return Ok(String::new());
            }
            parent
                .parse::<usize>()
                .ok()
                .and_then(|i| spans.get(i))
                .cloned()
                .ok_or_else(|| {
                    Error::io(
                        format!("{source_file}: {parent_name}"),
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!(
                                "token {position} points at span '{parent}', only {} spans exist",
                                spans.len()
                            ),
                        ),
                    )
                })
        })
        .collect()
}

/// Apply a selection rule to every token's set.
pub fn select_values(raw: &[String], rule: SelectionRule, scored: bool) -> Vec<String> {
    raw.iter()
        .map(|v| {
            let set = if scored {
                AnnotationSet::parse_scored(v)
            } else {
                AnnotationSet::parse(v)
            };
            rule.select(&set)
        })
        .collect()
}

/// Token-wise [`suppress_if`]; both columns must be aligned.
pub fn suppress_values(
    source_file: &str,
    companion_name: &str,
    values: &[String],
    companions: &[String],
) -> Result<Vec<String>> {
    if values.len() != companions.len() {
        return Err(Error::Alignment {
            source_file: source_file.to_string(),
            annotation: companion_name.to_string(),
            expected: values.len(),
            actual: companions.len(),
        });
    }
    Ok(values
        .iter()
        .zip(companions)
        .map(|(v, c)| suppress_if(v, c))
        .collect())
}

impl DerivedAnnotation {
    /// Compute and store this annotation for one source file. Returns token count.
    pub fn apply<S>(&self, store: &S, source_file: &str) -> Result<usize>
    where
        S: AnnotationSource + AnnotationSink,
    {
        let values = match &self.derivation {
            Derivation::Select {
                input,
                rule,
                scored,
            } => select_values(&store.read_all(source_file, input)?, *rule, *scored),
            Derivation::SuppressIf { value, companion } => {
                let values = store.read_all(source_file, value)?;
                let companions = store.read_all(source_file, companion)?;
                suppress_values(source_file, companion, &values, &companions)?
            }
            Derivation::ProjectSpan { spans, parent } => {
                let span_values = store.read_all(source_file, spans)?;
                let parents = store.read_all(source_file, parent)?;
                project_values(source_file, parent, &span_values, &parents)?
            }
        };
        store.write_annotation(source_file, &self.output, &values)?;
        Ok(values.len())
    }
}

/// Run `derivations` in order for every source file, files in parallel.
///
/// The first failure aborts the run.
pub fn derive_all<S>(
    store: &S,
    source_files: &[String],
    derivations: &[DerivedAnnotation],
    pb: &ProgressBar,
) -> Result<usize>
where
    S: AnnotationSource + AnnotationSink + Sync,
{
    pb.set_length(source_files.len() as u64);
    let tokens = source_files
        .par_iter()
        .map(|file| -> Result<usize> {
            let mut tokens = 0;
            for d in derivations {
                tokens = d.apply(store, file).inspect_err(|e| {
                    log::error!("{file}: deriving {} failed: {e}", d.output);
                })?;
            }
            pb.inc(1);
            log::debug!("{file}: {} annotations derived", derivations.len());
            Ok(tokens)
        })
        .try_reduce(|| 0, |a, b| Ok(a + b))?;
    pb.finish_and_clear();
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::WorkDir;
    use tempfile::TempDir;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    fn inputs() -> DerivationInputs<'static> {
        DerivationInputs {
            complemgram: "saldo.complemgram",
            sense: "wsd.sense",
            baseform: "baseform",
            lemgram: "lemgram",
        }
    }

    #[test]
    fn select_values_best_scored() {
        let raw = strings(&["|den..1:0.8|den..2:0.2|", "|", ""]);
        assert_eq!(
            select_values(&raw, SelectionRule::Best, true),
            strings(&["den..1", "", ""])
        );
    }

    #[test]
    fn select_values_first_unscored() {
        let raw = strings(&["|hund|hundar|", "katt"]);
        assert_eq!(
            select_values(&raw, SelectionRule::First, false),
            strings(&["hund", "katt"])
        );
    }

    #[test]
    fn suppress_values_mismatch_is_alignment_error() {
        let err = suppress_values("doc1", "wsd.sense", &strings(&["a", "b"]), &strings(&["|"]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Alignment {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn standard_derivations_order_puts_conditional_last() {
        let ds = standard_derivations(&inputs());
        assert_eq!(ds.len(), 5);
        assert_eq!(ds.last().unwrap().output, COMPLEMGRAM_BEST_COND);
        let best_pos = ds.iter().position(|d| d.output == COMPLEMGRAM_BEST).unwrap();
        assert!(best_pos < ds.len() - 1);
    }

    #[test]
    fn derive_all_writes_every_output() {
        let dir = TempDir::new().unwrap();
        let wd = WorkDir::new(dir.path(), None);
        for file in ["doc1", "doc2"] {
            wd.write_annotation(file, "saldo.complemgram", &strings(&["|a+b:0.5|", "|c+d:0.9|"]))
                .unwrap();
            wd.write_annotation(file, "wsd.sense", &strings(&["|x..1:0.9|", "|"]))
                .unwrap();
            wd.write_annotation(file, "baseform", &strings(&["|hund|", "|katt|kattor|"]))
                .unwrap();
            wd.write_annotation(file, "lemgram", &strings(&["|hund..nn.1|", "|"]))
                .unwrap();
        }

        let files = strings(&["doc1", "doc2"]);
        let tokens = derive_all(
            &wd,
            &files,
            &standard_derivations(&inputs()),
            &ProgressBar::hidden(),
        )
        .unwrap();
        assert_eq!(tokens, 4);

        assert_eq!(
            wd.read_all("doc1", SENSE_BEST).unwrap(),
            strings(&["x..1", ""])
        );
        assert_eq!(
            wd.read_all("doc2", BASEFORM_FIRST).unwrap(),
            strings(&["hund", "katt"])
        );
        assert_eq!(
            wd.read_all("doc2", LEMGRAM_FIRST).unwrap(),
            strings(&["hund..nn.1", ""])
        );
        // First token has a sense, so its compound analysis is dropped.
        assert_eq!(
            wd.read_all("doc1", COMPLEMGRAM_BEST_COND).unwrap(),
            strings(&["", "c+d"])
        );
    }

    #[test]
    fn project_values_maps_tokens_to_spans() {
        let spans = strings(&["1897", "2003-05-01"]);
        let parents = strings(&["0", "0", "", "1"]);
        assert_eq!(
            project_values("doc1", "token.text", &spans, &parents).unwrap(),
            strings(&["1897", "1897", "", "2003-05-01"])
        );
        let err = project_values("doc1", "token.text", &spans, &strings(&["2"])).unwrap_err();
        assert!(err.is_io());
        assert!(err.to_string().contains("token.text"));
    }

    #[test]
    fn text_level_dates_become_token_values() {
        let dir = TempDir::new().unwrap();
        let wd = WorkDir::new(dir.path(), None);
        // Two texts: three tokens in the first, two in the second
        wd.write_annotation("doc1", "text.date", &strings(&["1897", "1901"]))
            .unwrap();
        wd.write_annotation("doc1", "token.text", &strings(&["0", "0", "0", "1", "1"]))
            .unwrap();

        let ds = [span_projection("text.date", "token.text")];
        let tokens = derive_all(&wd, &strings(&["doc1"]), &ds, &ProgressBar::hidden()).unwrap();
        assert_eq!(tokens, 5);
        assert_eq!(
            wd.read_all("doc1", DATE).unwrap(),
            strings(&["1897", "1897", "1897", "1901", "1901"])
        );
    }

    #[test]
    fn derive_all_missing_input_fails() {
        let dir = TempDir::new().unwrap();
        let wd = WorkDir::new(dir.path(), None);
        let files = strings(&["doc1"]);
        let err = derive_all(
            &wd,
            &files,
            &standard_derivations(&inputs()),
            &ProgressBar::hidden(),
        )
        .unwrap_err();
        assert!(err.is_io());
    }
}
