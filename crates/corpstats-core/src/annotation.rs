//! Multi-valued token annotations and canonical value selection.
//!
//! A set annotation is encoded as `|v0|v1|…|`, rank 0 first. Upstream
//! analysers emit sets already ordered: by descending score for scored sets
//! (senses, compound analyses), by first occurrence otherwise (baseforms,
//! lemgrams).

use std::fmt;

/// Separator between set elements.
pub const SET_DELIMITER: char = '|';

/// Separator between a value and its score in scored sets.
pub const SCORE_SEPARATOR: char = ':';

/// Sentinel written for a set annotation with no values.
pub const EMPTY_SET: &str = "|";

/// One candidate value, with the score split off for scored sets.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub value: String,
    pub score: Option<f64>,
}

/// Rank-ordered candidate values for a single token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationSet {
    candidates: Vec<Candidate>,
}

impl AnnotationSet {
    /// Parse an unscored set. A plain value is a set of one element.
    pub fn parse(raw: &str) -> Self {
        let candidates = elements(raw)
            .map(|v| Candidate {
                value: v.to_string(),
                score: None,
            })
            .collect();
        Self { candidates }
    }

    /// Parse a scored set (`value:score` elements).
    ///
    /// The suffix after the last `:` is treated as a score only if it parses
    /// as a number; otherwise the element is kept whole.
    pub fn parse_scored(raw: &str) -> Self {
        let candidates = elements(raw).map(split_score).collect();
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    fn rank0(&self) -> &str {
        self.candidates.first().map_or("", |c| c.value.as_str())
    }
}

impl fmt::Display for AnnotationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(EMPTY_SET)?;
        for c in &self.candidates {
            match c.score {
                Some(score) => write!(f, "{}{SCORE_SEPARATOR}{score}{SET_DELIMITER}", c.value)?,
                None => write!(f, "{}{SET_DELIMITER}", c.value)?,
            }
        }
        Ok(())
    }
}

fn elements(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(SET_DELIMITER).filter(|v| !v.is_empty())
}

fn split_score(element: &str) -> Candidate {
    if let Some((value, score)) = element.rsplit_once(SCORE_SEPARATOR) {
        if let Ok(score) = score.parse::<f64>() {
            return Candidate {
                value: value.to_string(),
                score: Some(score),
            };
        }
    }
    Candidate {
        value: element.to_string(),
        score: None,
    }
}

/// How a canonical value is picked out of a set.
///
/// Both rules take rank 0. They are kept apart because the name records what
/// the source guarantees: `Best` for sets sorted by score, `First` for sets
/// that are merely in order of first occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionRule {
    Best,
    First,
}

impl SelectionRule {
    pub fn select(self, set: &AnnotationSet) -> String {
        match self {
            Self::Best => best(set),
            Self::First => first(set),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::First => "first",
        }
    }
}

impl fmt::Display for SelectionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Highest-scored value of a score-sorted set, `""` when empty.
pub fn best(set: &AnnotationSet) -> String {
    set.rank0().to_string()
}

/// First value of a set, `""` when empty.
pub fn first(set: &AnnotationSet) -> String {
    set.rank0().to_string()
}

/// Drop `value` when `companion` carries an annotation.
///
/// Used to drop a compound analysis when the token already has a sense, so
/// overlapping analyses are not counted twice.
pub fn suppress_if(value: &str, companion: &str) -> String {
    if !companion.is_empty() && companion != EMPTY_SET {
        String::new()
    } else {
        value.to_string()
    }
}
