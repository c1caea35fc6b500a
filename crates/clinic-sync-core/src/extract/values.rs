//! Unit-aware extraction of growth values from clinical free text.
//!
//! Handles:
//! - Decimal comma or dot ("4,5 kg" and "4.5 kg")
//! - Unit conversion (g→kg, m→cm)
//! - Plausibility ranges that reject syntactically valid but clinically absurd values

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::fold_tr;

const NUMBER: &str = r"(\d+(?:[.,]\d+)?)";

static KILOGRAMS: LazyLock<Regex> = LazyLock::new(|| unit_pattern(r"(?:kg|kilogram|kilo)"));
static GRAMS: LazyLock<Regex> = LazyLock::new(|| unit_pattern(r"(?:gram|gr|g)"));
static CENTIMETRES: LazyLock<Regex> = LazyLock::new(|| unit_pattern(r"cm"));
static METRES: LazyLock<Regex> = LazyLock::new(|| unit_pattern(r"(?:metre|m)"));
static HEAD_CIRCUMFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&fold_tr(&format!(
        r"(?:baş\s*çevresi|kafa\s*çevresi|b\.\s*ç\.?)\s*[:=]?\s*{}",
        NUMBER
    )))
    .expect("head circumference pattern")
});

fn unit_pattern(unit: &str) -> Regex {
    Regex::new(&fold_tr(&format!(r"{}\s*{}\b", NUMBER, unit))).expect("unit pattern")
}

/// A measurement field that can be extracted from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    /// Body weight, canonical unit kg
    Weight,
    /// Body length/height, canonical unit cm
    Height,
    /// Head circumference, canonical unit cm
    HeadCircumference,
}

/// Which candidate wins when a field appears more than once in a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    First,
    /// Later text in a note usually carries the corrected value.
    #[default]
    Last,
}

/// Values extracted from a single text, in canonical units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractedValues {
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub head_circumference: Option<f64>,
}

impl ExtractedValues {
    /// No field produced a plausible value.
    pub fn is_empty(&self) -> bool {
        self.weight.is_none() && self.height.is_none() && self.head_circumference.is_none()
    }
}

/// A plausible match at a byte offset in the folded text.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: usize,
    value: f64,
}

/// Extractor for weight, height and head circumference.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueExtractor {
    policy: MatchPolicy,
}

impl ValueExtractor {
    pub fn new(policy: MatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Extract every field from `text`.
    pub fn extract_all(&self, text: &str) -> ExtractedValues {
        let lower = fold_tr(text);
        ExtractedValues {
            weight: self.pick(weight_candidates(&lower)),
            height: self.pick(height_candidates(&lower)),
            head_circumference: self.pick(head_candidates(&lower)),
        }
    }

    /// Extract a single field from `text`.
    pub fn extract(&self, text: &str, kind: FieldKind) -> Option<f64> {
        let lower = fold_tr(text);
        let candidates = match kind {
            FieldKind::Weight => weight_candidates(&lower),
            FieldKind::Height => height_candidates(&lower),
            FieldKind::HeadCircumference => head_candidates(&lower),
        };
        self.pick(candidates)
    }

    fn pick(&self, mut candidates: Vec<Candidate>) -> Option<f64> {
        candidates.sort_by_key(|c| c.start);
        let chosen = match self.policy {
            MatchPolicy::First => candidates.first(),
            MatchPolicy::Last => candidates.last(),
        };
        chosen.map(|c| c.value)
    }
}

fn weight_candidates(text: &str) -> Vec<Candidate> {
    let mut out = scan(text, &KILOGRAMS, 0.0..100.0, 1.0, &[]);
    out.extend(scan(text, &GRAMS, 100.0..100_000.0, 0.001, &[]));
    out
}

fn height_candidates(text: &str) -> Vec<Candidate> {
    // "baş çevresi 35 cm" is a head circumference, not a height
    let head_spans: Vec<Range<usize>> = HEAD_CIRCUMFERENCE
        .find_iter(text)
        .map(|m| m.range())
        .collect();

    let mut out = scan(text, &CENTIMETRES, 20.0..250.0, 1.0, &head_spans);
    out.extend(scan(text, &METRES, 0.2..2.5, 100.0, &[]));
    out
}

fn head_candidates(text: &str) -> Vec<Candidate> {
    scan(text, &HEAD_CIRCUMFERENCE, 20.0..70.0, 1.0, &[])
}

/// Collect matches whose raw number lies strictly inside `bounds`, scaled to the
/// canonical unit. Matches whose number starts inside an `excluded` span are ignored.
fn scan(
    text: &str,
    pattern: &Regex,
    bounds: Range<f64>,
    scale: f64,
    excluded: &[Range<usize>],
) -> Vec<Candidate> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| {
            let number = caps.get(1)?;
            if excluded.iter().any(|span| span.contains(&number.start())) {
                return None;
            }
            let raw = parse_number(&caps)?;
            let plausible = raw > bounds.start && raw < bounds.end;
            plausible.then(|| Candidate {
                start: number.start(),
                value: round3(raw * scale),
            })
        })
        .collect()
}

fn parse_number(caps: &Captures<'_>) -> Option<f64> {
    caps.get(1)?.as_str().replace(',', ".").parse().ok()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
