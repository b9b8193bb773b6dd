//! Reconciliation candidates and their sub-score vectors.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Sub-score keys reported in the output, in column order.
pub const SUB_SCORE_KEYS: [&str; 7] = [
    "ElasticOriginalNameEntry",
    "ElasticNameOnly",
    "ElasticSeventyFive",
    "OriginalLength",
    "OriginalLengthDifference",
    "EntityTypeFilter",
    "MultiStage:ElasticNameOnly:SNACDegree",
];

/// Written in place of a sub-score the service did not report.
pub const ABSENT_SCORE: &str = "0";

/// One proposed match for a name query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    /// First name entry of the matched identity
    pub name: String,

    /// Stable ARK identifier of the matched identity
    pub ark: String,

    /// Overall match strength (0.0 - 1.0)
    pub strength: f64,

    /// Named sub-scores, if the service sent a vector at all
    pub vector: Option<ScoreVector>,
}

impl Candidate {
    /// Read a candidate from one element of the `reconciliation` list.
    ///
    /// Returns `None` when the identity name, ARK or strength is missing or
    /// mistyped. A missing or non-object `vector` is not an error; it is
    /// recorded as `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        let identity = value.get("identity")?;
        let name = identity
            .get("nameEntries")?
            .get(0)?
            .get("original")?
            .as_str()?
            .to_string();
        let ark = identity.get("ark")?.as_str()?.to_string();
        let strength = number(value.get("strength")?)?;
        let vector = value.get("vector").and_then(ScoreVector::from_value);

        Some(Self {
            name,
            ark,
            strength,
            vector,
        })
    }

    pub fn has_vector(&self) -> bool {
        self.vector.is_some()
    }

    /// Strength rounded to two decimals.
    pub fn formatted_strength(&self) -> String {
        format!("{:.2}", self.strength)
    }

    /// Sub-scores in [`SUB_SCORE_KEYS`] order, `"0"` where absent.
    pub fn formatted_sub_scores(&self) -> [String; 7] {
        SUB_SCORE_KEYS.map(|key| match &self.vector {
            Some(vector) => vector.formatted(key),
            None => ABSENT_SCORE.to_string(),
        })
    }
}

/// Numeric sub-scores keyed by name.
///
/// Non-numeric entries are dropped on read, so they read back as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreVector {
    scores: BTreeMap<String, f64>,
}

impl ScoreVector {
    /// Read a vector from a JSON object. Returns `None` for non-objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let scores = object
            .iter()
            .filter_map(|(key, score)| number(score).map(|n| (key.clone(), n)))
            .collect();
        Some(Self { scores })
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.scores.get(key).copied()
    }

    /// The score as the service would print it, or `"0"` if absent.
    pub fn formatted(&self, key: &str) -> String {
        self.get(key)
            .map(format_score)
            .unwrap_or_else(|| ABSENT_SCORE.to_string())
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ScoreVector {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self {
            scores: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Scores in `[1e-3, 1e7)` print in decimal form with no trailing zeros.
const DECIMAL_RANGE: std::ops::Range<f64> = 1e-3..1e7;

/// The score in the service's number form.
///
/// Decimal form drops a zero fraction (`1.0` prints as `1`, `0.25` as
/// `0.25`). Outside the decimal range the exponent form keeps at least one
/// fraction digit (`1e-7` prints as `1.0E-7`, `1.5e10` as `1.5E10`).
pub fn format_score(score: f64) -> String {
    if !score.is_finite() {
        return ABSENT_SCORE.to_string();
    }
    if score == 0.0 || DECIMAL_RANGE.contains(&score.abs()) {
        return format!("{}", score);
    }

    let scientific = format!("{:e}", score);
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => {
            format!("{}E{}", mantissa, exponent)
        }
        Some((mantissa, exponent)) => format!("{}.0E{}", mantissa, exponent),
        None => scientific,
    }
}

/// Read a JSON number, or a string holding one.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
