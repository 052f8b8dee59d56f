//! Score normalization.
//!
//! Grading records arrive in one of three shapes and are reduced to a single
//! `{earned, possible, percentage, letterGrade}` value. Multi-worksheet
//! averages always go through [`Rollup`], which sums points before dividing.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

const AGGREGATE_TOTAL_KEYS: &[&str] = &["totalPoints", "total_points"];
const AGGREGATE_EARNED_KEYS: &[&str] = &["totalPointsEarned", "total_points_earned"];
const QUESTIONS_KEYS: &[&str] = &["questions"];
const PERCENT_KEYS: &[&str] = &["totalScore", "total_score"];
const COMMON_ERROR_KEYS: &[&str] = &["commonErrors", "common_errors"];
const QUESTION_SCORE_KEYS: &[&str] = &["score"];
const QUESTION_MAX_KEYS: &[&str] = &["maxScore", "max_score"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub(crate) enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    pub(crate) fn from_percentage(percentage: u32) -> Self {
        match percentage {
            90.. => Self::A,
            80..=89 => Self::B,
            70..=79 => Self::C,
            60..=69 => Self::D,
            _ => Self::F,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NormalizedScore {
    pub(crate) earned: f64,
    pub(crate) possible: f64,
    pub(crate) percentage: u32,
    pub(crate) letter_grade: LetterGrade,
}

impl NormalizedScore {
    pub(crate) fn from_totals(earned: f64, possible: f64) -> Self {
        let percentage = percentage(earned, possible);
        Self { earned, possible, percentage, letter_grade: LetterGrade::from_percentage(percentage) }
    }
}

/// `round(earned / possible * 100)`, or 0 when nothing was possible.
/// Negative results clamp to 0; extra credit above 100 is kept.
pub(crate) fn percentage(earned: f64, possible: f64) -> u32 {
    if possible <= 0.0 || !possible.is_finite() || !earned.is_finite() {
        return 0;
    }
    let value = (earned / possible * 100.0).round();
    if value <= 0.0 {
        0
    } else {
        value as u32
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QuestionScore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) max_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub(crate) detail: Map<String, Value>,
}

impl QuestionScore {
    pub(crate) fn earned(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }

    pub(crate) fn possible(&self) -> f64 {
        self.max_score.unwrap_or(1.0)
    }

    fn from_record(value: &Value) -> Self {
        let Some(map) = value.as_object() else {
            return Self { score: number(value), max_score: None, detail: Map::new() };
        };
        let detail = map
            .iter()
            .filter(|(key, _)| {
                !QUESTION_SCORE_KEYS.contains(&key.as_str())
                    && !QUESTION_MAX_KEYS.contains(&key.as_str())
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self {
            score: field(map, QUESTION_SCORE_KEYS).and_then(number),
            max_score: field(map, QUESTION_MAX_KEYS).and_then(number),
            detail,
        }
    }
}

/// The three score shapes a grading record can take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum ScoreShape {
    AggregatePoints {
        #[serde(rename = "totalPoints")]
        total_points: f64,
        #[serde(rename = "totalPointsEarned")]
        total_points_earned: f64,
    },
    QuestionList {
        questions: Vec<QuestionScore>,
    },
    BarePercentage {
        #[serde(rename = "totalScore")]
        total_score: f64,
    },
}

impl ScoreShape {
    /// `(earned, possible)` for this shape.
    pub(crate) fn points(&self) -> (f64, f64) {
        match self {
            Self::AggregatePoints { total_points, total_points_earned } => {
                (*total_points_earned, *total_points)
            }
            Self::QuestionList { questions } => question_totals(questions),
            Self::BarePercentage { total_score } => (*total_score, 100.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawGradingResult {
    pub(crate) score: ScoreShape,
    #[serde(default)]
    pub(crate) common_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub(crate) detail: Map<String, Value>,
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum ShapeError {
    #[error("grading record is not a JSON object")]
    NotAnObject,
    #[error("grading record has no totalPoints/totalPointsEarned, questions, or totalScore")]
    Unrecognized,
}

impl RawGradingResult {
    pub(crate) fn aggregate(earned: f64, possible: f64) -> Self {
        Self::from_shape(ScoreShape::AggregatePoints {
            total_points: possible,
            total_points_earned: earned,
        })
    }

    pub(crate) fn question_list(questions: Vec<QuestionScore>) -> Self {
        Self::from_shape(ScoreShape::QuestionList { questions })
    }

    pub(crate) fn bare_percentage(total_score: f64) -> Self {
        Self::from_shape(ScoreShape::BarePercentage { total_score })
    }

    fn from_shape(score: ScoreShape) -> Self {
        Self { score, common_errors: Vec::new(), detail: Map::new() }
    }

    /// Classifies a free-form grading record. The first matching shape wins:
    /// aggregate points, then a question list, then a bare percentage.
    pub(crate) fn from_record(record: &Value) -> Result<Self, ShapeError> {
        let map = record.as_object().ok_or(ShapeError::NotAnObject)?;

        let aggregate = field(map, AGGREGATE_TOTAL_KEYS)
            .and_then(number)
            .zip(field(map, AGGREGATE_EARNED_KEYS).and_then(number));
        let questions = field(map, QUESTIONS_KEYS).and_then(Value::as_array);
        let bare = field(map, PERCENT_KEYS).and_then(number);

        let score = if let Some((total_points, total_points_earned)) = aggregate {
            ScoreShape::AggregatePoints { total_points, total_points_earned }
        } else if let Some(questions) = questions {
            ScoreShape::QuestionList {
                questions: questions.iter().map(QuestionScore::from_record).collect(),
            }
        } else if let Some(total_score) = bare {
            ScoreShape::BarePercentage { total_score }
        } else {
            return Err(ShapeError::Unrecognized);
        };

        let common_errors = field(map, COMMON_ERROR_KEYS)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let consumed = [
            AGGREGATE_TOTAL_KEYS,
            AGGREGATE_EARNED_KEYS,
            PERCENT_KEYS,
            COMMON_ERROR_KEYS,
        ];
        let mut detail = Map::new();
        for (key, value) in map {
            let is_consumed = consumed.iter().any(|keys| keys.contains(&key.as_str()));
            let is_scored_questions =
                QUESTIONS_KEYS.contains(&key.as_str()) && matches!(score, ScoreShape::QuestionList { .. });
            if !is_consumed && !is_scored_questions {
                detail.insert(key.clone(), value.clone());
            }
        }

        Ok(Self { score, common_errors, detail })
    }

    pub(crate) fn with_common_errors(mut self, common_errors: Vec<String>) -> Self {
        self.common_errors = common_errors;
        self
    }

    pub(crate) fn with_detail(mut self, key: &str, value: Value) -> Self {
        self.detail.insert(key.to_string(), value);
        self
    }

    pub(crate) fn questions(&self) -> Option<&[QuestionScore]> {
        match &self.score {
            ScoreShape::QuestionList { questions } => Some(questions),
            _ => None,
        }
    }
}

/// A manual per-question correction, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) struct ScoreOverride {
    pub(crate) question: usize,
    pub(crate) score: f64,
}

#[derive(Debug, Error, PartialEq)]
pub(crate) enum OverrideError {
    #[error("per-question overrides need a question-list grading result")]
    NoQuestions,
    #[error("question {question} does not exist (result has {available} questions)")]
    UnknownQuestion { question: usize, available: usize },
}

pub(crate) fn normalize(raw: &RawGradingResult) -> NormalizedScore {
    let (earned, possible) = raw.score.points();
    NormalizedScore::from_totals(earned, possible)
}

pub(crate) fn normalize_with_overrides(
    raw: &RawGradingResult,
    overrides: &[ScoreOverride],
) -> Result<NormalizedScore, OverrideError> {
    if overrides.is_empty() {
        return Ok(normalize(raw));
    }
    let questions = raw.questions().ok_or(OverrideError::NoQuestions)?;
    let adjusted = apply_overrides(questions, overrides)?;
    let (earned, possible) = question_totals(&adjusted);
    Ok(NormalizedScore::from_totals(earned, possible))
}

pub(crate) fn apply_overrides(
    questions: &[QuestionScore],
    overrides: &[ScoreOverride],
) -> Result<Vec<QuestionScore>, OverrideError> {
    let mut adjusted = questions.to_vec();
    for item in overrides {
        let available = adjusted.len();
        let target = item
            .question
            .checked_sub(1)
            .and_then(|index| adjusted.get_mut(index))
            .ok_or(OverrideError::UnknownQuestion { question: item.question, available })?;
        target.score = Some(item.score);
    }
    Ok(adjusted)
}

pub(crate) fn question_totals(questions: &[QuestionScore]) -> (f64, f64) {
    questions.iter().fold((0.0, 0.0), |(earned, possible), question| {
        (earned + question.earned(), possible + question.possible())
    })
}

/// Additive accumulator for multi-worksheet averages.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct Rollup {
    pub(crate) earned: f64,
    pub(crate) possible: f64,
    pub(crate) count: usize,
}

impl Rollup {
    pub(crate) fn add(&mut self, score: &NormalizedScore) {
        self.earned += score.earned;
        self.possible += score.possible;
        self.count += 1;
    }

    pub(crate) fn merge(&mut self, other: &Rollup) {
        self.earned += other.earned;
        self.possible += other.possible;
        self.count += other.count;
    }

    pub(crate) fn percentage(&self) -> u32 {
        percentage(self.earned, self.possible)
    }

    /// `None` when nothing contributed; callers render that as "N/A".
    pub(crate) fn score(&self) -> Option<NormalizedScore> {
        (self.count > 0).then(|| NormalizedScore::from_totals(self.earned, self.possible))
    }
}

fn field<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| map.get(*key)).filter(|value| !value.is_null())
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|value| value.is_finite())
}
