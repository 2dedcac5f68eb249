use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use tweetwise_types::api::{Correction, Critique, Curation};
use tweetwise_types::models::SuggestionKind;

/// Parses model output into the kind's payload object. The bool is the
/// degraded flag: true means the output was unusable and the payload
/// is a safe default, so callers can tell "no issues found" apart from
/// "analysis failed".
pub fn parse_payload(kind: SuggestionKind, raw: &str) -> (Value, bool) {
    match kind {
        SuggestionKind::Spelling | SuggestionKind::Grammar => {
            let (suggestions, degraded) = parse_corrections(raw);
            (
                serde_json::json!({ "suggestions": suggestions }),
                degraded,
            )
        }
        SuggestionKind::Critique => {
            let (critique, degraded) = parse_critique(raw);
            (serde_json::json!({ "critique": critique }), degraded)
        }
        SuggestionKind::Curation => {
            let (curation, degraded) = parse_curation(raw);
            (serde_json::json!({ "curation": curation }), degraded)
        }
    }
}

#[derive(Deserialize)]
struct CorrectionList {
    #[serde(default)]
    suggestions: Vec<Correction>,
}

pub fn parse_corrections(raw: &str) -> (Vec<Correction>, bool) {
    match from_model_json::<CorrectionList>(raw) {
        Some(list) => (list.suggestions, false),
        None => {
            warn!("Unparseable correction output, degrading to empty list");
            (Vec::new(), true)
        }
    }
}

/// Raw critique with unclamped scores; the model occasionally returns
/// 0 or 11.
#[derive(Deserialize)]
struct RawCritique {
    engagement_score: i64,
    clarity_score: i64,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvements: Vec<String>,
    #[serde(default)]
    overall: String,
}

pub fn parse_critique(raw: &str) -> (Critique, bool) {
    match from_model_json::<RawCritique>(raw) {
        Some(c) => (
            Critique {
                engagement_score: clamp_score(c.engagement_score),
                clarity_score: clamp_score(c.clarity_score),
                strengths: c.strengths,
                improvements: c.improvements,
                overall: c.overall,
            },
            false,
        ),
        None => {
            warn!("Unparseable critique output, degrading to neutral critique");
            (neutral_critique(), true)
        }
    }
}

pub fn parse_curation(raw: &str) -> (Curation, bool) {
    match from_model_json::<Curation>(raw) {
        Some(c) => (c, false),
        None => {
            warn!("Unparseable curation output, degrading to empty curation");
            (
                Curation {
                    variants: Vec::new(),
                    hashtags: Vec::new(),
                },
                true,
            )
        }
    }
}

pub fn clamp_score(value: i64) -> u8 {
    value.clamp(1, 10) as u8
}

fn neutral_critique() -> Critique {
    Critique {
        engagement_score: 5,
        clarity_score: 5,
        strengths: Vec::new(),
        improvements: Vec::new(),
        overall: "Analysis unavailable for this text.".to_string(),
    }
}

/// Models wrap JSON in markdown fences often enough that stripping
/// them is table stakes.
fn from_model_json<T: serde::de::DeserializeOwned>(raw: &str) -> Option<T> {
    serde_json::from_str(strip_fences(raw)).ok()
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") up to the first newline
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}
