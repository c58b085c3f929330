//! Best-effort extraction of structured fields from model output.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::case::{CaseResult, ResultMetadata};
use crate::domain::gateway::GatewayResponse;
use crate::errors::ShapingError;

pub const TRUNCATION_NOTICE: &str = "model output was truncated at the token limit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapedFields {
    pub summary: String,
    pub recommendation: String,
    pub confidence: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShapeOutcome {
    Structured(ShapedFields),
    Fallback(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Label {
    Summary,
    Recommendation,
    Confidence,
}

/// Request-scoped values copied into the result metadata.
#[derive(Clone, Copy, Debug)]
pub struct ShapeContext<'a> {
    pub customer_id: &'a str,
    pub correlation_id: &'a str,
    pub prompt_fingerprint: &'a str,
}

pub fn shape(
    response: GatewayResponse,
    context: &ShapeContext<'_>,
) -> Result<CaseResult, ShapingError> {
    if let Some(error) = response.error.as_ref() {
        return Err(ShapingError::UpstreamFailure(error.clone()));
    }
    let truncated = response.is_truncated();
    let metadata = ResultMetadata {
        correlation_id: context.correlation_id.to_string(),
        model: response.model,
        attempts: response.attempts,
        input_tokens: response.usage.input_tokens,
        output_tokens: response.usage.output_tokens,
        stop_reason: response.stop_reason,
        prompt_fingerprint: context.prompt_fingerprint.to_string(),
    };
    let content = response.content.ok_or(ShapingError::MissingContent)?;
    let error = truncated.then(|| TRUNCATION_NOTICE.to_string());

    let result = match extract(&content) {
        ShapeOutcome::Structured(fields) => CaseResult {
            customer_id: context.customer_id.to_string(),
            summary: Some(fields.summary),
            recommendation: Some(fields.recommendation),
            confidence: fields.confidence,
            raw_text: None,
            shape_degraded: false,
            error,
            metadata,
        },
        ShapeOutcome::Fallback(raw_text) => CaseResult {
            customer_id: context.customer_id.to_string(),
            summary: None,
            recommendation: None,
            confidence: None,
            raw_text: Some(raw_text),
            shape_degraded: true,
            error,
            metadata,
        },
    };

    Ok(result)
}

pub fn extract(text: &str) -> ShapeOutcome {
    let mut summary = None;
    let mut recommendation = None;
    let mut confidence = None;

    let matches = label_pattern().captures_iter(text).collect::<Vec<_>>();
    for (index, captures) in matches.iter().enumerate() {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value_end = matches
            .get(index + 1)
            .and_then(|next| next.get(0))
            .map(|next| next.start())
            .unwrap_or(text.len());
        let value = clean_value(&text[whole.end()..value_end]);

        match classify(name.as_str()) {
            Label::Summary if summary.is_none() && !value.is_empty() => summary = Some(value),
            Label::Recommendation if recommendation.is_none() && !value.is_empty() => {
                recommendation = Some(value)
            }
            Label::Confidence if confidence.is_none() => confidence = parse_confidence(&value),
            _ => {}
        }
    }

    match (summary, recommendation) {
        (Some(summary), Some(recommendation)) => {
            ShapeOutcome::Structured(ShapedFields { summary, recommendation, confidence })
        }
        _ => ShapeOutcome::Fallback(text.to_string()),
    }
}

/// Labels count only at the start of a line or of a sentence, so a word like
/// "score:" inside a value does not split it.
fn label_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?im)(?:^|[.!?;]\s+)[ \t]*(?:[-*][ \t]+)?(?:\*\*|__)?\b(summary|justification|recommended[ _]action|recommendation|next[ _]action|action|confidence|score)\b(?:\*\*|__)?\s*:",
        )
        .unwrap_or_else(|error| panic!("label pattern must compile: {error}"))
    })
}

fn classify(label: &str) -> Label {
    let normalized = label.to_ascii_lowercase();
    match normalized.as_str() {
        "summary" | "justification" => Label::Summary,
        "confidence" | "score" => Label::Confidence,
        _ => Label::Recommendation,
    }
}

fn clean_value(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let unwrapped = collapsed.trim_matches(|ch: char| ch == '*' || ch == '`').trim();
    unwrapped.strip_suffix('.').unwrap_or(unwrapped).trim().to_string()
}

fn parse_confidence(value: &str) -> Option<u8> {
    let digits = value
        .chars()
        .skip_while(|ch| !ch.is_ascii_digit())
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    if digits.is_empty() {
        return None;
    }
    let significant = digits.trim_start_matches('0');
    if significant.len() > 3 {
        return Some(100);
    }
    Some(significant.parse::<u16>().unwrap_or(0).min(100) as u8)
}
