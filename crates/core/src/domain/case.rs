use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Inbound CRM case. `customer_id` and `description` are required; unknown
/// fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct CaseRequest {
    /// CRM customer identifier (required).
    #[schema(example = "C-1")]
    pub customer_id: Option<String>,
    /// Free-text description of the issue or opportunity (required).
    #[schema(example = "Billing dispute")]
    pub description: Option<String>,
    pub subject: Option<String>,
    pub priority: Option<String>,
    pub account: Option<AccountInfo>,
    /// Prior interactions, oldest first.
    pub history: Vec<InteractionEntry>,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AccountInfo {
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub website: Option<String>,
}

impl AccountInfo {
    /// Labelled, non-blank fields in prompt order.
    pub fn labelled_fields(&self) -> Vec<(&'static str, &str)> {
        [
            ("Company", &self.company_name),
            ("Industry", &self.industry),
            ("Location", &self.location),
            ("Contact", &self.contact_name),
            ("Email", &self.contact_email),
            ("Website", &self.website),
        ]
        .into_iter()
        .filter_map(|(label, value)| non_blank(value.as_deref()).map(|value| (label, value)))
        .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct InteractionEntry {
    #[schema(example = "email")]
    pub channel: Option<String>,
    #[schema(example = "2024-03-01")]
    pub occurred_at: Option<String>,
    pub note: String,
}

/// Shaped outcome returned to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CaseResult {
    pub customer_id: String,
    pub summary: Option<String>,
    pub recommendation: Option<String>,
    /// Model-reported confidence, clamped to 0..=100.
    pub confidence: Option<u8>,
    /// Unmodified model output when the structured format was not found.
    pub raw_text: Option<String>,
    pub shape_degraded: bool,
    /// Set when the upstream call only partially succeeded.
    pub error: Option<String>,
    pub metadata: ResultMetadata,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ResultMetadata {
    pub correlation_id: String,
    pub model: Option<String>,
    pub attempts: u32,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
    pub stop_reason: Option<String>,
    pub prompt_fingerprint: String,
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
