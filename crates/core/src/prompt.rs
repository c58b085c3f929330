//! Deterministic CaseRequest → PromptDocument rendering.
//!
//! Section order is fixed so rendered prompts can be compared byte-for-byte:
//!
//! 1. `CASE` (customer id, subject, priority)
//! 2. `ACCOUNT` (present fields only; omitted when empty)
//! 3. `CONTACT ANALYSIS` (only with a contact email)
//! 4. `DESCRIPTION`
//! 5. `HISTORY` (newest `max_history_entries`, oldest first)
//! 6. `NOTES`
//! 7. `RESPONSE FORMAT`
//!
//! Free text longer than `max_field_chars` characters is cut and suffixed with
//! an explicit `[truncated: N characters omitted]` marker.

use std::borrow::Cow;

use sha2::{Digest, Sha256};

use crate::config::PromptConfig;
use crate::domain::case::{non_blank, AccountInfo, CaseRequest, InteractionEntry};
use crate::errors::ValidationError;

pub const SYSTEM_PROMPT: &str = "You are an expert customer-relationship analyst reviewing CRM cases \
for a services company. Base every statement on the case data provided and respond only in the \
requested format.";

pub const RESPONSE_FORMAT_SECTION: &str = "=== RESPONSE FORMAT ===
Respond in this EXACT format:

Summary: [one or two sentences summarising the case]
Action: [one specific, actionable next step]
Confidence: [number 0-100]";

const GENERIC_EMAIL_DOMAINS: [&str; 5] =
    ["gmail.com", "yahoo.com", "hotmail.com", "outlook.com", "aol.com"];

/// Required fields, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 2] = ["customer_id", "description"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptDocument {
    system: String,
    user: String,
    fingerprint: String,
}

impl PromptDocument {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        let system = system.into();
        let user = user.into();
        let fingerprint = fingerprint(&system, &user);
        Self { system, user, fingerprint }
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Hex SHA-256 over both parts; safe to log in place of the prompt body.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

#[derive(Clone, Debug, Default)]
pub struct PromptBuilder {
    settings: PromptConfig,
}

impl PromptBuilder {
    pub fn new(settings: PromptConfig) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PromptConfig {
        &self.settings
    }

    pub fn build(&self, case: &CaseRequest) -> Result<PromptDocument, ValidationError> {
        let validated = validate_case(case)?;
        let mut sections = Vec::new();

        sections.push(self.case_section(&validated, case));

        if let Some(account) = &case.account {
            if let Some(section) = self.account_section(account) {
                sections.push(section);
            }
            if let Some(email) = non_blank(account.contact_email.as_deref()) {
                sections.push(format!(
                    "=== CONTACT ANALYSIS ===\n{}",
                    analyze_contact_email(email, account.website.as_deref())
                ));
            }
        }

        sections.push(format!(
            "=== DESCRIPTION ===\n{}",
            truncate_field(validated.description, self.settings.max_field_chars)
        ));

        if let Some(section) = self.history_section(&case.history) {
            sections.push(section);
        }

        if let Some(notes) = non_blank(case.notes.as_deref()) {
            sections.push(format!(
                "=== NOTES ===\n{}",
                truncate_field(notes, self.settings.max_field_chars)
            ));
        }

        sections.push(RESPONSE_FORMAT_SECTION.to_string());

        Ok(PromptDocument::new(SYSTEM_PROMPT, sections.join("\n\n")))
    }

    fn case_section(&self, validated: &ValidatedCase<'_>, case: &CaseRequest) -> String {
        let mut lines = vec![
            "=== CASE ===".to_string(),
            format!("Customer ID: {}", validated.customer_id),
        ];
        if let Some(subject) = non_blank(case.subject.as_deref()) {
            lines.push(format!(
                "Subject: {}",
                truncate_field(subject, self.settings.max_field_chars)
            ));
        }
        if let Some(priority) = non_blank(case.priority.as_deref()) {
            lines.push(format!("Priority: {priority}"));
        }
        lines.join("\n")
    }

    fn account_section(&self, account: &AccountInfo) -> Option<String> {
        let fields = account.labelled_fields();
        if fields.is_empty() {
            return None;
        }

        let mut lines = vec!["=== ACCOUNT ===".to_string()];
        lines.extend(fields.into_iter().map(|(label, value)| {
            format!("{label}: {}", truncate_field(value, self.settings.max_field_chars))
        }));
        Some(lines.join("\n"))
    }

    fn history_section(&self, history: &[InteractionEntry]) -> Option<String> {
        let entries =
            history.iter().filter(|entry| !entry.note.trim().is_empty()).collect::<Vec<_>>();
        if entries.is_empty() {
            return None;
        }

        let dropped = entries.len().saturating_sub(self.settings.max_history_entries);
        let mut lines = vec!["=== HISTORY ===".to_string()];
        if dropped > 0 {
            let noun = if dropped == 1 { "entry" } else { "entries" };
            lines.push(format!("({dropped} earlier {noun} omitted)"));
        }

        for (index, entry) in entries.iter().skip(dropped).enumerate() {
            let mut line = format!("{}. ", index + 1);
            if let Some(occurred_at) = non_blank(entry.occurred_at.as_deref()) {
                line.push_str(&format!("[{occurred_at}] "));
            }
            if let Some(channel) = non_blank(entry.channel.as_deref()) {
                line.push_str(&format!("({channel}) "));
            }
            line.push_str(&truncate_field(&entry.note, self.settings.max_field_chars));
            lines.push(line);
        }

        Some(lines.join("\n"))
    }
}

/// Borrowed view of a case whose required fields are known to be present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ValidatedCase<'a> {
    pub customer_id: &'a str,
    pub description: &'a str,
}

pub fn validate_case(case: &CaseRequest) -> Result<ValidatedCase<'_>, ValidationError> {
    let customer_id = non_blank(case.customer_id.as_deref())
        .ok_or_else(|| ValidationError::missing(REQUIRED_FIELDS[0]))?;
    if case.description.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        return Err(ValidationError::missing(REQUIRED_FIELDS[1]));
    }
    let description = case.description.as_deref().unwrap_or_default();

    Ok(ValidatedCase { customer_id, description })
}

pub fn truncate_field(value: &str, max_chars: usize) -> Cow<'_, str> {
    let total = value.chars().count();
    if total <= max_chars {
        return Cow::Borrowed(value);
    }

    let kept = value.chars().take(max_chars).collect::<String>();
    Cow::Owned(format!("{kept} [truncated: {} characters omitted]", total - max_chars))
}

/// Describes how trustworthy a contact address looks relative to the account website.
pub fn analyze_contact_email(email: &str, website: Option<&str>) -> String {
    let domain = match email.trim().split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.trim().is_empty() => {
            domain.trim().to_ascii_lowercase()
        }
        _ => return "Invalid email format".to_string(),
    };

    if GENERIC_EMAIL_DOMAINS.contains(&domain.as_str()) {
        return format!("Generic email domain ({domain}) - less professional");
    }

    let website_host = non_blank(website).map(website_host).filter(|host| !host.is_empty());
    match website_host {
        Some(host) if domain.contains(&host) || host.contains(&domain) => {
            format!("Professional email - domain matches website ({domain})")
        }
        Some(_) => format!("Email domain ({domain}) doesn't match website"),
        None => format!("Professional email domain ({domain})"),
    }
}

fn website_host(website: &str) -> String {
    let lowered = website.trim().to_ascii_lowercase();
    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let without_www = without_scheme.strip_prefix("www.").unwrap_or(without_scheme);
    without_www.split('/').next().unwrap_or_default().to_string()
}

fn fingerprint(system: &str, user: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(system.as_bytes());
    hasher.update([0u8]);
    hasher.update(user.as_bytes());
    hasher.finalize().iter().map(|byte| format!("{byte:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::{
        analyze_contact_email, truncate_field, PromptBuilder, RESPONSE_FORMAT_SECTION,
        SYSTEM_PROMPT,
    };
    use crate::config::PromptConfig;
    use crate::domain::case::{AccountInfo, CaseRequest, InteractionEntry};

    fn minimal_case() -> CaseRequest {
        CaseRequest {
            customer_id: Some("C-1".to_string()),
            description: Some("Billing dispute".to_string()),
            ..CaseRequest::default()
        }
    }

    fn entry(note: &str) -> InteractionEntry {
        InteractionEntry { note: note.to_string(), ..InteractionEntry::default() }
    }

    #[test]
    fn minimal_case_renders_golden_prompt() {
        let prompt = PromptBuilder::default().build(&minimal_case()).expect("valid case");

        assert_eq!(prompt.system(), SYSTEM_PROMPT);
        assert_eq!(
            prompt.user(),
            format!(
                "=== CASE ===\nCustomer ID: C-1\n\n=== DESCRIPTION ===\nBilling dispute\n\n{RESPONSE_FORMAT_SECTION}"
            )
        );
    }

    #[test]
    fn build_is_deterministic() {
        let mut case = minimal_case();
        case.subject = Some("Invoice #44".to_string());
        case.history = vec![entry("called about invoice"), entry("sent credit memo")];
        let builder = PromptBuilder::default();

        let first = builder.build(&case).expect("valid case");
        let second = builder.build(&case.clone()).expect("valid case");

        assert_eq!(first, second);
        assert_eq!(first.fingerprint(), second.fingerprint());
        assert_eq!(first.fingerprint().len(), 64);
    }

    #[test]
    fn missing_description_is_named() {
        let case = CaseRequest { customer_id: Some("C-1".to_string()), ..CaseRequest::default() };
        let error = PromptBuilder::default().build(&case).expect_err("description is required");
        assert_eq!(error.field, "description");
    }

    #[test]
    fn blank_customer_id_is_named_first() {
        let case = CaseRequest {
            customer_id: Some("   ".to_string()),
            description: None,
            ..CaseRequest::default()
        };
        let error = PromptBuilder::default().build(&case).expect_err("customer_id is required");
        assert_eq!(error.field, "customer_id");
    }

    #[test]
    fn sections_follow_fixed_order() {
        let case = CaseRequest {
            customer_id: Some("C-9".to_string()),
            description: Some("Renewal at risk".to_string()),
            subject: Some("Renewal".to_string()),
            priority: Some("high".to_string()),
            account: Some(AccountInfo {
                company_name: Some("Acme Consulting".to_string()),
                contact_email: Some("jane@acme.com".to_string()),
                website: Some("https://www.acme.com/about".to_string()),
                ..AccountInfo::default()
            }),
            history: vec![InteractionEntry {
                channel: Some("email".to_string()),
                occurred_at: Some("2024-03-01".to_string()),
                note: "Asked for discount".to_string(),
            }],
            notes: Some("VIP".to_string()),
        };

        let prompt = PromptBuilder::default().build(&case).expect("valid case");
        let user = prompt.user();
        let positions = [
            "=== CASE ===",
            "=== ACCOUNT ===",
            "=== CONTACT ANALYSIS ===",
            "=== DESCRIPTION ===",
            "=== HISTORY ===",
            "=== NOTES ===",
            "=== RESPONSE FORMAT ===",
        ]
        .map(|header| user.find(header).expect("section should be present"));

        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(user.contains("Priority: high"));
        assert!(user.contains("1. [2024-03-01] (email) Asked for discount"));
        assert!(user.contains("Professional email - domain matches website (acme.com)"));
    }

    #[test]
    fn long_fields_are_truncated_with_marker() {
        let builder =
            PromptBuilder::new(PromptConfig { max_field_chars: 40, max_history_entries: 20 });
        let mut case = minimal_case();
        case.description = Some("x".repeat(100));

        let prompt = builder.build(&case).expect("valid case");
        let expected = format!("{} [truncated: 60 characters omitted]", "x".repeat(40));
        assert!(prompt.user().contains(&expected));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let value = "é".repeat(10);
        assert_eq!(truncate_field(&value, 10), value);
        assert_eq!(truncate_field(&value, 4), "éééé [truncated: 6 characters omitted]");
    }

    #[test]
    fn history_keeps_newest_entries() {
        let builder =
            PromptBuilder::new(PromptConfig { max_field_chars: 4000, max_history_entries: 2 });
        let mut case = minimal_case();
        case.history = vec![entry("first"), entry("second"), entry("  "), entry("third")];

        let prompt = builder.build(&case).expect("valid case");
        assert!(prompt.user().contains("(1 earlier entry omitted)\n1. second\n2. third"));
        assert!(!prompt.user().contains("first"));

        case.history.insert(0, entry("zeroth"));
        let prompt = builder.build(&case).expect("valid case");
        assert!(prompt.user().contains("(2 earlier entries omitted)\n1. second\n2. third"));
    }

    #[test]
    fn contact_analysis_flags_generic_and_matching_domains() {
        assert_eq!(
            analyze_contact_email("ops@gmail.com", Some("acme.com")),
            "Generic email domain (gmail.com) - less professional"
        );
        assert_eq!(
            analyze_contact_email("ops@acme.com", Some("other.io")),
            "Email domain (acme.com) doesn't match website"
        );
        assert_eq!(analyze_contact_email("ops@acme.com", None), "Professional email domain (acme.com)");
        assert_eq!(analyze_contact_email("not-an-email", None), "Invalid email format");
    }
}
