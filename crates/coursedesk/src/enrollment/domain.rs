use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier wrapper for accepted enrollments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnrollmentId(pub String);

const ID_SUFFIX_LEN: usize = 9;

impl EnrollmentId {
    /// Mint a fresh identifier from the submission instant plus a random suffix.
    pub fn generate(at: DateTime<Utc>) -> Self {
        let suffix = Alphanumeric
            .sample_string(&mut rand::rng(), ID_SUFFIX_LEN)
            .to_ascii_lowercase();
        Self(format!("enrollment_{}_{}", at.timestamp_millis(), suffix))
    }
}

/// One student's course-interest submission, enriched server-side.
///
/// `id` and `submitted_at` are assigned exactly once during intake and never
/// accepted from the caller. Records are immutable once persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRecord {
    pub id: EnrollmentId,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub selected_course: String,
    pub preferred_timing: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motivation: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl EnrollmentRecord {
    /// Stem shared by the per-record JSON file and its remote document twin.
    /// Whitespace runs in the student name collapse to underscores.
    pub fn file_stem(&self) -> String {
        format!(
            "enrollment_{}_{}",
            self.submitted_at.timestamp_millis(),
            sanitize_whitespace(&self.full_name)
        )
    }
}

fn sanitize_whitespace(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

/// One violated constraint on a named submission field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Raised when a submission violates the field rules; carries every
/// violation, not just the first.
#[derive(Debug, thiserror::Error)]
#[error("invalid enrollment data: {} field violation(s)", .errors.len())]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

/// A submission that has passed field validation but has not yet been
/// enriched with an identifier or timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentSubmission {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub selected_course: String,
    pub preferred_timing: String,
    pub previous_experience: Option<String>,
    pub motivation: Option<String>,
}

impl EnrollmentSubmission {
    /// Validate an untyped payload against the enrollment field rules,
    /// collecting every violation.
    pub fn from_value(payload: &Value) -> Result<Self, ValidationError> {
        let mut errors = Vec::new();

        let full_name = required_text(payload, "fullName", "Full name is required", &mut errors);
        let email = required_text(payload, "email", "Valid email is required", &mut errors);
        let phone = required_text(payload, "phone", "Phone number is required", &mut errors);
        let address = optional_text(payload, "address", &mut errors);
        let selected_course = required_text(
            payload,
            "selectedCourse",
            "Course selection is required",
            &mut errors,
        );
        let preferred_timing = required_text(
            payload,
            "preferredTiming",
            "Preferred timing is required",
            &mut errors,
        );
        let previous_experience = optional_text(payload, "previousExperience", &mut errors);
        let motivation = optional_text(payload, "motivation", &mut errors);

        if let Some(candidate) = &email {
            if !is_valid_email(candidate) {
                errors.push(FieldError {
                    field: "email",
                    message: "Valid email is required".to_string(),
                });
            }
        }

        if !errors.is_empty() {
            return Err(ValidationError { errors });
        }

        Ok(Self {
            full_name: full_name.unwrap_or_default(),
            email: email.unwrap_or_default(),
            phone: phone.unwrap_or_default(),
            address,
            selected_course: selected_course.unwrap_or_default(),
            preferred_timing: preferred_timing.unwrap_or_default(),
            previous_experience,
            motivation,
        })
    }

    /// Enrich the submission into a persistable record.
    pub fn into_record(self, id: EnrollmentId, submitted_at: DateTime<Utc>) -> EnrollmentRecord {
        EnrollmentRecord {
            id,
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            address: self.address,
            selected_course: self.selected_course,
            preferred_timing: self.preferred_timing,
            previous_experience: self.previous_experience,
            motivation: self.motivation,
            submitted_at,
        }
    }
}

fn required_text(
    payload: &Value,
    field: &'static str,
    message: &str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match payload.get(field) {
        Some(Value::String(raw)) if !raw.trim().is_empty() => Some(raw.trim().to_string()),
        _ => {
            errors.push(FieldError {
                field,
                message: message.to_string(),
            });
            None
        }
    }
}

fn optional_text(
    payload: &Value,
    field: &'static str,
    errors: &mut Vec<FieldError>,
) -> Option<String> {
    match payload.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(raw)) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(_) => {
            errors.push(FieldError {
                field,
                message: format!("{field} must be provided as text"),
            });
            None
        }
    }
}

fn is_valid_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }

    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && !domain.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::HashSet;

    fn sample_payload() -> Value {
        json!({
            "fullName": "Asha Rao",
            "email": "asha@example.com",
            "phone": "9000000000",
            "selectedCourse": "Tally Prime",
            "preferredTiming": "morning",
        })
    }

    #[test]
    fn valid_payload_passes_with_trimmed_fields() {
        let mut payload = sample_payload();
        payload["fullName"] = json!("  Asha Rao  ");
        let submission = EnrollmentSubmission::from_value(&payload).expect("valid submission");
        assert_eq!(submission.full_name, "Asha Rao");
        assert!(submission.address.is_none());
        assert!(submission.motivation.is_none());
    }

    #[test]
    fn empty_payload_reports_every_required_field() {
        let error = EnrollmentSubmission::from_value(&json!({})).expect_err("must fail");
        let fields: HashSet<&str> = error.errors.iter().map(|err| err.field).collect();
        for expected in ["fullName", "email", "phone", "selectedCourse", "preferredTiming"] {
            assert!(fields.contains(expected), "missing error for {expected}");
        }
    }

    #[test]
    fn malformed_email_is_reported_alongside_other_violations() {
        let payload = json!({
            "fullName": "Asha Rao",
            "email": "not-an-email",
            "selectedCourse": "Tally Prime",
        });
        let error = EnrollmentSubmission::from_value(&payload).expect_err("must fail");
        let fields: Vec<&str> = error.errors.iter().map(|err| err.field).collect();
        assert!(fields.contains(&"email"));
        assert!(fields.contains(&"phone"));
        assert!(fields.contains(&"preferredTiming"));
    }

    #[test]
    fn email_syntax_checks() {
        for good in ["asha@example.com", "a.b+c@mail.co.in"] {
            assert!(is_valid_email(good), "{good} should pass");
        }
        for bad in ["", "plain", "@example.com", "a@", "a@nodot", "a b@x.com", "a@@x.com", "a@.com"] {
            assert!(!is_valid_email(bad), "{bad} should fail");
        }
    }

    #[test]
    fn non_string_values_are_field_errors_not_panics() {
        let mut payload = sample_payload();
        payload["phone"] = json!(9000000000u64);
        payload["motivation"] = json!(["learn", "grow"]);
        let error = EnrollmentSubmission::from_value(&payload).expect_err("must fail");
        let fields: Vec<&str> = error.errors.iter().map(|err| err.field).collect();
        assert!(fields.contains(&"phone"));
        assert!(fields.contains(&"motivation"));
    }

    #[test]
    fn generated_ids_are_unique_across_many_submissions() {
        let now = Utc::now();
        let ids: HashSet<String> = (0..10_000)
            .map(|_| EnrollmentId::generate(now).0)
            .collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn generated_id_carries_timestamp_and_random_suffix() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        let id = EnrollmentId::generate(at);
        let rest = id.0.strip_prefix("enrollment_").expect("prefix");
        let (millis, suffix) = rest.split_once('_').expect("two segments");
        assert_eq!(millis, at.timestamp_millis().to_string());
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(!suffix.chars().any(|c| c.is_ascii_uppercase()));
    }

    #[test]
    fn record_serializes_in_camel_case() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        let record = EnrollmentSubmission::from_value(&sample_payload())
            .expect("valid")
            .into_record(EnrollmentId::generate(at), at);

        let value = serde_json::to_value(&record).expect("serializes");
        assert!(value.get("fullName").is_some());
        assert!(value.get("selectedCourse").is_some());
        assert!(value.get("submittedAt").is_some());
        // Absent optionals are dropped from the payload, as in the stored files.
        assert!(value.get("address").is_none());

        let parsed: EnrollmentRecord = serde_json::from_value(value).expect("round-trips");
        assert_eq!(parsed, record);
    }

    #[test]
    fn file_stem_collapses_whitespace_in_names() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        let mut payload = sample_payload();
        payload["fullName"] = json!("Asha  Devi Rao");
        let record = EnrollmentSubmission::from_value(&payload)
            .expect("valid")
            .into_record(EnrollmentId::generate(at), at);
        assert_eq!(
            record.file_stem(),
            format!("enrollment_{}_Asha_Devi_Rao", at.timestamp_millis())
        );
    }
}
