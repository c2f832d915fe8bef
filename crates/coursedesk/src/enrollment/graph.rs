use std::fmt;
use std::fmt::Write as _;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{header, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use super::domain::EnrollmentRecord;
use super::store::{ledger_row, LEDGER_HEADER};
use crate::config::GraphCredentials;

const LOGIN_BASE: &str = "https://login.microsoftonline.com";
const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Folder under the service account's drive root receiving enrollment files.
const DRIVE_FOLDER: &str = "EnrollmentData";

/// Tokens are refreshed this many seconds before their reported expiry.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Error raised by the remote document/list/mail integration.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("graph token exchange failed: {0}")]
    Token(String),
    #[error("graph transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("graph rejected {operation}: {status}")]
    Api {
        operation: &'static str,
        status: StatusCode,
    },
    #[error("ledger row encoding failed: {0}")]
    Ledger(#[from] csv::Error),
    #[error("enrollment record could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Remote capabilities the orchestrator may invoke independently. Every
/// failure is non-fatal to the overall submission.
#[async_trait]
pub trait GraphGateway: Send + Sync {
    /// Upload the JSON-serialized record to the enrollment folder; returns a
    /// location reference (web URL) when the service reports one.
    async fn store_as_document(&self, record: &EnrollmentRecord) -> Result<String, GraphError>;

    /// Append one row to the dated remote CSV blob, creating it from the
    /// fixed header when absent. Read-modify-write: two overlapping
    /// submissions can lose a row, an accepted limitation at current load.
    async fn append_to_tabular_ledger(
        &self,
        record: &EnrollmentRecord,
    ) -> Result<String, GraphError>;

    /// Create a structured item in the configured SharePoint list.
    async fn create_list_item(
        &self,
        record: &EnrollmentRecord,
        site_id: &str,
        list_id: &str,
    ) -> Result<String, GraphError>;

    /// Send an HTML summary of the record to one recipient.
    async fn notify(
        &self,
        record: &EnrollmentRecord,
        recipient: &str,
    ) -> Result<String, GraphError>;
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) > now
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct DriveItemResponse {
    #[serde(rename = "webUrl")]
    web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListItemResponse {
    id: Option<String>,
}

/// Microsoft Graph client over the app-only client-credentials grant.
///
/// Acquired tokens are cached in-process and reused until shortly before
/// expiry, falling back to a fresh exchange.
pub struct GraphClient {
    http: reqwest::Client,
    credentials: GraphCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl GraphClient {
    pub fn new(credentials: GraphCredentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            credentials,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, GraphError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.exchange_client_credentials().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }

    async fn exchange_client_credentials(&self) -> Result<CachedToken, GraphError> {
        let url = format!(
            "{LOGIN_BASE}/{}/oauth2/v2.0/token",
            self.credentials.tenant_id
        );
        let response = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GraphError::Token(format!("{status}: {detail}")));
        }

        let body: TokenResponse = response.json().await?;
        Ok(CachedToken {
            value: body.access_token,
            expires_at: Utc::now() + Duration::seconds(body.expires_in),
        })
    }

    async fn put_drive_content(
        &self,
        file_name: &str,
        content_type: &'static str,
        body: Vec<u8>,
        operation: &'static str,
    ) -> Result<Option<String>, GraphError> {
        let token = self.access_token().await?;
        let url = format!("{GRAPH_BASE}/me/drive/root:/{DRIVE_FOLDER}/{file_name}:/content");
        let response = self
            .http
            .put(&url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::Api { operation, status });
        }

        let item: DriveItemResponse = response.json().await?;
        Ok(item.web_url)
    }
}

impl fmt::Debug for GraphClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphClient")
            .field("tenant_id", &self.credentials.tenant_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl GraphGateway for GraphClient {
    async fn store_as_document(&self, record: &EnrollmentRecord) -> Result<String, GraphError> {
        let file_name = format!("{}.json", record.file_stem());
        let body = serde_json::to_vec_pretty(record)?;
        let web_url = self
            .put_drive_content(&file_name, "application/json", body, "document upload")
            .await?;
        Ok(web_url.unwrap_or_else(|| "File saved successfully".to_string()))
    }

    async fn append_to_tabular_ledger(
        &self,
        record: &EnrollmentRecord,
    ) -> Result<String, GraphError> {
        let file_name = format!(
            "enrollments_{}.csv",
            record.submitted_at.format("%Y-%m-%d")
        );
        let url = format!("{GRAPH_BASE}/me/drive/root:/{DRIVE_FOLDER}/{file_name}:/content");

        let token = self.access_token().await?;
        let response = self.http.get(&url).bearer_auth(&token).send().await?;
        let mut content = match response.status() {
            StatusCode::NOT_FOUND => format!("{LEDGER_HEADER}\n"),
            status if status.is_success() => response.text().await?,
            status => {
                return Err(GraphError::Api {
                    operation: "ledger read",
                    status,
                })
            }
        };

        content.push_str(&ledger_row(record)?);
        let web_url = self
            .put_drive_content(&file_name, "text/csv", content.into_bytes(), "ledger write")
            .await?;
        Ok(web_url.unwrap_or_else(|| "Data appended to CSV successfully".to_string()))
    }

    async fn create_list_item(
        &self,
        record: &EnrollmentRecord,
        site_id: &str,
        list_id: &str,
    ) -> Result<String, GraphError> {
        let token = self.access_token().await?;
        let url = format!("{GRAPH_BASE}/sites/{site_id}/lists/{list_id}/items");
        let item = json!({
            "fields": {
                "Title": format!("Enrollment - {}", record.full_name),
                "FullName": record.full_name,
                "Email": record.email,
                "Phone": record.phone,
                "Address": record.address,
                "SelectedCourse": record.selected_course,
                "PreferredTiming": record.preferred_timing,
                "PreviousExperience": record.previous_experience,
                "Motivation": record.motivation,
                "EnrollmentDate": record.submitted_at.to_rfc3339(),
            }
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&item)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::Api {
                operation: "list item create",
                status,
            });
        }

        let created: ListItemResponse = response.json().await?;
        Ok(match created.id {
            Some(id) => format!("SharePoint item created with ID: {id}"),
            None => "SharePoint item created".to_string(),
        })
    }

    async fn notify(
        &self,
        record: &EnrollmentRecord,
        recipient: &str,
    ) -> Result<String, GraphError> {
        let token = self.access_token().await?;
        let message = json!({
            "message": {
                "subject": format!(
                    "New Enrollment: {} - {}",
                    record.full_name, record.selected_course
                ),
                "body": {
                    "contentType": "HTML",
                    "content": notification_html(record),
                },
                "toRecipients": [
                    { "emailAddress": { "address": recipient } }
                ]
            }
        });

        let response = self
            .http
            .post(format!("{GRAPH_BASE}/me/sendMail"))
            .bearer_auth(token)
            .json(&message)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::Api {
                operation: "notification send",
                status,
            });
        }

        Ok("Enrollment notification email sent successfully".to_string())
    }
}

fn notification_html(record: &EnrollmentRecord) -> String {
    let mut html = String::new();
    writeln!(html, "<h2>New Student Enrollment</h2>").expect("write heading");

    writeln!(html, "<h3>Personal Information</h3>").expect("write section");
    html.push_str("<ul>");
    write_item(&mut html, "Name", &record.full_name);
    write_item(&mut html, "Email", &record.email);
    write_item(&mut html, "Phone", &record.phone);
    write_item(&mut html, "Address", record.address.as_deref().unwrap_or(""));
    write_item(
        &mut html,
        "Experience",
        record.previous_experience.as_deref().unwrap_or(""),
    );
    html.push_str("</ul>");

    writeln!(html, "<h3>Course Details</h3>").expect("write section");
    html.push_str("<ul>");
    write_item(&mut html, "Course", &record.selected_course);
    write_item(&mut html, "Preferred Timing", &record.preferred_timing);
    write_item(
        &mut html,
        "Motivation",
        record.motivation.as_deref().unwrap_or(""),
    );
    html.push_str("</ul>");

    writeln!(
        html,
        "<p><strong>Enrollment Date:</strong> {}</p>",
        record.submitted_at.format("%B %d, %Y %H:%M UTC")
    )
    .expect("write footer");

    html
}

fn write_item(html: &mut String, label: &str, value: &str) {
    writeln!(
        html,
        "<li><strong>{}:</strong> {}</li>",
        label,
        escape_html(value)
    )
    .expect("write list item");
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::domain::EnrollmentId;
    use chrono::TimeZone;

    fn record() -> EnrollmentRecord {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        EnrollmentRecord {
            id: EnrollmentId::generate(at),
            full_name: "Asha <Rao>".to_string(),
            email: "asha@example.com".to_string(),
            phone: "9000000000".to_string(),
            address: None,
            selected_course: "Tally Prime".to_string(),
            preferred_timing: "morning".to_string(),
            previous_experience: None,
            motivation: Some("Payroll & GST".to_string()),
            submitted_at: at,
        }
    }

    #[test]
    fn notification_html_escapes_user_text() {
        let html = notification_html(&record());
        assert!(html.contains("Asha &lt;Rao&gt;"));
        assert!(html.contains("Payroll &amp; GST"));
        assert!(html.contains("<h3>Course Details</h3>"));
        assert!(!html.contains("<Rao>"));
    }

    #[test]
    fn cached_tokens_expire_with_a_safety_margin() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap();
        let token = CachedToken {
            value: "secret".to_string(),
            expires_at: now + Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS + 1),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::seconds(2)));
    }
}
