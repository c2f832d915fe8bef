use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{error, info};

use super::domain::{EnrollmentId, EnrollmentRecord, EnrollmentSubmission, ValidationError};
use super::graph::{GraphError, GraphGateway};
use super::store::{EnrollmentStore, StorageError};
use crate::config::SharePointConfig;

/// Remote destinations handed to the service when the Graph credential
/// triple is configured. Each optional member gates its own destination.
pub struct RemoteDestinations<G> {
    pub gateway: Arc<G>,
    pub notification_email: Option<String>,
    pub sharepoint: Option<SharePointConfig>,
}

/// Outcome of an accepted submission: the enriched record plus one labeled
/// result string per attempted destination, in invocation order.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionReceipt {
    pub record: EnrollmentRecord,
    pub storage: Vec<String>,
}

/// Service composing validation, enrichment, and the storage fan-out.
///
/// Destination failures never fail the overall submission; each is demoted
/// to a labeled entry in the receipt so callers learn exactly which
/// destinations succeeded. Only validation blocks a response.
pub struct EnrollmentService<S, G> {
    store: Arc<S>,
    remote: Option<RemoteDestinations<G>>,
}

impl<S, G> EnrollmentService<S, G>
where
    S: EnrollmentStore + 'static,
    G: GraphGateway + 'static,
{
    pub fn new(store: Arc<S>, remote: Option<RemoteDestinations<G>>) -> Self {
        Self { store, remote }
    }

    /// Validate an untyped payload, enrich it, and fan it out to every
    /// configured destination.
    pub async fn submit(&self, payload: Value) -> Result<SubmissionReceipt, ValidationError> {
        let submission = EnrollmentSubmission::from_value(&payload)?;

        let now = Utc::now();
        let record = submission.into_record(EnrollmentId::generate(now), now);

        let mut storage = Vec::new();
        if let Some(remote) = &self.remote {
            self.fan_out_remote(remote, &record, &mut storage).await;
        }

        match self.store.save(&record).await {
            Ok(message) => storage.push(format!("Local: {message}")),
            Err(err) => {
                error!(%err, "local enrollment save failed");
                storage.push(format!("Local Error: {err}"));
            }
        }

        info!(
            enrollment_id = %record.id.0,
            destinations = storage.len(),
            "enrollment accepted"
        );

        Ok(SubmissionReceipt { record, storage })
    }

    async fn fan_out_remote(
        &self,
        remote: &RemoteDestinations<G>,
        record: &EnrollmentRecord,
        storage: &mut Vec<String>,
    ) {
        capture(
            storage,
            "OneDrive",
            remote.gateway.store_as_document(record).await,
        );
        capture(
            storage,
            "CSV",
            remote.gateway.append_to_tabular_ledger(record).await,
        );

        if let Some(recipient) = &remote.notification_email {
            capture(storage, "Email", remote.gateway.notify(record, recipient).await);
        }

        if let Some(sharepoint) = &remote.sharepoint {
            capture(
                storage,
                "SharePoint",
                remote
                    .gateway
                    .create_list_item(record, &sharepoint.site_id, &sharepoint.list_id)
                    .await,
            );
        }
    }

    /// Persisted records, newest first.
    pub async fn list(&self) -> Result<Vec<EnrollmentRecord>, StorageError> {
        self.store.list().await
    }

    /// Raw CSV ledger bytes for download.
    pub async fn ledger(&self) -> Result<Vec<u8>, StorageError> {
        self.store.ledger_csv().await
    }
}

fn capture(storage: &mut Vec<String>, label: &str, result: Result<String, GraphError>) {
    match result {
        Ok(message) => storage.push(format!("{label}: {message}")),
        Err(err) => {
            error!(destination = label, %err, "enrollment destination failed");
            storage.push(format!("{label} Error: {err}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrollment::store::LEDGER_HEADER;
    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        saved: Mutex<Vec<EnrollmentRecord>>,
        fail: bool,
    }

    impl MemoryStore {
        fn failing() -> Self {
            Self {
                saved: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        fn saved(&self) -> Vec<EnrollmentRecord> {
            self.saved.lock().expect("store mutex poisoned").clone()
        }
    }

    #[async_trait]
    impl EnrollmentStore for MemoryStore {
        async fn save(&self, record: &EnrollmentRecord) -> Result<String, StorageError> {
            if self.fail {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.saved
                .lock()
                .expect("store mutex poisoned")
                .push(record.clone());
            Ok(format!("Enrollment saved locally: {}.json", record.file_stem()))
        }

        async fn list(&self) -> Result<Vec<EnrollmentRecord>, StorageError> {
            let mut records = self.saved();
            records.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
            Ok(records)
        }

        async fn ledger_csv(&self) -> Result<Vec<u8>, StorageError> {
            let records = self.saved();
            if records.is_empty() {
                return Err(StorageError::NotFound);
            }
            Ok(format!("{LEDGER_HEADER}\n").into_bytes())
        }
    }

    #[derive(Default)]
    struct StubGateway {
        fail_document: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl StubGateway {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().expect("call mutex poisoned").clone()
        }

        fn record_call(&self, name: &'static str) {
            self.calls.lock().expect("call mutex poisoned").push(name);
        }
    }

    #[async_trait]
    impl GraphGateway for StubGateway {
        async fn store_as_document(
            &self,
            _record: &EnrollmentRecord,
        ) -> Result<String, GraphError> {
            self.record_call("document");
            if self.fail_document {
                return Err(GraphError::Api {
                    operation: "document upload",
                    status: StatusCode::SERVICE_UNAVAILABLE,
                });
            }
            Ok("https://contoso.example/drive/item".to_string())
        }

        async fn append_to_tabular_ledger(
            &self,
            _record: &EnrollmentRecord,
        ) -> Result<String, GraphError> {
            self.record_call("ledger");
            Ok("Data appended to CSV successfully".to_string())
        }

        async fn create_list_item(
            &self,
            _record: &EnrollmentRecord,
            _site_id: &str,
            _list_id: &str,
        ) -> Result<String, GraphError> {
            self.record_call("list_item");
            Ok("SharePoint item created with ID: 7".to_string())
        }

        async fn notify(
            &self,
            _record: &EnrollmentRecord,
            _recipient: &str,
        ) -> Result<String, GraphError> {
            self.record_call("notify");
            Ok("Enrollment notification email sent successfully".to_string())
        }
    }

    fn payload() -> Value {
        json!({
            "fullName": "Asha Rao",
            "email": "asha@example.com",
            "phone": "9000000000",
            "selectedCourse": "Tally Prime",
            "preferredTiming": "morning",
        })
    }

    fn remote(gateway: Arc<StubGateway>) -> RemoteDestinations<StubGateway> {
        RemoteDestinations {
            gateway,
            notification_email: Some("admissions@example.com".to_string()),
            sharepoint: Some(SharePointConfig {
                site_id: "site".to_string(),
                list_id: "list".to_string(),
            }),
        }
    }

    #[tokio::test]
    async fn local_only_submission_yields_single_local_entry() {
        let store = Arc::new(MemoryStore::default());
        let service: EnrollmentService<MemoryStore, StubGateway> =
            EnrollmentService::new(store.clone(), None);

        let receipt = service.submit(payload()).await.expect("accepted");
        assert_eq!(receipt.storage.len(), 1);
        assert!(receipt.storage[0].starts_with("Local: "));
        assert_eq!(store.saved().len(), 1);
        assert_eq!(store.saved()[0], receipt.record);
    }

    #[tokio::test]
    async fn validation_failure_persists_nothing() {
        let store = Arc::new(MemoryStore::default());
        let gateway = Arc::new(StubGateway::default());
        let service = EnrollmentService::new(store.clone(), Some(remote(gateway.clone())));

        let error = service
            .submit(json!({ "email": "asha@example.com" }))
            .await
            .expect_err("must fail validation");

        assert!(error.errors.iter().any(|err| err.field == "fullName"));
        assert!(store.saved().is_empty());
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn fan_out_reports_every_destination_in_order() {
        let store = Arc::new(MemoryStore::default());
        let gateway = Arc::new(StubGateway::default());
        let service = EnrollmentService::new(store.clone(), Some(remote(gateway.clone())));

        let receipt = service.submit(payload()).await.expect("accepted");
        let labels: Vec<&str> = receipt
            .storage
            .iter()
            .map(|entry| entry.split(':').next().unwrap_or_default())
            .collect();
        assert_eq!(labels, ["OneDrive", "CSV", "Email", "SharePoint", "Local"]);
        assert_eq!(gateway.calls(), ["document", "ledger", "notify", "list_item"]);
    }

    #[tokio::test]
    async fn remote_failure_does_not_block_other_destinations() {
        let store = Arc::new(MemoryStore::default());
        let gateway = Arc::new(StubGateway {
            fail_document: true,
            ..StubGateway::default()
        });
        let service = EnrollmentService::new(store.clone(), Some(remote(gateway)));

        let receipt = service.submit(payload()).await.expect("accepted");
        assert!(receipt.storage[0].starts_with("OneDrive Error: "));
        assert!(receipt.storage[1].starts_with("CSV: "));
        assert!(receipt.storage.last().expect("entries").starts_with("Local: "));
        assert_eq!(store.saved().len(), 1);
    }

    #[tokio::test]
    async fn local_failure_is_demoted_to_a_labeled_entry() {
        let store = Arc::new(MemoryStore::failing());
        let service: EnrollmentService<MemoryStore, StubGateway> =
            EnrollmentService::new(store, None);

        let receipt = service.submit(payload()).await.expect("still accepted");
        assert_eq!(receipt.storage.len(), 1);
        assert!(receipt.storage[0].starts_with("Local Error: "));
    }

    #[tokio::test]
    async fn unconfigured_optional_destinations_are_skipped() {
        let store = Arc::new(MemoryStore::default());
        let gateway = Arc::new(StubGateway::default());
        let service = EnrollmentService::new(
            store,
            Some(RemoteDestinations {
                gateway: gateway.clone(),
                notification_email: None,
                sharepoint: None,
            }),
        );

        let receipt = service.submit(payload()).await.expect("accepted");
        let labels: Vec<&str> = receipt
            .storage
            .iter()
            .map(|entry| entry.split(':').next().unwrap_or_default())
            .collect();
        assert_eq!(labels, ["OneDrive", "CSV", "Local"]);
        assert_eq!(gateway.calls(), ["document", "ledger"]);
    }
}
