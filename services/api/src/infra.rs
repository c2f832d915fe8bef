use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use coursedesk::config::AppConfig;
use coursedesk::enrollment::{
    EnrollmentService, FilesystemEnrollmentStore, GraphClient, RemoteDestinations,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Composition root: a filesystem store always, Graph destinations only
/// when the credential triple is configured.
pub(crate) fn build_enrollment_service(
    config: &AppConfig,
) -> Arc<EnrollmentService<FilesystemEnrollmentStore, GraphClient>> {
    let store = Arc::new(FilesystemEnrollmentStore::new(config.storage.dir.clone()));

    let remote = config.remote.as_ref().map(|remote| RemoteDestinations {
        gateway: Arc::new(GraphClient::new(remote.credentials.clone())),
        notification_email: remote.notification_email.clone(),
        sharepoint: remote.sharepoint.clone(),
    });

    Arc::new(EnrollmentService::new(store, remote))
}
