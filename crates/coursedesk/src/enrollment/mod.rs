//! Enrollment intake, storage fan-out, and retrieval workflows.
//!
//! A submission is validated, enriched with an identifier and timestamp,
//! then written to every configured destination: always the local
//! filesystem store, plus the Microsoft Graph destinations when
//! credentials are present. Per-destination outcomes are collected as
//! labeled strings rather than short-circuiting the request.

pub mod domain;
pub mod graph;
pub mod local;
pub mod router;
pub mod service;
pub mod store;

pub use domain::{
    EnrollmentId, EnrollmentRecord, EnrollmentSubmission, FieldError, ValidationError,
};
pub use graph::{GraphClient, GraphError, GraphGateway};
pub use local::FilesystemEnrollmentStore;
pub use router::enrollment_router;
pub use service::{EnrollmentService, RemoteDestinations, SubmissionReceipt};
pub use store::{EnrollmentStore, StorageError, LEDGER_FILE, LEDGER_HEADER};
