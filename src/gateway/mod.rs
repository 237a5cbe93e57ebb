//! Admission-gated submission of documents to the registration service.

mod submission;
mod transport;

pub use submission::SubmissionGateway;
pub use transport::{HttpTransport, Transport, CREATE_DOCUMENT_URL, SIGNATURE_HEADER};
