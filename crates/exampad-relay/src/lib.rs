//! Relay HTTP client
//!
//! Typed access to the remote file-relay server brokering exam PDFs
//! between teachers and students, one operation per resource. Every
//! request carries an `X-ROLE` header, and every free-text path segment
//! (class, subject, filename) is percent-encoded before interpolation —
//! these identifiers come straight from teacher/student input.
//!
//! Failure semantics: one best-effort attempt per call, no retries and
//! no backoff. Transport errors, non-2xx statuses, and decode failures
//! are logged with their cause and then collapsed to an empty list,
//! `None`, or `false` at the boundary; re-triggering is left to the
//! caller. Binary fetches additionally require the `%PDF` magic before
//! anything is written into the exam store.

mod error;

use std::path::PathBuf;
use std::time::Duration;

use reqwest::multipart;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use error::RelayError;
use exampad_store::ExamStore;
use exampad_types::{has_pdf_magic, DocumentSummary, Role, SubmissionSummary};

/// Header naming the caller's role towards the relay.
pub const ROLE_HEADER: &str = "X-ROLE";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub base_url: Url,
    pub timeout: Duration,
}

impl RelayConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Parse a base URL string, e.g. "http://exam-relay.local:8000".
    pub fn from_base_url(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(base_url)?))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

pub struct RelayClient {
    config: RelayConfig,
    http: reqwest::Client,
}

impl RelayClient {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Liveness check. Mirrors the relay contract: any response body
    /// means the server is alive, regardless of status.
    pub async fn ping(&self) -> bool {
        match self.ping_inner().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "relay ping failed");
                false
            }
        }
    }

    async fn ping_inner(&self) -> Result<(), RelayError> {
        let url = self.endpoint(&["ping"])?;
        let response = self
            .http
            .get(url)
            .timeout(self.config.timeout)
            .send()
            .await?;
        response.bytes().await?;
        Ok(())
    }

    /// List the exams offered to a class/subject. Empty on any failure;
    /// "no exams" and "server unreachable" are indistinguishable here.
    pub async fn list_exams(&self, class_id: &str, subject_id: &str) -> Vec<DocumentSummary> {
        match self
            .get_json(
                &["api", "student", "tests", class_id, subject_id],
                Role::Student,
            )
            .await
        {
            Ok(list) => list,
            Err(e) => {
                warn!(class_id, subject_id, error = %e, "listing exams failed");
                Vec::new()
            }
        }
    }

    /// Download an exam PDF into the local store, overwriting any
    /// existing copy. `None` on any transport, status, or content
    /// failure; invalid bytes never reach the store.
    pub async fn fetch_exam(
        &self,
        store: &ExamStore,
        class_id: &str,
        subject_id: &str,
        filename: &str,
    ) -> Option<PathBuf> {
        let result: Result<PathBuf, RelayError> = async {
            let bytes = self
                .get_pdf(
                    &["api", "student", "tests", class_id, subject_id, filename],
                    Role::Student,
                )
                .await?;
            Ok(store.store_exam(class_id, subject_id, filename, &bytes)?)
        }
        .await;

        match result {
            Ok(path) => {
                debug!(class_id, subject_id, filename, "exam fetched");
                Some(path)
            }
            Err(e) => {
                warn!(class_id, subject_id, filename, error = %e, "fetching exam failed");
                None
            }
        }
    }

    /// Submit an annotated exam. The file part carries the
    /// submitter-derived filename; the relay prefixes the stored name
    /// itself, the client never does.
    pub async fn submit_exam(
        &self,
        class_id: &str,
        subject_id: &str,
        test_filename: &str,
        submitter_filename: &str,
        pdf_bytes: Vec<u8>,
    ) -> bool {
        let result: Result<(), RelayError> = async {
            let url = self.endpoint(&[
                "api",
                "student",
                "tests",
                class_id,
                subject_id,
                test_filename,
                "submit",
            ])?;
            let part = multipart::Part::bytes(pdf_bytes)
                .file_name(submitter_filename.to_string())
                .mime_str("application/pdf")
                .map_err(|e| RelayError::Request(e.to_string()))?;
            let form = multipart::Form::new().part("pdf", part);

            let response = self
                .http
                .post(url)
                .header(ROLE_HEADER, Role::Student.header_value())
                .multipart(form)
                .timeout(self.config.timeout)
                .send()
                .await?;
            expect_success(&response)
        }
        .await;

        match result {
            Ok(()) => {
                debug!(class_id, subject_id, test_filename, "exam submitted");
                true
            }
            Err(e) => {
                warn!(class_id, subject_id, test_filename, error = %e, "submitting exam failed");
                false
            }
        }
    }

    /// Publish a new exam PDF (teacher role).
    pub async fn upload_exam(
        &self,
        class_id: &str,
        subject_id: &str,
        filename: &str,
        pdf_bytes: Vec<u8>,
    ) -> bool {
        let result: Result<(), RelayError> = async {
            let url = self.endpoint(&["api", "teacher", "tests"])?;
            let part = multipart::Part::bytes(pdf_bytes)
                .file_name(filename.to_string())
                .mime_str("application/pdf")
                .map_err(|e| RelayError::Request(e.to_string()))?;
            let form = multipart::Form::new()
                .text("class", class_id.to_string())
                .text("subject", subject_id.to_string())
                .part("pdf", part);

            let response = self
                .http
                .post(url)
                .header(ROLE_HEADER, Role::Teacher.header_value())
                .multipart(form)
                .timeout(self.config.timeout)
                .send()
                .await?;
            expect_success(&response)
        }
        .await;

        match result {
            Ok(()) => {
                debug!(class_id, subject_id, filename, "exam uploaded");
                true
            }
            Err(e) => {
                warn!(class_id, subject_id, filename, error = %e, "uploading exam failed");
                false
            }
        }
    }

    /// List the submissions handed in for a test (teacher role).
    pub async fn list_submissions(
        &self,
        class_id: &str,
        subject_id: &str,
        test_base_name: &str,
    ) -> Vec<SubmissionSummary> {
        match self
            .get_json(
                &[
                    "api",
                    "teacher",
                    "submissions",
                    class_id,
                    subject_id,
                    test_base_name,
                ],
                Role::Teacher,
            )
            .await
        {
            Ok(list) => list,
            Err(e) => {
                warn!(class_id, subject_id, test_base_name, error = %e, "listing submissions failed");
                Vec::new()
            }
        }
    }

    /// Download one submission copy into `Submissions/` (teacher role).
    pub async fn fetch_submission(
        &self,
        store: &ExamStore,
        class_id: &str,
        subject_id: &str,
        test_base_name: &str,
        filename: &str,
    ) -> Option<PathBuf> {
        let result: Result<PathBuf, RelayError> = async {
            let bytes = self
                .get_pdf(
                    &[
                        "api",
                        "teacher",
                        "submissions",
                        class_id,
                        subject_id,
                        test_base_name,
                        filename,
                    ],
                    Role::Teacher,
                )
                .await?;
            Ok(store.store_submission(class_id, subject_id, filename, &bytes)?)
        }
        .await;

        match result {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(class_id, subject_id, filename, error = %e, "fetching submission failed");
                None
            }
        }
    }

    /// Known classes, for input-assist dropdowns.
    pub async fn list_classes(&self, role: Role) -> Vec<String> {
        match self.get_json(&["api", "classes"], role).await {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "listing classes failed");
                Vec::new()
            }
        }
    }

    /// Known subjects of a class, for input-assist dropdowns.
    pub async fn list_subjects(&self, class_id: &str, role: Role) -> Vec<String> {
        match self.get_json(&["api", "subjects", class_id], role).await {
            Ok(list) => list,
            Err(e) => {
                warn!(class_id, error = %e, "listing subjects failed");
                Vec::new()
            }
        }
    }

    /// Build an endpoint URL; each segment is percent-encoded for the
    /// URL path character set.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RelayError> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RelayError::Request("relay base URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        role: Role,
    ) -> Result<T, RelayError> {
        let url = self.endpoint(segments)?;
        let response = self
            .http
            .get(url)
            .header(ROLE_HEADER, role.header_value())
            .timeout(self.config.timeout)
            .send()
            .await?;
        expect_success(&response)?;
        response
            .json()
            .await
            .map_err(|e| RelayError::Decode(e.to_string()))
    }

    async fn get_pdf(&self, segments: &[&str], role: Role) -> Result<Vec<u8>, RelayError> {
        let url = self.endpoint(segments)?;
        let response = self
            .http
            .get(url)
            .header(ROLE_HEADER, role.header_value())
            .timeout(self.config.timeout)
            .send()
            .await?;
        expect_success(&response)?;

        let bytes = response.bytes().await?;
        if !has_pdf_magic(&bytes) {
            return Err(RelayError::NotPdf);
        }
        Ok(bytes.to_vec())
    }
}

fn expect_success(response: &reqwest::Response) -> Result<(), RelayError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(RelayError::Status(response.status()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str) -> RelayClient {
        RelayClient::new(RelayConfig::from_base_url(base).unwrap())
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let client = client("http://relay.local:8000");
        let url = client
            .endpoint(&["api", "student", "tests", "5BHIT", "Mathe"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://relay.local:8000/api/student/tests/5BHIT/Mathe"
        );
    }

    #[test]
    fn test_endpoint_percent_encodes_free_text_segments() {
        let client = client("http://relay.local:8000");
        let url = client
            .endpoint(&["api", "student", "tests", "5 BHIT", "Mathe/Physik"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://relay.local:8000/api/student/tests/5%20BHIT/Mathe%2FPhysik"
        );
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash_in_base() {
        let client = client("http://relay.local:8000/");
        let url = client.endpoint(&["ping"]).unwrap();
        assert_eq!(url.as_str(), "http://relay.local:8000/ping");
    }
}
