//! Registry fixtures for the mock server.
//!
//! Provides factory functions for realistic registry documents and upload
//! bodies.

use serde::{Deserialize, Serialize};

use super::handler::HandlerResult;
use super::server::MockServer;

/// A v3 feed's service index (`index.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIndex {
    pub version: String,
    pub resources: Vec<ServiceResource>,
}

/// One endpoint advertised by a [`ServiceIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceResource {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ServiceResource {
    pub fn new(id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resource_type: resource_type.into(),
            comment: None,
        }
    }
}

/// Collection of fixture factories for registry tests.
pub struct Fixtures;

impl Fixtures {
    // =========================================================================
    // Feed Fixtures
    // =========================================================================

    /// A service index whose endpoints all live under `feed_url`.
    pub fn service_index(feed_url: &str) -> ServiceIndex {
        ServiceIndex {
            version: "3.0.0".to_string(),
            resources: vec![
                ServiceResource::new(format!("{feed_url}/api/v2/package"), "PackagePublish/2.0.0"),
                ServiceResource::new(
                    format!("{feed_url}/flatcontainer/"),
                    "PackageBaseAddress/3.0.0",
                ),
                ServiceResource::new(
                    format!("{feed_url}/registration/"),
                    "RegistrationsBaseUrl/3.6.0",
                ),
                ServiceResource::new(format!("{feed_url}/query"), "SearchQueryService/3.5.0"),
            ],
        }
    }

    /// Serve [`service_index`](Self::service_index) at `GET /index.json`.
    pub fn register_service_index(server: &MockServer) {
        let index = Self::service_index(server.url());
        server.get("/index.json", move |_| {
            let index = index.clone();
            HandlerResult::respond(move |response| {
                if let Err(err) = response.set_json_content(&index) {
                    tracing::error!(error = %err, "failed to serialize service index");
                }
            })
        });
    }

    // =========================================================================
    // Upload Fixtures
    // =========================================================================

    /// Content type for a multipart upload with `boundary`.
    pub fn multipart_content_type(boundary: &str) -> String {
        format!("multipart/form-data; boundary={boundary}")
    }

    /// A single-file multipart body the way push clients send it.
    pub fn multipart_upload(boundary: &str, file_name: &str, payload: &[u8]) -> Vec<u8> {
        let mut body = Vec::with_capacity(payload.len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"package\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(payload);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipart::extract_package;

    #[test]
    fn test_service_index_serializes_json_ld_names() {
        let index = Fixtures::service_index("http://127.0.0.1:1/feed");
        let json = serde_json::to_value(&index).unwrap();

        assert_eq!(json["version"], "3.0.0");
        assert_eq!(json["resources"][0]["@id"], "http://127.0.0.1:1/feed/api/v2/package");
        assert_eq!(json["resources"][0]["@type"], "PackagePublish/2.0.0");
        assert!(json["resources"][0].get("comment").is_none());
    }

    #[test]
    fn test_service_index_round_trips() {
        let index = Fixtures::service_index("http://host/feed");
        let json = serde_json::to_string(&index).unwrap();

        let parsed: ServiceIndex = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, index);
    }

    #[test]
    fn test_multipart_upload_extracts_payload() {
        let payload = b"PK\x03\x04 package bytes";
        let body = Fixtures::multipart_upload("----b0undary", "foo.1.0.0.nupkg", payload);

        let extracted = extract_package(
            Some(&Fixtures::multipart_content_type("----b0undary")),
            &body,
        );

        assert_eq!(extracted, payload);
    }
}
