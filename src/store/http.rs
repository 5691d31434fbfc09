//! [`DocumentStore`] backed by a Couchbase-compatible cluster over HTTP.
//!
//! - Declarative statements and document upserts go to the query service
//!   (`POST {query_url}` with a JSON body).
//! - Metadata listing and the structural fallback go to the cluster management REST API
//!   (`/pools/default/buckets/...`).
//!
//! Every request carries HTTP basic auth and the configured timeout.

use std::fmt;

use reqwest::{StatusCode, Url};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;

use crate::config::{ConnectionConfig, ContainerSettings};
use crate::error::{StoreError, StoreResult};
use crate::types::{Document, NamespacePath};

use super::{DocumentStore, SubContainerInfo, quote_identifier};

/// HTTP client for a cluster's query service and management API.
pub struct HttpStore {
    client: Client,
    management_url: Url,
    query_url: String,
    username: String,
    password: String,
}

impl fmt::Debug for HttpStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpStore")
            .field("management_url", &self.management_url.as_str())
            .field("query_url", &self.query_url)
            .field("username", &self.username)
            .finish()
    }
}

impl HttpStore {
    /// Build a client for the cluster described by `connection`.
    pub fn new(connection: &ConnectionConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(connection.timeout())
            .build()
            .map_err(|e| StoreError::Fatal(format!("failed to build http client: {e}")))?;
        let management_url = Url::parse(&connection.management_url())
            .map_err(|e| StoreError::Fatal(format!("invalid management url: {e}")))?;

        Ok(Self {
            client,
            management_url,
            query_url: connection.query_url(),
            username: connection.username.clone(),
            password: connection.password.clone(),
        })
    }

    fn send(&self, req: RequestBuilder) -> StoreResult<Response> {
        let resp = req
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .map_err(map_network_error)?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().unwrap_or_default();
        Err(classify_failure(status, &body))
    }

    /// Management endpoint under `/pools/default/buckets`, each segment percent-encoded.
    fn buckets_url(&self, segments: &[&str]) -> StoreResult<Url> {
        let mut url = self.management_url.clone();
        url.path_segments_mut()
            .map_err(|()| StoreError::Fatal("management url cannot take a path".to_string()))?
            .pop_if_empty()
            .extend(["pools", "default", "buckets"])
            .extend(segments);
        Ok(url)
    }

    fn query(&self, body: &serde_json::Value) -> StoreResult<()> {
        let resp = self.send(self.client.post(&self.query_url).json(body))?;
        let status = resp.status();
        let text = resp.text().map_err(map_network_error)?;
        check_query_status(status, &text)
    }
}

impl DocumentStore for HttpStore {
    fn list_containers(&self) -> StoreResult<Vec<String>> {
        let text = self
            .send(self.client.get(self.buckets_url(&[])?))?
            .text()
            .map_err(map_network_error)?;
        parse_bucket_names(&text)
    }

    fn create_container(&self, name: &str, settings: &ContainerSettings) -> StoreResult<()> {
        let quota = settings.ram_quota_mb.to_string();
        let form = [
            ("name", name),
            ("ramQuotaMB", quota.as_str()),
            ("bucketType", settings.bucket_type.as_str()),
        ];
        self.send(self.client.post(self.buckets_url(&[])?).form(&form))?;
        Ok(())
    }

    fn list_sub_containers(&self, container: &str) -> StoreResult<Vec<SubContainerInfo>> {
        let url = self.buckets_url(&[container, "scopes"])?;
        let text = self
            .send(self.client.get(url))?
            .text()
            .map_err(map_network_error)?;
        parse_scopes(&text)
    }

    fn execute_statement(&self, statement: &str) -> StoreResult<()> {
        self.query(&serde_json::json!({ "statement": statement }))
    }

    fn create_sub_container(&self, container: &str, sub_container: &str) -> StoreResult<()> {
        let url = self.buckets_url(&[container, "scopes"])?;
        self.send(self.client.post(url).form(&[("name", sub_container)]))?;
        Ok(())
    }

    fn create_leaf(&self, container: &str, sub_container: &str, leaf: &str) -> StoreResult<()> {
        let url = self.buckets_url(&[container, "scopes", sub_container, "collections"])?;
        self.send(self.client.post(url).form(&[("name", leaf)]))?;
        Ok(())
    }

    fn upsert(&self, path: &NamespacePath, document: &Document) -> StoreResult<()> {
        let statement = upsert_statement(path)?;
        self.query(&serde_json::json!({
            "statement": statement,
            "$key": document.key,
            "$doc": document.body,
        }))
    }
}

/// `UPSERT INTO` statement for a keyspace, taking the key and body as named parameters.
pub fn upsert_statement(path: &NamespacePath) -> StoreResult<String> {
    let quote = |name: &str| {
        quote_identifier(name)
            .ok_or_else(|| StoreError::Structural(format!("cannot quote name '{name}'")))
    };
    Ok(format!(
        "UPSERT INTO {}.{}.{} (KEY, VALUE) VALUES ($key, $doc)",
        quote(&path.container)?,
        quote(&path.sub_container)?,
        quote(&path.leaf)?
    ))
}

/// Map a non-success response to a [`StoreError`].
///
/// The cluster reports duplicate buckets/scopes/collections as a plain `400` whose only
/// distinguishing feature is the message text, so this is the one place that matches on
/// "already exists". Everything else is classified by status code.
pub fn classify_failure(status: StatusCode, body: &str) -> StoreError {
    let detail = if body.trim().is_empty() {
        format!("status {status}")
    } else {
        format!("status {status}: {}", body.trim())
    };

    if status == StatusCode::CONFLICT || body.to_ascii_lowercase().contains("already exists") {
        return StoreError::AlreadyExists(detail);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::Fatal(detail),
        StatusCode::NOT_FOUND => StoreError::NotFound(detail),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => StoreError::Transient(detail),
        s if s.is_server_error() => StoreError::Transient(detail),
        _ => StoreError::Structural(detail),
    }
}

fn map_network_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Transient(format!("request timed out: {e}"))
    } else if e.is_connect() {
        StoreError::Transient(format!("connection failed: {e}"))
    } else if e.is_decode() {
        StoreError::Structural(format!("invalid response: {e}"))
    } else {
        StoreError::Transient(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

// The query service can answer 200 with `"status": "errors"`.
fn check_query_status(status: StatusCode, text: &str) -> StoreResult<()> {
    let parsed: QueryResponse = serde_json::from_str(text)
        .map_err(|e| StoreError::Structural(format!("invalid query response: {e}")))?;
    if parsed.status == "success" && parsed.errors.is_empty() {
        return Ok(());
    }
    Err(classify_failure(
        if status.is_success() {
            StatusCode::BAD_REQUEST
        } else {
            status
        },
        text,
    ))
}

#[derive(Debug, Deserialize)]
struct NamedEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ScopeEntry {
    name: String,
    #[serde(default)]
    collections: Vec<NamedEntry>,
}

#[derive(Debug, Deserialize)]
struct ScopesManifest {
    #[serde(default)]
    scopes: Vec<ScopeEntry>,
}

fn parse_bucket_names(text: &str) -> StoreResult<Vec<String>> {
    let buckets: Vec<NamedEntry> = serde_json::from_str(text)
        .map_err(|e| StoreError::Structural(format!("invalid bucket listing: {e}")))?;
    Ok(buckets.into_iter().map(|b| b.name).collect())
}

fn parse_scopes(text: &str) -> StoreResult<Vec<SubContainerInfo>> {
    let manifest: ScopesManifest = serde_json::from_str(text)
        .map_err(|e| StoreError::Structural(format!("invalid scope listing: {e}")))?;
    Ok(manifest
        .scopes
        .into_iter()
        .map(|s| SubContainerInfo {
            name: s.name,
            leaves: s.collections.into_iter().map(|c| c.name).collect(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_messages_map_to_already_exists() {
        let err = classify_failure(
            StatusCode::BAD_REQUEST,
            r#"{"errors":{"name":"Bucket with given name already exists"}}"#,
        );
        assert!(err.is_already_exists());
        assert!(classify_failure(StatusCode::CONFLICT, "").is_already_exists());
    }

    #[test]
    fn statuses_map_to_error_kinds() {
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, ""),
            StoreError::Fatal(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::NOT_FOUND, "no bucket"),
            StoreError::NotFound(_)
        ));
        assert!(classify_failure(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, "syntax error"),
            StoreError::Structural(_)
        ));
    }

    #[test]
    fn query_errors_in_ok_response_are_failures() {
        assert!(check_query_status(StatusCode::OK, r#"{"status":"success","results":[]}"#).is_ok());
        let err = check_query_status(
            StatusCode::OK,
            r#"{"status":"errors","errors":[{"code":12003,"msg":"Keyspace not found"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Structural(_)));
        let exists = check_query_status(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"status":"errors","errors":[{"msg":"Scope with name spider2 already exists"}]}"#,
        )
        .unwrap_err();
        assert!(exists.is_already_exists());
    }

    #[test]
    fn parses_management_listings() {
        let names = parse_bucket_names(r#"[{"name":"a","quota":{}},{"name":"b"}]"#).unwrap();
        assert_eq!(names, vec!["a", "b"]);

        let scopes = parse_scopes(
            r#"{"uid":"1","scopes":[
                {"name":"_default","collections":[{"name":"_default"}]},
                {"name":"spider2","collections":[{"name":"orders","maxTTL":0}]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(scopes.len(), 2);
        assert!(scopes[1].has_leaf("orders"));
    }

    #[test]
    fn upsert_statement_quotes_every_level() {
        let stmt = upsert_statement(&NamespacePath::new("db", "spider2", "t")).unwrap();
        assert_eq!(
            stmt,
            "UPSERT INTO `db`.`spider2`.`t` (KEY, VALUE) VALUES ($key, $doc)"
        );
        assert!(upsert_statement(&NamespacePath::new("d`b", "s", "t")).is_err());
    }

    #[test]
    fn management_paths_encode_each_segment() {
        let store = HttpStore::new(&ConnectionConfig::default()).unwrap();
        let plain = store.buckets_url(&["sales_2024", "scopes"]).unwrap();
        assert!(plain.as_str().ends_with("/pools/default/buckets/sales_2024/scopes"));

        let odd = store.buckets_url(&["a b/c", "scopes"]).unwrap();
        assert!(odd.as_str().ends_with("/pools/default/buckets/a%20b%2Fc/scopes"));
    }
}
