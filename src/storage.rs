//! Amazon S3 (and S3-compatible) object storage client.
//!
//! Talks to the S3 REST API directly with AWS Signature V4 authentication,
//! using only pure-Rust dependencies (`hmac`, `sha2`) for signing.
//!
//! Two operations are needed:
//!
//! - `HeadBucket`, to verify that the bucket exists and the credentials can
//!   reach it.
//! - `PutObject`, to upload a file.
//!
//! # Addressing
//!
//! Without a custom endpoint, requests use virtual-hosted addressing
//! (`https://<bucket>.s3.<region>.amazonaws.com/<key>`). With
//! `storage.endpoint_url` set (MinIO, LocalStack), requests use path-style
//! addressing (`<endpoint>/<bucket>/<key>`).
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID` — required
//! - `AWS_SECRET_ACCESS_KEY` — required
//! - `AWS_SESSION_TOKEN` — optional (temporary credentials)
//!
//! # Retries
//!
//! Transport errors, HTTP 429 and 5xx responses are retried up to
//! `storage.max_attempts` total attempts with exponential backoff.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Method, Url};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

// ============ AWS Credentials ============

/// AWS credentials loaded from environment variables.
#[derive(Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl AwsCredentials {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: Option<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token,
        }
    }

    /// Load credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`,
    /// and optionally `AWS_SESSION_TOKEN`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let access_key_id = get("AWS_ACCESS_KEY_ID").ok_or(Error::MissingCredentials {
            var: "AWS_ACCESS_KEY_ID",
        })?;
        let secret_access_key = get("AWS_SECRET_ACCESS_KEY").ok_or(Error::MissingCredentials {
            var: "AWS_SECRET_ACCESS_KEY",
        })?;

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token: get("AWS_SESSION_TOKEN"),
        })
    }
}

// ============ Client ============

/// Where a request goes and what gets signed for it.
#[derive(Debug, PartialEq)]
struct Location {
    url: String,
    host: String,
    canonical_uri: String,
}

pub struct StorageClient {
    config: StorageConfig,
    creds: AwsCredentials,
    http: reqwest::Client,
    endpoint: Option<Url>,
}

impl StorageClient {
    pub fn new(config: &StorageConfig, creds: AwsCredentials) -> Result<Self> {
        let endpoint = match &config.endpoint_url {
            Some(raw) => {
                let url = Url::parse(raw).map_err(|_| Error::InvalidEndpoint(raw.clone()))?;
                if url.host_str().is_none() {
                    return Err(Error::InvalidEndpoint(raw.clone()));
                }
                Some(url)
            }
            None => None,
        };

        // A redirect would be re-sent with a signature for the original host.
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(Error::HttpClient)?;

        Ok(Self {
            config: config.clone(),
            creds,
            http,
            endpoint,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }

    /// `s3://<bucket>/<key>`
    pub fn object_uri(&self, key: &str) -> String {
        format!("s3://{}/{}", self.config.bucket, key)
    }

    /// Check that the bucket exists and is reachable with these credentials.
    pub async fn head_bucket(&self) -> Result<()> {
        let location = self.location(None);
        self.send_signed(Method::HEAD, &location, None, None).await?;
        tracing::info!(bucket = %self.config.bucket, "bucket reachable");
        Ok(())
    }

    /// Upload `body` under `key`.
    pub async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let location = self.location(Some(key));
        let size = body.len();
        self.send_signed(Method::PUT, &location, Some(body), Some(content_type))
            .await?;
        tracing::info!(bucket = %self.config.bucket, key, size, "object uploaded");
        Ok(())
    }

    fn location(&self, key: Option<&str>) -> Location {
        let encoded_key = key.map(|k| k.split('/').map(uri_encode).collect::<Vec<_>>().join("/"));

        match &self.endpoint {
            Some(endpoint) => {
                // Path-style: <endpoint>/<bucket>/<key>
                let host = match endpoint.port() {
                    Some(port) => format!("{}:{}", endpoint.host_str().unwrap_or_default(), port),
                    None => endpoint.host_str().unwrap_or_default().to_string(),
                };
                let base_path = endpoint.path().trim_end_matches('/');
                let mut canonical_uri =
                    format!("{}/{}", base_path, uri_encode(&self.config.bucket));
                if let Some(k) = &encoded_key {
                    canonical_uri.push('/');
                    canonical_uri.push_str(k);
                }
                Location {
                    url: format!("{}://{}{}", endpoint.scheme(), host, canonical_uri),
                    host,
                    canonical_uri,
                }
            }
            None => {
                let host = format!(
                    "{}.s3.{}.amazonaws.com",
                    self.config.bucket, self.config.region
                );
                let canonical_uri = format!("/{}", encoded_key.unwrap_or_default());
                Location {
                    url: format!("https://{}{}", host, canonical_uri),
                    host,
                    canonical_uri,
                }
            }
        }
    }

    /// Sign and send a request, retrying transient failures.
    async fn send_signed(
        &self,
        method: Method,
        location: &Location,
        body: Option<Vec<u8>>,
        content_type: Option<&str>,
    ) -> Result<reqwest::Response> {
        let payload_hash = hex_sha256(body.as_deref().unwrap_or_default());
        let attempts = self.config.max_attempts.max(1);
        let mut last_err = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = Duration::from_millis(self.config.retry_base_ms << (attempt - 1).min(5));
                tracing::debug!(attempt, ?delay, "retrying S3 request");
                tokio::time::sleep(delay).await;
            }

            let amz_date = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();

            let mut headers = vec![
                ("host".to_string(), location.host.clone()),
                ("x-amz-content-sha256".to_string(), payload_hash.clone()),
                ("x-amz-date".to_string(), amz_date.clone()),
            ];
            if let Some(ref token) = self.creds.session_token {
                headers.push(("x-amz-security-token".to_string(), token.clone()));
            }

            let authorization = authorization_header(
                &self.creds,
                &self.config.region,
                &amz_date,
                &CanonicalRequest {
                    method: method.as_str(),
                    uri: &location.canonical_uri,
                    query: "",
                    headers,
                    payload_hash: &payload_hash,
                },
            );

            let mut req_builder = self
                .http
                .request(method.clone(), &location.url)
                .header("Authorization", &authorization)
                .header("x-amz-content-sha256", &payload_hash)
                .header("x-amz-date", &amz_date);

            if let Some(ref token) = self.creds.session_token {
                req_builder = req_builder.header("x-amz-security-token", token);
            }
            if let Some(ct) = content_type {
                req_builder = req_builder.header("Content-Type", ct);
            }
            if let Some(ref bytes) = body {
                req_builder = req_builder.body(bytes.clone());
            }

            match req_builder.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return Ok(resp);
                    }

                    let err = service_error(resp).await;
                    if status.as_u16() == 429 || status.is_server_error() {
                        tracing::warn!(%err, attempt, "transient S3 error");
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "S3 request failed");
                    last_err = Some(Error::Unreachable {
                        target: self.config.endpoint_label().to_string(),
                        source: e,
                    });
                }
            }
        }

        Err(last_err.unwrap_or(Error::Storage {
            status: 0,
            code: "NoAttempt".to_string(),
            message: "request was never sent".to_string(),
        }))
    }
}

/// Turn a non-success S3 response into [`Error::Storage`].
///
/// S3 returns an XML `<Error>` document for most failures; HEAD responses
/// carry no body, so the code is derived from the status.
async fn service_error(resp: reqwest::Response) -> Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    let code = extract_xml_value(&body, "Code").unwrap_or_else(|| match status.as_u16() {
        400 => "BadRequest".to_string(),
        403 => "Forbidden".to_string(),
        404 => "NotFound".to_string(),
        other => format!("HTTP {}", other),
    });
    let message = extract_xml_value(&body, "Message").unwrap_or_else(|| {
        if body.trim().is_empty() {
            status.canonical_reason().unwrap_or("unknown error").to_string()
        } else {
            body.chars().take(500).collect()
        }
    });

    Error::Storage {
        status: status.as_u16(),
        code,
        message,
    }
}

/// Generate a collision-free object key for an uploaded file.
///
/// The key is `<prefix>/<uuid hex><ext>`, where `ext` is `.` followed by
/// whatever comes after the last dot of `file_name` (empty if there is no
/// dot). The original file name stem never appears in the key.
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let ext = match file_name.rsplit_once('.') {
        Some((_, ext)) => format!(".{}", ext),
        None => String::new(),
    };
    let id = Uuid::new_v4().simple().to_string();
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{}{}", id, ext)
    } else {
        format!("{}/{}{}", prefix, id, ext)
    }
}

// ============ Access check ============

/// Load credentials from the environment and issue `HeadBucket`.
pub async fn check_access(config: &StorageConfig) -> Result<()> {
    let creds = AwsCredentials::from_env()?;
    StorageClient::new(config, creds)?.head_bucket().await
}

/// Map an access-check failure to a diagnostic line.
pub fn describe_access_error(config: &StorageConfig, err: &Error) -> String {
    match err {
        Error::MissingCredentials { var } => {
            format!("AWS credentials missing ({} is not set).", var)
        }
        Error::Unreachable { source, .. } => format!(
            "Failed to connect to S3 endpoint ({}): {}",
            config.endpoint_label(),
            source
        ),
        Error::Storage { .. } => format!("Client error accessing bucket: {}", err),
        other => format!("Unexpected S3 error: {}", other),
    }
}

/// Run `docchat s3-check`.
pub async fn run_check(config: &StorageConfig) -> anyhow::Result<()> {
    match check_access(config).await {
        Ok(()) => {
            println!("Bucket access OK. (s3://{})", config.bucket);
            Ok(())
        }
        Err(e) => anyhow::bail!("{}", describe_access_error(config, &e)),
    }
}

// ============ AWS SigV4 Helpers ============

/// The parts of a request that go into the SigV4 canonical request.
struct CanonicalRequest<'a> {
    method: &'a str,
    uri: &'a str,
    /// Already encoded and sorted.
    query: &'a str,
    headers: Vec<(String, String)>,
    payload_hash: &'a str,
}

/// Compute the `Authorization` header value for a request.
///
/// `amz_date` is the `x-amz-date` timestamp (`YYYYMMDD'T'HHMMSS'Z'`).
fn authorization_header(
    creds: &AwsCredentials,
    region: &str,
    amz_date: &str,
    request: &CanonicalRequest<'_>,
) -> String {
    let date_stamp = &amz_date[..8.min(amz_date.len())];

    let mut headers: Vec<(String, String)> = request
        .headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.trim().to_string()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let signed_headers: String = headers
        .iter()
        .map(|(k, _)| k.as_str())
        .collect::<Vec<_>>()
        .join(";");

    let canonical_headers: String = headers
        .iter()
        .map(|(k, v)| format!("{}:{}\n", k, v))
        .collect();

    let canonical_request = format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        request.method,
        request.uri,
        request.query,
        canonical_headers,
        signed_headers,
        request.payload_hash
    );

    let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, region);
    let string_to_sign = format!(
        "AWS4-HMAC-SHA256\n{}\n{}\n{}",
        amz_date,
        credential_scope,
        hex_sha256(canonical_request.as_bytes())
    );

    let signing_key = derive_signing_key(&creds.secret_access_key, date_stamp, region, "s3");
    let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

    format!(
        "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
        creds.access_key_id, credential_scope, signed_headers, signature
    )
}

/// Compute the hex-encoded SHA-256 hash of data.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986, leaving only `A-Z a-z 0-9 - _ . ~`.
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}

/// Extract the text content of an XML tag (simple, non-nested).
fn extract_xml_value(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{}>", tag);
    let close = format!("</{}>", tag);
    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)?;
    Some(xml[start..start + end].to_string())
}
