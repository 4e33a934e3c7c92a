//! LibreLinkUp reading source
//!
//! Reads the current glucose measurement of the first patient connection
//! shared with a LibreLinkUp follower account:
//! - Logs in and caches the session token until it expires
//! - Follows the regional redirect returned by the global endpoint
//! - Drops the cached session on a 401 so the next fetch logs in again

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::ReadingSource;
use crate::error::SourceError;
use crate::models::Reading;

/// Global LibreLinkUp API endpoint
pub const DEFAULT_LIBRE_BASE_URL: &str = "https://api.libreview.io";

/// Client version reported to the API
pub const DEFAULT_LIBRE_VERSION: &str = "4.12.0";

const PRODUCT: &str = "llu.android";
const MGDL_PER_MMOL: f64 = 18.0;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Login status codes returned in the response envelope
const STATUS_BAD_CREDENTIALS: i32 = 2;
const STATUS_TERMS_REQUIRED: i32 = 4;

/// LibreLinkUp follower credentials
#[derive(Clone)]
pub struct LibreCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for LibreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibreCredentials")
            .field("username", &self.username)
            .field("password", &format!("******** ({})", self.password.len()))
            .finish()
    }
}

/// Connection options for the LibreLinkUp API
#[derive(Debug, Clone)]
pub struct LibreOptions {
    /// API base URL; a region (e.g. "eu") selects `https://api-{region}.libreview.io`
    pub base_url: String,
    /// Client version header
    pub version: String,
}

impl LibreOptions {
    pub fn for_region(region: Option<&str>, version: Option<&str>) -> Self {
        Self {
            base_url: region
                .filter(|r| !r.is_empty())
                .map(regional_base_url)
                .unwrap_or_else(|| DEFAULT_LIBRE_BASE_URL.to_string()),
            version: version
                .filter(|v| !v.is_empty())
                .unwrap_or(DEFAULT_LIBRE_VERSION)
                .to_string(),
        }
    }
}

impl Default for LibreOptions {
    fn default() -> Self {
        Self::for_region(None, None)
    }
}

fn regional_base_url(region: &str) -> String {
    format!("https://api-{}.libreview.io", region.to_lowercase())
}

/// Authenticated session
#[derive(Debug, Clone)]
struct Session {
    base_url: String,
    token: String,
    account_id: String,
    expires_at: i64,
}

impl Session {
    fn is_expired(&self, now: i64) -> bool {
        // Refresh a minute early
        now >= self.expires_at - 60
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: i32,
    data: Option<T>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    #[serde(default)]
    redirect: bool,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    user: Option<UserData>,
    #[serde(default)]
    auth_ticket: Option<AuthTicket>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AuthTicket {
    token: String,
    expires: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection {
    patient_id: String,
}

#[derive(Debug, Deserialize)]
struct GraphData {
    connection: GraphConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphConnection {
    #[serde(default)]
    glucose_measurement: Option<GlucoseMeasurement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct GlucoseMeasurement {
    #[serde(default)]
    value_in_mg_per_dl: Option<f64>,
    #[serde(default)]
    value: Option<f64>,
    /// 0 = mmol/L, 1 = mg/dL
    #[serde(default)]
    glucose_units: Option<u8>,
}

impl GlucoseMeasurement {
    /// Value in mmol/L rounded to one decimal, independent of display units
    fn mmol_per_l(&self) -> Option<f64> {
        let mmol = match (self.value_in_mg_per_dl, self.value, self.glucose_units) {
            (Some(mgdl), _, _) => mgdl / MGDL_PER_MMOL,
            (None, Some(v), Some(1)) => v / MGDL_PER_MMOL,
            (None, Some(v), _) => v,
            (None, None, _) => return None,
        };
        Some((mmol * 10.0).round() / 10.0)
    }
}

/// Reading source backed by the LibreLinkUp follower API
pub struct LibreLinkUpSource {
    client: Client,
    credentials: LibreCredentials,
    options: LibreOptions,
    session: RwLock<Option<Session>>,
}

impl LibreLinkUpSource {
    pub fn new(credentials: LibreCredentials, options: LibreOptions) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            credentials,
            options,
            session: RwLock::new(None),
        })
    }

    pub fn options(&self) -> &LibreOptions {
        &self.options
    }

    /// Fetch the raw graph document for the first connection
    pub async fn read_raw(&self) -> Result<Value, SourceError> {
        let session = self.session().await?;
        let patient_id = self.first_patient_id(&session).await?;
        let path = format!("/llu/connections/{}/graph", patient_id);
        self.get_json::<Value>(&session, &path).await
    }

    /// Drop the cached session
    pub async fn invalidate(&self) {
        *self.session.write().await = None;
    }

    async fn session(&self) -> Result<Session, SourceError> {
        let now = Utc::now().timestamp();
        if let Some(session) = self.session.read().await.as_ref() {
            if !session.is_expired(now) {
                return Ok(session.clone());
            }
        }

        let session = self.login().await?;
        *self.session.write().await = Some(session.clone());
        Ok(session)
    }

    async fn login(&self) -> Result<Session, SourceError> {
        let mut base_url = self.options.base_url.clone();

        // One regional redirect is followed at most
        for _ in 0..2 {
            let url = format!("{}/llu/auth/login", base_url);
            let response = self
                .with_headers(self.client.post(&url))
                .json(&LoginRequest {
                    email: &self.credentials.username,
                    password: &self.credentials.password,
                })
                .send()
                .await?;

            let envelope: Envelope<LoginData> = decode(response).await?;

            match envelope.status {
                0 => {}
                STATUS_BAD_CREDENTIALS => {
                    let message = envelope
                        .error
                        .and_then(|e| e.message)
                        .unwrap_or_else(|| "bad credentials".to_string());
                    return Err(SourceError::Authentication(message));
                }
                STATUS_TERMS_REQUIRED => return Err(SourceError::TermsNotAccepted),
                other => {
                    return Err(SourceError::Other(format!(
                        "unexpected login status {}",
                        other
                    )))
                }
            }

            let data = envelope
                .data
                .ok_or_else(|| SourceError::Decode("login response has no data".to_string()))?;

            if data.redirect {
                let region = data
                    .region
                    .ok_or_else(|| SourceError::Decode("redirect without region".to_string()))?;
                info!(region = %region, "LibreLinkUp login redirected to regional endpoint");
                base_url = regional_base_url(&region);
                continue;
            }

            let user = data
                .user
                .ok_or_else(|| SourceError::Decode("login response has no user".to_string()))?;
            let ticket = data
                .auth_ticket
                .ok_or_else(|| SourceError::Decode("login response has no auth ticket".to_string()))?;

            debug!(base_url = %base_url, expires = ticket.expires, "LibreLinkUp session established");

            return Ok(Session {
                base_url,
                token: ticket.token,
                account_id: account_id(&user.id),
                expires_at: ticket.expires,
            });
        }

        Err(SourceError::Other(
            "LibreLinkUp redirected more than once".to_string(),
        ))
    }

    async fn first_patient_id(&self, session: &Session) -> Result<String, SourceError> {
        let connections: Vec<Connection> = self.get_json(session, "/llu/connections").await?;
        connections
            .into_iter()
            .next()
            .map(|c| c.patient_id)
            .ok_or(SourceError::NoConnections)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        session: &Session,
        path: &str,
    ) -> Result<T, SourceError> {
        let url = format!("{}{}", session.base_url, path);
        let response = self
            .with_headers(self.client.get(&url))
            .bearer_auth(&session.token)
            .header("account-id", &session.account_id)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            self.invalidate().await;
        }

        let envelope: Envelope<T> = decode(response).await?;
        envelope
            .data
            .ok_or_else(|| SourceError::Decode(format!("{} returned no data", path)))
    }

    fn with_headers(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("product", PRODUCT)
            .header("version", &self.options.version)
            .header("accept", "application/json")
            .header("cache-control", "no-cache")
    }
}

#[async_trait]
impl ReadingSource for LibreLinkUpSource {
    async fn fetch_current(&self) -> Result<Reading, SourceError> {
        let session = self.session().await?;
        let patient_id = self.first_patient_id(&session).await?;

        let path = format!("/llu/connections/{}/graph", patient_id);
        let graph: GraphData = self.get_json(&session, &path).await?;

        let value = graph
            .connection
            .glucose_measurement
            .and_then(|m| m.mmol_per_l())
            .ok_or(SourceError::MissingMeasurement)?;

        Ok(Reading::now(value))
    }
}

/// Hex SHA-256 of the account's user id, sent as the `account-id` header
fn account_id(user_id: &str) -> String {
    hex::encode(Sha256::digest(user_id.as_bytes()))
}

async fn decode<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<Envelope<T>, SourceError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| SourceError::Decode(e.to_string()))
}
