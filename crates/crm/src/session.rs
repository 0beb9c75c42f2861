use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use switchboard_core::config::CrmConfig;

#[derive(Debug, thiserror::Error)]
pub enum CrmError {
    #[error("crm integration is disabled")]
    Disabled,
    #[error("crm credentials are not configured: {0}")]
    MissingCredentials(String),
    #[error("crm login failed: {0}")]
    Login(String),
    #[error("crm request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("crm api error ({status}): {body}")]
    Api { status: StatusCode, body: String },
    #[error("crm response decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

struct CrmAuth {
    access_token: SecretString,
    instance_url: String,
}

/// Authenticated Salesforce REST session. Auth state and the describe cache
/// live behind async mutexes so one session can serve concurrent turns.
pub struct CrmSession {
    client: Client,
    config: CrmConfig,
    auth: Mutex<Option<CrmAuth>>,
    describe_cache: Mutex<HashMap<String, Value>>,
}

impl CrmSession {
    pub fn new(config: CrmConfig) -> Result<Self, CrmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            auth: Mutex::new(None),
            describe_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn max_records(&self) -> usize {
        self.config.max_records
    }

    pub fn max_response_bytes(&self) -> usize {
        self.config.max_response_bytes
    }

    pub fn max_fields(&self) -> usize {
        self.config.max_fields
    }

    /// Establishes a session if one does not exist yet. The auth lock is held
    /// across login, so the first caller to succeed wins and later callers
    /// reuse its session; a failed attempt leaves the slot empty for the next
    /// caller to retry.
    pub async fn connect(&self) -> Result<(), CrmError> {
        if !self.config.enabled {
            return Err(CrmError::Disabled);
        }

        let mut auth = self.auth.lock().await;
        if auth.is_some() {
            return Ok(());
        }

        if let (Some(access_token), Some(instance_url)) =
            (&self.config.access_token, &self.config.instance_url)
        {
            debug!(event_name = "crm.connect.token", "using configured access token");
            *auth = Some(CrmAuth {
                access_token: access_token.clone(),
                instance_url: instance_url.trim_end_matches('/').to_owned(),
            });
            return Ok(());
        }

        let (Some(username), Some(password)) = (&self.config.username, &self.config.password)
        else {
            return Err(CrmError::MissingCredentials(
                "set either access_token + instance_url or username + password".to_owned(),
            ));
        };

        let established = self.soap_login(username, password).await?;
        info!(event_name = "crm.connect.login", instance_url = %established.instance_url, "crm session established");
        *auth = Some(established);
        Ok(())
    }

    /// Drops the session and the describe cache. The next tool call logs in
    /// again.
    pub async fn close(&self) {
        *self.auth.lock().await = None;
        self.describe_cache.lock().await.clear();
    }

    /// SOAP username-password login. The security token, when present, is
    /// appended to the password as the login endpoint expects.
    async fn soap_login(&self, username: &str, password: &SecretString) -> Result<CrmAuth, CrmError> {
        let mut credential = password.expose_secret().to_owned();
        if let Some(token) = &self.config.security_token {
            credential.push_str(token.expose_secret());
        }

        let endpoint = format!(
            "{}/services/Soap/u/{}",
            self.config.login_url.trim_end_matches('/'),
            self.config.api_version
        );
        let envelope = format!(
            "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
             <env:Envelope xmlns:env=\"http://schemas.xmlsoap.org/soap/envelope/\" \
             xmlns:urn=\"urn:partner.soap.sforce.com\">\
             <env:Body><urn:login>\
             <urn:username>{}</urn:username>\
             <urn:password>{}</urn:password>\
             </urn:login></env:Body></env:Envelope>",
            xml_escape(username),
            xml_escape(&credential)
        );

        let response = self
            .client
            .post(&endpoint)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", "login")
            .body(envelope)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let detail = extract_tag(&body, "faultstring")
                .unwrap_or_else(|| format!("login endpoint returned {status}"));
            return Err(CrmError::Login(detail));
        }

        let session_id = extract_tag(&body, "sessionId")
            .ok_or_else(|| CrmError::Login("login response missing session id".to_owned()))?;
        let server_url = extract_tag(&body, "serverUrl")
            .ok_or_else(|| CrmError::Login("login response missing server url".to_owned()))?;
        let instance_url = server_url
            .split("/services")
            .next()
            .unwrap_or(server_url.as_str())
            .trim_end_matches('/')
            .to_owned();

        Ok(CrmAuth { access_token: SecretString::from(session_id), instance_url })
    }

    /// Sends one authenticated REST request under `/services/data/v{version}`.
    /// An expired session is dropped so a later call can log in again.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, CrmError> {
        let path = if path.starts_with('/') { path.to_owned() } else { format!("/{path}") };
        self.send(
            method,
            &format!("/services/data/v{}{}", self.config.api_version, path),
            query,
            body,
        )
        .await
    }

    /// Sends a Tooling API request under `/services/data/v{version}/tooling`.
    pub async fn tooling(
        &self,
        method: Method,
        action: &str,
        body: Option<&Value>,
    ) -> Result<Value, CrmError> {
        let action = action.trim_start_matches('/');
        self.send(
            method,
            &format!("/services/data/v{}/tooling/{action}", self.config.api_version),
            &[],
            body,
        )
        .await
    }

    /// Sends an Apex REST request under `/services/apexrest`.
    pub async fn apexrest(
        &self,
        method: Method,
        action: &str,
        body: Option<&Value>,
    ) -> Result<Value, CrmError> {
        let action = if action.starts_with('/') { action.to_owned() } else { format!("/{action}") };
        self.send(method, &format!("/services/apexrest{action}"), &[], body).await
    }

    async fn send(
        &self,
        method: Method,
        service_path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, CrmError> {
        self.connect().await?;

        let (token, url) = {
            let auth = self.auth.lock().await;
            // connect() above guarantees the slot is filled.
            let auth = auth.as_ref().ok_or(CrmError::Disabled)?;
            (
                auth.access_token.expose_secret().to_owned(),
                format!("{}{}", auth.instance_url, service_path),
            )
        };

        let mut request = self
            .client
            .request(method, &url)
            .bearer_auth(&token)
            .header("Accept", "application/json");
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::UNAUTHORIZED {
            self.close().await;
        }
        if !status.is_success() {
            return Err(CrmError::Api { status, body: text });
        }
        if text.trim().is_empty() {
            // DELETE and PATCH respond 204 with no body.
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn query(&self, soql: &str) -> Result<Value, CrmError> {
        self.request(Method::GET, "/query", &[("q".to_owned(), soql.to_owned())], None).await
    }

    pub async fn search(&self, sosl: &str) -> Result<Value, CrmError> {
        self.request(Method::GET, "/search", &[("q".to_owned(), sosl.to_owned())], None).await
    }

    /// Describes an object, returning at most `max_fields` fields with name,
    /// label, type, and custom flag. Full describe payloads are cached for
    /// the process lifetime; the cap is applied per call.
    pub async fn describe_fields(
        &self,
        object_name: &str,
        max_fields: usize,
    ) -> Result<Value, CrmError> {
        let describe = {
            let cache = self.describe_cache.lock().await;
            cache.get(object_name).cloned()
        };
        let describe = match describe {
            Some(cached) => cached,
            None => {
                let fetched = self
                    .request(Method::GET, &format!("/sobjects/{object_name}/describe"), &[], None)
                    .await?;
                self.describe_cache
                    .lock()
                    .await
                    .insert(object_name.to_owned(), fetched.clone());
                fetched
            }
        };

        let all_fields = describe
            .get("fields")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let total = all_fields.len();
        let fields: Vec<Value> = all_fields
            .into_iter()
            .take(max_fields)
            .map(|field| {
                json!({
                    "name": field.get("name").cloned().unwrap_or(Value::Null),
                    "label": field.get("label").cloned().unwrap_or(Value::Null),
                    "type": field.get("type").cloned().unwrap_or(Value::Null),
                    "custom": field.get("custom").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();

        Ok(json!({
            "objectName": object_name,
            "totalFields": total,
            "displayedFields": fields.len(),
            "fields": fields,
        }))
    }

    pub async fn retrieve(&self, object_name: &str, record_id: &str) -> Result<Value, CrmError> {
        self.request(Method::GET, &format!("/sobjects/{object_name}/{record_id}"), &[], None)
            .await
    }

    pub async fn create(&self, object_name: &str, fields: &Value) -> Result<Value, CrmError> {
        self.request(Method::POST, &format!("/sobjects/{object_name}"), &[], Some(fields)).await
    }

    pub async fn update(
        &self,
        object_name: &str,
        record_id: &str,
        fields: &Value,
    ) -> Result<(), CrmError> {
        self.request(
            Method::PATCH,
            &format!("/sobjects/{object_name}/{record_id}"),
            &[],
            Some(fields),
        )
        .await?;
        Ok(())
    }

    pub async fn delete(&self, object_name: &str, record_id: &str) -> Result<(), CrmError> {
        self.request(Method::DELETE, &format!("/sobjects/{object_name}/{record_id}"), &[], None)
            .await?;
        Ok(())
    }
}

/// Appends `LIMIT {max_records}` to a query that has no LIMIT clause. A query
/// that already carries one is returned untouched.
pub fn ensure_query_limit(query: &str, max_records: usize) -> String {
    if query.to_uppercase().contains("LIMIT") {
        query.to_owned()
    } else {
        format!("{} LIMIT {max_records}", query.trim_end())
    }
}

/// Caps a query result's `records` array at `max_records`, annotating the
/// payload with the original and displayed counts when anything was dropped.
pub fn limit_query_records(mut response: Value, max_records: usize) -> Value {
    let original_count = match response.get("records").and_then(Value::as_array) {
        Some(records) => records.len(),
        None => return response,
    };
    if original_count <= max_records {
        return response;
    }

    if let Some(records) = response.get_mut("records").and_then(Value::as_array_mut) {
        records.truncate(max_records);
    }
    if let Some(object) = response.as_object_mut() {
        object.insert("_truncated".to_owned(), json!(true));
        object.insert("_original_record_count".to_owned(), json!(original_count));
        object.insert("_displayed_record_count".to_owned(), json!(max_records));
    }
    response
}

/// Truncates a serialized response at a byte budget, cutting at the last
/// whole line inside the budget when there is one.
pub fn truncate_response(text: &str, max_bytes: usize) -> String {
    const MARKER: &str = "\n... (response truncated due to size)";
    if text.len() <= max_bytes {
        return text.to_owned();
    }

    let mut boundary = max_bytes.min(text.len());
    while boundary > 0 && !text.is_char_boundary(boundary) {
        boundary -= 1;
    }
    let head = &text[..boundary];
    let cut = head.rfind('\n').unwrap_or(boundary);
    format!("{}{MARKER}", &text[..cut])
}

fn xml_escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Pulls the text of the first `<tag>...</tag>` pair out of an XML body.
/// Enough for the login response, which is flat and namespace-free at the
/// element level.
fn extract_tag(body: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = body.find(&open)? + open.len();
    let end = body[start..].find(&close)? + start;
    Some(body[start..end].to_owned())
}
