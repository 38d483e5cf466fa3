//! Wikibase connection management: HTTP client, login session, and raw
//! access to the SPARQL endpoint and the MediaWiki action API.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use catalog_core::config::WikibaseConfig;
use catalog_core::CatalogError;

/// Errors from knowledge-base operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Wikibase API error {code}: {info}")]
    Api { code: String, info: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Write conflict for {label:?}: {info}")]
    WriteConflict { label: String, info: String },

    #[error("Parent of {node} via {property}: expected exactly one, found {found:?}")]
    ParentResolution {
        node: String,
        property: String,
        found: Vec<String>,
    },

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// One value in a SPARQL JSON result row.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SparqlTerm {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl SparqlTerm {
    pub fn is_uri(&self) -> bool {
        self.kind == "uri"
    }
}

/// A result row: variable name → bound value. Unbound variables are absent.
pub type SparqlRow = BTreeMap<String, SparqlTerm>;

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    bindings: Vec<SparqlRow>,
}

/// Parse a SPARQL 1.1 JSON results document.
pub fn parse_sparql_json(body: &str) -> Result<Vec<SparqlRow>, GraphError> {
    let response: SparqlResponse = serde_json::from_str(body)
        .map_err(|e| GraphError::Serialization(format!("Bad SPARQL response: {e}")))?;
    Ok(response.results.bindings)
}

/// Logged-in session. Writes and deletes carry its CSRF token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: String,
    pub csrf_token: String,
}

/// Client for one Wikibase instance.
///
/// Clone is cheap (the HTTP client is reference counted); clones share the
/// cookie jar and therefore the login.
#[derive(Clone)]
pub struct WikibaseClient {
    http: reqwest::Client,
    config: WikibaseConfig,
    session: Option<Session>,
}

impl WikibaseClient {
    /// Build the HTTP client and, when a user is configured, log in.
    pub async fn connect(config: &WikibaseConfig) -> Result<Self, GraphError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .build()?;

        let mut client = Self {
            http,
            config: config.clone(),
            session: None,
        };

        if config.user.is_empty() {
            tracing::info!(api = %config.api_url, "No Wikibase user configured, read-only client");
        } else {
            client.session = Some(client.login().await?);
            tracing::info!(api = %config.api_url, user = %config.user, "Logged in to Wikibase");
        }

        Ok(client)
    }

    pub fn config(&self) -> &WikibaseConfig {
        &self.config
    }

    pub(crate) fn session(&self) -> Result<&Session, GraphError> {
        self.session
            .as_ref()
            .ok_or_else(|| GraphError::Auth("write requires a logged-in session".to_string()))
    }

    /// Bot-password login followed by a CSRF token fetch.
    async fn login(&self) -> Result<Session, GraphError> {
        let tokens = self
            .api_get(&[("action", "query"), ("meta", "tokens"), ("type", "login")])
            .await?;
        let login_token = json_str(&tokens, &["query", "tokens", "logintoken"])
            .ok_or_else(|| GraphError::Auth("no login token in response".to_string()))?
            .to_string();

        let login = self
            .api_post(&[
                ("action", "login"),
                ("lgname", self.config.user.as_str()),
                ("lgpassword", self.config.password.as_str()),
                ("lgtoken", login_token.as_str()),
            ])
            .await?;
        match json_str(&login, &["login", "result"]) {
            Some("Success") => {}
            other => {
                let reason = json_str(&login, &["login", "reason"]).unwrap_or("no reason given");
                return Err(GraphError::Auth(format!(
                    "login as {} failed ({}): {reason}",
                    self.config.user,
                    other.unwrap_or("no result")
                )));
            }
        }

        let tokens = self
            .api_get(&[("action", "query"), ("meta", "tokens")])
            .await?;
        let csrf_token = json_str(&tokens, &["query", "tokens", "csrftoken"])
            .ok_or_else(|| GraphError::Auth("no CSRF token in response".to_string()))?
            .to_string();

        Ok(Session {
            user: self.config.user.clone(),
            csrf_token,
        })
    }

    /// Run a SELECT query and return its result rows.
    pub async fn sparql(&self, query: &str) -> Result<Vec<SparqlRow>, GraphError> {
        tracing::debug!(query, "SPARQL query");
        let response = self
            .http
            .get(&self.config.sparql_url)
            .query(&[("query", query), ("format", "json")])
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        parse_sparql_json(&body)
    }

    /// GET against the action API. `format=json` is added.
    pub(crate) async fn api_get(&self, params: &[(&str, &str)]) -> Result<Value, GraphError> {
        let response = self
            .http
            .get(&self.config.api_url)
            .query(params)
            .query(&[("format", "json")])
            .send()
            .await?
            .error_for_status()?;
        check_api_error(response.json().await?)
    }

    /// POST (form-encoded) against the action API. `format=json` is added.
    pub(crate) async fn api_post(&self, params: &[(&str, &str)]) -> Result<Value, GraphError> {
        let mut form: Vec<(&str, &str)> = params.to_vec();
        form.push(("format", "json"));
        let response = self
            .http
            .post(&self.config.api_url)
            .form(&form)
            .send()
            .await?
            .error_for_status()?;
        check_api_error(response.json().await?)
    }
}

/// Turn an `{"error": {...}}` body into [`GraphError::Api`].
pub(crate) fn check_api_error(body: Value) -> Result<Value, GraphError> {
    match body.get("error") {
        Some(error) => Err(GraphError::Api {
            code: error
                .get("code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            info: api_error_info(error),
        }),
        None => Ok(body),
    }
}

/// Human-readable error text, including Wikibase's nested message names.
fn api_error_info(error: &Value) -> String {
    let mut info = error
        .get("info")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if let Some(messages) = error.get("messages").and_then(Value::as_array) {
        for name in messages.iter().filter_map(|m| m.get("name").and_then(Value::as_str)) {
            info.push_str(" [");
            info.push_str(name);
            info.push(']');
        }
    }
    info
}

pub(crate) fn json_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    path.iter()
        .try_fold(value, |v, key| v.get(*key))
        .and_then(Value::as_str)
}
