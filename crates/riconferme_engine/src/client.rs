//! Typed operations of one wiki: reading, editing, login and admin actions.

use std::collections::HashMap;
use std::sync::Arc;

use bot_logging::{bot_info, bot_warn};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::cookies::CookieJar;
use crate::edit::EditParams;
use crate::query::QueryResults;
use crate::request::{first_page, params, Params, RequestEngine};
use crate::transport::{Method, Transport};
use crate::ApiError;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session with one wiki. Login state, tokens and cookies are per instance.
#[derive(Debug)]
pub struct Wiki {
    engine: RequestEngine,
    cookies: CookieJar,
    credentials: Option<Credentials>,
    bot_edits: bool,
    logged_in: bool,
    tokens: HashMap<String, String>,
}

impl Wiki {
    pub fn new(api_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            engine: RequestEngine::new(api_url, transport),
            cookies: CookieJar::new(),
            credentials: None,
            bot_edits: false,
            logged_in: false,
            tokens: HashMap::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Marks every edit with `bot=1`.
    pub fn with_bot_edits(mut self, bot_edits: bool) -> Self {
        self.bot_edits = bot_edits;
        self
    }

    pub fn set_bot_edits(&mut self, bot_edits: bool) {
        self.bot_edits = bot_edits;
    }

    pub fn api_url(&self) -> &str {
        self.engine.api_url()
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    pub async fn request(&mut self, method: Method, params: &Params) -> Result<Value, ApiError> {
        self.engine
            .execute_single(&mut self.cookies, method, params)
            .await
    }

    /// Continuation query; `params` must contain `action=query`.
    pub fn query(&mut self, params: Params) -> Result<QueryResults<'_>, ApiError> {
        self.engine.execute_as_query(&mut self.cookies, params)
    }

    pub async fn query_all(&mut self, params: Params) -> Result<Vec<Value>, ApiError> {
        self.query(params)?.collect_all().await
    }

    pub async fn get_page_content(&mut self, title: &str) -> Result<String, ApiError> {
        let request = params([
            ("action", "query"),
            ("prop", "revisions"),
            ("titles", title),
            ("rvprop", "content"),
            ("rvslots", "main"),
        ]);
        let body = self.request(Method::Get, &request).await?;
        read_main_slot(&body, title, None)
    }

    pub async fn get_page_section_content(
        &mut self,
        title: &str,
        section: u32,
    ) -> Result<String, ApiError> {
        let section_param = section.to_string();
        let request = params([
            ("action", "query"),
            ("prop", "revisions"),
            ("titles", title),
            ("rvprop", "content"),
            ("rvslots", "main"),
            ("rvsection", section_param.as_str()),
        ]);
        let body = match self.request(Method::Get, &request).await {
            Err(ApiError::Api { code, .. }) if code == "nosuchsection" => {
                return Err(missing_section(title, section));
            }
            other => other?,
        };
        read_main_slot(&body, title, Some(section))
    }

    /// Timestamp of the first revision.
    pub async fn get_page_creation_ts(&mut self, title: &str) -> Result<DateTime<Utc>, ApiError> {
        let request = params([
            ("action", "query"),
            ("prop", "revisions"),
            ("titles", title),
            ("rvprop", "timestamp"),
            ("rvdir", "newer"),
            ("rvlimit", "1"),
        ]);
        let body = self.request(Method::Get, &request).await?;
        let page = first_page(&body)?;
        if is_missing(page) {
            return Err(ApiError::MissingPage(title.to_string()));
        }
        let ts = page
            .get("revisions")
            .and_then(|r| r.get(0))
            .and_then(|r| r.get("timestamp"))
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::UnexpectedResponse(format!("no revisions for {title}")))?;
        DateTime::parse_from_rfc3339(ts)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|err| ApiError::UnexpectedResponse(format!("bad timestamp {ts}: {err}")))
    }

    /// Logs in once per instance; later calls are no-ops.
    pub async fn login(&mut self) -> Result<(), ApiError> {
        if self.logged_in {
            return Ok(());
        }
        let Some(credentials) = self.credentials.clone() else {
            return Err(ApiError::Login(format!(
                "no credentials configured for {}",
                self.api_url()
            )));
        };
        let token = self
            .get_token("login")
            .await
            .map_err(|err| ApiError::Login(err.to_string()))?;
        let request = params([
            ("action", "login"),
            ("lgname", credentials.username.as_str()),
            ("lgpassword", credentials.password.as_str()),
            ("lgtoken", token.as_str()),
        ]);
        let body = self
            .request(Method::Post, &request)
            .await
            .map_err(|err| ApiError::Login(err.to_string()))?;
        let result = body
            .get("login")
            .and_then(|l| l.get("result"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if result != "Success" {
            let reason = body
                .get("login")
                .and_then(|l| l.get("reason"))
                .and_then(Value::as_str)
                .unwrap_or(result);
            return Err(ApiError::Login(reason.to_string()));
        }
        bot_info!("Logged in to {} as {}", self.api_url(), credentials.username);
        self.logged_in = true;
        self.tokens.clear();
        Ok(())
    }

    /// Token of `kind` (`csrf`, `login`, ...), fetched once and cached.
    pub async fn get_token(&mut self, kind: &str) -> Result<String, ApiError> {
        if let Some(token) = self.tokens.get(kind) {
            return Ok(token.clone());
        }
        let request = params([("action", "query"), ("meta", "tokens"), ("type", kind)]);
        let body = self.request(Method::Get, &request).await?;
        let token = body
            .get("query")
            .and_then(|q| q.get("tokens"))
            .and_then(|t| t.get(format!("{kind}token")))
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::UnexpectedResponse(format!("no {kind} token")))?
            .to_string();
        self.tokens.insert(kind.to_string(), token.clone());
        Ok(token)
    }

    pub async fn edit_page(&mut self, edit: EditParams) -> Result<(), ApiError> {
        self.login().await?;
        let mut request = edit.to_params();
        request.insert("token".into(), self.get_token("csrf").await?);
        if self.bot_edits {
            request.insert("bot".into(), "1".into());
        }
        let body = self.request(Method::Post, &request).await?;
        let outcome = body.get("edit");
        let result = outcome
            .and_then(|e| e.get("result"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        if result == "Success" {
            bot_info!("Edited {}", edit.title);
            return Ok(());
        }
        if outcome.and_then(|e| e.get("captcha")).is_some() {
            return Err(ApiError::EditCaptcha(edit.title));
        }
        Err(ApiError::Edit {
            title: edit.title,
            result: result.to_string(),
        })
    }

    /// Restricts edit and move to sysops, indefinitely.
    pub async fn protect_page(&mut self, title: &str, reason: &str) -> Result<(), ApiError> {
        self.login().await?;
        let token = self.get_token("csrf").await?;
        let request = params([
            ("action", "protect"),
            ("title", title),
            ("protections", "edit=sysop|move=sysop"),
            ("expiry", "infinite"),
            ("reason", reason),
            ("token", token.as_str()),
        ]);
        self.request(Method::Post, &request).await?;
        bot_info!("Protected {title}");
        Ok(())
    }

    /// Blocks `username` indefinitely; an existing block counts as success.
    pub async fn block_user(&mut self, username: &str, reason: &str) -> Result<(), ApiError> {
        self.login().await?;
        let token = self.get_token("csrf").await?;
        let request = params([
            ("action", "block"),
            ("user", username),
            ("expiry", "infinite"),
            ("reason", reason),
            ("nocreate", "1"),
            ("autoblock", "1"),
            ("noemail", "1"),
            ("token", token.as_str()),
        ]);
        match self.request(Method::Post, &request).await {
            Ok(_) => {
                bot_info!("Blocked {username}");
                Ok(())
            }
            Err(ApiError::AlreadyBlocked(info)) => {
                bot_warn!("{username} is already blocked: {info}");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

fn is_missing(page: &Value) -> bool {
    match page.get("missing") {
        Some(Value::Bool(flag)) => *flag,
        Some(_) => true,
        None => false,
    }
}

fn missing_section(title: &str, section: u32) -> ApiError {
    ApiError::MissingSection {
        title: title.to_string(),
        section,
    }
}

fn read_main_slot(body: &Value, title: &str, section: Option<u32>) -> Result<String, ApiError> {
    let page = first_page(body)?;
    if is_missing(page) {
        return Err(ApiError::MissingPage(title.to_string()));
    }
    let revision = page
        .get("revisions")
        .and_then(|r| r.get(0))
        .ok_or_else(|| ApiError::UnexpectedResponse(format!("no revisions for {title}")))?;
    if let Some(section) = section {
        if revision.get("nosuchsection").is_some() || page.get("nosuchsection").is_some() {
            return Err(missing_section(title, section));
        }
    }
    let slot = revision.get("slots").and_then(|s| s.get("main"));
    slot.and_then(|s| s.get("content").or_else(|| s.get("*")))
        .or_else(|| revision.get("content"))
        .or_else(|| revision.get("*"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ApiError::UnexpectedResponse(format!("no content for {title}")))
}
