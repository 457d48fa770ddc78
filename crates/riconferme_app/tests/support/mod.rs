//! In-memory wikis answering the action API calls the bot makes.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use riconferme_app::platform::settings::Settings;
use riconferme_app::Bot;
use riconferme_core::fixed_clock;
use riconferme_engine::{HttpRequest, HttpResponse, Transport, TransportError};
use serde_json::{json, Map, Value};

pub const MAIN: &str = "https://main.test/w/api.php";
pub const CENTRAL: &str = "https://central.test/w/api.php";
pub const PRIVATE: &str = "https://private.test/w/api.php";

pub const CONFIG_TITLE: &str = "Utente:BotRiconferme/Config.json";
pub const MSG_TITLE: &str = "Utente:BotRiconferme/Messages.json";
pub const MAIN_TITLE: &str = "Wikipedia:Amministratori/Riconferma annuale";
pub const LIST_TITLE: &str = "Utente:BotRiconferme/List.json";
pub const VOTES_TITLE: &str = "Wikipedia:Wikipediano/Votazioni";
pub const NEWS_TITLE: &str = "Template:VotazioniRCnews";
pub const LOG_TITLE: &str = "Utente:BotRiconferme/Log";

pub const MESSAGES: &str = include_str!("../fixtures/messages.json");

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

#[derive(Debug, Clone)]
pub struct FakePage {
    pub content: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEdit {
    pub title: String,
    pub summary: String,
    pub bot: bool,
}

#[derive(Debug, Default)]
pub struct FakeWiki {
    pub pages: BTreeMap<String, FakePage>,
    pub allusers: Vec<Value>,
    pub logevents: Vec<Value>,
    pub protected: Vec<String>,
    pub edits: Vec<RecordedEdit>,
    /// Titles of every content read, sections included.
    pub reads: Vec<String>,
}

/// Several wikis keyed by API URL, served through one transport.
pub struct FakeFarm {
    wikis: Mutex<HashMap<String, FakeWiki>>,
    now: DateTime<Utc>,
}

impl FakeFarm {
    pub fn new(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            wikis: Mutex::new(HashMap::new()),
            now,
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, FakeWiki>> {
        self.wikis.lock().unwrap()
    }

    pub fn with_wiki<R>(&self, url: &str, f: impl FnOnce(&mut FakeWiki) -> R) -> R {
        f(self.lock().entry(url.to_string()).or_default())
    }

    pub fn put_page(&self, url: &str, title: &str, content: &str, created: DateTime<Utc>) {
        self.with_wiki(url, |wiki| {
            wiki.pages.insert(
                title.to_string(),
                FakePage {
                    content: content.to_string(),
                    created,
                },
            );
        });
    }

    pub fn page(&self, url: &str, title: &str) -> Option<String> {
        self.with_wiki(url, |wiki| wiki.pages.get(title).map(|p| p.content.clone()))
    }

    pub fn edits(&self, url: &str) -> Vec<RecordedEdit> {
        self.with_wiki(url, |wiki| wiki.edits.clone())
    }

    pub fn reads(&self, url: &str, title: &str) -> usize {
        self.with_wiki(url, |wiki| wiki.reads.iter().filter(|t| *t == title).count())
    }

    pub fn protected(&self, url: &str) -> Vec<String> {
        self.with_wiki(url, |wiki| wiki.protected.clone())
    }

    fn respond(&self, request: &HttpRequest) -> Value {
        let now = self.now;
        self.with_wiki(&request.url, |wiki| wiki.handle(request, now))
    }
}

#[async_trait]
impl Transport for FakeFarm {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        Ok(HttpResponse::json(self.respond(request).to_string()))
    }
}

fn error(code: &str, info: &str) -> Value {
    json!({"error": {"code": code, "info": info}})
}

impl FakeWiki {
    fn handle(&mut self, request: &HttpRequest, now: DateTime<Utc>) -> Value {
        match request.param("action") {
            Some("login") => json!({"login": {"result": "Success"}}),
            Some("edit") => self.edit(request, now),
            Some("protect") => {
                let title = request.param("title").unwrap_or_default().to_string();
                self.protected.push(title.clone());
                json!({"protect": {"title": title}})
            }
            Some("query") => self.query(request),
            other => error("badvalue", &format!("unsupported action {other:?}")),
        }
    }

    fn edit(&mut self, request: &HttpRequest, now: DateTime<Utc>) -> Value {
        let title = request.param("title").unwrap_or_default().to_string();
        let existing = self.pages.get(&title).map(|p| p.content.clone());
        if request.param("createonly").is_some() && existing.is_some() {
            return error(
                "articleexists",
                "The article you tried to create has been created already.",
            );
        }
        let old = existing.clone().unwrap_or_default();
        let content = if let Some(text) = request.param("text") {
            if request.param("section") == Some("new") {
                let heading = request.param("sectiontitle").unwrap_or_default();
                format!("{old}\n\n== {heading} ==\n\n{text}")
            } else {
                text.to_string()
            }
        } else if let Some(text) = request.param("appendtext") {
            format!("{old}{text}")
        } else if let Some(text) = request.param("prependtext") {
            format!("{text}{old}")
        } else {
            return error("missingparam", "one of text, appendtext, prependtext is required");
        };
        let created = self.pages.get(&title).map(|p| p.created).unwrap_or(now);
        self.pages.insert(title.clone(), FakePage { content, created });
        self.edits.push(RecordedEdit {
            title: title.clone(),
            summary: request.param("summary").unwrap_or_default().to_string(),
            bot: request.param("bot") == Some("1"),
        });
        json!({"edit": {"result": "Success", "title": title}})
    }

    fn query(&mut self, request: &HttpRequest) -> Value {
        if request.param("meta") == Some("tokens") {
            let kind = request.param("type").unwrap_or("csrf");
            let mut tokens = Map::new();
            tokens.insert(format!("{kind}token"), json!(format!("{kind}+\\")));
            return json!({"query": {"tokens": tokens}});
        }
        match request.param("list") {
            Some("allusers") => return json!({"query": {"allusers": self.allusers}}),
            Some("allpages") => {
                let prefix = format!("Wikipedia:{}", request.param("apprefix").unwrap_or_default());
                let pages: Vec<Value> = self
                    .pages
                    .keys()
                    .filter(|title| title.starts_with(&prefix))
                    .map(|title| json!({"ns": 4, "title": title}))
                    .collect();
                return json!({"query": {"allpages": pages}});
            }
            Some("logevents") => {
                let kind = request.param("letype");
                let title = request.param("letitle");
                let events: Vec<&Value> = self
                    .logevents
                    .iter()
                    .filter(|e| kind.is_none() || e.get("type").and_then(Value::as_str) == kind)
                    .filter(|e| title.is_none() || e.get("title").and_then(Value::as_str) == title)
                    .collect();
                return json!({"query": {"logevents": events}});
            }
            Some(other) => return error("badvalue", &format!("unsupported list {other}")),
            None => {}
        }

        let title = request.param("titles").unwrap_or_default();
        let Some(page) = self.pages.get(title) else {
            return json!({"query": {"pages": [{"title": title, "missing": true}]}});
        };
        match request.param("prop") {
            Some("templates") => {
                let templates: Vec<Value> = transcluded(&page.content)
                    .into_iter()
                    .filter(|t| t.starts_with("Wikipedia:"))
                    .map(|t| json!({"ns": 4, "title": t}))
                    .collect();
                json!({"query": {"pages": [{"title": title, "templates": templates}]}})
            }
            Some("revisions") if request.param("rvprop") == Some("timestamp") => json!({
                "query": {"pages": [{
                    "title": title,
                    "revisions": [{"timestamp": page.created.to_rfc3339()}]
                }]}
            }),
            Some("revisions") => {
                self.reads.push(title.to_string());
                let content = match request.param("rvsection") {
                    Some(n) => match section(&page.content, n.parse().unwrap_or(usize::MAX)) {
                        Some(text) => text,
                        None => return error("nosuchsection", &format!("There is no section {n}.")),
                    },
                    None => page.content.clone(),
                };
                json!({"query": {"pages": [{
                    "title": title,
                    "revisions": [{"slots": {"main": {"content": content}}}]
                }]}})
            }
            other => error("badvalue", &format!("unsupported prop {other:?}")),
        }
    }
}

fn transcluded(content: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = content;
    while let Some(start) = rest.find("{{") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            break;
        };
        found.push(after[..end].to_string());
        rest = &after[end + 2..];
    }
    found
}

/// Section `n` of `content`; every `=`-delimited line opens a section.
fn section(content: &str, n: usize) -> Option<String> {
    let mut sections: Vec<Vec<&str>> = vec![Vec::new()];
    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.len() > 2 && trimmed.starts_with('=') && trimmed.ends_with('=') {
            sections.push(Vec::new());
        }
        sections.last_mut().unwrap().push(line);
    }
    sections.get(n).map(|lines| lines.join("\n"))
}

pub fn settings() -> Settings {
    Settings {
        main_api_url: MAIN.into(),
        central_api_url: CENTRAL.into(),
        private_api_url: PRIVATE.into(),
        username: "BotRiconferme".into(),
        password: "secret".into(),
        config_title: CONFIG_TITLE.into(),
        msg_title: MSG_TITLE.into(),
        time_zone: "Europe/Rome".into(),
        log_file: PathBuf::from("riconferme.log"),
        last_run_file: PathBuf::from(".riconferme_last_run.ron"),
        request_timeout_secs: 60,
        config: HashMap::from([("bot-edits".to_string(), "1".to_string())]),
    }
}

pub fn config_page() -> String {
    json!({
        "main-page-title": MAIN_TITLE,
        "list-title": LIST_TITLE,
        "vote-page-title": VOTES_TITLE,
        "news-page-title": NEWS_TITLE,
        "admins-list-title": "Wikipedia:Amministratori/Lista",
        "cu-list-title": "Wikipedia:Checkuser/Lista",
        "bureaucrats-list-title": "Wikipedia:Burocrati/Lista",
        "announce-page-title": "Wikipedia:Comunicazioni",
        "latest-news-title": "Wikipedia:Ultime notizie",
        "timeline-title": "Wikipedia:Amministratori/Cronologia",
        "flag-removal-title": "Steward requests/Permissions",
        "simple-archive-title": "Wikipedia:Amministratori/Riconferma annuale/Archivio tacite",
        "vote-archive-title": "Wikipedia:Amministratori/Riconferma annuale/Archivio voti",
        "user-talk-prefix": "Discussioni utente:",
        "exclude-admins": ["FilterBot"],
        "central-suffix": "itwiki",
        "log-page": LOG_TITLE,
        "bot-edits": false
    })
    .to_string()
}

/// A farm with the configuration, messages and shared pages in place.
pub fn farm(now: DateTime<Utc>, admin_list: Value) -> Arc<FakeFarm> {
    let farm = FakeFarm::new(now);
    let old = at(2015, 1, 1, 12);
    farm.put_page(MAIN, CONFIG_TITLE, &config_page(), old);
    farm.put_page(MAIN, MSG_TITLE, MESSAGES, old);
    farm.put_page(MAIN, LIST_TITLE, &admin_list.to_string(), old);
    farm.put_page(MAIN, MAIN_TITLE, "Procedure in corso:\n", old);
    farm.put_page(MAIN, VOTES_TITLE, "== Votazioni ==\n{{In corso}}\n", old);
    farm.put_page(
        MAIN,
        NEWS_TITLE,
        "{{VotazioniRCnews|riconferme tacite amministratori = |riconferme voto amministratori = }}",
        old,
    );
    farm
}

pub async fn prepared_bot(farm: &Arc<FakeFarm>, now: DateTime<Utc>) -> Bot {
    let transport: Arc<dyn Transport> = farm.clone();
    let mut bot = Bot::new(settings(), transport, fixed_clock(now)).unwrap();
    bot.prepare().await.unwrap();
    bot
}
