//! Per-run shared data, computed on first use.

use anyhow::Result;
use bot_logging::{bot_debug, bot_info};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use riconferme_core::procedure::matches_procedure_title;
use riconferme_core::{AdminList, Config};
use riconferme_engine::{params, Wiki};
use serde_json::Value;

use crate::keys::{LIST_TITLE, MAIN_PAGE_TITLE};
use crate::page::ProcedurePage;

#[derive(Debug, Default)]
pub struct TaskDataProvider {
    admin_list: Option<AdminList>,
    users_to_process: Option<Vec<String>>,
    open_pages: Option<Vec<ProcedurePage>>,
    pages_to_close: Option<Vec<ProcedurePage>>,
    created_pages: Vec<ProcedurePage>,
}

impl TaskDataProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn admin_list(&mut self, wiki: &mut Wiki, config: &Config) -> Result<&AdminList> {
        let list = match self.admin_list.take() {
            Some(list) => list,
            None => {
                let title = config.get_str(LIST_TITLE)?;
                let text = wiki.get_page_content(title).await?;
                let list = AdminList::from_json(&text)?;
                bot_debug!("Loaded admin list with {} entries", list.len());
                list
            }
        };
        Ok(self.admin_list.insert(list))
    }

    /// Replaces the cached list after it has been written back.
    pub fn set_admin_list(&mut self, list: AdminList) {
        self.admin_list = Some(list);
    }

    pub async fn users_to_process(
        &mut self,
        wiki: &mut Wiki,
        config: &Config,
        today: NaiveDate,
    ) -> Result<&[String]> {
        let users = match self.users_to_process.take() {
            Some(users) => users,
            None => {
                let users = self.admin_list(wiki, config).await?.users_due(today);
                bot_info!("{} users due on {}", users.len(), today);
                users
            }
        };
        Ok(self.users_to_process.insert(users))
    }

    pub fn remove_user(&mut self, name: &str) {
        if let Some(users) = &mut self.users_to_process {
            users.retain(|user| user != name);
        }
    }

    /// Procedures transcluded in the main page.
    pub async fn open_pages(
        &mut self,
        wiki: &mut Wiki,
        config: &Config,
    ) -> Result<&mut [ProcedurePage]> {
        let pages = match self.open_pages.take() {
            Some(pages) => pages,
            None => load_open_pages(wiki, config).await?,
        };
        Ok(self.open_pages.insert(pages))
    }

    /// Open procedures whose end is before `now`.
    pub async fn pages_to_close(
        &mut self,
        wiki: &mut Wiki,
        config: &Config,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Result<&mut [ProcedurePage]> {
        let pages = match self.pages_to_close.take() {
            Some(pages) => pages,
            None => {
                let mut to_close = Vec::new();
                for page in self.open_pages(wiki, config).await?.iter_mut() {
                    if page.is_to_close(wiki, tz, now).await? {
                        to_close.push(page.clone());
                    }
                }
                bot_info!("{} procedures to close", to_close.len());
                to_close
            }
        };
        Ok(self.pages_to_close.insert(pages))
    }

    /// Stores pages taken from `pages_to_close`, with whatever they have
    /// read since, so later units do not read them again.
    pub fn set_pages_to_close(&mut self, pages: Vec<ProcedurePage>) {
        self.pages_to_close = Some(pages);
    }

    pub fn created_pages(&self) -> &[ProcedurePage] {
        &self.created_pages
    }

    pub fn add_created_page(&mut self, page: ProcedurePage) {
        self.created_pages.push(page);
    }
}

async fn load_open_pages(wiki: &mut Wiki, config: &Config) -> Result<Vec<ProcedurePage>> {
    let main_title = config.get_str(MAIN_PAGE_TITLE)?;
    let results = wiki
        .query_all(params([
            ("action", "query"),
            ("prop", "templates"),
            ("titles", main_title),
            ("tlnamespace", "4"),
            ("tllimit", "max"),
        ]))
        .await?;

    let mut pages: Vec<ProcedurePage> = Vec::new();
    let titles = results
        .iter()
        .filter_map(|page| page.get("templates").and_then(Value::as_array))
        .flatten()
        .filter_map(|template| template.get("title").and_then(Value::as_str))
        .filter(|title| matches_procedure_title(main_title, title));
    for title in titles {
        if pages.iter().any(|page| page.title() == title) {
            continue;
        }
        pages.push(ProcedurePage::parse(title)?);
    }
    bot_info!("{} open procedures", pages.len());
    Ok(pages)
}
