//! A reconfirmation procedure page, with its derived values cached.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use riconferme_core::procedure::{self, Outcome, ProcedureTitle};
use riconferme_core::ContentError;
use riconferme_engine::Wiki;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedurePage {
    title: ProcedureTitle,
    content: Option<String>,
    support: Option<u32>,
    oppose: Option<u32>,
    quorum: Option<u32>,
    creation: Option<DateTime<Utc>>,
}

impl ProcedurePage {
    pub fn new(title: ProcedureTitle) -> Self {
        Self {
            title,
            content: None,
            support: None,
            oppose: None,
            quorum: None,
            creation: None,
        }
    }

    /// A page this run has just created at `now`.
    pub fn created_at(title: ProcedureTitle, now: DateTime<Utc>) -> Self {
        Self {
            creation: Some(now),
            ..Self::new(title)
        }
    }

    pub fn parse(title: &str) -> Result<Self, ContentError> {
        ProcedureTitle::parse(title).map(Self::new)
    }

    pub fn title(&self) -> &str {
        self.title.as_str()
    }

    pub fn user(&self) -> &str {
        self.title.user()
    }

    pub fn base_title(&self) -> &str {
        self.title.base_title()
    }

    pub async fn content(&mut self, wiki: &mut Wiki) -> Result<&str> {
        let content = match self.content.take() {
            Some(content) => content,
            None => wiki.get_page_content(self.title.as_str()).await?,
        };
        Ok(self.content.insert(content))
    }

    /// Replaces the cached text after the page has been edited.
    pub fn set_content(&mut self, content: String) {
        self.content = Some(content);
    }

    /// Drops the cached text and the counts read from it; the page will be
    /// read again on next use.
    pub fn invalidate(&mut self) {
        self.content = None;
        self.support = None;
        self.oppose = None;
        self.quorum = None;
    }

    pub async fn is_vote(&mut self, wiki: &mut Wiki) -> Result<bool> {
        Ok(procedure::is_vote(self.content(wiki).await?))
    }

    async fn count_section(&mut self, wiki: &mut Wiki, section: u32) -> Result<u32> {
        let text = wiki
            .get_page_section_content(self.title.as_str(), section)
            .await?;
        Ok(procedure::count_votes(&text))
    }

    pub async fn support_count(&mut self, wiki: &mut Wiki) -> Result<u32> {
        if let Some(count) = self.support {
            return Ok(count);
        }
        if !self.is_vote(wiki).await? {
            return Err(ContentError::NotAVote(self.title().to_string()).into());
        }
        let sections = procedure::vote_sections(true);
        let count = self.count_section(wiki, sections.support).await?;
        self.support = Some(count);
        Ok(count)
    }

    pub async fn oppose_count(&mut self, wiki: &mut Wiki) -> Result<u32> {
        if let Some(count) = self.oppose {
            return Ok(count);
        }
        let sections = procedure::vote_sections(self.is_vote(wiki).await?);
        let count = self.count_section(wiki, sections.oppose).await?;
        self.oppose = Some(count);
        Ok(count)
    }

    pub async fn quorum(&mut self, wiki: &mut Wiki) -> Result<u32> {
        if let Some(quorum) = self.quorum {
            return Ok(quorum);
        }
        let quorum = procedure::parse_quorum(self.content(wiki).await?)?;
        self.quorum = Some(quorum);
        Ok(quorum)
    }

    pub async fn has_opposition(&mut self, wiki: &mut Wiki) -> Result<bool> {
        let oppose = self.oppose_count(wiki).await?;
        let quorum = self.quorum(wiki).await?;
        Ok(procedure::has_opposition(oppose, quorum))
    }

    pub async fn outcome(&mut self, wiki: &mut Wiki) -> Result<Outcome> {
        if !self.is_vote(wiki).await? {
            return Ok(Outcome::Ok);
        }
        let support = self.support_count(wiki).await?;
        let oppose = self.oppose_count(wiki).await?;
        let quorum = self.quorum(wiki).await?;
        Ok(procedure::outcome(support, oppose, quorum))
    }

    pub async fn creation_ts(&mut self, wiki: &mut Wiki) -> Result<DateTime<Utc>> {
        if let Some(ts) = self.creation {
            return Ok(ts);
        }
        let ts = wiki.get_page_creation_ts(self.title.as_str()).await?;
        self.creation = Some(ts);
        Ok(ts)
    }

    pub async fn end_ts(&mut self, wiki: &mut Wiki, tz: Tz) -> Result<DateTime<Utc>> {
        if self.is_vote(wiki).await? {
            Ok(procedure::parse_vote_end(self.content(wiki).await?, tz)?)
        } else {
            Ok(procedure::silent_end(self.creation_ts(wiki).await?))
        }
    }

    pub async fn is_to_close(
        &mut self,
        wiki: &mut Wiki,
        tz: Tz,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        Ok(now > self.end_ts(wiki, tz).await?)
    }
}

/// End of a vote opened at `now`.
pub fn vote_end_from(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::days(procedure::VOTE_DURATION_DAYS)
}
