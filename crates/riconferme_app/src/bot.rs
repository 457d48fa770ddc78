//! Wiring of one run: wikis, messages, configuration and the on-wiki log.

use std::sync::Arc;

use anyhow::{Context, Result};
use bot_logging::{bot_info, LogBuffer};
use chrono::NaiveDate;
use riconferme_core::config::parse_config_page;
use riconferme_core::localtime::time_with_article;
use riconferme_core::{Clock, Config, ConfigError, MessageProvider, TaskResult};
use riconferme_engine::{Credentials, EditParams, Transport, Wiki, WikiGroup};
use serde_json::Value;

use crate::keys::{BOT_EDITS, LOG_PAGE};
use crate::platform::settings::Settings;
use crate::tasks::{RunMode, TaskContext, TaskManager};

const FALLBACK_LOG_SUMMARY: &str = "Log";

pub struct Bot {
    settings: Settings,
    ctx: TaskContext,
    log_page: Option<String>,
}

impl Bot {
    pub fn new(settings: Settings, transport: Arc<dyn Transport>, clock: Clock) -> Result<Self> {
        let tz = settings.time_zone()?;
        let credentials = Credentials {
            username: settings.username.clone(),
            password: settings.password.clone(),
        };
        let wiki = |api_url: &str| {
            Wiki::new(api_url, Arc::clone(&transport)).with_credentials(credentials.clone())
        };
        let wikis = WikiGroup::new(
            wiki(&settings.main_api_url),
            wiki(&settings.central_api_url),
            wiki(&settings.private_api_url),
        );
        let log_page = settings.config.get(LOG_PAGE).cloned();
        Ok(Self {
            ctx: TaskContext::new(wikis, Config::new(), clock, tz),
            settings,
            log_page,
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.ctx.today()
    }

    /// Loads messages and configuration from the main wiki. Local entries
    /// of the settings file override the on-wiki ones.
    pub async fn prepare(&mut self) -> Result<()> {
        let main = &mut self.ctx.wikis.main;
        let messages = main
            .get_page_content(&self.settings.msg_title)
            .await
            .with_context(|| format!("reading messages from {}", self.settings.msg_title))?;
        self.ctx.messages = MessageProvider::from_json(&messages)?;

        let config_page = main
            .get_page_content(&self.settings.config_title)
            .await
            .with_context(|| format!("reading configuration from {}", self.settings.config_title))?;
        let mut values = parse_config_page(&config_page)?;
        for (key, value) in &self.settings.config {
            values.insert(key.clone(), Value::String(value.clone()));
        }
        self.ctx.config.init(values)?;

        let bot_edits = match self.ctx.config.get_bool(BOT_EDITS) {
            Err(ConfigError::Missing(_)) => false,
            other => other?,
        };
        self.ctx.wikis.main.set_bot_edits(bot_edits);
        if let Some(page) = self.ctx.config.get_opt_str(LOG_PAGE)? {
            self.log_page = Some(page.to_string());
        }
        bot_info!(
            "Loaded {} messages, bot edits {}",
            self.ctx.messages.len(),
            if bot_edits { "on" } else { "off" }
        );
        Ok(())
    }

    pub async fn run(&mut self, mode: &RunMode) -> TaskResult {
        TaskManager::run(mode, &mut self.ctx).await
    }

    /// Appends the buffered warnings and errors to the log page of the
    /// private wiki. Nothing is written when the buffer is empty.
    pub async fn flush_log(&mut self, buffer: &LogBuffer) -> Result<()> {
        let lines = buffer.take();
        if lines.is_empty() {
            return Ok(());
        }
        let Some(page) = self.log_page.clone() else {
            anyhow::bail!("no log page configured, {} log lines dropped", lines.len());
        };
        let text = log_section(&time_with_article(self.ctx.now(), self.ctx.tz), &lines);
        let summary = self
            .ctx
            .msg("ric-log-summary")
            .map(|msg| msg.text())
            .unwrap_or_else(|_| FALLBACK_LOG_SUMMARY.to_string());
        self.ctx
            .wikis
            .private
            .edit_page(EditParams::append(page, text).summary(summary))
            .await?;
        Ok(())
    }
}

fn log_section(when: &str, lines: &[String]) -> String {
    let mut text = format!("\n;Esecuzione {when}");
    for line in lines {
        text.push_str("\n* ");
        text.push_str(line);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_lines_become_a_list() {
        let lines = vec!["WARN: a".to_string(), "ERROR: b".to_string()];
        assert_eq!(
            log_section("il 1 marzo alle 10:00", &lines),
            "\n;Esecuzione il 1 marzo alle 10:00\n* WARN: a\n* ERROR: b"
        );
    }
}
