//! Lists the closed procedures in the yearly archives.

use anyhow::Result;
use chrono::Datelike;
use riconferme_core::wikitext::transclusions;
use riconferme_core::TaskResult;
use riconferme_engine::EditParams;

use super::TaskContext;
use crate::keys::{SIMPLE_ARCHIVE_TITLE, VOTE_ARCHIVE_TITLE};

pub(super) async fn run(ctx: &mut TaskContext) -> Result<TaskResult> {
    let (now, tz) = (ctx.now(), ctx.tz);
    let year = ctx.today().year();
    let mut pages = ctx
        .provider
        .pages_to_close(&mut ctx.wikis.main, &ctx.config, tz, now)
        .await?
        .to_vec();
    if pages.is_empty() {
        return Ok(TaskResult::nothing());
    }

    let mut simple = Vec::new();
    let mut votes = Vec::new();
    for page in &mut pages {
        if page.is_vote(&mut ctx.wikis.main).await? {
            votes.push(page.title().to_string());
        } else {
            simple.push(page.title().to_string());
        }
    }
    ctx.provider.set_pages_to_close(pages);

    for (key, titles) in [(SIMPLE_ARCHIVE_TITLE, simple), (VOTE_ARCHIVE_TITLE, votes)] {
        if titles.is_empty() {
            continue;
        }
        let archive = format!("{}/{year}", ctx.config_str(key)?);
        let summary = ctx
            .msg("ric-archive-summary")?
            .param("$num", titles.len().to_string())
            .text();
        ctx.wikis
            .main
            .edit_page(EditParams::append(archive, transclusions(&titles)).summary(summary))
            .await?;
    }
    Ok(TaskResult::good())
}
