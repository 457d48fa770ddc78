//! Announces the procedures created in this run on the shared pages.

use anyhow::Result;
use bot_logging::bot_info;
use chrono_tz::Tz;
use riconferme_core::localtime::time_with_article;
use riconferme_core::procedure::silent_end;
use riconferme_core::wikitext::{
    add_block_lines, transclusions, update_news_counter, VotesBlock, SILENT_NEWS_COUNTER,
};
use riconferme_core::TaskResult;
use riconferme_engine::EditParams;

use super::{rewrite_page, TaskContext};
use crate::keys::{MAIN_PAGE_TITLE, NEWS_PAGE_TITLE, VOTE_PAGE_TITLE};
use crate::page::ProcedurePage;

pub(super) async fn run(ctx: &mut TaskContext) -> Result<TaskResult> {
    let mut pages: Vec<ProcedurePage> = ctx.provider.created_pages().to_vec();
    if pages.is_empty() {
        bot_info!("No procedures were opened");
        return Ok(TaskResult::nothing());
    }

    add_to_main_page(ctx, &pages).await?;
    add_vote_lines(ctx, &mut pages).await?;
    update_news(ctx, pages.len()).await?;
    Ok(TaskResult::good())
}

async fn add_to_main_page(ctx: &mut TaskContext, pages: &[ProcedurePage]) -> Result<()> {
    let title = ctx.config_str(MAIN_PAGE_TITLE)?;
    let titles: Vec<&str> = pages.iter().map(ProcedurePage::title).collect();
    let summary = ctx
        .msg("ric-main-page-summary")?
        .param("$num", pages.len().to_string())
        .text();
    ctx.wikis
        .main
        .edit_page(EditParams::append(title, transclusions(&titles)).summary(summary))
        .await?;
    Ok(())
}

async fn add_vote_lines(ctx: &mut TaskContext, pages: &mut [ProcedurePage]) -> Result<()> {
    let tz: Tz = ctx.tz;
    let mut lines = Vec::with_capacity(pages.len());
    for page in pages.iter_mut() {
        let end = silent_end(page.creation_ts(&mut ctx.wikis.main).await?);
        lines.push(
            ctx.msg("ric-vote-line")?
                .params([
                    ("$user", page.user()),
                    ("$title", page.title()),
                    ("$end", time_with_article(end, tz).as_str()),
                ])
                .text(),
        );
    }

    let title = ctx.config_str(VOTE_PAGE_TITLE)?;
    let summary = ctx
        .msg("ric-votes-page-summary")?
        .param("$num", pages.len().to_string())
        .text();
    rewrite_page(&mut ctx.wikis.main, &title, summary, |content| {
        Ok(add_block_lines(content, VotesBlock::Silent, &lines)?)
    })
    .await?;
    Ok(())
}

async fn update_news(ctx: &mut TaskContext, opened: usize) -> Result<()> {
    let title = ctx.config_str(NEWS_PAGE_TITLE)?;
    let summary = ctx
        .msg("ric-news-page-summary")?
        .param("$num", opened.to_string())
        .text();
    rewrite_page(&mut ctx.wikis.main, &title, summary, |content| {
        Ok(update_news_counter(content, SILENT_NEWS_COUNTER, opened as i64)?)
    })
    .await?;
    Ok(())
}
