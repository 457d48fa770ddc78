//! Turns silent procedures that met opposition into votes.

use anyhow::Result;
use bot_logging::bot_info;
use riconferme_core::localtime::time_with_article;
use riconferme_core::procedure::open_vote_content;
use riconferme_core::wikitext::{
    add_block_lines, remove_empty_blocks, remove_procedure_lines, update_news_counter,
    VotesBlock, SILENT_NEWS_COUNTER, VOTE_NEWS_COUNTER,
};
use riconferme_core::TaskResult;
use riconferme_engine::EditParams;

use super::{rewrite_page, TaskContext};
use crate::keys::{NEWS_PAGE_TITLE, VOTE_PAGE_TITLE};
use crate::page::{vote_end_from, ProcedurePage};

pub(super) async fn run(ctx: &mut TaskContext) -> Result<TaskResult> {
    let open = ctx
        .provider
        .open_pages(&mut ctx.wikis.main, &ctx.config)
        .await?
        .to_vec();

    let mut to_start = Vec::new();
    for mut page in open {
        if page.is_vote(&mut ctx.wikis.main).await? {
            continue;
        }
        if page.has_opposition(&mut ctx.wikis.main).await? {
            bot_info!("{} has reached the opposition threshold", page.title());
            to_start.push(page);
        }
    }
    if to_start.is_empty() {
        bot_info!("No votes to start");
        return Ok(TaskResult::nothing());
    }

    for page in &mut to_start {
        open_vote(ctx, page).await?;
    }
    let started: Vec<&str> = to_start.iter().map(ProcedurePage::title).collect();
    for page in ctx
        .provider
        .open_pages(&mut ctx.wikis.main, &ctx.config)
        .await?
        .iter_mut()
    {
        if started.contains(&page.title()) {
            page.invalidate();
        }
    }

    update_votes_page(ctx, &to_start).await?;
    update_news(ctx, to_start.len()).await?;
    Ok(TaskResult::good())
}

async fn open_vote(ctx: &mut TaskContext, page: &mut ProcedurePage) -> Result<()> {
    let content = open_vote_content(page.content(&mut ctx.wikis.main).await?);
    let summary = ctx.msg("ric-vote-start-page-summary")?.text();
    ctx.wikis
        .main
        .edit_page(EditParams::replace(page.title(), content).summary(summary))
        .await?;
    page.invalidate();
    Ok(())
}

/// Moves the users from the silent block to the vote block.
async fn update_votes_page(ctx: &mut TaskContext, pages: &[ProcedurePage]) -> Result<()> {
    let end = time_with_article(vote_end_from(ctx.now()), ctx.tz);
    let users: Vec<&str> = pages.iter().map(ProcedurePage::user).collect();
    let mut lines = Vec::with_capacity(pages.len());
    for page in pages {
        lines.push(
            ctx.msg("ric-vote-line")?
                .params([
                    ("$user", page.user()),
                    ("$title", page.title()),
                    ("$end", end.as_str()),
                ])
                .text(),
        );
    }

    let title = ctx.config_str(VOTE_PAGE_TITLE)?;
    let summary = ctx
        .msg("ric-vote-start-votes-page-summary")?
        .param("$num", pages.len().to_string())
        .text();
    rewrite_page(&mut ctx.wikis.main, &title, summary, |content| {
        let content = remove_procedure_lines(content, &users)?;
        let content = add_block_lines(&content, VotesBlock::Vote, &lines)?;
        Ok(remove_empty_blocks(&content))
    })
    .await?;
    Ok(())
}

async fn update_news(ctx: &mut TaskContext, started: usize) -> Result<()> {
    let title = ctx.config_str(NEWS_PAGE_TITLE)?;
    let summary = ctx
        .msg("ric-vote-start-news-summary")?
        .param("$num", started.to_string())
        .text();
    let delta = started as i64;
    rewrite_page(&mut ctx.wikis.main, &title, summary, |content| {
        let content = update_news_counter(content, SILENT_NEWS_COUNTER, -delta)?;
        Ok(update_news_counter(&content, VOTE_NEWS_COUNTER, delta)?)
    })
    .await?;
    Ok(())
}
