//! Closes the procedures whose time is up.

use anyhow::Result;
use bot_logging::bot_info;
use riconferme_core::procedure::add_outcome_text;
use riconferme_core::wikitext::{remove_transclusions, replace_in_progress};
use riconferme_core::{Outcome, TaskResult};
use riconferme_engine::EditParams;

use super::{rewrite_page, TaskContext};
use crate::keys::MAIN_PAGE_TITLE;
use crate::page::ProcedurePage;

fn outcome_message(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Ok => "ric-outcome-ok",
        Outcome::FailVotes => "ric-outcome-fail-votes",
        Outcome::NoQuorum => "ric-outcome-no-quorum",
    }
}

fn base_outcome_message(outcome: Outcome) -> &'static str {
    if outcome.is_failure() {
        "ric-base-outcome-fail"
    } else {
        "ric-base-outcome-ok"
    }
}

pub(super) async fn run(ctx: &mut TaskContext) -> Result<TaskResult> {
    let (now, tz) = (ctx.now(), ctx.tz);
    let mut pages = ctx
        .provider
        .pages_to_close(&mut ctx.wikis.main, &ctx.config, tz, now)
        .await?
        .to_vec();
    if pages.is_empty() {
        bot_info!("No procedures to close");
        return Ok(TaskResult::nothing());
    }

    for page in &mut pages {
        let outcome = page.outcome(&mut ctx.wikis.main).await?;
        bot_info!("{} closes with outcome {:?}", page.title(), outcome);
        if page.is_vote(&mut ctx.wikis.main).await? {
            add_outcome(ctx, page, outcome).await?;
        }
        let reason = ctx
            .msg("ric-protect-reason")?
            .param("$title", page.title())
            .text();
        ctx.wikis.main.protect_page(page.title(), &reason).await?;
        update_base_page(ctx, page, outcome).await?;
    }

    let main_title = ctx.config_str(MAIN_PAGE_TITLE)?;
    let titles: Vec<&str> = pages.iter().map(ProcedurePage::title).collect();
    let summary = ctx
        .msg("ric-main-page-remove-summary")?
        .param("$num", pages.len().to_string())
        .text();
    rewrite_page(&mut ctx.wikis.main, &main_title, summary, |content| {
        Ok(remove_transclusions(content, &titles)?)
    })
    .await?;
    ctx.provider.set_pages_to_close(pages);
    Ok(TaskResult::good())
}

async fn add_outcome(
    ctx: &mut TaskContext,
    page: &mut ProcedurePage,
    outcome: Outcome,
) -> Result<()> {
    let text = ctx.msg(outcome_message(outcome))?.text();
    let content = add_outcome_text(page.content(&mut ctx.wikis.main).await?, &text)?;
    let summary = ctx.msg("ric-close-page-summary")?.text();
    ctx.wikis
        .main
        .edit_page(EditParams::replace(page.title(), content.clone()).summary(summary))
        .await?;
    page.set_content(content);
    Ok(())
}

async fn update_base_page(
    ctx: &mut TaskContext,
    page: &ProcedurePage,
    outcome: Outcome,
) -> Result<()> {
    let text = ctx.msg(base_outcome_message(outcome))?.text();
    let summary = ctx
        .msg("ric-base-page-close-summary")?
        .param("$title", page.title())
        .text();
    rewrite_page(&mut ctx.wikis.main, page.base_title(), summary, |content| {
        Ok(replace_in_progress(content, &text)?)
    })
    .await?;
    Ok(())
}
