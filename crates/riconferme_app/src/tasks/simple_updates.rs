//! Cascades every closed procedure onto the votes, news and list pages.

use anyhow::Result;
use riconferme_core::wikitext::{
    remove_admin_row, remove_checkuser_row, remove_empty_blocks, remove_procedure_lines,
    update_admin_row, update_checkuser_row, update_news_counter, SILENT_NEWS_COUNTER,
    VOTE_NEWS_COUNTER,
};
use riconferme_core::{Group, TaskResult};

use super::{closed_procedures, rewrite_page, ClosedProcedure, TaskContext};
use crate::keys::{ADMINS_LIST_TITLE, CU_LIST_TITLE, NEWS_PAGE_TITLE, VOTE_PAGE_TITLE};

pub(super) async fn run(ctx: &mut TaskContext) -> Result<TaskResult> {
    let closed = closed_procedures(ctx).await?;
    if closed.is_empty() {
        return Ok(TaskResult::nothing());
    }

    update_votes_page(ctx, &closed).await?;
    update_news(ctx, &closed).await?;
    update_admins_list(ctx, &closed).await?;
    update_checkuser_list(ctx, &closed).await?;
    Ok(TaskResult::good())
}

async fn update_votes_page(ctx: &mut TaskContext, closed: &[ClosedProcedure]) -> Result<()> {
    let title = ctx.config_str(VOTE_PAGE_TITLE)?;
    let users: Vec<&str> = closed.iter().map(|c| c.user.as_str()).collect();
    let summary = ctx
        .msg("ric-votes-page-close-summary")?
        .param("$num", closed.len().to_string())
        .text();
    rewrite_page(&mut ctx.wikis.main, &title, summary, |content| {
        Ok(remove_empty_blocks(&remove_procedure_lines(content, &users)?))
    })
    .await?;
    Ok(())
}

async fn update_news(ctx: &mut TaskContext, closed: &[ClosedProcedure]) -> Result<()> {
    let votes = closed.iter().filter(|c| c.is_vote).count() as i64;
    let silent = closed.len() as i64 - votes;
    let title = ctx.config_str(NEWS_PAGE_TITLE)?;
    let summary = ctx
        .msg("ric-news-close-summary")?
        .param("$num", closed.len().to_string())
        .text();
    rewrite_page(&mut ctx.wikis.main, &title, summary, |content| {
        let mut content = content.to_string();
        if silent > 0 {
            content = update_news_counter(&content, SILENT_NEWS_COUNTER, -silent)?;
        }
        if votes > 0 {
            content = update_news_counter(&content, VOTE_NEWS_COUNTER, -votes)?;
        }
        Ok(content)
    })
    .await?;
    Ok(())
}

/// Confirmed sysops get their dates refreshed, failed ones leave the list.
async fn update_admins_list(ctx: &mut TaskContext, closed: &[ClosedProcedure]) -> Result<()> {
    let today = ctx.today();
    let title = ctx.config_str(ADMINS_LIST_TITLE)?;
    let summary = ctx.msg("ric-admins-list-summary")?.text();
    rewrite_page(&mut ctx.wikis.main, &title, summary, |content| {
        let mut content = content.to_string();
        for procedure in closed {
            if procedure.outcome.is_failure() {
                content = remove_admin_row(&content, &procedure.user)?;
                continue;
            }
            let next = procedure.info.next_due_date(today).unwrap_or(today);
            content = update_admin_row(&content, &procedure.user, today, next)?;
        }
        Ok(content)
    })
    .await?;
    Ok(())
}

async fn update_checkuser_list(ctx: &mut TaskContext, closed: &[ClosedProcedure]) -> Result<()> {
    let checkusers: Vec<&ClosedProcedure> = closed
        .iter()
        .filter(|c| c.info.group_date(Group::Checkuser).is_some())
        .collect();
    if checkusers.is_empty() {
        return Ok(());
    }

    let today = ctx.today();
    let title = ctx.config_str(CU_LIST_TITLE)?;
    let summary = ctx.msg("ric-cu-list-summary")?.text();
    rewrite_page(&mut ctx.wikis.main, &title, summary, |content| {
        let mut content = content.to_string();
        for procedure in checkusers {
            content = if procedure.outcome.is_failure() {
                remove_checkuser_row(&content, &procedure.user)?
            } else {
                update_checkuser_row(&content, &procedure.user, today)?
            };
        }
        Ok(content)
    })
    .await?;
    Ok(())
}
