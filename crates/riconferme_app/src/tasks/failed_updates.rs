//! Follow-ups for the procedures that ended with a failure.

use anyhow::Result;
use bot_logging::bot_info;
use riconferme_core::localtime::format_long_date;
use riconferme_core::messages::comma_list;
use riconferme_core::wikitext::{add_announcement, close_timeline_bar, remove_bureaucrat_row};
use riconferme_core::{Group, TaskResult};
use riconferme_engine::EditParams;

use super::{closed_procedures, rewrite_page, ClosedProcedure, TaskContext};
use crate::keys::{
    ANNOUNCE_PAGE_TITLE, BUREAUCRATS_LIST_TITLE, FLAG_REMOVAL_TITLE, LATEST_NEWS_TITLE,
    TIMELINE_TITLE,
};

pub(super) async fn run(ctx: &mut TaskContext) -> Result<TaskResult> {
    let failed: Vec<ClosedProcedure> = closed_procedures(ctx)
        .await?
        .into_iter()
        .filter(|c| c.outcome.is_failure())
        .collect();
    if failed.is_empty() {
        bot_info!("No failed procedures");
        return Ok(TaskResult::nothing());
    }

    update_bureaucrats(ctx, &failed).await?;
    request_flag_removal(ctx, &failed).await?;
    announce(ctx, &failed).await?;
    add_latest_news(ctx, &failed).await?;
    update_timeline(ctx, &failed).await?;
    Ok(TaskResult::good())
}

async fn update_bureaucrats(ctx: &mut TaskContext, failed: &[ClosedProcedure]) -> Result<()> {
    let users: Vec<&str> = failed
        .iter()
        .filter(|c| c.info.group_date(Group::Bureaucrat).is_some())
        .map(|c| c.user.as_str())
        .collect();
    if users.is_empty() {
        return Ok(());
    }
    let title = ctx.config_str(BUREAUCRATS_LIST_TITLE)?;
    let summary = ctx.msg("ric-bureaucrats-list-summary")?.text();
    rewrite_page(&mut ctx.wikis.main, &title, summary, |content| {
        let mut content = content.to_string();
        for user in &users {
            content = remove_bureaucrat_row(&content, user)?;
        }
        Ok(content)
    })
    .await?;
    Ok(())
}

async fn request_flag_removal(ctx: &mut TaskContext, failed: &[ClosedProcedure]) -> Result<()> {
    let title = ctx.config_str(FLAG_REMOVAL_TITLE)?;
    for procedure in failed {
        let groups: Vec<&str> = procedure.info.groups().map(Group::as_str).collect();
        let heading = ctx
            .msg("ric-flag-removal-title")?
            .param("$user", &procedure.user)
            .text();
        let text = ctx
            .msg("ric-flag-removal-text")?
            .params([
                ("$user", procedure.user.as_str()),
                ("$title", procedure.title.as_str()),
                ("$groups", comma_list(&groups).as_str()),
            ])
            .text();
        let summary = ctx
            .msg("ric-flag-removal-summary")?
            .param("$user", &procedure.user)
            .text();
        ctx.wikis
            .central
            .edit_page(EditParams::new_section(title.as_str(), heading, text).summary(summary))
            .await?;
    }
    Ok(())
}

async fn announce(ctx: &mut TaskContext, failed: &[ClosedProcedure]) -> Result<()> {
    let today = ctx.today();
    let mut lines = Vec::with_capacity(failed.len());
    for procedure in failed {
        lines.push(
            ctx.msg("ric-announce-line")?
                .params([
                    ("$user", procedure.user.as_str()),
                    ("$title", procedure.title.as_str()),
                ])
                .text(),
        );
    }
    let title = ctx.config_str(ANNOUNCE_PAGE_TITLE)?;
    let summary = ctx.msg("ric-announce-summary")?.text();
    rewrite_page(&mut ctx.wikis.main, &title, summary, |content| {
        Ok(lines
            .iter()
            .fold(content.to_string(), |page, line| add_announcement(&page, today, line)))
    })
    .await?;
    Ok(())
}

async fn add_latest_news(ctx: &mut TaskContext, failed: &[ClosedProcedure]) -> Result<()> {
    let date = format_long_date(ctx.today());
    let mut text = String::new();
    for procedure in failed {
        text.push_str(
            &ctx.msg("ric-latest-news-text")?
                .params([
                    ("$user", procedure.user.as_str()),
                    ("$title", procedure.title.as_str()),
                    ("$date", date.as_str()),
                ])
                .text(),
        );
        text.push('\n');
    }
    let title = ctx.config_str(LATEST_NEWS_TITLE)?;
    let summary = ctx.msg("ric-latest-news-summary")?.text();
    ctx.wikis
        .main
        .edit_page(EditParams::prepend(title, text).summary(summary))
        .await?;
    Ok(())
}

async fn update_timeline(ctx: &mut TaskContext, failed: &[ClosedProcedure]) -> Result<()> {
    let today = ctx.today();
    let title = ctx.config_str(TIMELINE_TITLE)?;
    let summary = ctx.msg("ric-timeline-summary")?.text();
    rewrite_page(&mut ctx.wikis.main, &title, summary, |content| {
        let mut content = content.to_string();
        for procedure in failed {
            content = close_timeline_bar(&content, &procedure.user, today)?;
        }
        Ok(content)
    })
    .await?;
    Ok(())
}
