//! Opens a new procedure page for every user due today.

use anyhow::{anyhow, Result};
use bot_logging::{bot_info, bot_warn};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use riconferme_core::localtime::{format_long_date, local_date};
use riconferme_core::messages::comma_list;
use riconferme_core::{ProcedureTitle, TaskResult};
use riconferme_engine::{params, EditParams, Wiki};
use serde_json::Value;

use super::TaskContext;
use crate::keys::MAIN_PAGE_TITLE;
use crate::page::ProcedurePage;

/// Where the next procedure of a user goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageNumber {
    Next(u32),
    /// The latest procedure was opened today already.
    CreatedToday,
}

pub(super) async fn run(ctx: &mut TaskContext) -> Result<TaskResult> {
    let now = ctx.now();
    let today = ctx.today();
    let tz = ctx.tz;
    let main_title = ctx.config_str(MAIN_PAGE_TITLE)?;

    let users = ctx
        .provider
        .users_to_process(&mut ctx.wikis.main, &ctx.config, today)
        .await?
        .to_vec();
    if users.is_empty() {
        bot_info!("No users to process");
        return Ok(TaskResult::nothing());
    }

    for user in &users {
        let next = next_page_number(&mut ctx.wikis.main, &main_title, user, tz, today).await?;
        let number = match next {
            PageNumber::Next(number) => number,
            PageNumber::CreatedToday => {
                bot_warn!("A procedure for {user} was already opened today, skipping");
                ctx.provider.remove_user(user);
                continue;
            }
        };
        let title = ProcedureTitle::new(&main_title, user, number);
        create_procedure_page(ctx, &title).await?;
        create_or_update_base_page(ctx, &title).await?;
        ctx.provider.add_created_page(ProcedurePage::created_at(title, now));
    }

    if ctx.provider.created_pages().is_empty() {
        return Ok(TaskResult::nothing());
    }
    Ok(TaskResult::good())
}

async fn next_page_number(
    wiki: &mut Wiki,
    main_title: &str,
    user: &str,
    tz: Tz,
    today: NaiveDate,
) -> Result<PageNumber> {
    let prefix = format!("{}/{user}/", strip_namespace(main_title));
    let pages = wiki
        .query_all(params([
            ("action", "query"),
            ("list", "allpages"),
            ("apnamespace", "4"),
            ("apprefix", prefix.as_str()),
            ("aplimit", "max"),
        ]))
        .await?;
    let titles: Vec<&str> = pages
        .iter()
        .filter_map(|page| page.get("title").and_then(Value::as_str))
        .collect();

    let Some(last) = last_procedure(&titles) else {
        return Ok(PageNumber::Next(1));
    };
    let created: DateTime<Utc> = wiki.get_page_creation_ts(last.as_str()).await?;
    Ok(page_number(last.number(), local_date(created, tz), today))
}

fn strip_namespace(title: &str) -> &str {
    title.split_once(':').map(|(_, rest)| rest).unwrap_or(title)
}

/// Procedure with the highest number among `titles`.
fn last_procedure(titles: &[&str]) -> Option<ProcedureTitle> {
    titles
        .iter()
        .filter_map(|title| ProcedureTitle::parse(title).ok())
        .max_by_key(ProcedureTitle::number)
}

fn page_number(last: u32, last_created: NaiveDate, today: NaiveDate) -> PageNumber {
    if last_created == today {
        PageNumber::CreatedToday
    } else {
        PageNumber::Next(last + 1)
    }
}

async fn create_procedure_page(ctx: &mut TaskContext, title: &ProcedureTitle) -> Result<()> {
    let user = title.user();
    let admin_list = ctx
        .provider
        .admin_list(&mut ctx.wikis.main, &ctx.config)
        .await?;
    let info = admin_list
        .get(user)
        .ok_or_else(|| anyhow!("{user} is not in the admin list"))?;
    let flag_date = info
        .valid_flag_date()
        .ok_or_else(|| anyhow!("{user} has no flag date"))?;
    let groups: Vec<&str> = info.groups().map(|group| group.as_str()).collect();
    let number = title.number().to_string();

    let text = ctx
        .msg("ric-page-text")?
        .params([
            ("$user", user),
            ("$date", format_long_date(flag_date).as_str()),
            ("$groups", comma_list(&groups).as_str()),
            ("$num", number.as_str()),
        ])
        .text();
    let summary = ctx.msg("ric-page-summary")?.param("$user", user).text();

    ctx.wikis
        .main
        .edit_page(
            EditParams::replace(title.as_str(), text)
                .summary(summary)
                .create_only(),
        )
        .await?;
    bot_info!("Created {}", title.as_str());
    Ok(())
}

async fn create_or_update_base_page(ctx: &mut TaskContext, title: &ProcedureTitle) -> Result<()> {
    let base = title.base_title();
    let edit = if title.number() == 1 {
        let text = ctx
            .msg("ric-base-page-text")?
            .params([("$title", title.as_str()), ("$user", title.user())])
            .text();
        let summary = ctx.msg("ric-base-page-summary")?.text();
        EditParams::replace(base, text).summary(summary).create_only()
    } else {
        let text = ctx
            .msg("ric-base-page-append")?
            .params([("$title", title.as_str()), ("$user", title.user())])
            .text();
        let summary = ctx.msg("ric-base-page-summary-update")?.text();
        EditParams::append(base, format!("\n{text}")).summary(summary)
    };
    ctx.wikis.main.edit_page(edit).await?;
    Ok(())
}
