//! Keeps the admin list page in sync with the groups actually held.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, Result};
use bot_logging::{bot_info, bot_warn};
use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use chrono_tz::Tz;
use riconferme_core::admin_list::{
    compute_new_list, extra_groups, missing_groups, ActualGroups, ListChanges, Rename,
};
use riconferme_core::localtime::local_date;
use riconferme_core::{AdminList, Group, TaskResult};
use riconferme_engine::{params, EditParams, Wiki};
use serde_json::Value;

use super::TaskContext;
use crate::keys::{CENTRAL_SUFFIX, EXCLUDE_ADMINS, LIST_TITLE};

const RENAME_WINDOW_DAYS: i64 = 30;

pub(super) async fn run(ctx: &mut TaskContext) -> Result<TaskResult> {
    let now = ctx.now();
    let today = ctx.today();
    let tz = ctx.tz;
    let excluded = ctx.config_list_or_empty(EXCLUDE_ADMINS)?;
    let central_suffix = ctx.config_str(CENTRAL_SUFFIX)?;

    let current = ctx
        .provider
        .admin_list(&mut ctx.wikis.main, &ctx.config)
        .await?
        .clone();
    let actual = actual_groups(&mut ctx.wikis.main, &excluded).await?;
    let renames = recent_renames(&mut ctx.wikis.main, &current, now).await?;

    let mut errors = Vec::new();
    let mut missing = BTreeMap::new();
    for (user, groups) in missing_groups(&current, &actual) {
        let inherited = renames
            .iter()
            .find(|rename| rename.new == user)
            .and_then(|rename| current.get(&rename.old));
        let mut dates = BTreeMap::new();
        for group in groups {
            if inherited.is_some_and(|info| info.group_date(group).is_some()) {
                continue;
            }
            let found = match group {
                Group::Checkuser => {
                    let title = format!("User:{user}@{central_suffix}");
                    flag_date(&mut ctx.wikis.central, &title, group, tz).await?
                }
                _ => flag_date(&mut ctx.wikis.main, &format!("User:{user}"), group, tz).await?,
            };
            match found {
                Some(date) => {
                    dates.insert(group, date);
                }
                None => {
                    bot_warn!("No {group} date found for {user}");
                    errors.push(format!("no {group} date for {user}"));
                }
            }
        }
        if !dates.is_empty() {
            missing.insert(user, dates);
        }
    }

    let changes = ListChanges {
        missing,
        extra: extra_groups(&current, &actual),
        renames,
    };
    let new_list = compute_new_list(&current, &changes, today);
    if new_list == current {
        bot_info!("Admin list already up to date");
        return Ok(if errors.is_empty() {
            TaskResult::nothing()
        } else {
            TaskResult::from_errors(errors)
        });
    }

    bot_info!(
        "Admin list: {} added, {} removed, {} renamed",
        changes.missing.len(),
        changes.extra.len(),
        changes.renames.len()
    );
    let title = ctx.config_str(LIST_TITLE)?;
    let summary = ctx.msg("ric-list-summary")?.text();
    ctx.wikis
        .main
        .edit_page(EditParams::replace(title, new_list.to_json()?).summary(summary))
        .await?;
    ctx.provider.set_admin_list(new_list);
    Ok(TaskResult::from_errors(errors))
}

async fn actual_groups(wiki: &mut Wiki, excluded: &[String]) -> Result<ActualGroups> {
    let users = wiki
        .query_all(params([
            ("action", "query"),
            ("list", "allusers"),
            ("augroup", "sysop"),
            ("auprop", "groups"),
            ("aulimit", "max"),
        ]))
        .await?;

    let mut actual = ActualGroups::new();
    for user in &users {
        let name = user
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("allusers entry without name: {user}"))?;
        if excluded.iter().any(|e| e == name) {
            continue;
        }
        let groups: BTreeSet<Group> = user
            .get("groups")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .filter_map(|g| g.parse().ok())
            .collect();
        actual.insert(name.to_string(), groups);
    }
    Ok(actual)
}

fn lists_group(value: Option<&Value>, group: Group) -> bool {
    value
        .and_then(Value::as_array)
        .is_some_and(|groups| groups.iter().any(|g| g.as_str() == Some(group.as_str())))
}

/// Local date of the most recent grant of `group` in the rights log of
/// `title`.
async fn flag_date(
    wiki: &mut Wiki,
    title: &str,
    group: Group,
    tz: Tz,
) -> Result<Option<NaiveDate>> {
    let entries = wiki
        .query_all(params([
            ("action", "query"),
            ("list", "logevents"),
            ("letype", "rights"),
            ("letitle", title),
            ("leprop", "details|timestamp"),
            ("lelimit", "max"),
        ]))
        .await?;

    for entry in &entries {
        let Some(details) = entry.get("params") else {
            continue;
        };
        if lists_group(details.get("newgroups"), group)
            && !lists_group(details.get("oldgroups"), group)
        {
            let ts = entry
                .get("timestamp")
                .and_then(Value::as_str)
                .ok_or_else(|| anyhow!("rights log entry without timestamp for {title}"))?;
            let ts = DateTime::parse_from_rfc3339(ts)?.with_timezone(&Utc);
            return Ok(Some(local_date(ts, tz)));
        }
    }
    Ok(None)
}

/// Renames of listed users in the last month, oldest first, following
/// chains of renames.
async fn recent_renames(
    wiki: &mut Wiki,
    current: &AdminList,
    now: DateTime<Utc>,
) -> Result<Vec<Rename>> {
    let since =
        (now - Duration::days(RENAME_WINDOW_DAYS)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let entries = wiki
        .query_all(params([
            ("action", "query"),
            ("list", "logevents"),
            ("letype", "renameuser"),
            ("leprop", "details|timestamp"),
            ("leend", since.as_str()),
            ("lelimit", "max"),
        ]))
        .await?;

    let mut known: BTreeSet<String> = current.iter().map(|(name, _)| name.to_string()).collect();
    let mut renames = Vec::new();
    for entry in entries.iter().rev() {
        let Some(details) = entry.get("params") else {
            continue;
        };
        let (Some(old), Some(new)) = (
            details.get("olduser").and_then(Value::as_str),
            details.get("newuser").and_then(Value::as_str),
        ) else {
            continue;
        };
        if known.contains(old) {
            bot_info!("{old} was renamed to {new}");
            known.insert(new.to_string());
            renames.push(Rename {
                old: old.to_string(),
                new: new.to_string(),
            });
        }
    }
    Ok(renames)
}
