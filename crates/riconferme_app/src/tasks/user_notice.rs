//! Tells each user that their procedure has started.

use anyhow::Result;
use riconferme_core::TaskResult;
use riconferme_engine::EditParams;

use super::TaskContext;
use crate::keys::USER_TALK_PREFIX;

pub(super) async fn run(ctx: &mut TaskContext) -> Result<TaskResult> {
    let pages = ctx.provider.created_pages().to_vec();
    if pages.is_empty() {
        return Ok(TaskResult::nothing());
    }

    let prefix = ctx.config_str(USER_TALK_PREFIX)?;
    for page in &pages {
        let heading = ctx.msg("ric-user-notice-title")?.text();
        let text = ctx
            .msg("ric-user-notice-text")?
            .params([("$user", page.user()), ("$title", page.title())])
            .text();
        let summary = ctx.msg("ric-user-notice-summary")?.text();
        let talk = format!("{prefix}{}", page.user());
        ctx.wikis
            .main
            .edit_page(EditParams::new_section(talk, heading, text).summary(summary))
            .await?;
    }
    Ok(TaskResult::good())
}
