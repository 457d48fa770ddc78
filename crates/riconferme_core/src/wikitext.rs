//! Text transforms applied to the auxiliary pages a procedure touches.
//!
//! Each function takes the current page text and returns the new one; none
//! of them performs IO. A pattern that must be present and is not yields
//! [`ContentError::MissingMatch`].

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::{Captures, Regex};

use crate::error::ContentError;
use crate::localtime::{format_long_date, format_short_date, month_name};
use crate::procedure::replace_literal;

pub const SILENT_NEWS_COUNTER: &str = "riconferme tacite amministratori";
pub const VOTE_NEWS_COUNTER: &str = "riconferme voto amministratori";

static IN_PROGRESS_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\{\{In corso\}\}[ \t]*$").expect("valid regex"));

static EMPTY_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<div id="(?:riconferma-tacita|vota-riconferma)">\s*</div>\n?"#)
        .expect("valid regex")
});

const IN_PROGRESS_MARKER: &str = "riconferma in corso";

fn alternation<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|s| regex::escape(s.as_ref()))
        .collect::<Vec<_>>()
        .join("|")
}

fn compile(pattern: &str) -> Result<Regex, ContentError> {
    Regex::new(pattern).map_err(|err| ContentError::MissingMatch(err.to_string()))
}

/// `\n{{a}}\n{{b}}`, ready to be appended to a page.
pub fn transclusions<S: AsRef<str>>(titles: &[S]) -> String {
    titles
        .iter()
        .map(|t| format!("\n{{{{{}}}}}", t.as_ref()))
        .collect()
}

/// Drops `{{title}}` lines, with or without the `Wikipedia:` prefix.
pub fn remove_transclusions<S: AsRef<str>>(
    content: &str,
    titles: &[S],
) -> Result<String, ContentError> {
    if titles.is_empty() {
        return Ok(content.to_string());
    }
    let bare: Vec<&str> = titles
        .iter()
        .map(|t| {
            let t = t.as_ref();
            t.strip_prefix("Wikipedia:").unwrap_or(t)
        })
        .collect();
    let pattern = format!(r"\{{\{{(?:Wikipedia:)?(?:{})\}}\}}\n?", alternation(&bare));
    Ok(replace_literal(&compile(&pattern)?, content, ""))
}

/// Adds `delta` to the `name = N` parameter of the news template. A zero
/// count is written as an empty value.
pub fn update_news_counter(content: &str, name: &str, delta: i64) -> Result<String, ContentError> {
    let name_pattern = name
        .split(' ')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[ _]");
    let re = compile(&format!(r"(\| *{name_pattern} *= *)(\d*)(\s*[}}|])"))?;
    let caps = re
        .captures(content)
        .ok_or_else(|| ContentError::MissingMatch(format!("news counter {name}")))?;
    let current: i64 = caps[2].parse().unwrap_or(0);
    let updated = (current + delta).max(0);
    let value = if updated == 0 {
        String::new()
    } else {
        updated.to_string()
    };
    let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
    Ok(format!(
        "{}{}{}{}{}",
        &content[..whole.start],
        &caps[1],
        value,
        &caps[3],
        &content[whole.end..]
    ))
}

/// Reads the current value of a news counter; empty means zero.
pub fn news_counter(content: &str, name: &str) -> Result<u32, ContentError> {
    let name_pattern = name
        .split(' ')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[ _]");
    let re = compile(&format!(r"\| *{name_pattern} *= *(\d*)\s*[}}|]"))?;
    let caps = re
        .captures(content)
        .ok_or_else(|| ContentError::MissingMatch(format!("news counter {name}")))?;
    Ok(caps[1].parse().unwrap_or(0))
}

/// The two blocks of the votes page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotesBlock {
    Silent,
    Vote,
}

impl VotesBlock {
    pub fn div_id(self) -> &'static str {
        match self {
            VotesBlock::Silent => "riconferma-tacita",
            VotesBlock::Vote => "vota-riconferma",
        }
    }

    fn opening(self) -> String {
        format!("<div id=\"{}\">", self.div_id())
    }
}

/// Inserts `lines` at the end of `block`, creating the block right after
/// `{{In corso}}` when it does not exist yet.
pub fn add_block_lines<S: AsRef<str>>(
    content: &str,
    block: VotesBlock,
    lines: &[S],
) -> Result<String, ContentError> {
    let body: String = lines
        .iter()
        .map(|l| format!("{}\n", l.as_ref()))
        .collect();
    let opening = block.opening();
    if let Some(start) = content.find(&opening) {
        let close = content[start..]
            .find("</div>")
            .map(|offset| start + offset)
            .ok_or_else(|| ContentError::MissingMatch(format!("end of {}", block.div_id())))?;
        let mut out = String::with_capacity(content.len() + body.len() + 1);
        out.push_str(&content[..close]);
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&body);
        out.push_str(&content[close..]);
        return Ok(out);
    }

    let header = IN_PROGRESS_HEADER_RE
        .find(content)
        .ok_or_else(|| ContentError::MissingMatch("{{In corso}}".into()))?;
    Ok(format!(
        "{}\n{}\n{}</div>{}",
        &content[..header.end()],
        opening,
        body,
        &content[header.end()..]
    ))
}

/// Drops the list lines linking to a procedure of one of `users`.
pub fn remove_procedure_lines<S: AsRef<str>>(
    content: &str,
    users: &[S],
) -> Result<String, ContentError> {
    if users.is_empty() {
        return Ok(content.to_string());
    }
    let pattern = format!(
        r"(?m)^\*.*\[\[[^|\]\n]*/(?:{})/\d+\|.*\n?",
        alternation(users)
    );
    Ok(replace_literal(&compile(&pattern)?, content, ""))
}

pub fn remove_empty_blocks(content: &str) -> String {
    replace_literal(&EMPTY_BLOCK_RE, content, "")
}

fn admin_row_re(user: &str) -> Result<Regex, ContentError> {
    compile(&format!(
        r"(?m)^(.*\{{\{{Ammini\w+/riga\|{}\|[^\d\n]+\|\d{{8}}\|)(?:\d{{8}})?\|\d{{8}}((?:\|[a-z]*)?\}}\}}.*\n?)",
        regex::escape(user)
    ))
}

/// Sets the last and next confirmation dates (`yyyymmdd`) in the admins
/// list row of `user`.
pub fn update_admin_row(
    content: &str,
    user: &str,
    last: NaiveDate,
    next: NaiveDate,
) -> Result<String, ContentError> {
    let re = admin_row_re(user)?;
    if !re.is_match(content) {
        return Err(ContentError::MissingMatch(format!("admin row of {user}")));
    }
    let last = last.format("%Y%m%d").to_string();
    let next = next.format("%Y%m%d").to_string();
    Ok(re
        .replace(content, |caps: &Captures<'_>| {
            format!("{}{}|{}{}", &caps[1], last, next, &caps[2])
        })
        .into_owned())
}

pub fn remove_admin_row(content: &str, user: &str) -> Result<String, ContentError> {
    let re = admin_row_re(user)?;
    if !re.is_match(content) {
        return Err(ContentError::MissingMatch(format!("admin row of {user}")));
    }
    Ok(replace_literal(&re, content, ""))
}

fn checkuser_row_re(user: &str) -> Result<Regex, ContentError> {
    compile(&format!(
        r"(?m)^(\{{\{{Checkuser\|{}\|[^}}\n]*\|)([^|}}\n]*)(\}}\}}.*\n?)",
        regex::escape(user)
    ))
}

/// Writes `date` as the last confirmation of `user` in the checkuser list.
pub fn update_checkuser_row(
    content: &str,
    user: &str,
    date: NaiveDate,
) -> Result<String, ContentError> {
    let re = checkuser_row_re(user)?;
    if !re.is_match(content) {
        return Err(ContentError::MissingMatch(format!("checkuser row of {user}")));
    }
    let date = format_long_date(date);
    Ok(re
        .replace(content, |caps: &Captures<'_>| {
            format!("{}{}{}", &caps[1], date, &caps[3])
        })
        .into_owned())
}

pub fn remove_checkuser_row(content: &str, user: &str) -> Result<String, ContentError> {
    let re = checkuser_row_re(user)?;
    if !re.is_match(content) {
        return Err(ContentError::MissingMatch(format!("checkuser row of {user}")));
    }
    Ok(replace_literal(&re, content, ""))
}

pub fn remove_bureaucrat_row(content: &str, user: &str) -> Result<String, ContentError> {
    let re = compile(&format!(
        r"(?m)^\{{\{{Burocrate\|{}(?:\|[^\n]*)?\}}\}}.*\n?",
        regex::escape(user)
    ))?;
    if !re.is_match(content) {
        return Err(ContentError::MissingMatch(format!("bureaucrat row of {user}")));
    }
    Ok(replace_literal(&re, content, ""))
}

/// Closes the open bar of `user` in the timeline on `date`.
pub fn close_timeline_bar(
    content: &str,
    user: &str,
    date: NaiveDate,
) -> Result<String, ContentError> {
    let re = compile(&format!(
        r"(?m)^(\s*bar:{} from: \d+/\d+/\d+ till: )end",
        regex::escape(user)
    ))?;
    if !re.is_match(content) {
        return Err(ContentError::MissingMatch(format!("timeline bar of {user}")));
    }
    let date = format_short_date(date);
    Ok(re
        .replace(content, |caps: &Captures<'_>| format!("{}{}", &caps[1], date))
        .into_owned())
}

/// `=== Marzo 2024 ===`
pub fn month_header(date: NaiveDate) -> String {
    let name = month_name(chrono::Datelike::month(&date));
    let mut chars = name.chars();
    let capitalized: String = chars
        .next()
        .map(|first| first.to_uppercase().chain(chars).collect())
        .unwrap_or_default();
    format!("=== {} {} ===", capitalized, chrono::Datelike::year(&date))
}

/// Adds `line` under the section of the month of `date`, opening the section
/// at the end of the page when missing.
pub fn add_announcement(content: &str, date: NaiveDate, line: &str) -> String {
    let header = month_header(date);
    match content.find(&header) {
        Some(start) => {
            let after_header = start + header.len();
            let section_end = content[after_header..]
                .find("\n==")
                .map(|offset| after_header + offset)
                .unwrap_or(content.len());
            let section = &content[..section_end];
            let head = section.trim_end_matches('\n');
            let trailing = &section[head.len()..];
            format!("{head}\n{line}{trailing}{}", &content[section_end..])
        }
        None => format!("{}\n\n{}\n{}", content.trim_end(), header, line),
    }
}

/// Replaces the in-progress marker of a base page with the outcome.
pub fn replace_in_progress(content: &str, outcome: &str) -> Result<String, ContentError> {
    if !content.contains(IN_PROGRESS_MARKER) {
        return Err(ContentError::MissingMatch(IN_PROGRESS_MARKER.into()));
    }
    Ok(content.replacen(IN_PROGRESS_MARKER, outcome, 1))
}
