//! Procedure lifecycle model: everything that is derived from the text of a
//! reconfirmation page.
//!
//! Wiki markup has no grammar the bot can rely on, so each accessor here is
//! defined by the exact pattern it matches. Changing a pattern changes the
//! behaviour of the whole pipeline.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use regex::{NoExpand, Regex};

use crate::error::ContentError;
use crate::localtime::parse_local_time;

/// Days after creation before a silent confirmation is closed.
pub const SIMPLE_DURATION_DAYS: i64 = 7;
/// Days a vote stays open.
pub const VOTE_DURATION_DAYS: i64 = 14;
/// Upper bound of the opposition threshold.
pub const REQUIRED_OPPOSE_MAX: u32 = 15;

/// Present only on silent confirmations; removed when a vote is opened.
const VOTE_SECTION_MARKER: &str = "<!-- SEZIONE DA UTILIZZARE PER";

static QUORUM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"soddisfare il \[\[[^|\]]+\|quorum]] di '''(\d+) voti'''").expect("valid regex")
});

static VOTE_END_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"La votazione ha inizio il.+ alle ore ([\d:]+) e ha termine il (.+) alla stessa ora")
        .expect("valid regex")
});

static DAY_CLEANUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\d \w]").expect("valid regex"));

static SILENT_SENTENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^La procedura di riconferma tacita .+").expect("valid regex")
});

static VOTE_SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!-- SEZIONE DA UTILIZZARE PER(.+?)-->").expect("valid regex")
});

static MAJORITY_SENTENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"è necessario ottenere una maggioranza .+ votanti\.").expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    FailVotes,
    NoQuorum,
}

impl Outcome {
    pub fn is_failure(self) -> bool {
        !matches!(self, Outcome::Ok)
    }
}

/// Section numbers holding the support and oppose lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteSections {
    pub support: u32,
    pub oppose: u32,
}

pub fn vote_sections(is_vote: bool) -> VoteSections {
    if is_vote {
        VoteSections {
            support: 3,
            oppose: 4,
        }
    } else {
        VoteSections {
            support: 0,
            oppose: 3,
        }
    }
}

pub fn is_vote(content: &str) -> bool {
    !content.contains(VOTE_SECTION_MARKER)
}

/// Whether `line` is a counted entry: `^# *(?![# *:]|\.\.\.$)`.
///
/// Sub-items (`##`, `#*`, `#:`) and bare ellipsis placeholders are skipped.
pub fn is_vote_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('#') else {
        return false;
    };
    // Every shorter run of spaces is followed by a space, which is itself
    // excluded, so only the position after all spaces matters.
    let after_spaces = rest.trim_end_matches('\r').trim_start_matches(' ');
    !after_spaces.starts_with(['#', '*', ':']) && after_spaces != "..."
}

pub fn count_votes(section: &str) -> u32 {
    section.lines().filter(|line| is_vote_line(line)).count() as u32
}

pub fn parse_quorum(content: &str) -> Result<u32, ContentError> {
    let caps = QUORUM_RE
        .captures(content)
        .ok_or_else(|| ContentError::MissingMatch("quorum".into()))?;
    caps[1]
        .parse()
        .map_err(|_| ContentError::MissingMatch("quorum".into()))
}

/// `min(15, ceil(quorum / 4))`
pub fn opposition_threshold(quorum: u32) -> u32 {
    REQUIRED_OPPOSE_MAX.min(quorum.div_ceil(4))
}

pub fn has_opposition(oppose: u32, quorum: u32) -> bool {
    oppose >= opposition_threshold(quorum)
}

/// Outcome of a vote; a missing quorum wins over a failed majority.
pub fn outcome(support: u32, oppose: u32, quorum: u32) -> Outcome {
    let total = u64::from(support) + u64::from(oppose);
    if support < quorum {
        Outcome::NoQuorum
    } else if 3 * u64::from(support) < 2 * total {
        Outcome::FailVotes
    } else {
        Outcome::Ok
    }
}

/// End of a vote, read from the opening sentence of the page.
pub fn parse_vote_end(content: &str, tz: Tz) -> Result<DateTime<Utc>, ContentError> {
    let caps = VOTE_END_RE
        .captures(content)
        .ok_or_else(|| ContentError::MissingMatch("vote end date".into()))?;
    let hours = &caps[1];
    let day = DAY_CLEANUP_RE.replace_all(&caps[2], "");
    parse_local_time(&format!("{day} alle {hours}"), tz)
}

pub fn silent_end(created: DateTime<Utc>) -> DateTime<Utc> {
    created + Duration::days(SIMPLE_DURATION_DAYS)
}

/// Turns a silent confirmation into a vote: the silent sentence is struck
/// and the commented-out vote section is uncovered.
pub fn open_vote_content(content: &str) -> String {
    let struck = SILENT_SENTENCE_RE.replace_all(content, "<del>$0</del>");
    VOTE_SECTION_RE.replace_all(&struck, "$1").into_owned()
}

/// Inserts `outcome_text` on the line after the majority requirement.
pub fn add_outcome_text(content: &str, outcome_text: &str) -> Result<String, ContentError> {
    let found = MAJORITY_SENTENCE_RE
        .find(content)
        .ok_or_else(|| ContentError::MissingMatch("majority sentence".into()))?;
    let mut out = String::with_capacity(content.len() + outcome_text.len() + 1);
    out.push_str(&content[..found.end()]);
    out.push('\n');
    out.push_str(outcome_text);
    out.push_str(&content[found.end()..]);
    Ok(out)
}

/// `<main>/<user>/<number>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProcedureTitle {
    title: String,
    user: String,
    number: u32,
}

impl ProcedureTitle {
    pub fn new(main_title: &str, user: &str, number: u32) -> Self {
        Self {
            title: format!("{main_title}/{user}/{number}"),
            user: user.to_string(),
            number,
        }
    }

    pub fn parse(title: &str) -> Result<Self, ContentError> {
        let invalid = || ContentError::InvalidTitle(title.to_string());
        let mut parts = title.rsplitn(3, '/');
        let number = parts
            .next()
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(invalid)?;
        let user = parts.next().filter(|u| !u.is_empty()).ok_or_else(invalid)?;
        parts.next().filter(|b| !b.is_empty()).ok_or_else(invalid)?;
        Ok(Self {
            title: title.to_string(),
            user: user.to_string(),
            number,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.title
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// `<main>/<user>`
    pub fn base_title(&self) -> &str {
        self.title
            .rsplit_once('/')
            .map(|(base, _)| base)
            .unwrap_or(&self.title)
    }
}

/// Whether `candidate` is `<main>/<something>/<digit>...`.
pub fn matches_procedure_title(main_title: &str, candidate: &str) -> bool {
    let Some(rest) = candidate
        .strip_prefix(main_title)
        .and_then(|rest| rest.strip_prefix('/'))
    else {
        return false;
    };
    rest.split_once('/').is_some_and(|(user, number)| {
        !user.is_empty() && number.starts_with(|c: char| c.is_ascii_digit())
    })
}

/// Literal replacement that never interprets `$` in `replacement`.
pub(crate) fn replace_literal(re: &Regex, content: &str, replacement: &str) -> String {
    re.replace_all(content, NoExpand(replacement)).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Rome;

    const SILENT_PAGE: &str = "La procedura di riconferma tacita dell'utente inizia oggi.\n\
<!-- SEZIONE DA UTILIZZARE PER LA VOTAZIONE\n== Votazione ==\n-->\n\
Per essere riconfermato deve soddisfare il [[WP:Q|quorum]] di '''20 voti'''.";

    #[test]
    fn vote_detection_uses_section_marker() {
        assert!(!is_vote(SILENT_PAGE));
        assert!(is_vote("== Votazione ==\n# voto"));
        assert_eq!(vote_sections(false), VoteSections { support: 0, oppose: 3 });
        assert_eq!(vote_sections(true), VoteSections { support: 3, oppose: 4 });
    }

    #[test]
    fn vote_lines_skip_sub_items_and_placeholders() {
        let section = "== Contrari ==\n# [[Utente:A|A]]\n#[[Utente:B|B]]\n## risposta\n#: commento\n#* nota\n# ...\n#...\n#   [[Utente:C|C]]\n#\n* non numerato\n";
        assert_eq!(count_votes(section), 4);
        assert!(is_vote_line("# ...x"));
        assert!(!is_vote_line(" # indented"));
        assert!(!is_vote_line("#  #spaced sub-item"));
    }

    #[test]
    fn quorum_is_extracted_or_missing() {
        assert_eq!(parse_quorum(SILENT_PAGE), Ok(20));
        assert_eq!(
            parse_quorum("nessun quorum"),
            Err(ContentError::MissingMatch("quorum".into()))
        );
    }

    #[test]
    fn opposition_threshold_is_capped() {
        assert_eq!(opposition_threshold(20), 5);
        assert_eq!(opposition_threshold(21), 6);
        assert_eq!(opposition_threshold(100), 15);
        assert!(has_opposition(5, 20));
        assert!(!has_opposition(4, 20));
    }

    #[test]
    fn outcome_scenarios() {
        assert_eq!(outcome(18, 5, 20), Outcome::NoQuorum);
        assert_eq!(outcome(15, 10, 10), Outcome::FailVotes);
        assert_eq!(outcome(20, 10, 10), Outcome::Ok);
        assert_eq!(outcome(5, 100, 10), Outcome::NoQuorum);
    }

    #[test]
    fn outcome_is_monotone_in_support() {
        for quorum in [0, 5, 20] {
            for oppose in 0..30 {
                let mut seen_ok = false;
                for support in 0..60 {
                    let result = outcome(support, oppose, quorum);
                    if seen_ok {
                        assert_eq!(result, Outcome::Ok);
                    }
                    seen_ok |= result == Outcome::Ok;
                }
            }
        }
    }

    #[test]
    fn vote_end_is_read_from_opening_sentence() {
        let content = "La votazione ha inizio il [[5 marzo]] [[2024]] alle ore 14:00 e ha termine il [[19 marzo]] [[2024]] alla stessa ora.";
        let end = parse_vote_end(content, Rome).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 19, 13, 0, 0).unwrap());
        assert!(matches!(
            parse_vote_end("testo", Rome),
            Err(ContentError::MissingMatch(_))
        ));
    }

    #[test]
    fn silent_procedures_last_a_week() {
        let created = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(silent_end(created), Utc.with_ymd_and_hms(2024, 3, 8, 10, 0, 0).unwrap());
    }

    #[test]
    fn opening_a_vote_uncovers_the_vote_section() {
        let opened = open_vote_content(SILENT_PAGE);
        assert!(opened.starts_with("<del>La procedura di riconferma tacita dell'utente inizia oggi.</del>\n"));
        assert!(opened.contains(" LA VOTAZIONE\n== Votazione ==\n\n"));
        assert!(is_vote(&opened));
    }

    #[test]
    fn outcome_text_goes_after_majority_sentence() {
        let content = "Per la riconferma è necessario ottenere una maggioranza dei 2/3 dei votanti.\n== Favorevoli ==";
        let closed = add_outcome_text(content, "Esito: $1 riconfermato").unwrap();
        assert_eq!(
            closed,
            "Per la riconferma è necessario ottenere una maggioranza dei 2/3 dei votanti.\nEsito: $1 riconfermato\n== Favorevoli =="
        );
        assert!(add_outcome_text("altro", "x").is_err());
    }

    #[test]
    fn procedure_titles_are_split_on_slashes() {
        let title =
            ProcedureTitle::parse("Wikipedia:Amministratori/Riconferma annuale/Alice/2").unwrap();
        assert_eq!(title.user(), "Alice");
        assert_eq!(title.number(), 2);
        assert_eq!(title.base_title(), "Wikipedia:Amministratori/Riconferma annuale/Alice");
        assert_eq!(
            ProcedureTitle::new("Wikipedia:Amministratori/Riconferma annuale", "Alice", 2),
            title
        );
        assert!(ProcedureTitle::parse("Alice/x").is_err());
    }

    #[test]
    fn procedure_title_pattern() {
        let main = "Wikipedia:Amministratori/Riconferma annuale";
        assert!(matches_procedure_title(main, "Wikipedia:Amministratori/Riconferma annuale/Bob/1"));
        assert!(!matches_procedure_title(main, "Wikipedia:Amministratori/Riconferma annuale/Bob"));
        assert!(!matches_procedure_title(main, "Template:Riconferma/Bob/1"));
        assert!(!matches_procedure_title(main, "Wikipedia:Amministratori/Riconferma annuale//1"));
        assert!(!matches_procedure_title(main, "Wikipedia:Amministratori/Riconferma annuale/Bob/Archivio"));
        assert!(!matches_procedure_title(main, "Wikipedia:Amministratori/Riconferma annualeX/Bob/1"));
    }

    #[test]
    fn procedure_title_pattern_takes_the_main_title_literally() {
        let main = "Wikipedia:Riconferma (2024)";
        assert!(matches_procedure_title(main, "Wikipedia:Riconferma (2024)/Bob/12"));
        assert!(!matches_procedure_title(main, "Wikipedia:Riconferma 2024/Bob/12"));
    }
}
