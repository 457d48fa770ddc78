//! Names of the configuration entries read by the bot.

pub const MAIN_PAGE_TITLE: &str = "main-page-title";
pub const LIST_TITLE: &str = "list-title";
pub const VOTE_PAGE_TITLE: &str = "vote-page-title";
pub const NEWS_PAGE_TITLE: &str = "news-page-title";
pub const ADMINS_LIST_TITLE: &str = "admins-list-title";
pub const CU_LIST_TITLE: &str = "cu-list-title";
pub const BUREAUCRATS_LIST_TITLE: &str = "bureaucrats-list-title";
pub const ANNOUNCE_PAGE_TITLE: &str = "announce-page-title";
pub const LATEST_NEWS_TITLE: &str = "latest-news-title";
pub const TIMELINE_TITLE: &str = "timeline-title";
pub const FLAG_REMOVAL_TITLE: &str = "flag-removal-title";
pub const SIMPLE_ARCHIVE_TITLE: &str = "simple-archive-title";
pub const VOTE_ARCHIVE_TITLE: &str = "vote-archive-title";
pub const USER_TALK_PREFIX: &str = "user-talk-prefix";
/// Users never treated as administrators (bots, system accounts).
pub const EXCLUDE_ADMINS: &str = "exclude-admins";
/// Wiki id appended to user names in the central rights log (`User:X@itwiki`).
pub const CENTRAL_SUFFIX: &str = "central-suffix";
pub const BOT_EDITS: &str = "bot-edits";
pub const LOG_PAGE: &str = "log-page";
