use std::env;
use std::path::PathBuf;

use chrono::Datelike;

use crate::roster::DEFAULT_SKIP_IDS;
use crate::store::default_db_path;

const DEFAULT_KTC_MAX_PAGES: usize = 10;
const DEFAULT_REQUEST_DELAY_MS: u64 = 750;
const DEFAULT_FETCH_PARALLELISM: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub db_path: Option<PathBuf>,
    pub season: i32,
    /// Restricts weekly projections to one week.
    pub sleeper_week: Option<u32>,
    pub ktc_max_pages: usize,
    pub ktc_include_redraft: bool,
    pub request_delay_ms: u64,
    pub fetch_parallelism: usize,
    pub exceptions_path: Option<PathBuf>,
    pub clay_text_path: Option<PathBuf>,
    pub roster_skip_ids: Vec<String>,
}

impl IngestConfig {
    pub fn from_env() -> Self {
        let db_path = env_path("FF_DB_PATH").or_else(default_db_path);
        let season = env::var("FF_SEASON")
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .unwrap_or_else(|| chrono::Utc::now().year())
            .clamp(2000, 2100);
        let sleeper_week = env::var("FF_SLEEPER_WEEK")
            .ok()
            .and_then(|v| parse_week(&v));
        let ktc_max_pages = env::var("FF_KTC_MAX_PAGES")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_KTC_MAX_PAGES)
            .clamp(1, 50);
        let ktc_include_redraft = env_bool("FF_KTC_INCLUDE_REDRAFT", true);
        let request_delay_ms = env::var("FF_REQUEST_DELAY_MS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_REQUEST_DELAY_MS)
            .clamp(0, 10_000);
        let fetch_parallelism = env::var("FF_FETCH_PARALLELISM")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_FETCH_PARALLELISM)
            .clamp(1, 32);
        let roster_skip_ids = env::var("FF_ROSTER_SKIP_IDS")
            .ok()
            .map(|v| parse_id_list(&v))
            .unwrap_or_else(|| DEFAULT_SKIP_IDS.iter().map(|s| s.to_string()).collect());

        Self {
            db_path,
            season,
            sleeper_week,
            ktc_max_pages,
            ktc_include_redraft,
            request_delay_ms,
            fetch_parallelism,
            exceptions_path: env_path("FF_EXCEPTIONS_PATH"),
            clay_text_path: env_path("FF_CLAY_TEXT_PATH"),
            roster_skip_ids,
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| {
            let t = v.trim().to_ascii_lowercase();
            !(t.is_empty() || t == "0" || t == "false" || t == "off" || t == "no")
        })
        .unwrap_or(default)
}

/// Regular-season week number, 1 through 18.
pub fn parse_week(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|w| (1..=18).contains(w))
}

/// Comma or whitespace separated identifiers; an empty string skips nobody.
pub fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_lists_accept_commas_and_spaces() {
        assert_eq!(parse_id_list("232, 4984  11573"), vec!["232", "4984", "11573"]);
        assert!(parse_id_list("").is_empty());
    }

    #[test]
    fn weeks_outside_the_regular_season_are_rejected() {
        assert_eq!(parse_week(" 7 "), Some(7));
        assert_eq!(parse_week("0"), None);
        assert_eq!(parse_week("19"), None);
        assert_eq!(parse_week("all"), None);
    }
}
