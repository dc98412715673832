//! Statement inspection and result file naming.

use chrono::NaiveDate;

/// Columns of the select list kept in a result file name.
const ACTION_TOKENS: usize = 3;

/// Maximum length of the action segment.
const MAX_ACTION_LEN: usize = 50;

const UNKNOWN: &str = "unknown";

/// Returns true if the statement's first token is `SELECT`, ignoring case.
pub fn is_select(sql: &str) -> bool {
    sql.split_whitespace()
        .next()
        .is_some_and(|token| token.eq_ignore_ascii_case("select"))
}

/// Derives the name a stored query result gets, without extension.
///
/// The name is `{YYYYMMDD}_{table}_{action}`: `table` is the last dotted
/// segment of the token after the first `FROM`, `action` joins up to three
/// select-list tokens with `*` spelled `all`. Only ASCII alphanumerics, `_`
/// and `.` survive.
pub fn result_file_name(sql: &str, date: NaiveDate) -> String {
    let lowered = sql.to_lowercase();
    let words: Vec<&str> = lowered.split_whitespace().collect();

    let table = words
        .iter()
        .position(|w| *w == "from")
        .and_then(|i| words.get(i + 1))
        .and_then(|t| t.rsplit('.').next())
        .unwrap_or(UNKNOWN);

    let action = match words.iter().position(|w| *w == "select") {
        Some(i) => words[i + 1..]
            .iter()
            .take_while(|w| **w != "from")
            .take(ACTION_TOKENS)
            .map(|w| w.replace('*', "all").replace(',', ""))
            .collect::<Vec<_>>()
            .join("_"),
        None => UNKNOWN.to_string(),
    };
    let action: String = action.chars().take(MAX_ACTION_LEN).collect();

    format!("{}_{table}_{action}", date.format("%Y%m%d"))
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect()
}
