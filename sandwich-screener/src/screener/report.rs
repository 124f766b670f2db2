//! Report generation module for screening results.
//!
//! Generates reports in various formats:
//! - Telegram message (HTML, for notifications)
//! - Plain text table (for terminals)
//! - JSON lines (for programmatic use)
//!
//! Every format is bounded by a character budget. Lines are dropped from
//! the end as a whole; the header is always emitted first.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::ranking::RankedMatch;

// ============================================================================
// Report Format
// ============================================================================

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Telegram HTML message
    #[default]
    Telegram,
    /// Plain text table
    Plain,
    /// One JSON object per line
    Json,
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Telegram => write!(f, "telegram"),
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "telegram" | "tg" | "html" => Ok(Self::Telegram),
            "plain" | "text" | "txt" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

// ============================================================================
// Report Formatter
// ============================================================================

/// Renders ranked matches into a bounded text report.
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    format: ReportFormat,
    max_chars: usize,
}

impl ReportFormatter {
    /// Create a formatter.
    pub fn new(format: ReportFormat, max_chars: usize) -> Self {
        Self { format, max_chars }
    }

    /// The output format.
    pub fn report_format(&self) -> ReportFormat {
        self.format
    }

    /// Render the report.
    pub fn format(&self, ranked: &[RankedMatch], resolution_date: NaiveDate) -> String {
        let (header, body) = match self.format {
            ReportFormat::Telegram => telegram_lines(ranked, resolution_date),
            ReportFormat::Plain => plain_lines(ranked, resolution_date),
            ReportFormat::Json => json_lines(ranked, resolution_date),
        };
        assemble(&header, &body, self.max_chars, |dropped| {
            self.omitted_line(dropped)
        })
    }

    fn omitted_line(&self, dropped: usize) -> String {
        match self.format {
            ReportFormat::Json => json!({ "omitted": dropped }).to_string(),
            _ => format!("... +{} more", dropped),
        }
    }
}

fn telegram_lines(ranked: &[RankedMatch], date: NaiveDate) -> (Vec<String>, Vec<String>) {
    let header = vec![
        format!("<b>Sandwich screen {}</b>", date),
        format!("Matches: {}", ranked.len()),
    ];

    if ranked.is_empty() {
        return (header, vec!["No matches today.".to_string()]);
    }

    let body = ranked
        .iter()
        .map(|r| {
            let name = escape_html(&r.item.name);
            if r.item.theme1.is_empty() {
                format!("• <b>{}</b>", name)
            } else {
                format!("• <b>{}</b> | {}", name, escape_html(&r.item.theme1))
            }
        })
        .collect();
    (header, body)
}

fn plain_lines(ranked: &[RankedMatch], date: NaiveDate) -> (Vec<String>, Vec<String>) {
    let mut header = vec![
        format!("Sandwich screen {}", date),
        format!("Matches: {}", ranked.len()),
    ];

    if ranked.is_empty() {
        return (header, vec!["No matches.".to_string()]);
    }

    let name_width = ranked
        .iter()
        .map(|r| r.item.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Name".len());
    let themes: Vec<String> = ranked.iter().map(theme_label).collect();
    let theme_width = themes
        .iter()
        .map(|t| t.chars().count())
        .max()
        .unwrap_or(0)
        .max("Themes".len());

    header.push(format!(
        "{:<nw$}  {:<tw$}  {:>12}  {:>12}  {:>12}",
        "Name",
        "Themes",
        "Close",
        "MA short",
        "MA long",
        nw = name_width,
        tw = theme_width
    ));

    let body = ranked
        .iter()
        .zip(themes)
        .map(|(r, themes)| {
            format!(
                "{:<nw$}  {:<tw$}  {:>12.2}  {:>12.2}  {:>12.2}",
                r.item.name,
                themes,
                r.item.close,
                r.item.ma_short,
                r.item.ma_long,
                nw = name_width,
                tw = theme_width
            )
        })
        .collect();
    (header, body)
}

fn json_lines(ranked: &[RankedMatch], date: NaiveDate) -> (Vec<String>, Vec<String>) {
    let header = vec![json!({
        "resolution_date": date.to_string(),
        "matches": ranked.len(),
    })
    .to_string()];

    let body = ranked
        .iter()
        .filter_map(|r| serde_json::to_string(r).ok())
        .collect();
    (header, body)
}

fn theme_label(r: &RankedMatch) -> String {
    [&r.item.theme1, &r.item.theme2, &r.item.theme3]
        .iter()
        .filter(|t| !t.is_empty())
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Escape the characters Telegram's HTML parse mode treats specially.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Join lines under a character budget.
///
/// Header lines are emitted first and never split. Body lines are kept
/// while they fit; when some are dropped, a line from `omitted` is
/// appended if room remains.
fn assemble(
    header: &[String],
    body: &[String],
    max_chars: usize,
    omitted: impl Fn(usize) -> String,
) -> String {
    let line_len = |line: &String| line.chars().count();
    let total: usize = header.iter().chain(body).map(line_len).sum::<usize>()
        + (header.len() + body.len()).saturating_sub(1);

    if total <= max_chars {
        return header
            .iter()
            .chain(body)
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
    }

    let mut out = String::new();
    let mut used = 0usize;
    let push = |out: &mut String, used: &mut usize, line: &str, len: usize| {
        if !out.is_empty() {
            out.push('\n');
            *used += 1;
        }
        out.push_str(line);
        *used += len;
    };

    for line in header {
        let len = line_len(line);
        let sep = usize::from(!out.is_empty());
        if used + sep + len > max_chars {
            return out;
        }
        push(&mut out, &mut used, line, len);
    }

    // Room for the worst-case omission line
    let reserve = omitted(body.len()).chars().count() + 1;
    let mut kept = 0usize;
    for line in body {
        let len = line_len(line);
        let sep = usize::from(!out.is_empty());
        if used + sep + len + reserve > max_chars {
            break;
        }
        push(&mut out, &mut used, line, len);
        kept += 1;
    }

    let note = omitted(body.len() - kept);
    let len = note.chars().count();
    let sep = usize::from(!out.is_empty());
    if used + sep + len <= max_chars {
        push(&mut out, &mut used, &note, len);
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screener::engine::MatchResult;
    use crate::screener::ranking::FrequencyRanker;

    fn m(name: &str, theme1: &str) -> MatchResult {
        MatchResult {
            name: name.into(),
            ticker: "000001".into(),
            theme1: theme1.into(),
            theme2: "Sub".into(),
            theme3: String::new(),
            close: 105.0,
            ma_short: 100.0,
            ma_long: 110.0,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    fn ranked(n: usize) -> Vec<RankedMatch> {
        let matches: Vec<_> = (0..n).map(|i| m(&format!("Name{:03}", i), "Tech")).collect();
        FrequencyRanker::new().rank(&matches)
    }

    #[test]
    fn test_report_format_parsing() {
        assert_eq!("telegram".parse::<ReportFormat>().unwrap(), ReportFormat::Telegram);
        assert_eq!("TG".parse::<ReportFormat>().unwrap(), ReportFormat::Telegram);
        assert_eq!("plain".parse::<ReportFormat>().unwrap(), ReportFormat::Plain);
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("pdf".parse::<ReportFormat>().is_err());
        assert_eq!(ReportFormat::Plain.to_string(), "plain");
    }

    #[test]
    fn test_telegram_lines_escape_html() {
        let ranked = FrequencyRanker::new().rank(&[m("A&B <Corp>", "2차전지")]);
        let text = ReportFormatter::new(ReportFormat::Telegram, 4000).format(&ranked, date());

        assert_eq!(
            text,
            "<b>Sandwich screen 2024-01-05</b>\nMatches: 1\n• <b>A&amp;B &lt;Corp&gt;</b> | 2차전지"
        );
    }

    #[test]
    fn test_telegram_empty_result() {
        let text = ReportFormatter::new(ReportFormat::Telegram, 4000).format(&[], date());
        assert!(text.ends_with("Matches: 0\nNo matches today."));
    }

    #[test]
    fn test_plain_table_has_columns() {
        let text = ReportFormatter::new(ReportFormat::Plain, 4000).format(&ranked(2), date());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[2].starts_with("Name"));
        assert!(lines[3].contains("Tech / Sub"));
        assert!(lines[3].contains("105.00"));
        assert!(lines[3].contains("110.00"));
    }

    #[test]
    fn test_json_lines_are_each_valid() {
        let text = ReportFormatter::new(ReportFormat::Json, 4000).format(&ranked(3), date());
        let values: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(values[0]["matches"], 3);
        assert_eq!(values[1]["theme1_count"], 3);
        assert_eq!(values[1]["name"], "Name000");
    }

    #[test]
    fn test_truncation_keeps_whole_lines() {
        let formatter = ReportFormatter::new(ReportFormat::Telegram, 200);
        let text = formatter.format(&ranked(50), date());

        assert!(text.chars().count() <= 200);
        assert!(text.starts_with("<b>Sandwich screen 2024-01-05</b>\nMatches: 50"));
        let lines: Vec<&str> = text.lines().collect();
        let last = lines.last().unwrap();
        assert!(last.starts_with("... +"));
        for line in &lines[2..lines.len() - 1] {
            assert!(line.starts_with("• <b>Name") && line.ends_with("| Tech"));
        }
    }

    #[test]
    fn test_truncation_counts_characters_not_bytes() {
        let matches: Vec<_> = (0..3).map(|i| m(&format!("삼성전자{}", i), "반도체")).collect();
        let ranked = FrequencyRanker::new().rank(&matches);
        let full = ReportFormatter::new(ReportFormat::Telegram, 4000).format(&ranked, date());
        let budget = full.chars().count();

        assert!(full.len() > budget);
        let text = ReportFormatter::new(ReportFormat::Telegram, budget).format(&ranked, date());
        assert_eq!(text, full);
    }

    #[test]
    fn test_assemble_within_budget_is_untouched() {
        let header = vec!["h".to_string()];
        let body = vec!["a".to_string(), "b".to_string()];
        assert_eq!(assemble(&header, &body, 5, |n| format!("+{n}")), "h\na\nb");
    }

    #[test]
    fn test_assemble_drops_trailing_lines() {
        let header = vec!["head".to_string()];
        let body = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        // "head\none\n+2" is 11 chars
        assert_eq!(assemble(&header, &body, 12, |n| format!("+{n}")), "head\none\n+2");
    }

    #[test]
    fn test_assemble_tiny_budget_never_splits() {
        let header = vec!["header".to_string()];
        let body = vec!["x".to_string()];
        assert_eq!(assemble(&header, &body, 3, |n| format!("+{n}")), "");
    }
}
