//! Utility functions shared by the screener crates.

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// This function safely handles multi-byte UTF-8 characters (Hangul, emoji, accented characters)
/// by using character boundaries instead of byte indices.
pub fn truncate_with_ellipsis(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => {
            let truncated = &s[..idx];
            format!("{}...", truncated.trim_end())
        }
        None => s.to_string(),
    }
}

/// Sanitize a string for safe logging (redact sensitive patterns).
pub fn sanitize_for_log(s: &str) -> String {
    let patterns: &[(&str, &str)] = &[
        // Telegram bot tokens embedded in API URLs: /bot123456:ABC-xyz/
        (r"bot\d{5,}:[A-Za-z0-9_-]{20,}", "bot***REDACTED***"),
        (r"(?i)(api[_-]?key|apikey|key)=[A-Za-z0-9_-]{16,}", "$1=***REDACTED***"),
        (r"(?i)(token|secret|bearer)\s*[=:]\s*\S{10,}", "$1=***REDACTED***"),
        (r"ya29\.[A-Za-z0-9_-]{20,}", "***REDACTED_GOOGLE_TOKEN***"),
    ];

    let mut result = s.to_string();
    for (pattern, replacement) in patterns {
        if let Ok(re) = regex::Regex::new(pattern) {
            result = re.replace_all(&result, *replacement).to_string();
        }
    }
    result
}

/// Mask a secret for display, keeping only the last four characters.
pub fn mask_secret(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".to_string();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
        assert_eq!(truncate_with_ellipsis("hello world", 5), "hello...");
        assert_eq!(truncate_with_ellipsis("삼성전자우선주", 4), "삼성전자...");
        assert_eq!(truncate_with_ellipsis("", 10), "");
    }

    #[test]
    fn test_sanitize_telegram_url() {
        let input = "POST https://api.telegram.org/bot123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw/sendMessage";
        let output = sanitize_for_log(input);
        assert!(!output.contains("AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw"));
        assert!(output.contains("REDACTED"));
        assert!(output.ends_with("/sendMessage"));
    }

    #[test]
    fn test_sanitize_api_key_query() {
        let input = "GET /v4/spreadsheets/abc/values/A:D?key=AIzaSyD-1234567890abcdefgh";
        let output = sanitize_for_log(input);
        assert!(!output.contains("AIzaSyD-1234567890abcdefgh"));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("123456:ABCDEF"), "****CDEF");
    }
}
