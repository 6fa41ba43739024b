//! `.env` line handling shared by import and export.
//!
//! Entry names are kebab-case (`db-password`) while environment variables are
//! upper snake case (`DB_PASSWORD`); the two helpers below map between them.

/// `db-password` → `DB_PASSWORD`
pub fn env_var_name(entry_name: &str) -> String {
    entry_name.to_uppercase().replace('-', "_")
}

/// `DB_PASSWORD` → `db-password`
pub fn entry_name(env_var: &str) -> String {
    env_var.to_lowercase().replace('_', "-")
}

/// Double-quote a value, escaping backslashes, quotes and line breaks.
pub fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

fn unescape(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

fn unquote(raw: &str) -> String {
    let raw = raw.trim();
    if raw.len() >= 2 {
        if raw.starts_with('"') && raw.ends_with('"') {
            return unescape(&raw[1..raw.len() - 1]);
        }
        if raw.starts_with('\'') && raw.ends_with('\'') {
            return raw[1..raw.len() - 1].to_string();
        }
    }
    raw.to_string()
}

/// Parse one `KEY=value` line into `(entry name, value)`.
///
/// Blank lines, comments and keys that cannot be variable names (containing
/// whitespace or `{`) yield `None`. A leading `export ` is tolerated.
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) || key.contains('{') {
        return None;
    }

    Some((entry_name(key), unquote(value)))
}

/// Heuristic used during auto-detection: more than half of the meaningful
/// lines look like assignments.
pub fn looks_like_dotenv(content: &str) -> bool {
    let lines: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();
    if lines.is_empty() {
        return false;
    }

    let assignments = lines
        .iter()
        .filter(|l| l.contains('=') && !l.starts_with('{') && !l.starts_with('['))
        .count();
    assignments * 2 > lines.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_mapping() {
        assert_eq!(env_var_name("db-password"), "DB_PASSWORD");
        assert_eq!(entry_name("DB_PASSWORD"), "db-password");
        assert_eq!(entry_name(&env_var_name("api-key-2")), "api-key-2");
    }

    #[test]
    fn test_quote_escapes_specials() {
        assert_eq!(quote("plain"), "\"plain\"");
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
        assert_eq!(quote("line1\nline2"), "\"line1\\nline2\"");
        assert_eq!(quote("C:\\dir"), "\"C:\\\\dir\"");
    }

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(
            parse_line("DB_PASSWORD=\"s3cr=t\""),
            Some(("db-password".to_string(), "s3cr=t".to_string()))
        );
        assert_eq!(
            parse_line("export API_KEY='raw\\n'"),
            Some(("api-key".to_string(), "raw\\n".to_string()))
        );
        assert_eq!(
            parse_line("TOKEN=abc"),
            Some(("token".to_string(), "abc".to_string()))
        );
        assert_eq!(
            parse_line("EMPTY="),
            Some(("empty".to_string(), String::new()))
        );
        assert_eq!(parse_line("# comment"), None);
        assert_eq!(parse_line("not an assignment"), None);
        assert_eq!(parse_line("BAD KEY=1"), None);
        assert_eq!(parse_line("{\"a\"=1"), None);
    }

    #[test]
    fn test_quote_then_parse_preserves_value() {
        let value = "multi\nline \"quoted\" \\ value";
        let line = format!("NAME={}", quote(value));
        let (_, parsed) = parse_line(&line).unwrap();
        assert_eq!(parsed, value);
    }

    #[test]
    fn test_looks_like_dotenv() {
        assert!(looks_like_dotenv("# header\nA=1\nB=2\n"));
        assert!(!looks_like_dotenv("{\"a\": \"b=c\"}"));
        assert!(!looks_like_dotenv("# only comments"));
        assert!(!looks_like_dotenv("one\ntwo\nTHREE=3"));
    }
}
