//! Date, month and year tokens pulled from free query text.

use regex::Regex;
use std::sync::OnceLock;

/// The single time constraint a query carries, most specific first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeTerm {
    /// `YYYY-MM-DD`
    Date(String),
    /// `YYYY-MM`
    Month(String),
    /// `YYYY`
    Year(String),
}

fn date_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([0-9]{4}-[0-9]{2}-[0-9]{2})\b").ok())
        .as_ref()
}

fn month_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([0-9]{4}-[0-9]{2})\b").ok())
        .as_ref()
}

fn first_capture(re: Option<&Regex>, query: &str) -> Option<String> {
    re?.captures(query)?.get(1).map(|m| m.as_str().to_string())
}

/// First date, else first month, else the first whitespace token that is exactly
/// four digits once surrounding punctuation is dropped.
pub fn extract(query: &str) -> Option<TimeTerm> {
    if let Some(date) = first_capture(date_re(), query) {
        return Some(TimeTerm::Date(date));
    }
    if let Some(month) = first_capture(month_re(), query) {
        return Some(TimeTerm::Month(month));
    }
    query
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()))
        .find(|t| t.len() == 4 && t.chars().all(|c| c.is_ascii_digit()))
        .map(|t| TimeTerm::Year(t.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_compile() {
        assert!(date_re().is_some());
        assert!(month_re().is_some());
    }

    #[test]
    fn date_beats_month_and_year() {
        assert_eq!(
            extract("bônus do Bruno Lima em 2024 no dia 2025-06-28"),
            Some(TimeTerm::Date("2025-06-28".into()))
        );
    }

    #[test]
    fn month_without_date() {
        assert_eq!(
            extract("salário de 2025-03 e 2025-04"),
            Some(TimeTerm::Month("2025-03".into()))
        );
    }

    #[test]
    fn first_bare_year() {
        assert_eq!(
            extract("pagamentos de 2023, 2024?"),
            Some(TimeTerm::Year("2023".into()))
        );
        assert_eq!(extract("pedido 12345 de 2022?"), Some(TimeTerm::Year("2022".into())));
    }

    #[test]
    fn nothing_to_extract() {
        assert_eq!(extract("qual o produto mais caro"), None);
        assert_eq!(extract(""), None);
        assert_eq!(extract("code A2025"), None);
    }
}
