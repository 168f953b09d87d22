//! Query string parsing.
//!
//! Values are taken literally: no percent-decoding, no `+` handling.

use std::collections::BTreeMap;

/// Key/value pairs from a request's query string.
pub type QueryMap = BTreeMap<String, String>;

/// Split a raw query string (without the leading `?`) into key/value pairs.
///
/// A query without any `=` yields an empty map. Pairs are separated by `&`
/// and split on their first `=`; pairs lacking `=` are skipped and later
/// duplicates replace earlier ones.
pub fn parse_query(raw: &str) -> QueryMap {
    let mut query = QueryMap::new();

    if !raw.contains('=') {
        return query;
    }

    for pair in raw.split('&') {
        if let Some((key, value)) = pair.split_once('=') {
            query.insert(key.to_string(), value.to_string());
        }
    }

    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_pairs() {
        let q = parse_query("q=hello&page=2");
        assert_eq!(q.get("q").map(String::as_str), Some("hello"));
        assert_eq!(q.get("page").map(String::as_str), Some("2"));
    }

    #[test]
    fn no_equals_means_empty() {
        assert!(parse_query("nocache").is_empty());
        assert!(parse_query("").is_empty());
    }

    #[test]
    fn splits_on_first_equals_only() {
        let q = parse_query("expr=a=b");
        assert_eq!(q.get("expr").map(String::as_str), Some("a=b"));
    }

    #[test]
    fn values_are_not_decoded() {
        let q = parse_query("q=hello%20world&r=a+b");
        assert_eq!(q.get("q").map(String::as_str), Some("hello%20world"));
        assert_eq!(q.get("r").map(String::as_str), Some("a+b"));
    }

    #[test]
    fn bare_keys_skipped_and_last_duplicate_wins() {
        let q = parse_query("a=1&flag&a=2&empty=");
        assert_eq!(q.len(), 2);
        assert_eq!(q.get("a").map(String::as_str), Some("2"));
        assert_eq!(q.get("empty").map(String::as_str), Some(""));
        assert!(!q.contains_key("flag"));
    }
}
