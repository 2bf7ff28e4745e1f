//! Strike keyword handling: parsing the configured list and matching it
//! against resolved evidence text.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Split a comma/newline separated keyword list; trims, lower-cases and drops
/// empties. Order is kept.
pub fn parse_tags(raw: &str) -> Vec<String> {
    static RE_SEP: OnceCell<Regex> = OnceCell::new();
    let re = RE_SEP.get_or_init(|| Regex::new(r"[\n,]+").expect("tag separator regex"));
    re.split(raw)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Tags that occur (case-insensitively) in `haystack`, in input order.
/// An empty result means "no strike".
pub fn match_tags<S: AsRef<str>>(haystack: &str, tags: &[S]) -> Vec<String> {
    if haystack.is_empty() {
        return Vec::new();
    }
    let text = haystack.to_lowercase();
    tags.iter()
        .map(AsRef::as_ref)
        .filter(|t| !t.is_empty())
        .filter(|t| text.contains(&t.to_lowercase()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_is_case_insensitive_and_ordered() {
        let tags = ["#strike", "3 strike"];
        assert_eq!(match_tags("User said #STRIKE here", &tags), vec!["#strike"]);
        assert_eq!(
            match_tags("3 STRIKE rule, #Strike", &tags),
            vec!["#strike", "3 strike"]
        );
    }

    #[test]
    fn empty_haystack_never_matches() {
        assert!(match_tags("", &["#strike"]).is_empty());
    }

    #[test]
    fn empty_tags_are_ignored() {
        assert!(match_tags("anything", &["", ""]).is_empty());
    }

    #[test]
    fn parse_splits_on_commas_and_newlines() {
        let out = parse_tags(" #Strike ,\n3 strike\n\n,, Spam ");
        assert_eq!(out, vec!["#strike", "3 strike", "spam"]);
        assert!(parse_tags("").is_empty());
    }
}
