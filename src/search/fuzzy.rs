//! Fuzzy name ranking for workspace symbol search.
//!
//! A candidate matches when every query character can be traversed in
//! order, case-insensitively. The score rewards consecutive runs,
//! CamelCase and word boundaries, early matches, and full-prefix matches;
//! an uppercase character at the start of the candidate counts as a
//! CamelCase boundary so acronym queries prefer CamelCase names.

const CONSECUTIVE_BONUS: i32 = 15;
const CAMEL_BONUS: i32 = 25;
const WORD_BOUNDARY_BONUS: i32 = 10;
const EARLY_MATCH_BONUS: i32 = 5;
const PREFIX_BONUS: i32 = 50;
const NODE_MODULES_PENALTY: i32 = -50;

/// Score a candidate against a query; 0 means no match, higher is better.
pub fn score(query: &str, candidate: &str) -> i32 {
    if query.is_empty() || candidate.is_empty() {
        return 0;
    }

    let query_chars: Vec<char> = query.chars().collect();
    let candidate_chars: Vec<char> = candidate.chars().collect();

    let mut total = 0;
    let mut query_index = 0;
    let mut last_match: Option<usize> = None;

    for (i, &c) in candidate_chars.iter().enumerate() {
        if query_index >= query_chars.len() {
            break;
        }
        if !c.eq_ignore_ascii_case(&query_chars[query_index]) {
            continue;
        }

        let previous = if i > 0 { Some(candidate_chars[i - 1]) } else { None };

        if last_match == Some(i.wrapping_sub(1)) && i > 0 {
            total += CONSECUTIVE_BONUS;
        }
        if c.is_uppercase()
            && previous.is_none_or(|p| p.is_lowercase() || !p.is_alphabetic())
        {
            total += CAMEL_BONUS;
        }
        if previous.is_none_or(|p| matches!(p, '_' | '-' | '.' | '/' | '\\')) {
            total += WORD_BOUNDARY_BONUS;
        }
        if last_match.is_none() && i < 3 {
            total += EARLY_MATCH_BONUS;
        }

        last_match = Some(i);
        query_index += 1;
    }

    if query_index < query_chars.len() {
        return 0;
    }

    let lowered_candidate = candidate.to_lowercase();
    let lowered_query = query.to_lowercase();
    if lowered_candidate.starts_with(&lowered_query) {
        total += PREFIX_BONUS;
    }

    total
}

/// Penalty applied to candidates defined under dependency stores.
pub fn uri_penalty(uri: &str) -> i32 {
    if uri.contains("node_modules") {
        NODE_MODULES_PENALTY
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_match_is_zero() {
        assert_eq!(score("xyz", "UserService"), 0);
        assert_eq!(score("", "UserService"), 0);
        assert_eq!(score("abc", ""), 0);
        // Order matters: all query chars must appear in order
        assert_eq!(score("su", "UserService"), 0);
    }

    #[test]
    fn test_acronym_prefers_camel_case() {
        let camel = score("CFA", "CompatFieldAdapter");
        let flat = score("CFA", "commonFileAccess");
        assert!(camel > 0 && flat > 0);
        assert!(
            camel > flat,
            "expected CompatFieldAdapter ({camel}) > commonFileAccess ({flat})"
        );
    }

    #[test]
    fn test_prefix_beats_scattered() {
        let prefix = score("user", "userService");
        let scattered = score("user", "updateSomeRecord");
        assert!(prefix > scattered);
    }

    #[test]
    fn test_consecutive_run_bonus() {
        let consecutive = score("save", "saveAll");
        let spread = score("save", "setAviationVerbEngine");
        assert!(consecutive > spread);
    }

    #[test]
    fn test_case_insensitive_traversal() {
        assert!(score("usersvc", "UserSvc") > 0);
        assert!(score("USERSVC", "userSvc") > 0);
    }

    #[test]
    fn test_word_boundary_after_separators() {
        let bounded = score("fp", "file_path");
        let unbounded = score("fp", "ofgap");
        assert!(bounded > unbounded);
    }

    #[test]
    fn test_uri_penalty() {
        assert_eq!(uri_penalty("/w/node_modules/lib/a.js"), -50);
        assert_eq!(uri_penalty("/w/src/a.ts"), 0);
    }
}
