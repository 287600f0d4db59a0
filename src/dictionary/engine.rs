//! Dictionary substitution.
//!
//! Applies the terms of the active dictionaries to a text, most-used first:
//! 1. Collect terms from dictionaries whose id is in the active list
//! 2. Stable-sort by descending usage (ties keep dictionary/term order)
//! 3. Replace every match of `from` with `to`, feeding each result to the next term
//! 4. Record each term that matched at least once
//!
//! A `from` that is not a valid regular expression is matched literally.
//! `to` is always inserted verbatim; `$1` and friends are not expanded.

use regex::{NoExpand, Regex};

use super::types::{Dictionary, Term};

/// Result of applying dictionaries to a text.
#[derive(Debug, Clone, PartialEq)]
pub struct Substitution {
    pub text: String,
    /// Terms that matched, in application order, each listed once.
    pub applied_terms: Vec<Term>,
}

/// Compile a term pattern. Returns None for an empty pattern.
fn compile(pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        return None;
    }
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(_) => Regex::new(&regex::escape(pattern)).ok(),
    }
}

/// Active terms in application order.
fn ordered_terms<'a>(dictionaries: &'a [Dictionary], active_ids: &[String]) -> Vec<&'a Term> {
    let mut terms: Vec<&Term> = dictionaries
        .iter()
        .filter(|d| active_ids.iter().any(|id| id == &d.id))
        .flat_map(|d| d.terms.iter())
        .collect();
    terms.sort_by(|a, b| b.usage.cmp(&a.usage));
    terms
}

/// Apply the active dictionaries to `text`.
///
/// # Examples
///
/// ```
/// use app_lib::dictionary::{apply, Dictionary, Term};
///
/// let now = chrono::Utc::now();
/// let mut dict = Dictionary::new("tech", None, now);
/// dict.terms.push(Term::new("AI", "人工知能", now));
/// let active = vec![dict.id.clone()];
///
/// let result = apply("AIを使う", &[dict], &active);
/// assert_eq!(result.text, "人工知能を使う");
/// assert_eq!(result.applied_terms.len(), 1);
/// ```
pub fn apply(text: &str, dictionaries: &[Dictionary], active_ids: &[String]) -> Substitution {
    let mut current = text.to_string();
    let mut applied_terms = Vec::new();

    for term in ordered_terms(dictionaries, active_ids) {
        let Some(re) = compile(&term.from) else {
            continue;
        };
        if !re.is_match(&current) {
            continue;
        }
        current = re.replace_all(&current, NoExpand(&term.to)).into_owned();
        applied_terms.push(term.clone());
    }

    Substitution {
        text: current,
        applied_terms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn term(from: &str, to: &str, usage: u64) -> Term {
        let mut t = Term::new(from, to, Utc::now());
        t.usage = usage;
        t
    }

    fn dict(terms: Vec<Term>) -> Dictionary {
        let mut d = Dictionary::new("test", None, Utc::now());
        d.terms = terms;
        d
    }

    #[test]
    fn test_single_term() {
        let d = dict(vec![term("AI", "人工知能", 0)]);
        let active = vec![d.id.clone()];
        let result = apply("AIを使う", &[d], &active);
        assert_eq!(result.text, "人工知能を使う");
        assert_eq!(result.applied_terms.len(), 1);
    }

    #[test]
    fn test_global_replace_records_term_once() {
        let d = dict(vec![term("AI", "人工知能", 0)]);
        let active = vec![d.id.clone()];
        let result = apply("AIとAIとAI", &[d], &active);
        assert_eq!(result.text, "人工知能と人工知能と人工知能");
        assert_eq!(result.applied_terms.len(), 1);
    }

    #[test]
    fn test_second_pass_changes_nothing() {
        let d = dict(vec![term("AI", "人工知能", 0), term("ML", "機械学習", 0)]);
        let active = vec![d.id.clone()];
        let first = apply("AIとML", std::slice::from_ref(&d), &active);
        assert_eq!(first.text, "人工知能と機械学習");

        let second = apply(&first.text, &[d], &active);
        assert_eq!(second.text, first.text);
        assert!(second.applied_terms.is_empty());
    }

    #[test]
    fn test_most_used_first() {
        // "ABC" -> "X" must run before "AB" -> "Y" because it is used more.
        let d = dict(vec![term("AB", "Y", 1), term("ABC", "X", 5)]);
        let active = vec![d.id.clone()];
        let result = apply("ABCD", &[d], &active);
        assert_eq!(result.text, "XD");
        assert_eq!(result.applied_terms.len(), 1);
        assert_eq!(result.applied_terms[0].from, "ABC");
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        let d = dict(vec![term("a", "b", 0), term("b", "c", 0)]);
        let active = vec![d.id.clone()];
        assert_eq!(apply("a", &[d], &active).text, "c");
    }

    #[test]
    fn test_inactive_dictionaries_ignored() {
        let d = dict(vec![term("AI", "人工知能", 0)]);
        let result = apply("AIを使う", &[d], &[]);
        assert_eq!(result.text, "AIを使う");
        assert!(result.applied_terms.is_empty());
    }

    #[test]
    fn test_regex_pattern() {
        let d = dict(vec![term(r"えー+と?", "", 0)]);
        let active = vec![d.id.clone()];
        assert_eq!(apply("えーーと今日は", &[d], &active).text, "今日は");
    }

    #[test]
    fn test_invalid_regex_matches_literally() {
        let d = dict(vec![term("(株", "株式会社", 0)]);
        let active = vec![d.id.clone()];
        assert_eq!(apply("(株テロップ", &[d], &active).text, "株式会社テロップ");
    }

    #[test]
    fn test_replacement_is_literal() {
        let d = dict(vec![term("(円)", "$1ドル", 0)]);
        let active = vec![d.id.clone()];
        assert_eq!(apply("100円", &[d], &active).text, "100$1ドル");
    }

    #[test]
    fn test_empty_pattern_skipped() {
        let d = dict(vec![term("", "x", 0)]);
        let active = vec![d.id.clone()];
        let result = apply("abc", &[d], &active);
        assert_eq!(result.text, "abc");
        assert!(result.applied_terms.is_empty());
    }
}
