//! Metric name expansion
//!
//! A fetch name may be a comma separated list (`a.x,a.y`) and each entry may
//! contain brace groups (`server{1,2}.cpu{.user,.sys}`). Both storage
//! adapters expand a fetch name into concrete names before batching.

use std::collections::HashSet;

/// Split on commas that are not nested inside braces
pub fn split_top_level(input: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut begin = 0;
    for (i, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&input[begin..i]);
                begin = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&input[begin..]);
    parts
}

/// Expand every brace group of a single name
///
/// Groups nest and may repeat; an unbalanced `{` is kept literally.
pub fn expand_braces(name: &str) -> Vec<String> {
    let Some(open) = name.find('{') else {
        return vec![name.to_string()];
    };
    let Some(close) = matching_brace(name, open) else {
        return vec![name.to_string()];
    };

    let prefix = &name[..open];
    let body = &name[open + 1..close];
    let suffix = &name[close + 1..];

    let mut out = Vec::new();
    for alternative in split_top_level(body) {
        for alt in expand_braces(alternative) {
            for tail in expand_braces(suffix) {
                out.push(format!("{prefix}{alt}{tail}"));
            }
        }
    }
    out
}

fn matching_brace(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s[open..].char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Concrete names for a fetch name, first occurrence order, no duplicates
pub fn expand_names(name: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    split_top_level(name)
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .flat_map(expand_braces)
        .filter(|n| seen.insert(n.clone()))
        .collect()
}

/// Group names into batches of at most `limit`
pub fn batches(names: Vec<String>, limit: usize) -> Vec<Vec<String>> {
    names
        .chunks(limit.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_braces() {
        assert_eq!(expand_names("a.b.c"), vec!["a.b.c"]);
    }

    #[test]
    fn test_simple_group() {
        assert_eq!(
            expand_names("server{1,2}.loadavg5"),
            vec!["server1.loadavg5", "server2.loadavg5"]
        );
    }

    #[test]
    fn test_multiple_and_nested_groups() {
        assert_eq!(
            expand_names("{a,b}.{x,y}"),
            vec!["a.x", "a.y", "b.x", "b.y"]
        );
        assert_eq!(expand_names("s{1,{2,3}}"), vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_top_level_list_dedup() {
        assert_eq!(
            expand_names("a.b,server{1,2},a.b"),
            vec!["a.b", "server1", "server2"]
        );
    }

    #[test]
    fn test_unbalanced_brace_kept() {
        assert_eq!(expand_names("a.{b"), vec!["a.{b"]);
    }

    #[test]
    fn test_batches() {
        let names: Vec<String> = (0..5).map(|i| format!("m{i}")).collect();
        let batched = batches(names, 2);
        assert_eq!(batched.len(), 3);
        assert_eq!(batched[2], vec!["m4".to_string()]);
        assert!(batches(Vec::new(), 50).is_empty());
    }
}
