// Link/routing rewrite: `.config/routing` lookup and longest-prefix URL
// rewrite (spec.md §4.8). Reuses the single-record cache that
// `domain::records::latest_by_name` already maintains, keyed the same way
// the cache-invalidation contract (spec.md §4.10) expects, so a write to
// the `routes` record invalidates this lookup for free.

use std::collections::HashMap;

use crate::errors::Result;
use crate::state::AppState;

use super::{records, streams};

async fn load_routes(state: &AppState, pod_name: &str) -> Result<Option<HashMap<String, String>>> {
    let Some(routing_stream) = streams::get_by_path(state, pod_name, ".config/routing").await?
    else {
        return Ok(None);
    };
    let Some(record) = records::latest_by_name(state, routing_stream.id, "routes").await? else {
        return Ok(None);
    };
    match serde_json::from_slice::<HashMap<String, String>>(&record.content) {
        Ok(map) => Ok(Some(map)),
        Err(_) => Ok(None),
    }
}

/// Rewrites `path` using the longest routing-map key that is a prefix of
/// it, preserving the unmatched suffix. Absence of a routing table, a parse
/// failure, or no matching key all leave `path` unchanged (spec.md §4.8).
pub async fn rewrite(state: &AppState, pod_name: &str, path: &str) -> Result<String> {
    let Some(routes) = load_routes(state, pod_name).await? else {
        return Ok(path.to_string());
    };

    let mut best: Option<(&String, &String)> = None;
    for (source, target) in routes.iter() {
        let matches = path == source.as_str() || path.starts_with(&format!("{source}/"));
        if matches && best.map(|(b, _)| source.len() > b.len()).unwrap_or(true) {
            best = Some((source, target));
        }
    }

    Ok(match best {
        Some((source, target)) => format!("{target}{}", &path[source.len()..]),
        None => path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rewrite_with(routes: &HashMap<String, String>, path: &str) -> String {
        let mut best: Option<(&String, &String)> = None;
        for (source, target) in routes.iter() {
            let matches = path == source.as_str() || path.starts_with(&format!("{source}/"));
            if matches && best.map(|(b, _)| source.len() > b.len()).unwrap_or(true) {
                best = Some((source, target));
            }
        }
        match best {
            Some((source, target)) => format!("{target}{}", &path[source.len()..]),
            None => path.to_string(),
        }
    }

    #[test]
    fn rewrites_longest_matching_prefix() {
        let mut routes = HashMap::new();
        routes.insert("/blog".to_string(), "/streams/blog".to_string());
        routes.insert("/blog/drafts".to_string(), "/streams/wip".to_string());
        assert_eq!(
            rewrite_with(&routes, "/blog/drafts/x"),
            "/streams/wip/x"
        );
        assert_eq!(rewrite_with(&routes, "/blog/post1"), "/streams/blog/post1");
    }

    #[test]
    fn leaves_unmatched_path_unchanged() {
        let routes = HashMap::new();
        assert_eq!(rewrite_with(&routes, "/unmapped"), "/unmapped");
    }

    #[test]
    fn rewrite_is_idempotent_for_non_chained_maps() {
        let mut routes = HashMap::new();
        routes.insert("/a".to_string(), "/b".to_string());
        let once = rewrite_with(&routes, "/a/x");
        let twice = rewrite_with(&routes, &once);
        assert_eq!(once, twice);
    }
}
