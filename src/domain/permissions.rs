// Permission evaluation: owner/creator rules, access_permission resolution,
// parent-chain inheritance (spec.md §4.6, §9).

use serde_json::Value;

use crate::config::get_config;
use crate::errors::Result;
use crate::table::records::RecordRow;
use crate::table::streams::{self, StreamRecord};
use crate::table::{pods, records};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Write,
}

/// The current pod owner (spec.md §3): the latest `owner` record in
/// `/.config/owner` is authoritative and supersedes the pod's denormalized
/// `owner_user_id`, which only seeds the value before any explicit write.
pub async fn current_owner(pod_name: &str) -> Result<String> {
    let pod = pods::get(pod_name).await?;
    if let Some(owner_stream) = streams::get_by_path(pod_name, ".config/owner").await? {
        let rows = records::find_by_name(owner_stream.id, "owner").await?;
        if let Some(latest) = rows.into_iter().find(|r| !r.deleted) {
            if let Ok(content) = serde_json::from_slice::<Value>(&latest.content) {
                if let Some(uid) = content.get("userId").and_then(|v| v.as_str()) {
                    return Ok(uid.to_string());
                }
            }
        }
    }
    Ok(pod.owner_user_id)
}

/// The full evaluation algorithm of spec.md §4.6, steps 1–7.
pub async fn evaluate(
    pod_name: &str,
    stream: &StreamRecord,
    user: Option<&str>,
    action: Action,
) -> Result<bool> {
    let owner = current_owner(pod_name).await?;

    if let Some(u) = user {
        if u == owner {
            return Ok(true);
        }
    }

    if let Some(u) = user {
        if u == stream.user_id && (owner.is_empty() || owner == stream.user_id) {
            return Ok(true);
        }
    }

    let max_hops = get_config().permission_stream_max_hops;
    let mut current = Some(stream.clone());
    let mut hops: u8 = 0;
    while let Some(s) = current {
        if hops >= max_hops {
            break;
        }
        if let Some(decision) = evaluate_access_rule(pod_name, &s, user, action).await? {
            return Ok(decision);
        }
        hops += 1;
        current = match s.parent_id {
            Some(pid) => streams::get_by_id(pid).await?,
            None => None,
        };
    }

    Ok(false)
}

/// Applies spec.md §4.6 steps 3–5 to a single stream, returning `None` when
/// this stream's rule does not decide the outcome (so the caller keeps
/// walking ancestors).
async fn evaluate_access_rule(
    pod_name: &str,
    stream: &StreamRecord,
    user: Option<&str>,
    action: Action,
) -> Result<Option<bool>> {
    match stream.access_permission.as_str() {
        "public" => Ok(Some(match action {
            Action::Read => true,
            Action::Write => user.is_some(),
        })),
        "private" => Ok(Some(user == Some(stream.user_id.as_str()))),
        p if p.starts_with('/') => evaluate_permission_stream(pod_name, p, user, action).await,
        _ => Ok(None),
    }
}

/// Looks up the permission stream at `path` and reads the latest,
/// non-tombstoned record named after the requesting user, or (spec.md §4.6
/// step 5's parenthetical) whose content's `id`/`userId` field equals the
/// user when no record is named after them directly. Content must set the
/// matching `read`/`write` boolean field to decide access; no matching
/// record at all leaves the decision to the next ancestor.
async fn evaluate_permission_stream(
    pod_name: &str,
    path: &str,
    user: Option<&str>,
    action: Action,
) -> Result<Option<bool>> {
    let Some(user) = user else { return Ok(None) };
    let trimmed = path.trim_start_matches('/');
    let Some(perm_stream) = streams::get_by_path(pod_name, trimmed).await? else {
        return Ok(None);
    };

    let by_name = records::find_by_name(perm_stream.id, user)
        .await?
        .into_iter()
        .find(|r| !r.deleted);
    let latest = match by_name {
        Some(r) => Some(r),
        None => find_latest_by_content_identity(perm_stream.id, user).await?,
    };
    let Some(latest) = latest else {
        return Ok(None);
    };
    let Ok(content) = serde_json::from_slice::<Value>(&latest.content) else {
        return Ok(None);
    };
    let field = match action {
        Action::Read => "read",
        Action::Write => "write",
    };
    match content.get(field).and_then(|v| v.as_bool()) {
        Some(allowed) => Ok(Some(allowed)),
        None => Ok(None),
    }
}

/// The highest-index, non-tombstoned record in `stream_id` whose content's
/// `id` or `userId` field equals `user` (spec.md §4.6 step 5's alternate
/// match, for permission-stream entries not named after the user).
async fn find_latest_by_content_identity(stream_id: i64, user: &str) -> Result<Option<RecordRow>> {
    let rows = records::list_all_ordered_by_index(stream_id).await?;
    let matching_identity = |row: &RecordRow| -> bool {
        let Ok(content) = serde_json::from_slice::<Value>(&row.content) else {
            return false;
        };
        let identity = content
            .get("id")
            .and_then(|v| v.as_str())
            .or_else(|| content.get("userId").and_then(|v| v.as_str()));
        identity == Some(user)
    };
    Ok(rows
        .into_iter()
        .filter(|r| !r.deleted)
        .filter(matching_identity)
        .max_by_key(|r| r.index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(access: &str, creator: &str) -> StreamRecord {
        StreamRecord {
            id: 1,
            pod_name: "alice".into(),
            name: "blog".into(),
            path: "blog".into(),
            parent_id: None,
            user_id: creator.into(),
            access_permission: access.into(),
            metadata: serde_json::json!({}),
            has_schema: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[tokio::test]
    async fn public_stream_allows_any_read() {
        let s = stream("public", "alice");
        let decision = evaluate_access_rule("alice", &s, Some("bob"), Action::Read)
            .await
            .unwrap();
        assert_eq!(decision, Some(true));
    }

    #[tokio::test]
    async fn public_stream_denies_anonymous_write() {
        let s = stream("public", "alice");
        let decision = evaluate_access_rule("alice", &s, None, Action::Write)
            .await
            .unwrap();
        assert_eq!(decision, Some(false));
    }

    #[tokio::test]
    async fn private_stream_only_allows_creator() {
        let s = stream("private", "alice");
        assert_eq!(
            evaluate_access_rule("alice", &s, Some("alice"), Action::Read)
                .await
                .unwrap(),
            Some(true)
        );
        assert_eq!(
            evaluate_access_rule("alice", &s, Some("bob"), Action::Read)
                .await
                .unwrap(),
            Some(false)
        );
    }
}
