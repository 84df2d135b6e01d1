// Stream hierarchy: create/lookup/list/delete (spec.md §3, §4.2).

use crate::errors::{Error, Result};
use crate::identifiers::{is_system_path, validate_stream_segment};
use crate::state::{AppState, StreamCacheEntry};
use crate::table::{records, streams};
use crate::table::streams::StreamRecord;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn join_path(parent_path: Option<&str>, name: &str) -> String {
    match parent_path {
        Some(p) if !p.is_empty() => format!("{p}/{name}"),
        _ => name.to_string(),
    }
}

pub const VALID_ACCESS_PERMISSIONS: &[&str] = &["public", "private"];

pub fn validate_access_permission(access: &str) -> Result<()> {
    if VALID_ACCESS_PERMISSIONS.contains(&access) || access.starts_with('/') {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!(
            "invalid access_permission: {access}"
        )))
    }
}

/// `create(parent_id|null, name, access_permission, user_id)` (spec.md §4.2).
/// Rejects `name` containing `/`, an empty name, or a name colliding with an
/// existing sibling stream **or** sibling record.
pub async fn create(
    state: &AppState,
    pod_name: &str,
    parent_id: Option<i64>,
    name: &str,
    access_permission: &str,
    user_id: &str,
) -> Result<StreamRecord> {
    validate_stream_segment(name)?;
    validate_access_permission(access_permission)?;

    let parent_path = match parent_id {
        Some(id) => Some(
            streams::get_by_id(id)
                .await?
                .ok_or_else(|| Error::StreamNotFound(id.to_string()))?
                .path,
        ),
        None => None,
    };
    let path = join_path(parent_path.as_deref(), name);

    if streams::get_by_path(pod_name, &path).await?.is_some() {
        return Err(Error::NameConflict(format!(
            "a stream named '{name}' already exists"
        )));
    }
    if let Some(pid) = parent_id {
        if !records::find_by_name(pid, name).await?.is_empty() {
            return Err(Error::NameConflict(format!(
                "a record named '{name}' already exists in the parent stream"
            )));
        }
    }

    let now = now_millis();
    let created = streams::insert(streams::NewStream {
        pod_name,
        parent_id,
        name,
        path: &path,
        user_id,
        access_permission,
        now,
    })
    .await?;

    state.invalidate_stream(pod_name, &path);
    if let Some(p) = parent_path {
        state.invalidate_stream(pod_name, &p);
    }

    Ok(created)
}

pub async fn get_by_path(
    state: &AppState,
    pod_name: &str,
    path: &str,
) -> Result<Option<StreamRecord>> {
    let cache_key = format!("stream:{pod_name}:{path}");
    if let Some(StreamCacheEntry::Stream(s)) = state.streams_cache.get(&cache_key) {
        return Ok(Some(s));
    }
    let found = streams::get_by_path(pod_name, path).await?;
    if let Some(ref s) = found {
        state
            .streams_cache
            .set(cache_key, StreamCacheEntry::Stream(s.clone()));
    }
    Ok(found)
}

pub async fn get_by_id(id: i64) -> Result<Option<StreamRecord>> {
    streams::get_by_id(id).await
}

pub async fn list_children(
    state: &AppState,
    pod_name: &str,
    parent_id: Option<i64>,
) -> Result<Vec<StreamRecord>> {
    let cache_key = match parent_id {
        Some(id) => format!("children:{pod_name}:{id}"),
        None => format!("children:{pod_name}:root"),
    };
    if let Some(StreamCacheEntry::Children(c)) = state.streams_cache.get(&cache_key) {
        return Ok(c);
    }
    let children = streams::list_children(pod_name, parent_id).await?;
    state
        .streams_cache
        .set(cache_key, StreamCacheEntry::Children(children.clone()));
    Ok(children)
}

/// Descendants of the stream at `path`, inclusive of the stream itself,
/// used by the recursive list query engine (spec.md §4.4).
pub async fn list_self_and_descendants(pod_name: &str, path: &str) -> Result<Vec<StreamRecord>> {
    streams::list_descendants(pod_name, path).await
}

/// `delete(stream_id)`: fails `FORBIDDEN` for any stream under `.config`
/// (spec.md §4.2), otherwise cascades to every descendant stream and all of
/// their records (spec.md §3).
pub async fn delete(state: &AppState, pod_name: &str, stream_id: i64) -> Result<()> {
    let stream = streams::get_by_id(stream_id)
        .await?
        .ok_or_else(|| Error::StreamNotFound(stream_id.to_string()))?;
    if is_system_path(&stream.path) {
        return Err(Error::Forbidden);
    }

    let mut victims = streams::list_descendants(pod_name, &stream.path).await?;
    victims.push(stream.clone());
    let ids: Vec<i64> = victims.iter().map(|s| s.id).collect();

    records::delete_all_for_streams(&ids).await?;
    streams::delete_many(&ids).await?;

    for victim in &victims {
        state.invalidate_stream(pod_name, &victim.path);
    }
    if let Some(pid) = stream.parent_id {
        if let Some(parent) = streams::get_by_id(pid).await? {
            state.invalidate_stream(pod_name, &parent.path);
        }
    }

    Ok(())
}

/// Mutates `access_permission` directly; per spec.md §9 Open Question (i),
/// reachable only via explicit config write, never as a side effect of a
/// record write to the stream.
pub async fn set_access_permission(
    state: &AppState,
    pod_name: &str,
    stream_id: i64,
    access_permission: &str,
) -> Result<()> {
    validate_access_permission(access_permission)?;
    let stream = streams::get_by_id(stream_id)
        .await?
        .ok_or_else(|| Error::StreamNotFound(stream_id.to_string()))?;
    streams::set_access_permission(stream_id, access_permission, now_millis()).await?;
    state.invalidate_stream(pod_name, &stream.path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_path_handles_root_and_nested() {
        assert_eq!(join_path(None, "blog"), "blog");
        assert_eq!(join_path(Some(""), "blog"), "blog");
        assert_eq!(join_path(Some("a"), "b"), "a/b");
        assert_eq!(join_path(Some("a/b"), "c"), "a/b/c");
    }

    #[test]
    fn access_permission_validation() {
        assert!(validate_access_permission("public").is_ok());
        assert!(validate_access_permission("private").is_ok());
        assert!(validate_access_permission("/members").is_ok());
        assert!(validate_access_permission("bogus").is_err());
    }
}
