// Maps (pod, URL path, query) to a stream, or a (stream, record_name) pair
// (spec.md §4.1).

use crate::domain::permissions;
use crate::domain::streams;
use crate::errors::{Error, Result};
use crate::state::AppState;
use crate::table::streams::StreamRecord;

#[derive(Debug, Clone)]
pub enum Resolution {
    Stream(StreamRecord),
    Record {
        stream: StreamRecord,
        record_name: String,
    },
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

/// Read resolution (spec.md §4.1 rules 1–5). `index_query_present` is true
/// when the request carries `?i=` or `?recursive=`.
pub async fn resolve_read(
    state: &AppState,
    pod_name: &str,
    path: &str,
    index_query_present: bool,
) -> Result<Resolution> {
    let normalized = normalize(path);
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

    if index_query_present {
        return streams::get_by_path(state, pod_name, &normalized)
            .await?
            .map(Resolution::Stream)
            .ok_or_else(|| Error::StreamNotFound(normalized.clone()));
    }

    if segments.len() <= 1 {
        return streams::get_by_path(state, pod_name, &normalized)
            .await?
            .map(Resolution::Stream)
            .ok_or_else(|| Error::StreamNotFound(normalized.clone()));
    }

    if let Some(stream) = streams::get_by_path(state, pod_name, &normalized).await? {
        return Ok(Resolution::Stream(stream));
    }

    let (prefix, record_name) = normalized.rsplit_once('/').unwrap();
    if let Some(stream) = streams::get_by_path(state, pod_name, prefix).await? {
        return Ok(Resolution::Record {
            stream,
            record_name: record_name.to_string(),
        });
    }

    Err(Error::RecordNotFound(normalized))
}

/// Write resolution: the last path segment is always the record name; the
/// prefix is the stream, auto-created along the way with `parent_access`
/// inherited when the caller has write access to the nearest existing
/// ancestor (spec.md §4.1).
pub struct WriteTarget {
    pub stream: StreamRecord,
    pub record_name: String,
}

pub async fn resolve_write(
    state: &AppState,
    pod_name: &str,
    path: &str,
    user_id: &str,
    auto_create: bool,
) -> Result<WriteTarget> {
    let normalized = normalize(path);
    let (prefix, record_name) = match normalized.rsplit_once('/') {
        Some((p, n)) => (p.to_string(), n.to_string()),
        None => (String::new(), normalized.clone()),
    };

    if let Some(stream) = streams::get_by_path(state, pod_name, &prefix).await? {
        return Ok(WriteTarget {
            stream,
            record_name,
        });
    }

    if !auto_create {
        return Err(Error::StreamNotFound(prefix));
    }

    let stream = auto_create_chain(state, pod_name, &prefix, user_id).await?;
    Ok(WriteTarget {
        stream,
        record_name,
    })
}

async fn auto_create_chain(
    state: &AppState,
    pod_name: &str,
    prefix: &str,
    user_id: &str,
) -> Result<StreamRecord> {
    let segments: Vec<&str> = prefix.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(Error::StreamNotFound("/".to_string()));
    }

    let mut parent_id: Option<i64> = None;
    let mut parent_access = "private".to_string();
    let mut built_path = String::new();
    let mut current: Option<StreamRecord> = None;
    // The deepest stream that already existed before this call started
    // creating anything; spec.md §4.1's auto-create precondition is
    // checked against this one stream, not against streams this same call
    // is in the process of fabricating.
    let mut nearest_existing_ancestor: Option<StreamRecord> = None;
    let mut permission_checked = false;

    for segment in segments {
        built_path = if built_path.is_empty() {
            segment.to_string()
        } else {
            format!("{built_path}/{segment}")
        };

        current = streams::get_by_path(state, pod_name, &built_path).await?;
        if current.is_none() {
            if !permission_checked {
                permission_checked = true;
                if let Some(ancestor) = &nearest_existing_ancestor {
                    let allowed = permissions::evaluate(
                        pod_name,
                        ancestor,
                        Some(user_id),
                        permissions::Action::Write,
                    )
                    .await?;
                    if !allowed {
                        return Err(Error::Forbidden);
                    }
                }
            }
            let created = streams::create(
                state,
                pod_name,
                parent_id,
                segment,
                &parent_access,
                user_id,
            )
            .await?;
            current = Some(created);
        } else {
            nearest_existing_ancestor = current.clone();
        }
        let s = current.clone().expect("just ensured present");
        parent_id = Some(s.id);
        parent_access = s.access_permission.clone();
    }

    current.ok_or_else(|| Error::StreamNotFound(prefix.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_leading_and_trailing_slashes() {
        assert_eq!(normalize("/blog/post1/"), "blog/post1");
        assert_eq!(normalize("blog"), "blog");
        assert_eq!(normalize("/"), "");
    }
}
