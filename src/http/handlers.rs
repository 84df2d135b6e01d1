// Route handlers for the core HTTP surface (spec.md §6.2).

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::Value;

use crate::config::get_config;
use crate::domain::{permissions, records, routing, schema_validator, streams};
use crate::errors::{Error, Result};
use crate::path_resolver::{self, Resolution};
use crate::rate_limit::Action as RateAction;
use crate::state::AppState;
use crate::table::records::RecordRow;

use super::pod_host::extract_pod;
use super::query::{DeleteQuery, IndexSelector, ReadQuery};
use super::session::SessionContext;

fn pod_or_400(req: &HttpRequest) -> Result<String> {
    let cfg = get_config();
    extract_pod(req, &cfg.host)
        .ok_or_else(|| Error::InvalidInput("request host is not a pod subdomain".to_string()))
}

/// Best-effort header insert: a value that can't round-trip through
/// `HeaderValue` (e.g. a `user_id` with non-ASCII or control bytes) is
/// dropped rather than panicking the response.
fn try_insert_header(resp: &mut HttpResponse, name: &'static str, value: &str) {
    if let Ok(v) = actix_web::http::header::HeaderValue::from_str(value) {
        resp.headers_mut()
            .insert(actix_web::http::header::HeaderName::from_static(name), v);
    }
}

fn record_headers(resp: &mut HttpResponse, row: &RecordRow) {
    try_insert_header(resp, "x-hash", &row.hash);
    if let Some(prev) = &row.previous_hash {
        try_insert_header(resp, "x-previous-hash", prev);
    }
    try_insert_header(resp, "x-author", &row.user_id);
    try_insert_header(resp, "x-timestamp", &row.created_at.to_string());
    try_insert_header(resp, "x-index", &row.index.to_string());
}

fn project_record(row: &RecordRow, query: &ReadQuery) -> Vec<u8> {
    let mut content = row.content.clone();
    if let Some(truncate) = query.truncate {
        content.truncate(truncate);
    }
    if let Some(fields) = query.field_list() {
        if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(&row.content) {
            let projected: serde_json::Map<String, Value> = map
                .into_iter()
                .filter(|(k, _)| fields.contains(k))
                .collect();
            content = serde_json::to_vec(&Value::Object(projected)).unwrap_or(content);
        }
    }
    content
}

fn single_record_response(row: RecordRow, query: &ReadQuery) -> HttpResponse {
    let content = project_record(&row, query);
    let mut resp = HttpResponse::Ok()
        .content_type(row.content_type.clone())
        .body(content);
    record_headers(&mut resp, &row);
    resp
}

fn list_response(page: crate::state::RecordListPage) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "records": page.records.iter().map(|r| serde_json::json!({
            "index": r.index,
            "name": r.name,
            "hash": r.hash,
            "previousHash": r.previous_hash,
            "userId": r.user_id,
            "createdAt": r.created_at,
            "contentType": r.content_type,
            "size": r.size,
        })).collect::<Vec<_>>(),
        "total": page.total,
        "hasMore": page.has_more,
    }))
}

pub async fn get_root(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: SessionContext,
) -> Result<HttpResponse> {
    get_path(req, state, session, web::Path::from(String::new()), web::Query(ReadQuery::default())).await
}

pub async fn get_path(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: SessionContext,
    path: web::Path<String>,
    query: web::Query<ReadQuery>,
) -> Result<HttpResponse> {
    let pod = pod_or_400(&req)?;
    session.check_pod_scope(&pod)?;
    let identifier = format!("{pod}:{}", session.user_id.as_deref().unwrap_or("anon"));
    let decision = state
        .rate_limiter
        .check_and_increment(&identifier, RateAction::Read)
        .await?;
    if !decision.allowed {
        return Err(Error::RateLimited {
            reset_at: decision.reset_at,
        });
    }

    let raw_path = path.into_inner();
    let rewritten = routing::rewrite(&state, &pod, &format!("/{raw_path}")).await?;

    let resolution =
        path_resolver::resolve_read(&state, &pod, &rewritten, query.is_index_query()).await?;

    match resolution {
        Resolution::Stream(stream) => {
            let allowed = permissions::evaluate(
                &pod,
                &stream,
                session.user_id.as_deref(),
                permissions::Action::Read,
            )
            .await?;
            if !allowed {
                return Err(Error::Forbidden);
            }

            if query.recursive {
                let descendants = streams::list_self_and_descendants(&pod, &stream.path).await?;
                let mut readable_ids = Vec::new();
                for s in &descendants {
                    if permissions::evaluate(
                        &pod,
                        s,
                        session.user_id.as_deref(),
                        permissions::Action::Read,
                    )
                    .await?
                    {
                        readable_ids.push(s.id);
                    }
                }
                let rows = records::list_recursive(&readable_ids).await?;
                let total = rows.len() as i64;
                let limit = query
                    .limit
                    .unwrap_or(get_config().list_default_limit)
                    .min(get_config().list_max_limit)
                    .max(1);
                let after = query.after.unwrap_or(-1);
                // `after` is a row offset into the merged, created_at-ordered
                // sequence, not a per-stream record index (spec.md §4.4).
                let after_resolved = if after < 0 { (total + after).max(-1) } else { after };
                let page_rows: Vec<RecordRow> = rows
                    .into_iter()
                    .enumerate()
                    .filter(|(pos, _)| *pos as i64 > after_resolved)
                    .map(|(_, r)| r)
                    .take((limit + 1) as usize)
                    .collect();
                let has_more = page_rows.len() as i64 > limit;
                let page_rows: Vec<RecordRow> = page_rows.into_iter().take(limit as usize).collect();
                return Ok(list_response(crate::state::RecordListPage {
                    records: page_rows,
                    total,
                    has_more,
                }));
            }

            if let Some(selector) = query.index_selector() {
                return match selector {
                    IndexSelector::Single(i) => {
                        let row = records::by_index(stream.id, i)
                            .await?
                            .ok_or_else(|| Error::RecordNotFound(i.to_string()))?;
                        Ok(single_record_response(row, &query))
                    }
                    IndexSelector::Range(a, b) => {
                        let rows = records::by_range(stream.id, a, b).await?;
                        Ok(list_response(crate::state::RecordListPage {
                            total: rows.len() as i64,
                            has_more: false,
                            records: rows,
                        }))
                    }
                };
            }

            let page = records::list(&state, stream.id, query.limit, query.after, query.unique)
                .await?;
            Ok(list_response(page))
        }
        Resolution::Record {
            stream,
            record_name,
        } => {
            let allowed = permissions::evaluate(
                &pod,
                &stream,
                session.user_id.as_deref(),
                permissions::Action::Read,
            )
            .await?;
            if !allowed {
                return Err(Error::Forbidden);
            }
            let row = records::latest_by_name(&state, stream.id, &record_name)
                .await?
                .ok_or_else(|| Error::RecordNotFound(record_name.clone()))?;
            Ok(single_record_response(row, &query))
        }
    }
}

pub async fn post_path(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
    session: SessionContext,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let pod = pod_or_400(&req)?;
    session.check_pod_scope(&pod)?;
    let user_id = session.require_user()?.to_string();

    // Implicit pod creation (spec.md §3): a brand-new pod subdomain's first
    // authenticated write creates the pod, owned by that writer.
    if crate::table::pods::try_get(&pod).await?.is_none() {
        let create_identifier = format!("{pod}:{user_id}");
        let decision = state
            .rate_limiter
            .check_and_increment(&create_identifier, RateAction::PodCreate)
            .await?;
        if !decision.allowed {
            return Err(Error::RateLimited {
                reset_at: decision.reset_at,
            });
        }
        crate::table::pods::create(&pod, &user_id, chrono::Utc::now().timestamp_millis()).await?;
        state.invalidate_user_pods(&user_id);
    }

    let identifier = format!("{pod}:{user_id}");
    let decision = state
        .rate_limiter
        .check_and_increment(&identifier, RateAction::Write)
        .await?;
    if !decision.allowed {
        return Err(Error::RateLimited {
            reset_at: decision.reset_at,
        });
    }

    let raw_path = path.into_inner();
    let rewritten = routing::rewrite(&state, &pod, &format!("/{raw_path}")).await?;

    let target =
        path_resolver::resolve_write(&state, &pod, &rewritten, &user_id, true).await?;

    let allowed = permissions::evaluate(
        &pod,
        &target.stream,
        Some(user_id.as_str()),
        permissions::Action::Write,
    )
    .await?;
    if !allowed {
        return Err(Error::Forbidden);
    }

    let content_type = req
        .headers()
        .get("X-Content-Type")
        .or_else(|| req.headers().get("Content-Type"))
        .and_then(|h| h.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let is_binary = req
        .headers()
        .get("X-Record-Type")
        .and_then(|h| h.to_str().ok())
        == Some("file")
        || !content_type.starts_with("text/") && !content_type.contains("json");

    if let Some(validator) = schema_validator::load_validator(&state, &pod, &target.stream).await? {
        let content_json: Value = serde_json::from_slice(&body).map_err(|_| {
            Error::Validation(serde_json::json!({
                "errors": [{"message": "body is not valid JSON"}],
            }))
        })?;
        schema_validator::validate(&validator, &content_json)?;
    }

    let storage_ref = state
        .storage
        .as_ref()
        .map(|s| s.as_ref() as &(dyn crate::storage::StorageAdapter + Send + Sync));

    let row = records::append(
        &state,
        storage_ref,
        records::AppendInput {
            stream_id: target.stream.id,
            stream_path: &target.stream.path,
            pod_name: &pod,
            name: &target.record_name,
            content: body.to_vec(),
            content_type,
            is_binary,
            user_id: &user_id,
            headers: serde_json::json!({}),
            ext: "bin",
        },
    )
    .await?;

    let mut resp = HttpResponse::Created().finish();
    record_headers(&mut resp, &row);
    Ok(resp)
}

pub async fn delete_path(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: SessionContext,
    path: web::Path<String>,
    query: web::Query<DeleteQuery>,
) -> Result<HttpResponse> {
    let pod = pod_or_400(&req)?;
    session.check_pod_scope(&pod)?;
    let user_id = session.require_user()?.to_string();

    let raw_path = path.into_inner();
    let rewritten = routing::rewrite(&state, &pod, &format!("/{raw_path}")).await?;

    if query.stream {
        let stream = streams::get_by_path(&state, &pod, rewritten.trim_start_matches('/'))
            .await?
            .ok_or_else(|| Error::StreamNotFound(rewritten.clone()))?;
        let allowed = permissions::evaluate(
            &pod,
            &stream,
            Some(user_id.as_str()),
            permissions::Action::Write,
        )
        .await?;
        if !allowed {
            return Err(Error::Forbidden);
        }
        streams::delete(&state, &pod, stream.id).await?;
        return Ok(HttpResponse::Ok().finish());
    }

    let target = path_resolver::resolve_write(&state, &pod, &rewritten, &user_id, false).await?;
    let allowed = permissions::evaluate(
        &pod,
        &target.stream,
        Some(user_id.as_str()),
        permissions::Action::Write,
    )
    .await?;
    if !allowed {
        return Err(Error::Forbidden);
    }

    let storage_ref = state
        .storage
        .as_ref()
        .map(|s| s.as_ref() as &(dyn crate::storage::StorageAdapter + Send + Sync));

    if query.purge {
        records::purge(
            &state,
            target.stream.id,
            &target.stream.path,
            &pod,
            &target.record_name,
            storage_ref,
        )
        .await?;
    } else {
        records::soft_delete(
            &state,
            target.stream.id,
            &target.stream.path,
            &pod,
            &target.record_name,
            &user_id,
        )
        .await?;
    }

    Ok(HttpResponse::Ok().finish())
}

#[derive(Debug, Deserialize)]
struct PatchStreamBody {
    #[serde(rename = "accessPermission")]
    access_permission: String,
}

/// Explicit stream-config write (spec.md §9 Open Question (i)): the only
/// path that may change a stream's `access_permission`.
pub async fn patch_path(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
    session: SessionContext,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let pod = pod_or_400(&req)?;
    session.check_pod_scope(&pod)?;
    let user_id = session.require_user()?.to_string();

    let raw_path = path.into_inner();
    let rewritten = routing::rewrite(&state, &pod, &format!("/{raw_path}")).await?;
    let stream = streams::get_by_path(&state, &pod, rewritten.trim_start_matches('/'))
        .await?
        .ok_or_else(|| Error::StreamNotFound(rewritten.clone()))?;

    let allowed = permissions::evaluate(
        &pod,
        &stream,
        Some(user_id.as_str()),
        permissions::Action::Write,
    )
    .await?;
    if !allowed {
        return Err(Error::Forbidden);
    }

    let patch: PatchStreamBody = serde_json::from_slice(&body).map_err(|_| {
        Error::InvalidInput("body must be {\"accessPermission\": \"public\"|\"private\"|\"/path\"}".to_string())
    })?;

    streams::set_access_permission(&state, &pod, stream.id, &patch.access_permission).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn delete_pod(
    req: HttpRequest,
    state: web::Data<AppState>,
    session: SessionContext,
) -> Result<HttpResponse> {
    let pod = pod_or_400(&req)?;
    session.check_pod_scope(&pod)?;
    let user_id = session.require_user()?;
    let owner = permissions::current_owner(&pod).await?;
    if owner != user_id {
        return Err(Error::Forbidden);
    }
    let stream_ids: Vec<i64> = crate::table::streams::list_all_for_pod(&pod)
        .await?
        .iter()
        .map(|s| s.id)
        .collect();
    crate::table::records::delete_all_for_streams(&stream_ids).await?;
    crate::table::streams::delete_all_for_pod(&pod).await?;
    crate::table::pods::delete(&pod).await?;
    state.invalidate_user_pods(user_id);
    Ok(HttpResponse::Ok().finish())
}
