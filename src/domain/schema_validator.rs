// JSON-schema compile/validate with a per-stream cache (spec.md §4.9).
//
// Compiled schemas are cached process-wide keyed by `(pod, stream.path)`
// and evicted on schema write, same as the teacher caches stream schemas
// in `STREAM_SCHEMAS_LATEST` (`service/db/schema.rs`).

use dashmap::DashMap;
use jsonschema::Validator;
use serde_json::Value;
use std::sync::Arc;

use crate::domain::records;
use crate::domain::streams;
use crate::errors::{Error, Result};
use crate::state::AppState;
use crate::table::streams::StreamRecord;

#[derive(Default)]
pub struct SchemaCache {
    compiled: DashMap<(String, String), Arc<Validator>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pod: &str, stream_path: &str) -> Option<Arc<Validator>> {
        self.compiled
            .get(&(pod.to_string(), stream_path.to_string()))
            .map(|e| e.value().clone())
    }

    pub fn compile_and_cache(
        &self,
        pod: &str,
        stream_path: &str,
        schema: &Value,
    ) -> Result<Arc<Validator>> {
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| Error::InvalidInput(format!("invalid json schema: {e}")))?;
        let validator = Arc::new(validator);
        self.compiled.insert(
            (pod.to_string(), stream_path.to_string()),
            validator.clone(),
        );
        Ok(validator)
    }

    pub fn evict(&self, pod: &str, stream_path: &str) {
        self.compiled
            .remove(&(pod.to_string(), stream_path.to_string()));
    }
}

/// `{ schemaType, schema, validationMode, appliesTo }` (spec.md §4.9).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SchemaDefinition {
    #[serde(rename = "schemaType")]
    pub schema_type: String,
    pub schema: Value,
    #[serde(rename = "validationMode", default)]
    pub validation_mode: Option<String>,
    #[serde(rename = "appliesTo", default)]
    pub applies_to: Option<String>,
}

/// Loads and compiles the `stream`'s schema, if it has one, checking the
/// process-global cache first (spec.md §4.9). Returns `None` when
/// `has_schema` is false, the `.config` child stream is missing, its
/// `schema` record is missing, or `schemaType` is `"none"`.
pub async fn load_validator(
    state: &AppState,
    pod_name: &str,
    stream: &StreamRecord,
) -> Result<Option<Arc<Validator>>> {
    if !stream.has_schema {
        return Ok(None);
    }
    if let Some(v) = state.schema_cache.get(pod_name, &stream.path) {
        return Ok(Some(v));
    }

    let config_path = format!("{}/.config", stream.path.trim_end_matches('/'));
    let Some(config_stream) = streams::get_by_path(state, pod_name, &config_path).await? else {
        return Ok(None);
    };
    let Some(record) = records::latest_by_name(state, config_stream.id, "schema").await? else {
        return Ok(None);
    };
    let definition: SchemaDefinition = serde_json::from_slice(&record.content)
        .map_err(|e| Error::Internal(format!("corrupt schema definition: {e}")))?;
    if definition.schema_type == "none" {
        return Ok(None);
    }

    let validator = state
        .schema_cache
        .compile_and_cache(pod_name, &stream.path, &definition.schema)?;
    Ok(Some(validator))
}

/// Writes a new `schema` record under `stream`'s `.config` child (creating
/// it if absent) and updates `has_schema` accordingly (spec.md §4.9).
/// `schemaType = "none"` disables validation and evicts the cache entry.
pub async fn set_schema(
    state: &AppState,
    pod_name: &str,
    stream_id: i64,
    definition: &SchemaDefinition,
    user_id: &str,
) -> Result<()> {
    let stream = streams::get_by_id(stream_id)
        .await?
        .ok_or_else(|| Error::StreamNotFound(stream_id.to_string()))?;

    let config_path = format!("{}/.config", stream.path.trim_end_matches('/'));
    let config_stream = match streams::get_by_path(state, pod_name, &config_path).await? {
        Some(s) => s,
        None => streams::create(state, pod_name, Some(stream_id), ".config", "private", user_id).await?,
    };

    records::append(
        state,
        None,
        records::AppendInput {
            stream_id: config_stream.id,
            stream_path: &config_stream.path,
            pod_name,
            name: "schema",
            content: serde_json::to_vec(definition)
                .map_err(|e| Error::Internal(format!("failed to encode schema: {e}")))?,
            content_type: "application/json".to_string(),
            is_binary: false,
            user_id,
            headers: serde_json::json!({}),
            ext: "json",
        },
    )
    .await?;

    let has_schema = definition.schema_type != "none";
    crate::table::streams::set_has_schema(stream_id, has_schema, chrono::Utc::now().timestamp_millis())
        .await?;
    state.schema_cache.evict(pod_name, &stream.path);
    state.invalidate_stream(pod_name, &stream.path);
    Ok(())
}

/// Validates `content` against `validator`, returning a structured
/// `VALIDATION_ERROR` detail payload (spec.md §7) on failure.
pub fn validate(validator: &Validator, content: &Value) -> Result<()> {
    let errors: Vec<Value> = validator
        .iter_errors(content)
        .map(|e| {
            serde_json::json!({
                "path": e.instance_path.to_string(),
                "message": e.to_string(),
            })
        })
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation(serde_json::json!({ "errors": errors })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compiles_and_caches_schema() {
        let cache = SchemaCache::new();
        assert!(cache.get("alice", "blog").is_none());
        let schema = json!({ "type": "object", "required": ["title"] });
        cache.compile_and_cache("alice", "blog", &schema).unwrap();
        assert!(cache.get("alice", "blog").is_some());
        cache.evict("alice", "blog");
        assert!(cache.get("alice", "blog").is_none());
    }

    #[test]
    fn validate_rejects_content_missing_required_field() {
        let schema = jsonschema::validator_for(&json!({
            "type": "object",
            "required": ["title"]
        }))
        .unwrap();
        let err = validate(&schema, &json!({ "body": "hi" })).unwrap_err();
        match err {
            Error::Validation(v) => assert!(v["errors"].as_array().unwrap().len() == 1),
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn validate_accepts_conforming_content() {
        let schema = jsonschema::validator_for(&json!({
            "type": "object",
            "required": ["title"]
        }))
        .unwrap();
        assert!(validate(&schema, &json!({ "title": "hi" })).is_ok());
    }
}
