// End-to-end exercises of the domain layer against an in-memory sqlite
// database, covering the scenarios and properties of spec.md §8.
//
// `podstream::db` pins the sqlite pool to a single connection (see
// db::connect_to_orm), so every test in this binary shares one physical
// in-memory database. Each test therefore uses its own pod name to avoid
// cross-test collisions regardless of execution order.

use std::sync::Arc;

use podstream::domain::{permissions, records, streams};
use podstream::errors::Error;
use podstream::path_resolver;
use podstream::rate_limit::SlidingWindowLimiter;
use podstream::state::AppState;
use podstream::table;

async fn fresh_state() -> AppState {
    table::create_all_tables().await.unwrap();
    AppState::new(Arc::new(SlidingWindowLimiter::new()), None)
}

async fn make_pod(name: &str, owner: &str) {
    if table::pods::try_get(name).await.unwrap().is_none() {
        table::pods::create(name, owner, 0).await.unwrap();
    }
}

fn append_input<'a>(
    stream_id: i64,
    stream_path: &'a str,
    pod_name: &'a str,
    name: &'a str,
    content: &[u8],
    user_id: &'a str,
) -> records::AppendInput<'a> {
    records::AppendInput {
        stream_id,
        stream_path,
        pod_name,
        name,
        content: content.to_vec(),
        content_type: "text/plain".to_string(),
        is_binary: false,
        user_id,
        headers: serde_json::json!({}),
        ext: "txt",
    }
}

#[tokio::test]
async fn scenario_a_append_and_read_back() {
    let state = fresh_state().await;
    make_pod("alice-a", "alice").await;

    let s = streams::create(&state, "alice-a", None, "blog", "public", "alice")
        .await
        .unwrap();

    let row = records::append(
        &state,
        None,
        append_input(s.id, &s.path, "alice-a", "post1", b"hi", "alice"),
    )
    .await
    .unwrap();

    assert_eq!(row.index, 0);
    assert!(row.previous_hash.is_none());

    let fetched = records::by_index(s.id, -1).await.unwrap().unwrap();
    assert_eq!(fetched.content, b"hi");
    assert_eq!(fetched.index, 0);
}

#[tokio::test]
async fn scenario_b_hash_chain_across_two_writes() {
    let state = fresh_state().await;
    make_pod("alice-b", "alice").await;
    let s = streams::create(&state, "alice-b", None, "log", "public", "alice")
        .await
        .unwrap();

    let r0 = records::append(
        &state,
        None,
        append_input(s.id, &s.path, "alice-b", "a", b"a", "alice"),
    )
    .await
    .unwrap();
    let r1 = records::append(
        &state,
        None,
        append_input(s.id, &s.path, "alice-b", "b", b"b", "alice"),
    )
    .await
    .unwrap();

    assert_eq!(r1.index, 1);
    assert_eq!(r1.previous_hash.as_deref(), Some(r0.hash.as_str()));

    let page = records::list(&state, s.id, Some(10), None, false)
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert!(!page.has_more);
}

#[tokio::test]
async fn scenario_c_permission_denial() {
    let state = fresh_state().await;
    make_pod("pod-c", "u1").await;

    let s = streams::create(&state, "pod-c", None, "private", "private", "u1")
        .await
        .unwrap();
    records::append(
        &state,
        None,
        append_input(s.id, &s.path, "pod-c", "r", b"secret", "u1"),
    )
    .await
    .unwrap();

    let allowed = permissions::evaluate("pod-c", &s, Some("u2"), permissions::Action::Read)
        .await
        .unwrap();
    assert!(!allowed);

    let allowed_owner = permissions::evaluate("pod-c", &s, Some("u1"), permissions::Action::Read)
        .await
        .unwrap();
    assert!(allowed_owner);
}

#[tokio::test]
async fn scenario_d_permission_stream_grants_and_revokes() {
    let state = fresh_state().await;
    make_pod("pod-d", "u1").await;

    let members = streams::create(&state, "pod-d", None, "members", "private", "u1")
        .await
        .unwrap();
    records::append(
        &state,
        None,
        records::AppendInput {
            stream_id: members.id,
            stream_path: &members.path,
            pod_name: "pod-d",
            name: "u2",
            content: serde_json::to_vec(&serde_json::json!({"read": true, "write": false}))
                .unwrap(),
            content_type: "application/json".to_string(),
            is_binary: false,
            user_id: "u1",
            headers: serde_json::json!({}),
            ext: "json",
        },
    )
    .await
    .unwrap();

    let notes = streams::create(&state, "pod-d", None, "notes", "/members", "u1")
        .await
        .unwrap();
    records::append(
        &state,
        None,
        append_input(notes.id, &notes.path, "pod-d", "n1", b"note", "u1"),
    )
    .await
    .unwrap();

    assert!(
        permissions::evaluate("pod-d", &notes, Some("u2"), permissions::Action::Read)
            .await
            .unwrap()
    );
    assert!(
        !permissions::evaluate("pod-d", &notes, Some("u2"), permissions::Action::Write)
            .await
            .unwrap()
    );

    records::append(
        &state,
        None,
        records::AppendInput {
            stream_id: members.id,
            stream_path: &members.path,
            pod_name: "pod-d",
            name: "u2",
            content: serde_json::to_vec(&serde_json::json!({"read": false, "write": false}))
                .unwrap(),
            content_type: "application/json".to_string(),
            is_binary: false,
            user_id: "u1",
            headers: serde_json::json!({}),
            ext: "json",
        },
    )
    .await
    .unwrap();

    assert!(
        !permissions::evaluate("pod-d", &notes, Some("u2"), permissions::Action::Read)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn scenario_e_recursive_list_excludes_siblings() {
    let state = fresh_state().await;
    make_pod("pod-e", "u1").await;

    let a = streams::create(&state, "pod-e", None, "a", "public", "u1")
        .await
        .unwrap();
    let b = streams::create(&state, "pod-e", Some(a.id), "b", "public", "u1")
        .await
        .unwrap();
    let c = streams::create(&state, "pod-e", Some(b.id), "c", "public", "u1")
        .await
        .unwrap();
    let a2 = streams::create(&state, "pod-e", None, "a2", "public", "u1")
        .await
        .unwrap();

    for (stream, name) in [(&a, "x"), (&b, "y"), (&c, "z")] {
        records::append(
            &state,
            None,
            append_input(stream.id, &stream.path, "pod-e", name, b"v", "u1"),
        )
        .await
        .unwrap();
    }
    records::append(
        &state,
        None,
        append_input(a2.id, &a2.path, "pod-e", "other", b"v", "u1"),
    )
    .await
    .unwrap();

    let descendants = streams::list_self_and_descendants("pod-e", &a.path)
        .await
        .unwrap();
    let ids: Vec<i64> = descendants.iter().map(|s| s.id).collect();
    assert_eq!(ids.len(), 3);
    let rows = records::list_recursive(&ids).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.name != "other"));
}

#[tokio::test]
async fn scenario_f_soft_delete_then_purge() {
    let state = fresh_state().await;
    make_pod("pod-f", "u1").await;
    let notes = streams::create(&state, "pod-f", None, "notes", "public", "u1")
        .await
        .unwrap();

    records::append(
        &state,
        None,
        append_input(notes.id, &notes.path, "pod-f", "draft", b"wip", "u1"),
    )
    .await
    .unwrap();

    records::soft_delete(&state, notes.id, &notes.path, "pod-f", "draft", "u1")
        .await
        .unwrap();

    assert!(records::latest_by_name(&state, notes.id, "draft")
        .await
        .unwrap()
        .is_none());

    records::purge(&state, notes.id, &notes.path, "pod-f", "draft", None)
        .await
        .unwrap();

    let rows = table::records::find_by_name(notes.id, "draft").await.unwrap();
    assert!(rows.iter().all(|r| r.purged && r.content_hash == "purged"));
}

#[tokio::test]
async fn property_chain_integrity_holds_after_many_appends() {
    let state = fresh_state().await;
    make_pod("pod-chain", "u1").await;
    let s = streams::create(&state, "pod-chain", None, "chain", "public", "u1")
        .await
        .unwrap();

    for i in 0..5 {
        records::append(
            &state,
            None,
            append_input(
                s.id,
                &s.path,
                "pod-chain",
                &format!("r{i}"),
                format!("v{i}").as_bytes(),
                "u1",
            ),
        )
        .await
        .unwrap();
    }

    let all = records::by_range(s.id, 0, 5).await.unwrap();
    assert_eq!(all.len(), 5);
    assert!(all[0].previous_hash.is_none());
    for k in 1..all.len() {
        assert_eq!(
            all[k].previous_hash.as_deref(),
            Some(all[k - 1].hash.as_str())
        );
        assert_eq!(all[k].index, all[k - 1].index + 1);
    }
}

#[tokio::test]
async fn soft_delete_tombstone_name_is_a_valid_record_name() {
    let state = fresh_state().await;
    make_pod("pod-tombstone", "u1").await;
    let notes = streams::create(&state, "pod-tombstone", None, "notes", "public", "u1")
        .await
        .unwrap();

    records::append(
        &state,
        None,
        append_input(notes.id, &notes.path, "pod-tombstone", "draft", b"wip", "u1"),
    )
    .await
    .unwrap();

    // Prior to the fix this raised Error::InvalidInput because the tombstone
    // name embedded an RFC3339 timestamp (":" and "+" are not valid record-name
    // characters); it must now succeed and use an epoch-millis suffix instead.
    let tombstone = records::soft_delete(&state, notes.id, &notes.path, "pod-tombstone", "draft", "u1")
        .await
        .unwrap();

    assert!(tombstone.name.starts_with("draft.deleted."));
    let suffix = tombstone.name.strip_prefix("draft.deleted.").unwrap();
    assert!(
        suffix.chars().all(|c| c.is_ascii_digit()),
        "tombstone suffix {suffix:?} is not all digits"
    );
}

#[tokio::test]
async fn auto_create_rejects_writer_without_access_to_existing_ancestor() {
    let state = fresh_state().await;
    make_pod("pod-autocreate", "alice").await;

    streams::create(&state, "pod-autocreate", None, "secret", "private", "alice")
        .await
        .unwrap();

    // Bob has no access to Alice's private "secret" stream, so he must not be
    // able to auto-create a child under it by simply writing through it.
    let err = path_resolver::resolve_write(
        &state,
        "pod-autocreate",
        "secret/newchild/leaf",
        "bob",
        true,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, Error::Forbidden));

    assert!(streams::get_by_path(&state, "pod-autocreate", "secret/newchild")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn auto_create_allows_owner_of_existing_ancestor() {
    let state = fresh_state().await;
    make_pod("pod-autocreate-ok", "alice").await;

    streams::create(&state, "pod-autocreate-ok", None, "notes", "private", "alice")
        .await
        .unwrap();

    let target = path_resolver::resolve_write(
        &state,
        "pod-autocreate-ok",
        "notes/2026/leaf",
        "alice",
        true,
    )
    .await
    .unwrap();

    assert_eq!(target.stream.path, "notes/2026");
    assert_eq!(target.record_name, "leaf");
}

#[tokio::test]
async fn auto_create_with_no_existing_ancestor_needs_no_permission_check() {
    let state = fresh_state().await;
    make_pod("pod-autocreate-fresh", "alice").await;

    // Nothing exists yet under this pod; the first segment has no ancestor to
    // check permission against, so any authenticated writer may create it.
    let target = path_resolver::resolve_write(
        &state,
        "pod-autocreate-fresh",
        "brand/new/leaf",
        "carol",
        true,
    )
    .await
    .unwrap();

    assert_eq!(target.stream.path, "brand/new");
    assert_eq!(target.stream.user_id, "carol");
}

#[tokio::test]
async fn permission_stream_matches_by_content_identity_when_not_named_after_user() {
    let state = fresh_state().await;
    make_pod("pod-content-id", "u1").await;

    let grants = streams::create(&state, "pod-content-id", None, "grants", "private", "u1")
        .await
        .unwrap();
    // Written under a record name unrelated to "u2"; only the content's
    // `id` field identifies the grantee.
    records::append(
        &state,
        None,
        records::AppendInput {
            stream_id: grants.id,
            stream_path: &grants.path,
            pod_name: "pod-content-id",
            name: "grant-entry-1",
            content: serde_json::to_vec(
                &serde_json::json!({"id": "u2", "read": true, "write": false}),
            )
            .unwrap(),
            content_type: "application/json".to_string(),
            is_binary: false,
            user_id: "u1",
            headers: serde_json::json!({}),
            ext: "json",
        },
    )
    .await
    .unwrap();

    let notes = streams::create(&state, "pod-content-id", None, "notes", "/grants", "u1")
        .await
        .unwrap();

    assert!(
        permissions::evaluate("pod-content-id", &notes, Some("u2"), permissions::Action::Read)
            .await
            .unwrap()
    );
    assert!(
        !permissions::evaluate("pod-content-id", &notes, Some("u2"), permissions::Action::Write)
            .await
            .unwrap()
    );
    assert!(
        !permissions::evaluate("pod-content-id", &notes, Some("u3"), permissions::Action::Read)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn implicit_pod_creation_primitives_round_trip() {
    // Exercises the table-layer primitives http::handlers::post_path composes
    // for spec.md §3's implicit-creation-by-ownership-assignment lifecycle:
    // absent pod -> create on first write -> now present with that writer as
    // owner.
    table::create_all_tables().await.unwrap();
    assert!(table::pods::try_get("pod-implicit-new")
        .await
        .unwrap()
        .is_none());

    table::pods::create("pod-implicit-new", "dave", 0).await.unwrap();

    let pod = table::pods::try_get("pod-implicit-new")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pod.owner_user_id, "dave");
}
