// tests/memory_lifecycle_test.rs

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{
    build_service, memory_store, new_memory, setup, BrokenEmbedder, DownVectorIndex,
    OrthoEmbedder,
};
use keepsake::memory::core::error::MemoryError;
use keepsake::memory::VectorIndex;
use keepsake::memory::core::types::{BulkDeleteSelector, MemoryFilter, MemoryPatch};
use keepsake::memory::features::scoring::MemoryScorer;

const USER: &str = "user-1";

#[tokio::test]
async fn test_create_validates_importance_range() {
    let ctx = setup().await;

    for importance in 1..=10 {
        let result = ctx
            .service
            .create(new_memory(USER, &format!("fact {importance}"), &[], Some(importance)))
            .await;
        assert!(result.is_ok(), "importance {importance} should be accepted");
    }

    for importance in [0, 11] {
        let err = ctx
            .service
            .create(new_memory(USER, "fact", &[], Some(importance)))
            .await
            .unwrap_err();
        match err {
            MemoryError::Validation { fields } => assert_eq!(fields, vec!["importance"]),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_create_rejects_empty_content() {
    let ctx = setup().await;

    let err = ctx
        .service
        .create(new_memory(USER, "   ", &[], None))
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::Validation { .. }));
}

#[tokio::test]
async fn test_create_defaults() {
    let ctx = setup().await;

    let memory = ctx
        .service
        .create(new_memory(USER, "enjoys rainy mornings", &[], None))
        .await
        .unwrap();

    assert_eq!(memory.importance, 5);
    assert!(memory.is_visible);
    assert!(!memory.user_created);
    assert!(memory.vector_synced);
    assert_eq!(ctx.vectors.count(USER).await.unwrap(), 1);
}

#[tokio::test]
async fn test_round_trip_by_tag_filter() {
    let ctx = setup().await;

    ctx.service
        .create(new_memory(USER, "likes hiking", &["hobbies"], Some(7)))
        .await
        .unwrap();
    ctx.service
        .create(new_memory(USER, "allergic to peanuts", &["health"], Some(9)))
        .await
        .unwrap();

    let filter = MemoryFilter {
        tags: Some(vec!["hobbies".to_string()]),
        ..Default::default()
    };
    let memories = ctx.service.list(USER, &filter, 50).await.unwrap();

    assert_eq!(memories.len(), 1);
    assert_eq!(memories[0].content, "likes hiking");
    assert_eq!(memories[0].importance, 7);
}

#[tokio::test]
async fn test_free_text_search_is_case_insensitive() {
    let ctx = setup().await;

    ctx.service
        .create(new_memory(USER, "Plays the Violin every weekend", &[], None))
        .await
        .unwrap();

    let filter = MemoryFilter {
        search: Some("vIoLiN".to_string()),
        ..Default::default()
    };
    let memories = ctx.service.list(USER, &filter, 50).await.unwrap();
    assert_eq!(memories.len(), 1);
}

#[tokio::test]
async fn test_update_enforces_ownership_and_existence() {
    let ctx = setup().await;

    let memory = ctx
        .service
        .create(new_memory(USER, "likes tea", &[], None))
        .await
        .unwrap();

    let err = ctx
        .service
        .update(&memory.id, "intruder", MemoryPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::Ownership { .. }));

    let err = ctx
        .service
        .update("no-such-id", USER, MemoryPatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::NotFound { .. }));
}

#[tokio::test]
async fn test_update_applies_partial_fields() {
    let ctx = setup().await;

    let memory = ctx
        .service
        .create(new_memory(USER, "likes tea", &["drinks"], Some(4)))
        .await
        .unwrap();

    let updated = ctx
        .service
        .update(
            &memory.id,
            USER,
            MemoryPatch {
                importance: Some(8),
                emotional_context: Some("fond ritual".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Untouched fields survive; provided fields change.
    assert_eq!(updated.content, "likes tea");
    assert_eq!(updated.tags, vec!["drinks"]);
    assert_eq!(updated.importance, 8);
    assert_eq!(updated.emotional_context.as_deref(), Some("fond ritual"));
}

#[tokio::test]
async fn test_update_content_refreshes_vector() {
    let ctx = setup().await;

    let memory = ctx
        .service
        .create(new_memory(USER, "likes tea", &[], None))
        .await
        .unwrap();
    assert_eq!(ctx.vectors.count(USER).await.unwrap(), 1);

    let updated = ctx
        .service
        .update(
            &memory.id,
            USER,
            MemoryPatch {
                content: Some("prefers coffee now".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    // Same key, superseded vector: still exactly one entry, and a search for
    // the new content finds it with full similarity.
    assert!(updated.vector_synced);
    assert_eq!(ctx.vectors.count(USER).await.unwrap(), 1);

    let ranked = ctx
        .service
        .recall(USER, Some("prefers coffee now"), &MemoryFilter::default(), 5)
        .await
        .unwrap();
    assert_eq!(ranked[0].memory.id, memory.id);
    assert!(ranked[0].similarity > 0.99);
}

#[tokio::test]
async fn test_soft_delete_hides_everywhere_but_export() {
    let ctx = setup().await;

    let memory = ctx
        .service
        .create(new_memory(USER, "temporary thought", &[], None))
        .await
        .unwrap();

    ctx.service.soft_delete(&memory.id, USER).await.unwrap();

    let listed = ctx
        .service
        .list(USER, &MemoryFilter::default(), 50)
        .await
        .unwrap();
    assert!(listed.is_empty());

    let recalled = ctx
        .service
        .recall(USER, Some("temporary thought"), &MemoryFilter::default(), 5)
        .await
        .unwrap();
    assert!(recalled.is_empty());

    let (_, stats) = ctx.service.introspect(USER, 10).await.unwrap();
    assert_eq!(stats.visible, 0);
    assert_eq!(stats.total, 1);

    // Retained for audit/export.
    let exported = ctx.service.export(USER).await.unwrap();
    assert_eq!(exported.len(), 1);
    assert!(!exported[0].is_visible);
}

#[tokio::test]
async fn test_bulk_delete_by_ids() {
    let ctx = setup().await;

    let a = ctx.service.create(new_memory(USER, "a", &[], None)).await.unwrap();
    let b = ctx.service.create(new_memory(USER, "b", &[], None)).await.unwrap();
    let _c = ctx.service.create(new_memory(USER, "c", &[], None)).await.unwrap();

    let deleted = ctx
        .service
        .bulk_soft_delete(USER, BulkDeleteSelector::Ids(vec![a.id, b.id]))
        .await
        .unwrap();
    assert_eq!(deleted, 2);

    let remaining = ctx
        .service
        .list(USER, &MemoryFilter::default(), 50)
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].content, "c");
}

#[tokio::test]
async fn test_bulk_delete_ids_scoped_to_owner() {
    let ctx = setup().await;

    let foreign = ctx
        .service
        .create(new_memory("someone-else", "not yours", &[], None))
        .await
        .unwrap();

    let deleted = ctx
        .service
        .bulk_soft_delete(USER, BulkDeleteSelector::Ids(vec![foreign.id.clone()]))
        .await
        .unwrap();
    assert_eq!(deleted, 0);

    let still_there = ctx.service.export("someone-else").await.unwrap();
    assert!(still_there[0].is_visible);
}

#[tokio::test]
async fn test_bulk_delete_by_date_range_is_inclusive() {
    let ctx = setup().await;
    let now = Utc::now();

    let mut ids = Vec::new();
    for (content, days_ago) in [("old", 4), ("boundary-start", 3), ("middle", 2), ("boundary-end", 1), ("fresh", 0)] {
        let memory = ctx
            .service
            .create(new_memory(USER, content, &[], None))
            .await
            .unwrap();
        sqlx::query("UPDATE memories SET created_at = ? WHERE id = ?")
            .bind((now - Duration::days(days_ago)).naive_utc())
            .bind(&memory.id)
            .execute(&ctx.store.pool)
            .await
            .unwrap();
        ids.push(memory.id);
    }

    let deleted = ctx
        .service
        .bulk_soft_delete(
            USER,
            BulkDeleteSelector::DateRange {
                start: now - Duration::days(3),
                end: now - Duration::days(1),
            },
        )
        .await
        .unwrap();
    assert_eq!(deleted, 3);

    let remaining = ctx
        .service
        .list(USER, &MemoryFilter::default(), 50)
        .await
        .unwrap();
    let mut contents: Vec<&str> = remaining.iter().map(|m| m.content.as_str()).collect();
    contents.sort();
    assert_eq!(contents, vec!["fresh", "old"]);
}

#[tokio::test]
async fn test_bulk_delete_rejects_inverted_range() {
    let ctx = setup().await;
    let now = Utc::now();

    let err = ctx
        .service
        .bulk_soft_delete(
            USER,
            BulkDeleteSelector::DateRange {
                start: now,
                end: now - Duration::days(1),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, MemoryError::Validation { .. }));
}

#[tokio::test]
async fn test_hard_delete_removes_record_and_vector() {
    let ctx = setup().await;

    let memory = ctx
        .service
        .create(new_memory(USER, "forget me", &[], None))
        .await
        .unwrap();
    assert_eq!(ctx.vectors.count(USER).await.unwrap(), 1);

    ctx.service.hard_delete(&memory.id, USER).await.unwrap();

    assert!(ctx.service.export(USER).await.unwrap().is_empty());
    assert_eq!(ctx.vectors.count(USER).await.unwrap(), 0);
}

#[tokio::test]
async fn test_hard_delete_works_on_soft_deleted_memory() {
    let ctx = setup().await;

    let memory = ctx
        .service
        .create(new_memory(USER, "gone twice", &[], None))
        .await
        .unwrap();
    ctx.service.soft_delete(&memory.id, USER).await.unwrap();
    ctx.service.hard_delete(&memory.id, USER).await.unwrap();

    assert!(ctx.service.export(USER).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_survives_vector_backend_outage() {
    let store = memory_store().await;
    let service = build_service(
        store.clone(),
        Arc::new(DownVectorIndex),
        Arc::new(OrthoEmbedder::new()),
        MemoryScorer::new(),
    );

    let memory = service
        .create(new_memory(USER, "still saved", &[], Some(6)))
        .await
        .unwrap();

    // Degraded to metadata-only storage, retrievable by non-vector paths.
    assert!(!memory.vector_synced);
    let listed = service.list(USER, &MemoryFilter::default(), 50).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].content, "still saved");
}

#[tokio::test]
async fn test_create_survives_permanent_embedding_failure() {
    let store = memory_store().await;
    let vectors = Arc::new(keepsake::memory::storage::memvec::InMemoryVectorIndex::new());
    let service = build_service(
        store.clone(),
        vectors.clone(),
        Arc::new(BrokenEmbedder),
        MemoryScorer::new(),
    );

    let memory = service
        .create(new_memory(USER, "unembeddable", &[], None))
        .await
        .unwrap();
    assert!(!memory.vector_synced);
    assert_eq!(vectors.count(USER).await.unwrap(), 0);
}

#[tokio::test]
async fn test_backfill_syncs_deferred_vectors() {
    let store = memory_store().await;
    let vectors = Arc::new(keepsake::memory::storage::memvec::InMemoryVectorIndex::new());

    // Embedding provider down at creation time.
    let degraded = build_service(
        store.clone(),
        vectors.clone(),
        Arc::new(BrokenEmbedder),
        MemoryScorer::new(),
    );
    let memory = degraded
        .create(new_memory(USER, "late bloomer", &[], None))
        .await
        .unwrap();
    assert!(!memory.vector_synced);

    // Provider recovers; the sweep re-offers embedding.
    let recovered = build_service(
        store.clone(),
        vectors.clone(),
        Arc::new(OrthoEmbedder::new()),
        MemoryScorer::new(),
    );
    let synced = recovered.backfill_unsynced(100).await.unwrap();
    assert_eq!(synced, 1);
    assert_eq!(vectors.count(USER).await.unwrap(), 1);

    let exported = recovered.export(USER).await.unwrap();
    assert!(exported[0].vector_synced);
}

#[tokio::test]
async fn test_delete_user_data_removes_records_and_namespace() {
    let ctx = setup().await;

    ctx.service.create(new_memory(USER, "one", &[], None)).await.unwrap();
    ctx.service.create(new_memory(USER, "two", &[], None)).await.unwrap();

    let (records, vectors) = ctx.service.delete_user_data(USER).await.unwrap();
    assert_eq!(records, 2);
    assert_eq!(vectors, 2);

    assert!(ctx.service.export(USER).await.unwrap().is_empty());
    assert_eq!(ctx.vectors.count(USER).await.unwrap(), 0);
}
