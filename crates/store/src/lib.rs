//! SQLite storage for stories and the user's auxiliary lists.
//!
//! The [`StoryStore`] owns the merge policy between freshly fetched metadata
//! and what the user has already stored: a refresh never downgrades a story
//! that has been fully downloaded, and never discards reading position or the
//! local timestamps.

mod columns;
mod db;
pub mod error;
mod models;
mod store;

pub use crate::columns::Column;
pub use crate::db::Database;
pub use crate::models::{FavoriteCanon, Marker};
pub use crate::store::StoryStore;

#[cfg(test)]
pub(crate) mod tests {
    use crate::{Column, Database, StoryStore};
    use crate::error::ErrorKind;
    use fray_events::{ChangeBus, ChangeEvent, ChangeKind};
    use fray_extract::models::{Author, Rating, StoryFragment, StoryId, StoryModel, StoryProgress, StoryStatus};
    use std::sync::Arc;
    use time::macros::utc_datetime;
    use tokio::sync::mpsc;

    pub(crate) fn story(id: u64, chapters: u32) -> StoryModel {
        StoryModel {
            id: StoryId(id),
            title: format!("Story {id}"),
            author: Author::new(1_000 + id, format!("author{id}")),
            canon: "Harry Potter".to_string(),
            category: "Books".to_string(),
            summary: "A summary.".to_string(),
            fragment: StoryFragment {
                rating: Rating::T,
                language: "English".to_string(),
                words: 1_000,
                chapters,
                favorites: 1,
                follows: 2,
                reviews: 3,
                genres: vec!["Drama".to_string()],
                characters: vec!["Harry P.".to_string()],
                published: Some(utc_datetime!(2017-07-14 02:40)),
                updated: Some(utc_datetime!(2020-09-13 12:26:40)),
                completed: false,
            },
            progress: StoryProgress::default(),
            status: StoryStatus::Transient,
            added: utc_datetime!(2024-01-01 00:00),
            last_read: None,
            image_url: Some("https://img.example/image/1/75/".to_string()),
            chapter_titles: Vec::new(),
        }
    }

    async fn store() -> (StoryStore, mpsc::UnboundedReceiver<ChangeEvent>) {
        let db = Database::connect_in_memory().await.unwrap();
        let bus = ChangeBus::spawn();
        let (tx, rx) = mpsc::unbounded_channel();
        bus.subscribe(Arc::new(move |event: &ChangeEvent| {
            _ = tx.send(event.clone());
        }));
        (StoryStore::new(&db, bus), rx)
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let (store, mut events) = store().await;
        let mut model = story(42, 5);
        assert_eq!(store.upsert(&model).await.unwrap(), ChangeKind::New);
        model.fragment.words = 2_000;
        assert_eq!(store.upsert(&model).await.unwrap(), ChangeKind::Changed);

        assert_eq!(store.query_by_id(StoryId(42)).await.unwrap(), Some(model.clone()));
        assert_eq!(store.query_all().await.unwrap().len(), 1);
        let first = events.recv().await.unwrap();
        assert_eq!(first.kind, ChangeKind::New);
        let second = events.recv().await.unwrap();
        assert_eq!(second, ChangeEvent::changed(model));
    }

    #[tokio::test]
    async fn test_upsert_rejects_unpersistable_model() {
        let (store, _events) = store().await;
        let mut model = story(42, 2);
        model.progress.current_chapter = 3;
        let err = store.upsert(&model).await.unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("progress"));
        assert_eq!(store.query_by_id(StoryId(42)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_merge_never_downgrades_local_story() {
        let (store, _events) = store().await;
        let mut existing = story(42, 5);
        existing.status = StoryStatus::Local;
        existing.progress = StoryProgress::new(3, 42.0, 1_234.5);
        existing.added = utc_datetime!(2023-03-03 03:03:03);
        existing.last_read = Some(utc_datetime!(2024-04-04 04:04:04));
        store.upsert(&existing).await.unwrap();

        let mut incoming = story(42, 5);
        incoming.status = StoryStatus::Remote;
        incoming.fragment.follows = 99;
        let merged = store.upsert_merged(incoming).await.unwrap();

        let stored = store.query_by_id(StoryId(42)).await.unwrap().unwrap();
        assert_eq!(stored, merged);
        assert_eq!(stored.status, StoryStatus::Local);
        assert_eq!(stored.progress, existing.progress);
        assert_eq!(stored.added, existing.added);
        assert_eq!(stored.last_read, existing.last_read);
        assert_eq!(stored.fragment.follows, 99);
    }

    #[tokio::test]
    async fn test_merge_keeps_remote_over_transient() {
        let (store, _events) = store().await;
        let mut existing = story(42, 5);
        existing.status = StoryStatus::Remote;
        store.upsert(&existing).await.unwrap();
        let merged = store.upsert_merged(story(42, 5)).await.unwrap();
        assert_eq!(merged.status, StoryStatus::Remote);
    }

    #[tokio::test]
    async fn test_merge_clamps_progress_when_chapters_shrink() {
        let (store, _events) = store().await;
        let mut existing = story(42, 5);
        existing.progress = StoryProgress::new(4, 50.0, 10.0);
        store.upsert(&existing).await.unwrap();
        let merged = store.upsert_merged(story(42, 2)).await.unwrap();
        assert_eq!(merged.progress, StoryProgress::new(2, 0.0, 0.0));
    }

    #[tokio::test]
    async fn test_restore_keeps_local_reading_state() {
        let (store, mut events) = store().await;
        let mut old = story(42, 5);
        old.status = StoryStatus::Local;
        old.progress = StoryProgress::new(3, 40.0, 1_200.0);
        store.upsert(&old).await.unwrap();

        let mut grown = story(42, 7);
        grown.status = StoryStatus::Remote;
        grown.fragment.words = 9_000;
        store.upsert_merged(grown).await.unwrap();
        let columns = [Column::CurrentChapter(4), Column::LastRead(Some(utc_datetime!(2025-05-05 05:05)))];
        let read = store.update_columns(StoryId(42), &columns).await.unwrap();
        assert_eq!(read.status, StoryStatus::Local);

        let restored = store.restore(&old).await.unwrap().unwrap();
        assert_eq!(store.query_by_id(StoryId(42)).await.unwrap(), Some(restored.clone()));
        assert_eq!(restored.fragment, old.fragment);
        assert_eq!(restored.status, StoryStatus::Local);
        assert_eq!(restored.progress.current_chapter, 4);
        assert_eq!(restored.last_read, Some(utc_datetime!(2025-05-05 05:05)));
        assert_eq!(restored.added, old.added);

        store.bus().flush().await;
        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert_eq!(last, Some(ChangeEvent::changed(restored)));
    }

    #[tokio::test]
    async fn test_restore_clamps_progress_and_skips_missing_story() {
        let (store, _events) = store().await;
        let mut old = story(42, 2);
        old.status = StoryStatus::Local;
        store.upsert(&old).await.unwrap();
        store.upsert_merged(story(42, 7)).await.unwrap();
        store.update_columns(StoryId(42), &[Column::CurrentChapter(6)]).await.unwrap();

        let restored = store.restore(&old).await.unwrap().unwrap();
        assert_eq!(restored.progress, StoryProgress::new(2, 0.0, 0.0));

        store.delete(StoryId(42)).await.unwrap();
        assert_eq!(store.restore(&old).await.unwrap(), None);
        assert_eq!(store.query_by_id(StoryId(42)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_merges_insert_once() {
        let (store, mut events) = store().await;
        let tasks = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.upsert_merged(story(7, 3)).await })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        store.bus().flush().await;
        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(event.kind);
        }
        assert_eq!(kinds.len(), 8);
        assert_eq!(kinds.iter().filter(|kind| **kind == ChangeKind::New).count(), 1);
        assert_eq!(kinds[0], ChangeKind::New);
    }

    #[tokio::test]
    async fn test_update_columns() {
        let (store, mut events) = store().await;
        store.upsert(&story(42, 5)).await.unwrap();
        let read_at = utc_datetime!(2025-05-05 05:05:05);
        let mut columns = Column::progress(StoryProgress::new(2, 10.0, 300.0)).to_vec();
        columns.push(Column::LastRead(Some(read_at)));
        columns.push(Column::Status(StoryStatus::Local));
        let updated = store.update_columns(StoryId(42), &columns).await.unwrap();
        assert_eq!(updated.progress, StoryProgress::new(2, 10.0, 300.0));
        assert_eq!(updated.last_read, Some(read_at));
        assert_eq!(updated.status, StoryStatus::Local);

        events.recv().await.unwrap();
        assert_eq!(events.recv().await.unwrap(), ChangeEvent::changed(updated));
    }

    #[tokio::test]
    async fn test_update_columns_errors() {
        let (store, _events) = store().await;
        let err = store.update_columns(StoryId(1), &[Column::CurrentChapter(1)]).await.unwrap_err();
        assert_eq!(*err, ErrorKind::NotFound(StoryId(1)));

        store.upsert(&story(1, 2)).await.unwrap();
        let err = store.update_columns(StoryId(1), &[]).await.unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("columns"));
        // Past the last chapter: caught by the table's check constraint.
        let err = store.update_columns(StoryId(1), &[Column::CurrentChapter(3)]).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Constraint);
        let err = store.update_columns(StoryId(1), &[Column::ScrollProgress(100.5)]).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Constraint);
    }

    #[tokio::test]
    async fn test_queries() {
        let (store, _events) = store().await;
        for id in [3, 1, 2] {
            let mut model = story(id, 1);
            if id != 2 {
                model.status = StoryStatus::Local;
            }
            store.upsert(&model).await.unwrap();
        }
        let ids = |stories: Vec<StoryModel>| stories.into_iter().map(|s| s.id.get()).collect::<Vec<_>>();
        assert_eq!(ids(store.query_all().await.unwrap()), vec![1, 2, 3]);
        assert_eq!(ids(store.query_all_local().await.unwrap()), vec![1, 3]);
        let wanted = [StoryId(3), StoryId(9), StoryId(1)];
        assert_eq!(ids(store.query_by_ids(&wanted).await.unwrap()), vec![3, 1]);
        assert!(store.query_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _events) = store().await;
        store.upsert(&story(42, 1)).await.unwrap();
        let deleted = store.delete(StoryId(42)).await.unwrap();
        assert_eq!(deleted.map(|s| s.id), Some(StoryId(42)));
        assert_eq!(store.delete(StoryId(42)).await.unwrap(), None);
        assert_eq!(store.query_by_id(StoryId(42)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_queue_reindexes_on_removal() {
        let (store, _events) = store().await;
        for id in [10, 20, 30, 40] {
            assert!(store.enqueue(StoryId(id)).await.unwrap());
        }
        assert!(!store.enqueue(StoryId(20)).await.unwrap());
        assert!(store.dequeue(StoryId(20)).await.unwrap());
        assert!(!store.dequeue(StoryId(20)).await.unwrap());
        assert_eq!(store.queue().await.unwrap(), vec![StoryId(10), StoryId(30), StoryId(40)]);

        let db_positions: Vec<(i64, i64)> =
            sqlx::query_as("SELECT story_id, position FROM download_queue ORDER BY position")
                .fetch_all(store.pool())
                .await
                .unwrap();
        assert_eq!(db_positions, vec![(10, 0), (30, 1), (40, 2)]);

        // New entries continue after the renumbered tail.
        store.enqueue(StoryId(50)).await.unwrap();
        assert_eq!(store.queue().await.unwrap().last(), Some(&StoryId(50)));
    }

    #[tokio::test]
    async fn test_markers() {
        let (store, _events) = store().await;
        store.set_marker(StoryId(1), 0xff0000).await.unwrap();
        store.set_marker(StoryId(1), 0x00ff00).await.unwrap();
        store.set_marker(StoryId(2), 0x0000ff).await.unwrap();
        assert_eq!(store.marker(StoryId(1)).await.unwrap(), Some(0x00ff00));
        assert_eq!(store.markers().await.unwrap().len(), 2);
        assert!(store.clear_marker(StoryId(1)).await.unwrap());
        assert!(!store.clear_marker(StoryId(1)).await.unwrap());
        assert_eq!(store.marker(StoryId(1)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_favorites() {
        let (store, _events) = store().await;
        assert!(store.add_favorite("/book/Dune/", "Dune").await.unwrap());
        assert!(!store.add_favorite("/book/Dune/", "Dune").await.unwrap());
        assert!(store.add_favorite("/anime/Bleach/", "Bleach").await.unwrap());
        let titles = store.favorites().await.unwrap().into_iter().map(|f| f.title).collect::<Vec<_>>();
        assert_eq!(titles, vec!["Bleach", "Dune"]);
        assert!(store.remove_favorite("/book/Dune/").await.unwrap());
        assert!(!store.remove_favorite("/book/Dune/").await.unwrap());
        assert_eq!(store.favorites().await.unwrap().len(), 1);
    }
}
