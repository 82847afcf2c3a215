//! Story table plus the download queue, color markers and favorite canons.

use crate::Database;
use crate::columns::Column;
use crate::error::{ErrorKind, Result, classify};
use crate::models::{FavoriteCanon, FavoriteRow, Marker, MarkerRow, StoryRow, id_from_row, id_to_row};
use exn::{OptionExt, ResultExt};
use fray_events::{ChangeBus, ChangeEvent, ChangeKind};
use fray_extract::models::{StoryId, StoryModel, now};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::instrument;

/// Attach a database error with the kind that matches what went wrong.
fn checked<T>(result: sqlx::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            let kind = classify(&err);
            Err(err).or_raise(|| kind)
        },
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error().is_some_and(|db| db.is_unique_violation())
}

/// Durable story storage.
///
/// Every mutation runs behind one writer lock, so two mutations of the same
/// story never interleave and a read-modify-write such as
/// [`upsert_merged`](Self::upsert_merged) sees the row it is about to replace.
/// Change events are published while the lock is still held, keeping their
/// order identical to the order of the writes.
#[derive(Debug, Clone)]
pub struct StoryStore {
    pool: SqlitePool,
    writer: Arc<Mutex<()>>,
    bus: ChangeBus,
}
impl StoryStore {
    pub fn new(db: &Database, bus: ChangeBus) -> Self {
        Self {
            pool: db.pool().clone(),
            writer: Arc::new(Mutex::new(())),
            bus,
        }
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // =========================================================================
    // Stories
    // =========================================================================

    /// Insert the story, or update it if a row with its id already exists.
    ///
    /// Publishes [`New`](ChangeKind::New) or [`Changed`](ChangeKind::Changed)
    /// accordingly.
    #[instrument(skip(self, story), fields(id = %story.id))]
    pub async fn upsert(&self, story: &StoryModel) -> Result<ChangeKind> {
        let _writer = self.writer.lock().await;
        self.upsert_locked(story).await
    }

    async fn upsert_locked(&self, story: &StoryModel) -> Result<ChangeKind> {
        let row = StoryRow::try_from(story)?;
        let inserted = row
            .clone()
            .bind(sqlx::query(include_str!("../queries/insert_story.sql")))
            .execute(&self.pool)
            .await;
        let kind = match inserted {
            Ok(_) => ChangeKind::New,
            Err(err) if is_unique_violation(&err) => {
                checked(
                    row.bind(sqlx::query(include_str!("../queries/update_story.sql")))
                        .execute(&self.pool)
                        .await,
                )?;
                ChangeKind::Changed
            },
            Err(err) => return checked(Err(err)),
        };
        tracing::debug!(%kind, status = %story.status, "stored story");
        self.bus.publish(ChangeEvent::new(kind, vec![story.clone()]));
        Ok(kind)
    }

    /// Upsert a freshly fetched story without losing local state.
    ///
    /// If the story is already stored, its added/read timestamps and reading
    /// progress are carried onto `story`, and the stored status is kept when
    /// it is further along than the incoming one. Progress beyond a shrunken
    /// chapter count is pulled back to the last chapter. Returns the model as
    /// stored.
    #[instrument(skip(self, story), fields(id = %story.id, incoming = %story.status))]
    pub async fn upsert_merged(&self, story: StoryModel) -> Result<StoryModel> {
        let _writer = self.writer.lock().await;
        let mut merged = match self.query_by_id(story.id).await? {
            Some(existing) => story.merged_with(&existing),
            None => story,
        };
        if merged.clamp_progress() {
            tracing::debug!(chapters = merged.fragment.chapters, "reading position clamped");
        }
        self.upsert_locked(&merged).await?;
        Ok(merged)
    }

    /// Put back the remote metadata and status of `old` after an update of
    /// the story could not be completed.
    ///
    /// Reading progress and the added/read timestamps are taken from the
    /// stored row, not from `old`, so whatever was recorded while the update
    /// ran survives; progress is pulled back inside `old`'s chapter count.
    /// Returns `None`, storing nothing, if the story is no longer stored.
    #[instrument(skip(self, old), fields(id = %old.id, status = %old.status))]
    pub async fn restore(&self, old: &StoryModel) -> Result<Option<StoryModel>> {
        let _writer = self.writer.lock().await;
        let Some(current) = self.query_by_id(old.id).await? else {
            return Ok(None);
        };
        let mut restored = old.clone().merged_with(&current);
        restored.status = old.status;
        if restored.clamp_progress() {
            tracing::debug!(chapters = restored.fragment.chapters, "reading position clamped");
        }
        self.upsert_locked(&restored).await?;
        Ok(Some(restored))
    }

    /// Overwrite specific locally-owned fields. Publishes
    /// [`Changed`](ChangeKind::Changed) with the reloaded row.
    #[instrument(skip(self, columns), fields(names = ?columns.iter().map(Column::name).collect::<Vec<_>>()))]
    pub async fn update_columns(&self, id: StoryId, columns: &[Column]) -> Result<StoryModel> {
        if columns.is_empty() {
            exn::bail!(ErrorKind::InvalidData("columns"));
        }
        let _writer = self.writer.lock().await;
        let mut builder = QueryBuilder::<Sqlite>::new("UPDATE stories SET ");
        {
            let mut set = builder.separated(", ");
            for column in columns {
                column.push(&mut set)?;
            }
        }
        builder.push(" WHERE story_id = ").push_bind(id_to_row(id)?);
        let done = checked(builder.build().execute(&self.pool).await)?;
        if done.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(id));
        }
        let story = self.query_by_id(id).await?.ok_or_raise(|| ErrorKind::NotFound(id))?;
        self.bus.publish(ChangeEvent::changed(story.clone()));
        Ok(story)
    }

    pub async fn query_by_id(&self, id: StoryId) -> Result<Option<StoryModel>> {
        let row: Option<StoryRow> = sqlx::query_as(include_str!("../queries/get_story.sql"))
            .bind(id_to_row(id)?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(StoryModel::try_from).transpose()
    }

    /// Stories for the given ids, in the order asked for. Unknown ids are
    /// skipped.
    pub async fn query_by_ids(&self, ids: &[StoryId]) -> Result<Vec<StoryModel>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder = QueryBuilder::<Sqlite>::new(include_str!("../queries/list_stories_by_ids.sql"));
        {
            let mut list = builder.separated(", ");
            for id in ids {
                list.push_bind(id_to_row(*id)?);
            }
        }
        builder.push(")");
        let rows: Vec<StoryRow> =
            builder.build_query_as().fetch_all(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        let mut stories = rows.into_iter().map(StoryModel::try_from).collect::<Result<Vec<_>>>()?;
        stories.sort_by_key(|story| ids.iter().position(|id| *id == story.id));
        Ok(stories)
    }

    /// Every fully downloaded story.
    pub async fn query_all_local(&self) -> Result<Vec<StoryModel>> {
        self.list(include_str!("../queries/list_local_stories.sql")).await
    }

    pub async fn query_all(&self) -> Result<Vec<StoryModel>> {
        self.list(include_str!("../queries/list_stories.sql")).await
    }

    async fn list(&self, sql: &'static str) -> Result<Vec<StoryModel>> {
        let rows: Vec<StoryRow> =
            sqlx::query_as(sql).fetch_all(&self.pool).await.or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(StoryModel::try_from).collect()
    }

    /// Remove the story row, returning what was stored.
    ///
    /// Queue entries, markers and chapter files are left alone, and no event
    /// is published; both are up to the caller.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: StoryId) -> Result<Option<StoryModel>> {
        let _writer = self.writer.lock().await;
        let Some(story) = self.query_by_id(id).await? else {
            return Ok(None);
        };
        checked(
            sqlx::query(include_str!("../queries/delete_story.sql"))
                .bind(id_to_row(id)?)
                .execute(&self.pool)
                .await,
        )?;
        Ok(Some(story))
    }

    // =========================================================================
    // Download queue
    // =========================================================================

    /// Append to the end of the queue. Returns `false` if already queued.
    #[instrument(skip(self))]
    pub async fn enqueue(&self, id: StoryId) -> Result<bool> {
        let _writer = self.writer.lock().await;
        let done = checked(
            sqlx::query(include_str!("../queries/enqueue.sql"))
                .bind(id_to_row(id)?)
                .execute(&self.pool)
                .await,
        )?;
        Ok(done.rows_affected() > 0)
    }

    /// Remove from the queue, renumbering the remaining entries from 0 in the
    /// same transaction. Returns `false` if it was not queued.
    #[instrument(skip(self))]
    pub async fn dequeue(&self, id: StoryId) -> Result<bool> {
        let _writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let done = checked(
            sqlx::query(include_str!("../queries/dequeue.sql"))
                .bind(id_to_row(id)?)
                .execute(&mut *tx)
                .await,
        )?;
        if done.rows_affected() == 0 {
            return Ok(false);
        }
        let remaining: Vec<i64> = sqlx::query_scalar(include_str!("../queries/list_queue.sql"))
            .fetch_all(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        for (position, story_id) in remaining.into_iter().enumerate() {
            let position = i64::try_from(position).or_raise(|| ErrorKind::InvalidData("queue position"))?;
            checked(
                sqlx::query(include_str!("../queries/set_queue_position.sql"))
                    .bind(position)
                    .bind(story_id)
                    .execute(&mut *tx)
                    .await,
            )?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(true)
    }

    /// Queued story ids, front first.
    pub async fn queue(&self) -> Result<Vec<StoryId>> {
        let ids: Vec<i64> = sqlx::query_scalar(include_str!("../queries/list_queue.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        ids.into_iter().map(id_from_row).collect()
    }

    // =========================================================================
    // Color markers
    // =========================================================================

    /// Set (or replace) the marker color of a story.
    #[instrument(skip(self))]
    pub async fn set_marker(&self, id: StoryId, color: u32) -> Result<()> {
        let _writer = self.writer.lock().await;
        checked(
            sqlx::query(include_str!("../queries/set_marker.sql"))
                .bind(id_to_row(id)?)
                .bind(i64::from(color))
                .execute(&self.pool)
                .await,
        )?;
        Ok(())
    }

    /// Returns `false` if the story had no marker.
    #[instrument(skip(self))]
    pub async fn clear_marker(&self, id: StoryId) -> Result<bool> {
        let _writer = self.writer.lock().await;
        let done = checked(
            sqlx::query(include_str!("../queries/clear_marker.sql"))
                .bind(id_to_row(id)?)
                .execute(&self.pool)
                .await,
        )?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn marker(&self, id: StoryId) -> Result<Option<u32>> {
        let color: Option<i64> = sqlx::query_scalar(include_str!("../queries/get_marker.sql"))
            .bind(id_to_row(id)?)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        color
            .map(|color| u32::try_from(color).or_raise(|| ErrorKind::InvalidData("marker color")))
            .transpose()
    }

    pub async fn markers(&self) -> Result<Vec<Marker>> {
        let rows: Vec<MarkerRow> = sqlx::query_as(include_str!("../queries/list_markers.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(Marker::try_from).collect()
    }

    // =========================================================================
    // Favorite canons
    // =========================================================================

    /// Returns `false` if the canon was already a favorite.
    #[instrument(skip(self))]
    pub async fn add_favorite(&self, path: &str, title: &str) -> Result<bool> {
        let _writer = self.writer.lock().await;
        let done = checked(
            sqlx::query(include_str!("../queries/add_favorite.sql"))
                .bind(path)
                .bind(title)
                .bind(now().unix_timestamp())
                .execute(&self.pool)
                .await,
        )?;
        Ok(done.rows_affected() > 0)
    }

    /// Returns `false` if the canon was not a favorite.
    #[instrument(skip(self))]
    pub async fn remove_favorite(&self, path: &str) -> Result<bool> {
        let _writer = self.writer.lock().await;
        let done = checked(
            sqlx::query(include_str!("../queries/remove_favorite.sql"))
                .bind(path)
                .execute(&self.pool)
                .await,
        )?;
        Ok(done.rows_affected() > 0)
    }

    pub async fn favorites(&self) -> Result<Vec<FavoriteCanon>> {
        let rows: Vec<FavoriteRow> = sqlx::query_as(include_str!("../queries/list_favorites.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(FavoriteCanon::try_from).collect()
    }
}
