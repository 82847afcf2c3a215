use crate::cli::{CacheCommand, Command, FavoriteCommand, MarkerCommand, QueueCommand};
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use fray_extract::models::{StoryId, StoryModel};
use fray_library::ChapterPipeline;
use fray_library::error::ErrorKind as LibraryErrorKind;
use time::UtcDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tokio_util::sync::CancellationToken;

const DATE: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day] [hour]:[minute]");

pub async fn execute(pipeline: &ChapterPipeline, command: Command, cancel: &CancellationToken) -> Result<()> {
    let ctx = pipeline.context();
    let store = &ctx.store;
    match command {
        Command::Fetch { id } => {
            let id = StoryId(id);
            let story = pipeline
                .fetch_and_materialize(id, cancel)
                .await
                .or_raise(|| ErrorKind::Command)?
                .ok_or_raise(|| ErrorKind::NotFound(id))?;
            println!("{story}: {} chapters downloaded", story.fragment.chapters);
        },
        Command::Update { id: Some(id) } => {
            let story = stored(pipeline, StoryId(id)).await?;
            report_update(&story, pipeline.reconcile(&story, cancel).await.or_raise(|| ErrorKind::Command)?);
        },
        Command::Update { id: None } => {
            for story in store.query_all_local().await.or_raise(|| ErrorKind::Command)? {
                match pipeline.reconcile(&story, cancel).await {
                    Ok(updated) => report_update(&story, updated),
                    Err(err) if *err == LibraryErrorKind::Cancelled => {
                        return Err(err).or_raise(|| ErrorKind::Command);
                    },
                    Err(err) => {
                        tracing::error!(id = %story.id, error = ?err, "update failed");
                        println!("{story}: update failed, {}", *err);
                    },
                }
            }
        },
        Command::Show { id } => show(&stored(pipeline, StoryId(id)).await?),
        Command::List { local } => {
            let stories = if local { store.query_all_local().await } else { store.query_all().await };
            let stories = stories.or_raise(|| ErrorKind::Command)?;
            for story in stories {
                println!("{story} [{}] {}/{}", story.status, story.progress.current_chapter, story.fragment.chapters);
            }
        },
        Command::Read { id, chapter } => {
            let id = StoryId(id);
            let text = pipeline
                .read_chapter(id, chapter)
                .await
                .or_raise(|| ErrorKind::Command)?
                .ok_or_raise(|| ErrorKind::NotDownloaded { id, chapter })?;
            println!("{text}");
        },
        Command::Progress { id, chapter, scroll, offset } => {
            let story = pipeline
                .record_progress(StoryId(id), chapter, scroll, offset)
                .await
                .or_raise(|| ErrorKind::Command)?;
            println!("{story}: chapter {chapter} of {}", story.fragment.chapters);
        },
        Command::Remove { id } => {
            let id = StoryId(id);
            let story = pipeline.remove(id).await.or_raise(|| ErrorKind::Command)?;
            match story {
                Some(story) => println!("removed {story}"),
                None => println!("story {id} was not in the library"),
            }
        },
        Command::Queue(command) => queue(pipeline, command, cancel).await?,
        Command::Marker(MarkerCommand::Set { id, color }) => {
            store.set_marker(StoryId(id), color).await.or_raise(|| ErrorKind::Command)?;
        },
        Command::Marker(MarkerCommand::Clear { id }) => {
            store.clear_marker(StoryId(id)).await.or_raise(|| ErrorKind::Command)?;
        },
        Command::Marker(MarkerCommand::List) => {
            for marker in store.markers().await.or_raise(|| ErrorKind::Command)? {
                println!("{} #{:06x}", marker.story, marker.color);
            }
        },
        Command::Favorite(FavoriteCommand::Add { path, title }) => {
            if !store.add_favorite(&path, &title).await.or_raise(|| ErrorKind::Command)? {
                println!("{path} is already a favorite");
            }
        },
        Command::Favorite(FavoriteCommand::Remove { path }) => {
            store.remove_favorite(&path).await.or_raise(|| ErrorKind::Command)?;
        },
        Command::Favorite(FavoriteCommand::List) => {
            for favorite in store.favorites().await.or_raise(|| ErrorKind::Command)? {
                println!("{} {} (added {})", favorite.path, favorite.title, date(favorite.added));
            }
        },
        Command::Categories { path } => {
            for canon in pipeline.fetch_categories(&path, cancel).await.or_raise(|| ErrorKind::Command)? {
                let stories = canon.stories.map(|count| count.to_string()).unwrap_or_default();
                println!("{} {} {stories}", canon.path, canon.title);
            }
        },
        Command::Canon { path, page } => {
            let listing = pipeline.fetch_canon_page(&path, page, cancel).await.or_raise(|| ErrorKind::Command)?;
            for story in &listing.items {
                println!("{story} ({} chapters)", story.fragment.chapters);
            }
            println!("page {page} of {}", listing.last_page);
        },
        Command::Reviews { id, chapter, page } => {
            let reviews = pipeline
                .fetch_reviews(StoryId(id), chapter, page, cancel)
                .await
                .or_raise(|| ErrorKind::Command)?;
            for review in &reviews.items {
                let posted = review.posted.map(date).unwrap_or_default();
                println!("{} on chapter {} {posted}\n    {}", review.name, review.chapter, review.text);
            }
            println!("page {page} of {}", reviews.last_page);
        },
        Command::Cache(CacheCommand::Purge) => {
            for cache in [&ctx.pages, &ctx.listings] {
                let purged = cache.purge().await.or_raise(|| ErrorKind::Command)?;
                println!("{}: {purged} expired entries removed", cache.name());
            }
        },
        Command::Cache(CacheCommand::Clear) => {
            for cache in [&ctx.pages, &ctx.listings] {
                cache.clear().await.or_raise(|| ErrorKind::Command)?;
            }
        },
    }
    Ok(())
}

async fn queue(pipeline: &ChapterPipeline, command: QueueCommand, cancel: &CancellationToken) -> Result<()> {
    let store = &pipeline.context().store;
    match command {
        QueueCommand::Add { ids } => {
            for id in ids {
                if !store.enqueue(StoryId(id)).await.or_raise(|| ErrorKind::Command)? {
                    println!("story {id} is already queued");
                }
            }
        },
        QueueCommand::Remove { id } => {
            store.dequeue(StoryId(id)).await.or_raise(|| ErrorKind::Command)?;
        },
        QueueCommand::List => {
            for (position, id) in store.queue().await.or_raise(|| ErrorKind::Command)?.into_iter().enumerate() {
                println!("{position}: {id}");
            }
        },
        QueueCommand::Run => {
            let report = pipeline.process_queue(cancel).await.or_raise(|| ErrorKind::Command)?;
            println!(
                "{} downloaded, {} not found, {} failed",
                report.downloaded.len(),
                report.not_found.len(),
                report.failed.len()
            );
            if report.cancelled {
                println!("interrupted; the rest stays queued");
            }
        },
    }
    Ok(())
}

async fn stored(pipeline: &ChapterPipeline, id: StoryId) -> Result<StoryModel> {
    pipeline
        .context()
        .store
        .query_by_id(id)
        .await
        .or_raise(|| ErrorKind::Command)?
        .ok_or_raise(|| ErrorKind::UnknownStory(id))
}

fn report_update(story: &StoryModel, updated: Option<StoryModel>) {
    match updated {
        Some(updated) => println!("{updated}: now {} chapters", updated.fragment.chapters),
        None => println!("{story}: up to date"),
    }
}

fn show(story: &StoryModel) {
    let fragment = &story.fragment;
    println!("{story}");
    println!("  {} / {}", story.category, story.canon);
    println!("  {}", story.summary);
    println!(
        "  rated {}, {}, {} words, {} chapters{}",
        fragment.rating,
        fragment.language,
        fragment.words,
        fragment.chapters,
        if fragment.completed { ", complete" } else { "" }
    );
    if let Some(published) = fragment.published {
        println!("  published {}", date(published));
    }
    if let Some(updated) = fragment.updated {
        println!("  updated {}", date(updated));
    }
    println!("  status {}, added {}", story.status, date(story.added));
    let progress = &story.progress;
    println!(
        "  reading chapter {} ({:.0}%){}",
        progress.current_chapter,
        progress.scroll_progress,
        story.last_read.map(|read| format!(", last read {}", date(read))).unwrap_or_default()
    );
}

fn date(at: UtcDateTime) -> String {
    at.format(DATE).unwrap_or_else(|_| at.to_string())
}
