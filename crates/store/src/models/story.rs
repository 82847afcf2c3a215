use super::{id_from_row, id_to_row, time_from_row};
use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use fray_extract::models::{Author, Rating, StoryFragment, StoryModel, StoryProgress, StoryStatus};
use serde_json::{from_str as from_json, to_string as to_json};

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct StoryRow {
    pub(crate) story_id: i64,
    pub(crate) title: String,
    pub(crate) author_id: i64,
    pub(crate) author_name: String,
    pub(crate) canon: String,
    pub(crate) category: String,
    pub(crate) summary: String,
    pub(crate) rating: String,
    pub(crate) language: String,
    pub(crate) words: i64,
    pub(crate) chapters: i64,
    pub(crate) favorites: i64,
    pub(crate) follows: i64,
    pub(crate) reviews: i64,
    pub(crate) genres: String,
    pub(crate) characters: String,
    pub(crate) published_at: Option<i64>,
    pub(crate) updated_at: Option<i64>,
    pub(crate) completed: bool,
    pub(crate) current_chapter: i64,
    pub(crate) scroll_progress: f64,
    pub(crate) scroll_absolute: f64,
    pub(crate) status: String,
    pub(crate) added_at: i64,
    pub(crate) last_read_at: Option<i64>,
    pub(crate) image_url: Option<String>,
    pub(crate) chapter_titles: String,
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

impl StoryRow {
    /// Binds every column in the `?1`..`?27` order shared by the insert and
    /// update queries.
    pub(crate) fn bind(self, query: SqliteQuery<'_>) -> SqliteQuery<'_> {
        query
            .bind(self.story_id)
            .bind(self.title)
            .bind(self.author_id)
            .bind(self.author_name)
            .bind(self.canon)
            .bind(self.category)
            .bind(self.summary)
            .bind(self.rating)
            .bind(self.language)
            .bind(self.words)
            .bind(self.chapters)
            .bind(self.favorites)
            .bind(self.follows)
            .bind(self.reviews)
            .bind(self.genres)
            .bind(self.characters)
            .bind(self.published_at)
            .bind(self.updated_at)
            .bind(self.completed)
            .bind(self.current_chapter)
            .bind(self.scroll_progress)
            .bind(self.scroll_absolute)
            .bind(self.status)
            .bind(self.added_at)
            .bind(self.last_read_at)
            .bind(self.image_url)
            .bind(self.chapter_titles)
    }
}

fn count(value: u64, field: &'static str) -> Result<i64> {
    i64::try_from(value).or_raise(|| ErrorKind::InvalidData(field))
}

fn uncount(value: i64, field: &'static str) -> Result<u64> {
    u64::try_from(value).or_raise(|| ErrorKind::InvalidData(field))
}

impl TryFrom<&StoryModel> for StoryRow {
    type Error = Error;
    fn try_from(story: &StoryModel) -> Result<Self> {
        if let Some(field) = story.invalid_field() {
            exn::bail!(ErrorKind::InvalidData(field));
        }
        let fragment = &story.fragment;
        Ok(Self {
            story_id: id_to_row(story.id)?,
            title: story.title.clone(),
            author_id: count(story.author.id, "author id")?,
            author_name: story.author.name.clone(),
            canon: story.canon.clone(),
            category: story.category.clone(),
            summary: story.summary.clone(),
            rating: fragment.rating.as_short_str().to_string(),
            language: fragment.language.clone(),
            words: count(fragment.words, "words")?,
            chapters: i64::from(fragment.chapters),
            favorites: count(fragment.favorites, "favorites")?,
            follows: count(fragment.follows, "follows")?,
            reviews: count(fragment.reviews, "reviews")?,
            genres: to_json(&fragment.genres).or_raise(|| ErrorKind::InvalidData("genres"))?,
            characters: to_json(&fragment.characters).or_raise(|| ErrorKind::InvalidData("characters"))?,
            published_at: fragment.published.map(|t| t.unix_timestamp()),
            updated_at: fragment.updated.map(|t| t.unix_timestamp()),
            completed: fragment.completed,
            current_chapter: i64::from(story.progress.current_chapter),
            scroll_progress: story.progress.scroll_progress,
            scroll_absolute: story.progress.scroll_absolute,
            status: story.status.as_str().to_string(),
            added_at: story.added.unix_timestamp(),
            last_read_at: story.last_read.map(|t| t.unix_timestamp()),
            image_url: story.image_url.clone(),
            chapter_titles: to_json(&story.chapter_titles).or_raise(|| ErrorKind::InvalidData("chapter titles"))?,
        })
    }
}

impl TryFrom<StoryRow> for StoryModel {
    type Error = Error;
    fn try_from(row: StoryRow) -> Result<Self> {
        Ok(Self {
            id: id_from_row(row.story_id)?,
            title: row.title,
            author: Author::new(uncount(row.author_id, "author id")?, row.author_name),
            canon: row.canon,
            category: row.category,
            summary: row.summary,
            fragment: StoryFragment {
                rating: row.rating.parse::<Rating>().or_raise(|| ErrorKind::InvalidData("rating"))?,
                language: row.language,
                words: uncount(row.words, "words")?,
                chapters: u32::try_from(row.chapters).or_raise(|| ErrorKind::InvalidData("chapters"))?,
                favorites: uncount(row.favorites, "favorites")?,
                follows: uncount(row.follows, "follows")?,
                reviews: uncount(row.reviews, "reviews")?,
                genres: from_json(&row.genres).or_raise(|| ErrorKind::InvalidData("genres"))?,
                characters: from_json(&row.characters).or_raise(|| ErrorKind::InvalidData("characters"))?,
                published: row.published_at.map(|t| time_from_row(t, "published")).transpose()?,
                updated: row.updated_at.map(|t| time_from_row(t, "updated")).transpose()?,
                completed: row.completed,
            },
            progress: StoryProgress {
                current_chapter: u32::try_from(row.current_chapter)
                    .or_raise(|| ErrorKind::InvalidData("current chapter"))?,
                scroll_progress: row.scroll_progress,
                scroll_absolute: row.scroll_absolute,
            },
            status: row.status.parse::<StoryStatus>().or_raise(|| ErrorKind::InvalidData("status"))?,
            added: time_from_row(row.added_at, "added")?,
            last_read: row.last_read_at.map(|t| time_from_row(t, "last read")).transpose()?,
            image_url: row.image_url,
            chapter_titles: from_json(&row.chapter_titles).or_raise(|| ErrorKind::InvalidData("chapter titles"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::story;

    #[test]
    fn test_model_to_row_and_back() {
        let mut model = story(42, 5);
        model.chapter_titles = vec!["One".to_string(), "Two".to_string()];
        model.fragment.updated = None;
        let row = StoryRow::try_from(&model).unwrap();
        assert_eq!(row.rating, "T");
        assert_eq!(row.status, "transient");
        assert_eq!(row.updated_at, None);
        assert_eq!(row.chapter_titles, r#"["One","Two"]"#);
        assert_eq!(StoryModel::try_from(row).unwrap(), model);
    }

    #[test]
    fn test_unpersistable_model() {
        let model = story(42, 0);
        let err = StoryRow::try_from(&model).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("chapters"));
    }

    #[test]
    fn test_corrupt_row() {
        let mut row = StoryRow::try_from(&story(42, 5)).unwrap();
        row.genres = "not json".to_string();
        let err = StoryModel::try_from(row).unwrap_err();
        assert_eq!(*err, ErrorKind::InvalidData("genres"));
    }
}
