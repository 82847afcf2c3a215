use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fray", version, about = "Download stories for reading offline")]
pub struct Cli {
    /// Configuration file to use instead of searching the config directory
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Log more; repeat for even more
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download a story and every chapter of it
    Fetch { id: u64 },
    /// Bring downloaded stories up to date; all of them unless one is given
    Update { id: Option<u64> },
    /// Show what the library knows about a story
    Show { id: u64 },
    /// List stories in the library
    List {
        /// Only fully downloaded stories
        #[arg(long)]
        local: bool,
    },
    /// Print a downloaded chapter
    Read { id: u64, chapter: u32 },
    /// Remember the reading position in a story
    Progress {
        id: u64,
        chapter: u32,
        /// Percentage scrolled through the chapter
        #[arg(long, default_value_t = 0.0)]
        scroll: f64,
        /// Raw scroll offset
        #[arg(long, default_value_t = 0.0)]
        offset: f64,
    },
    /// Delete a story, its chapters and everything referring to it
    Remove { id: u64 },
    /// Manage the download queue
    #[command(subcommand)]
    Queue(QueueCommand),
    /// Color-code stories
    #[command(subcommand)]
    Marker(MarkerCommand),
    /// Manage favorite canons
    #[command(subcommand)]
    Favorite(FavoriteCommand),
    /// List the canons of a category, such as /book/
    Categories { path: String },
    /// List the stories of a canon, such as /book/Harry-Potter/
    Canon {
        path: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// List reviews of a story
    Reviews {
        id: u64,
        /// Only reviews of this chapter
        #[arg(long, default_value_t = 0)]
        chapter: u32,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Maintain the page caches
    #[command(subcommand)]
    Cache(CacheCommand),
}

#[derive(Debug, Subcommand)]
pub enum QueueCommand {
    Add {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    Remove { id: u64 },
    List,
    /// Download every queued story
    Run,
}

#[derive(Debug, Subcommand)]
pub enum MarkerCommand {
    Set {
        id: u64,
        /// RGB color such as `#ff8800`
        #[arg(value_parser = parse_color)]
        color: u32,
    },
    Clear { id: u64 },
    List,
}

#[derive(Debug, Subcommand)]
pub enum FavoriteCommand {
    Add { path: String, title: String },
    Remove { path: String },
    List,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Drop expired pages
    Purge,
    /// Drop every page
    Clear,
}

fn parse_color(value: &str) -> Result<u32, String> {
    let hex = value.strip_prefix('#').unwrap_or(value);
    if hex.len() != 6 {
        return Err(format!("expected six hex digits, found {value:?}"));
    }
    u32::from_str_radix(hex, 16).map_err(|err| format!("{value:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case("#ff8800", Some(0xff8800))]
    #[case("00ff00", Some(0x00ff00))]
    #[case("#fff", None)]
    #[case("#gg0000", None)]
    fn test_parse_color(#[case] value: &str, #[case] expected: Option<u32>) {
        assert_eq!(parse_color(value).ok(), expected);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["fray", "queue", "add", "1", "2", "-vv", "--config", "/tmp/fray.toml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/fray.toml")));
        assert!(matches!(cli.command, Command::Queue(QueueCommand::Add { ids }) if ids == vec![1, 2]));
    }

    #[test]
    fn test_reviews_defaults() {
        let cli = Cli::try_parse_from(["fray", "reviews", "42"]).unwrap();
        assert!(matches!(cli.command, Command::Reviews { id: 42, chapter: 0, page: 1 }));
    }

    #[test]
    fn test_queue_add_needs_ids() {
        assert!(Cli::try_parse_from(["fray", "queue", "add"]).is_err());
    }
}
