use clap::{Parser, ValueEnum};

use crate::utils::version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SurfaceKind {
    /// The signed-in user's dreams
    Dreams,
    /// The community feed
    Feed,
    /// Comments under the post given by `--parent`
    Comments,
    /// Replies under the comment given by `--parent`
    Replies,
}

impl SurfaceKind {
    pub fn needs_parent(self) -> bool {
        matches!(self, SurfaceKind::Comments | SurfaceKind::Replies)
    }
}

#[derive(Parser, Debug)]
#[command(author, version = version(), about)]
pub struct Cli {
    #[arg(value_enum, help = "List to load")]
    pub surface: SurfaceKind,

    #[arg(short, long, value_name = "ORDER", help = "Sort order (recent, oldest, popular)")]
    pub sort: Option<String>,

    #[arg(long, value_name = "TEXT", help = "Only items matching this text")]
    pub search: Option<String>,

    #[arg(
        short,
        long,
        value_name = "N",
        default_value_t = 1,
        help = "Number of pages to load"
    )]
    pub pages: u32,

    #[arg(
        long,
        value_name = "ID",
        required_if_eq_any([("surface", "comments"), ("surface", "replies")]),
        help = "Post id for comments, comment id for replies"
    )]
    pub parent: Option<String>,

    #[arg(short, long, help = "Keep applying realtime updates until Ctrl-C")]
    pub follow: bool,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_feed() {
        let cli = Cli::try_parse_from(["dreamsync", "feed", "--sort", "popular", "-p", "3", "-f"])
            .expect("valid arguments");
        assert_eq!(cli.surface, SurfaceKind::Feed);
        assert_eq!(cli.sort.as_deref(), Some("popular"));
        assert_eq!(cli.pages, 3);
        assert!(cli.follow);
    }

    #[test]
    fn test_comments_require_parent() {
        assert!(Cli::try_parse_from(["dreamsync", "comments"]).is_err());
        let cli = Cli::try_parse_from(["dreamsync", "comments", "--parent", "p1"])
            .expect("valid arguments");
        assert_eq!(cli.parent.as_deref(), Some("p1"));
        assert!(cli.surface.needs_parent());
    }
}
