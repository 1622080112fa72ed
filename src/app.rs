use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::config::{self, Config};
use crate::logging;
use crate::navigation::NavigationState;
use crate::pager::TextPager;
use crate::source;
use crate::storage::{self, DocumentStore, SqliteStore};
use crate::store::{CursorStore, PostStore, SavedPost};
use crate::terminal::TerminalRenderer;
use crate::view::ViewStateMachine;

pub const DEBUG_BANNER: &str = "DEBUG MODE – CURRENT POST AT INDEX:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Browse,
    /// Print the post under the stored cursor and exit.
    Debug,
    /// Print the saved posts of the source and exit.
    Saved,
}

#[derive(Debug, Clone, Default)]
pub struct Options {
    pub source: String,
    pub config_file: Option<PathBuf>,
    pub mode: Mode,
}

pub fn run(options: Options) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: options.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    if let Err(err) = logging::init(&cfg.log) {
        eprintln!("warning: {err:#}");
    }
    tracing::info!(version = crate::VERSION, source = %options.source, mode = ?options.mode, "starting");

    let store: Arc<dyn DocumentStore> = Arc::new(
        SqliteStore::open(storage::Options {
            path: cfg.storage.path.clone(),
        })
        .context("open storage")?,
    );
    let mut nav = open_source(&cfg, &options.source, store)?;

    let stdout = io::stdout();
    match options.mode {
        Mode::Debug => print_debug(&nav, &mut stdout.lock()),
        Mode::Saved => print_saved(&nav, &mut stdout.lock()),
        Mode::Browse => browse(&cfg, &mut nav),
    }
}

/// Resolves the selector, loads its posts and restores the stored cursor.
pub fn open_source(
    cfg: &Config,
    selector: &str,
    store: Arc<dyn DocumentStore>,
) -> Result<NavigationState> {
    let source_cfg = cfg.source(selector).ok_or_else(|| {
        anyhow!(
            "unknown source {selector:?}; configured sources: {}",
            cfg.source_names().join(", ")
        )
    })?;
    let records = source::load(&cfg.data_dir, source_cfg, &cfg.zone()?)?;
    let pager = TextPager::new(cfg.view.page_width(), cfg.view.page_height())?;
    NavigationState::new(
        source_cfg.name.clone(),
        records,
        CursorStore::new(store.clone()),
        PostStore::new(store),
        pager,
    )
}

pub fn print_debug<W: Write>(nav: &NavigationState, out: &mut W) -> Result<()> {
    let record = nav.current_record()?;
    writeln!(out, "{DEBUG_BANNER}\n")?;
    let mut json =
        serde_json::Serializer::with_formatter(&mut *out, PrettyFormatter::with_indent(b"    "));
    record.serialize(&mut json)?;
    writeln!(out)?;
    Ok(())
}

pub fn print_saved<W: Write>(nav: &NavigationState, out: &mut W) -> Result<()> {
    let mut saved: Vec<SavedPost> = nav.saved_posts()?;
    saved.sort_by_key(|post| post.index);
    writeln!(out, "{}", serde_json::to_string_pretty(&saved)?)?;
    Ok(())
}

fn browse(cfg: &Config, nav: &mut NavigationState) -> Result<()> {
    let mut renderer = TerminalRenderer::enter(cfg.view, cfg.keys)?;
    let result = ViewStateMachine::new(nav, cfg.keys).run(&mut renderer);
    renderer.leave()?;
    result
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::source::{Mapper, SourceConfig};
    use tempfile::{tempdir, TempDir};

    fn fixture(posts: &str) -> (TempDir, Config, Arc<dyn DocumentStore>) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("posts.json"), posts).unwrap();
        let mut cfg = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        cfg.sources.insert(
            "Plain".into(),
            SourceConfig {
                name: "plain".into(),
                data_file: "posts.json".into(),
                mapper: Mapper::Plain,
            },
        );
        let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        (dir, cfg, store)
    }

    const POSTS: &str = r#"[
        {"content": "first", "datetime": "a"},
        {"content": "second", "datetime": "b"}
    ]"#;

    #[test]
    fn selector_is_case_insensitive() {
        let (_dir, cfg, store) = fixture(POSTS);
        let nav = open_source(&cfg, "pLaIn", store).unwrap();
        assert_eq!(nav.source_name(), "plain");
        assert_eq!(nav.len(), 2);
    }

    #[test]
    fn unknown_selector_lists_sources() {
        let (_dir, cfg, store) = fixture(POSTS);
        let err = open_source(&cfg, "Twitter", store).err().unwrap();
        let message = err.to_string();
        assert!(message.contains("Twitter"), "{message}");
        assert!(message.contains("Facebook, Plain"), "{message}");
    }

    #[test]
    fn debug_prints_current_record() {
        let (_dir, cfg, store) = fixture(POSTS);
        CursorStore::new(store.clone()).set_value("plain", 1).unwrap();
        let nav = open_source(&cfg, "plain", store).unwrap();
        let mut out = Vec::new();
        print_debug(&nav, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let expected = format!(
            "{DEBUG_BANNER}\n\n{{\n    \"index\": 1,\n    \"content\": \"second\",\n    \"datetime\": \"b\"\n}}\n"
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn debug_rejects_out_of_range_cursor() {
        let (_dir, cfg, store) = fixture(POSTS);
        CursorStore::new(store.clone()).set_value("plain", 9).unwrap();
        let nav = open_source(&cfg, "plain", store).unwrap();
        assert!(print_debug(&nav, &mut Vec::new()).is_err());
    }

    #[test]
    fn saved_listing_is_sorted() {
        let (_dir, cfg, store) = fixture(POSTS);
        let posts = PostStore::new(store.clone());
        posts.create("plain", 1, "second", "b").unwrap();
        posts.create("plain", 0, "first", "a").unwrap();
        posts.create("other", 0, "elsewhere", "c").unwrap();
        let nav = open_source(&cfg, "plain", store).unwrap();

        let mut out = Vec::new();
        print_saved(&nav, &mut out).unwrap();
        let listed: Vec<SavedPost> = serde_json::from_slice(&out).unwrap();
        let indices: Vec<usize> = listed.iter().map(|post| post.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert!(listed.iter().all(|post| post.source_name == "plain"));
    }
}
