use anyhow::{bail, Result};
use rand::Rng;

use crate::pager::TextPager;
use crate::source::PostRecord;
use crate::store::{CursorStore, PostStore, SavedPost};

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("cursor {cursor} is out of range for {len} posts")]
    CursorOutOfRange { cursor: i64, len: usize },
}

/// Cursor over one source's posts, persisted through [`CursorStore`].
pub struct NavigationState {
    source_name: String,
    records: Vec<PostRecord>,
    cursors: CursorStore,
    posts: PostStore,
    pager: TextPager,
    cursor: i64,
}

impl NavigationState {
    pub fn new(
        source_name: impl Into<String>,
        records: Vec<PostRecord>,
        cursors: CursorStore,
        posts: PostStore,
        pager: TextPager,
    ) -> Result<Self> {
        let source_name = source_name.into();
        if records.is_empty() {
            bail!("navigation: source {source_name} has no posts");
        }
        let cursor = cursors.get_value(&source_name)?;
        let mut state = Self {
            source_name,
            records,
            cursors,
            posts,
            pager,
            cursor,
        };
        if state.cursor_in_range() {
            state.reload()?;
        }
        Ok(state)
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn pager(&self) -> &TextPager {
        &self.pager
    }

    pub fn pager_mut(&mut self) -> &mut TextPager {
        &mut self.pager
    }

    fn last_index(&self) -> i64 {
        self.records.len() as i64 - 1
    }

    pub fn cursor_in_range(&self) -> bool {
        (0..=self.last_index()).contains(&self.cursor)
    }

    pub fn current_record(&self) -> Result<&PostRecord, NavigationError> {
        usize::try_from(self.cursor)
            .ok()
            .and_then(|index| self.records.get(index))
            .ok_or(NavigationError::CursorOutOfRange {
                cursor: self.cursor,
                len: self.records.len(),
            })
    }

    pub fn has_next(&self) -> bool {
        self.cursor < self.last_index()
    }

    pub fn has_previous(&self) -> bool {
        self.cursor > 0
    }

    /// Saved posts are keyed by (source, cursor).
    fn saved_key(&self) -> Option<usize> {
        usize::try_from(self.cursor).ok()
    }

    pub fn is_saved(&self) -> Result<bool> {
        let Some(index) = self.saved_key() else {
            return Ok(false);
        };
        Ok(self.posts.get(&self.source_name, index)?.is_some())
    }

    pub fn saved_posts(&self) -> Result<Vec<SavedPost>> {
        self.posts.get_all(&self.source_name)
    }

    fn set_cursor(&mut self, value: i64) -> Result<()> {
        self.cursors.set_value(&self.source_name, value)?;
        self.cursor = value;
        Ok(())
    }

    /// Loads the post under the cursor into the pager.
    pub fn reload(&mut self) -> Result<()> {
        let content = self.current_record()?.content.clone();
        self.pager.load(&content);
        Ok(())
    }

    pub fn next(&mut self) -> Result<()> {
        if !self.has_next() {
            return Ok(());
        }
        self.set_cursor(self.cursor + 1)?;
        self.reload()
    }

    pub fn previous(&mut self) -> Result<()> {
        if !self.has_previous() {
            return Ok(());
        }
        self.set_cursor(self.cursor - 1)?;
        self.reload()
    }

    pub fn random_jump(&mut self) -> Result<()> {
        self.random_jump_with(&mut rand::thread_rng())
    }

    /// Jumps to a uniformly chosen post in `0..len-1`; the last post is never
    /// picked. A single-post source has nothing to pick from and stays put.
    pub fn random_jump_with<R: Rng>(&mut self, rng: &mut R) -> Result<()> {
        let upper = self.records.len().saturating_sub(1);
        if upper == 0 {
            tracing::warn!(source = %self.source_name, "random jump ignored: no candidates");
            return Ok(());
        }
        let target = rng.gen_range(0..upper);
        self.set_cursor(target as i64)?;
        self.reload()
    }

    pub fn toggle_save(&mut self) -> Result<()> {
        let record = self.current_record()?.clone();
        let index = self.saved_key().ok_or(NavigationError::CursorOutOfRange {
            cursor: self.cursor,
            len: self.records.len(),
        })?;
        if self.is_saved()? {
            self.posts.delete(&self.source_name, index)?;
            tracing::info!(source = %self.source_name, index, "dropped post");
        } else {
            self.posts
                .create(&self.source_name, index, &record.content, &record.datetime)?;
            tracing::info!(source = %self.source_name, index, "saved post");
        }
        Ok(())
    }

    /// Moves the cursor back to the first post without reloading the pager.
    pub fn reset(&mut self) -> Result<()> {
        self.set_cursor(0)
    }
}
