//! Two-screen interaction loop.
//!
//! `Sanitize` runs once and only shows itself when the restored cursor does
//! not point at a loaded post. `Browse` then repeats until the quit key.
//! Transitions are plain functions over [`NavigationState`]; drawing and key
//! reading sit behind [`Renderer`].

use anyhow::Result;

use crate::config::{Action, Keymap};
use crate::navigation::NavigationState;

pub const SAVED_MARKER: &str = " ✔";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Sanitize,
    Browse,
    Terminated,
}

/// What the renderer hands back after blocking for the next event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Action(Action),
    /// A key with no binding.
    Unmapped,
    /// The terminal changed size; redraw the current frame.
    Redraw,
}

pub trait Renderer {
    fn draw(&mut self, frame: &Frame) -> Result<()>;
    fn next_input(&mut self) -> Result<Input>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    pub label: String,
    pub enabled: bool,
}

impl Control {
    fn new(name: &str, key: char, enabled: bool) -> Self {
        Self {
            label: format!("{name} ({key})"),
            enabled,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub label: String,
    pub previous: Control,
    pub next: Control,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowseFrame {
    pub header: String,
    pub datetime: String,
    pub position: String,
    pub saved: bool,
    pub page: String,
    pub pagination: Option<Pagination>,
    pub controls: Vec<Control>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizeFrame {
    pub source_name: String,
    pub cursor: i64,
    pub reset_key: char,
    pub quit_key: char,
}

impl SanitizeFrame {
    pub fn warning(&self) -> String {
        format!(
            "WARNING: Previous position for {} posts set to {}, which is out of range for post data.",
            self.source_name, self.cursor
        )
    }

    pub fn instructions(&self) -> [String; 2] {
        [
            format!("Press {} to reset index to 0 and continue", self.reset_key),
            format!("Press {} to exit", self.quit_key),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Sanitize(SanitizeFrame),
    Browse(BrowseFrame),
}

pub fn sanitize_frame(nav: &NavigationState, keys: &Keymap) -> Frame {
    Frame::Sanitize(SanitizeFrame {
        source_name: nav.source_name().to_string(),
        cursor: nav.cursor(),
        reset_key: keys.label(Action::ResetCursor),
        quit_key: keys.label(Action::Quit),
    })
}

pub fn browse_frame(nav: &NavigationState, keys: &Keymap) -> Result<Frame> {
    let record = nav.current_record()?;
    let saved = nav.is_saved()?;
    let pager = nav.pager();

    let pagination = (pager.page_count() > 1).then(|| Pagination {
        label: format!("Page {} / {}", pager.page_index() + 1, pager.page_count()),
        previous: Control::new(
            "Previous Page",
            keys.label(Action::PreviousPage),
            pager.has_previous(),
        ),
        next: Control::new("Next Page", keys.label(Action::NextPage), pager.has_next()),
    });

    let controls = vec![
        Control::new("Prev", keys.label(Action::PreviousPost), nav.has_previous()),
        Control::new(
            if saved { "Drop" } else { "Save" },
            keys.label(Action::ToggleSave),
            true,
        ),
        Control::new("Next", keys.label(Action::NextPost), nav.has_next()),
        Control::new("Rand", keys.label(Action::RandomPost), true),
        Control::new("Quit", keys.label(Action::Quit), true),
    ];

    Ok(Frame::Browse(BrowseFrame {
        header: format!("POST ROULETTE: {}", nav.source_name().to_uppercase()),
        datetime: record.datetime.clone(),
        position: format!(
            "{} / {}{}",
            nav.cursor() + 1,
            nav.len(),
            if saved { SAVED_MARKER } else { "" }
        ),
        saved,
        page: pager.current_page().to_string(),
        pagination,
        controls,
    }))
}

/// Sanitize screen input. `None` means the input is ignored.
pub fn sanitize_transition(nav: &mut NavigationState, action: Action) -> Result<Option<Screen>> {
    match action {
        Action::ResetCursor => {
            nav.reset()?;
            nav.reload()?;
            Ok(Some(Screen::Browse))
        }
        Action::Quit => Ok(Some(Screen::Terminated)),
        _ => Ok(None),
    }
}

/// Browse screen input, checked in priority order. `None` means the action is
/// unavailable and the input is ignored.
pub fn browse_transition(nav: &mut NavigationState, action: Action) -> Result<Option<Screen>> {
    match action {
        Action::Quit => return Ok(Some(Screen::Terminated)),
        Action::NextPost if nav.has_next() => nav.next()?,
        Action::PreviousPost if nav.has_previous() => nav.previous()?,
        Action::NextPage if nav.pager().has_next() => nav.pager_mut().next_page(),
        Action::PreviousPage if nav.pager().has_previous() => nav.pager_mut().previous_page(),
        Action::ToggleSave => nav.toggle_save()?,
        Action::RandomPost => nav.random_jump()?,
        _ => return Ok(None),
    }
    Ok(Some(Screen::Browse))
}

pub struct ViewStateMachine<'a> {
    nav: &'a mut NavigationState,
    keys: Keymap,
    screen: Screen,
}

impl<'a> ViewStateMachine<'a> {
    pub fn new(nav: &'a mut NavigationState, keys: Keymap) -> Self {
        Self {
            nav,
            keys,
            screen: Screen::Sanitize,
        }
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn run<R: Renderer>(&mut self, renderer: &mut R) -> Result<()> {
        while self.screen != Screen::Terminated {
            self.step(renderer)?;
        }
        tracing::info!(source = %self.nav.source_name(), cursor = self.nav.cursor(), "session ended");
        Ok(())
    }

    /// Runs the current screen until it hands over to another one, or until
    /// a Browse action has been applied.
    pub fn step<R: Renderer>(&mut self, renderer: &mut R) -> Result<Screen> {
        let next = match self.screen {
            Screen::Sanitize => self.sanitize(renderer)?,
            Screen::Browse => self.browse(renderer)?,
            Screen::Terminated => Screen::Terminated,
        };
        if next != self.screen {
            tracing::info!(from = ?self.screen, to = ?next, "screen change");
        }
        self.screen = next;
        Ok(next)
    }

    fn sanitize<R: Renderer>(&mut self, renderer: &mut R) -> Result<Screen> {
        if self.nav.cursor_in_range() {
            return Ok(Screen::Browse);
        }
        tracing::warn!(
            source = %self.nav.source_name(),
            cursor = self.nav.cursor(),
            posts = self.nav.len(),
            "stored cursor is out of range"
        );
        let frame = sanitize_frame(self.nav, &self.keys);
        renderer.draw(&frame)?;
        loop {
            match renderer.next_input()? {
                Input::Action(action) => {
                    if let Some(next) = sanitize_transition(self.nav, action)? {
                        tracing::debug!(?action, "sanitize action");
                        return Ok(next);
                    }
                }
                Input::Redraw => renderer.draw(&frame)?,
                Input::Unmapped => {}
            }
        }
    }

    fn browse<R: Renderer>(&mut self, renderer: &mut R) -> Result<Screen> {
        let frame = browse_frame(self.nav, &self.keys)?;
        renderer.draw(&frame)?;
        loop {
            match renderer.next_input()? {
                Input::Action(action) => {
                    if let Some(next) = browse_transition(self.nav, action)? {
                        tracing::debug!(?action, cursor = self.nav.cursor(), "browse action");
                        return Ok(next);
                    }
                }
                Input::Redraw => renderer.draw(&frame)?,
                Input::Unmapped => {}
            }
        }
    }
}
