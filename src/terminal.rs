use std::io::{self, Stdout};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget, Wrap};
use ratatui::Terminal;
use unicode_width::UnicodeWidthStr;

use crate::config::{Keymap, ViewConfig};
use crate::view::{BrowseFrame, Control, Frame, Input, Renderer, SanitizeFrame};

/// Draws frames into a fixed-size card anchored at the configured padding.
pub struct TerminalRenderer<B: Backend> {
    terminal: Terminal<B>,
    view: ViewConfig,
    keys: Keymap,
}

impl TerminalRenderer<CrosstermBackend<Stdout>> {
    /// Switches the terminal to raw mode on the alternate screen.
    pub fn enter(view: ViewConfig, keys: Keymap) -> Result<Self> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("terminal: enable raw mode")?;
        stdout
            .execute(EnterAlternateScreen)
            .context("terminal: enter alternate screen")?;
        let mut renderer = Self::with_backend(CrosstermBackend::new(stdout), view, keys)?;
        renderer.terminal.clear()?;
        Ok(renderer)
    }

    pub fn leave(&mut self) -> Result<()> {
        disable_raw_mode().context("terminal: disable raw mode")?;
        self.terminal
            .backend_mut()
            .execute(LeaveAlternateScreen)
            .context("terminal: leave alternate screen")?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl<B: Backend> TerminalRenderer<B> {
    pub fn with_backend(backend: B, view: ViewConfig, keys: Keymap) -> Result<Self> {
        let terminal = Terminal::new(backend).context("terminal: create")?;
        Ok(Self {
            terminal,
            view,
            keys,
        })
    }

    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }

    fn map_key(&self, key: KeyEvent) -> Input {
        if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return Input::Unmapped;
        }
        match key.code {
            KeyCode::Char(ch) => self
                .keys
                .action_for(ch)
                .map(Input::Action)
                .unwrap_or(Input::Unmapped),
            _ => Input::Unmapped,
        }
    }
}

impl<B: Backend> Renderer for TerminalRenderer<B> {
    fn draw(&mut self, frame: &Frame) -> Result<()> {
        let view = self.view;
        self.terminal
            .draw(|canvas| match frame {
                Frame::Sanitize(sanitize) => draw_sanitize(canvas, sanitize, &view),
                Frame::Browse(browse) => draw_browse(canvas, browse, &view),
            })
            .context("terminal: draw frame")?;
        Ok(())
    }

    fn next_input(&mut self) -> Result<Input> {
        loop {
            match event::read().context("terminal: read event")? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    return Ok(self.map_key(key));
                }
                Event::Resize(_, _) => return Ok(Input::Redraw),
                _ => {}
            }
        }
    }
}

/// Renders `widget` into the part of the requested area that is on screen.
/// Geometry saturates at the `u16` edge, so oversized views never overflow.
fn render_clipped<W: Widget>(
    canvas: &mut ratatui::Frame<'_>,
    widget: W,
    x: u16,
    y: u16,
    width: u16,
    height: u16,
) {
    let area = Rect::new(x, y, width, height).intersection(canvas.size());
    if !area.is_empty() {
        canvas.render_widget(widget, area);
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn standout() -> Style {
    Style::default().add_modifier(Modifier::REVERSED)
}

fn control_span(control: &Control) -> Span<'static> {
    Span::styled(
        control.label.clone(),
        if control.enabled { bold() } else { dim() },
    )
}

/// ` a | b | c ` with each control styled by availability.
fn control_line(controls: &[&Control]) -> Line<'static> {
    let mut spans = vec![Span::styled(" ", bold())];
    for (i, control) in controls.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", bold()));
        }
        spans.push(control_span(control));
    }
    spans.push(Span::styled(" ", bold()));
    Line::from(spans)
}

fn line_width(line: &Line<'_>) -> u16 {
    line.spans
        .iter()
        .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
        .sum::<usize>()
        .min(u16::MAX as usize) as u16
}

fn draw_sanitize(canvas: &mut ratatui::Frame<'_>, frame: &SanitizeFrame, view: &ViewConfig) {
    let x = view.padding_left;
    let y = view.padding_top;
    let [reset, quit] = frame.instructions();

    let warning = Paragraph::new(frame.warning()).wrap(Wrap { trim: true });
    render_clipped(canvas, warning, x, y, view.width, 3);
    render_clipped(
        canvas,
        Paragraph::new(reset).style(bold()).wrap(Wrap { trim: true }),
        x,
        y.saturating_add(4),
        view.width,
        1,
    );
    render_clipped(
        canvas,
        Paragraph::new(quit).style(bold()).wrap(Wrap { trim: true }),
        x,
        y.saturating_add(6),
        view.width,
        1,
    );
}

fn draw_browse(canvas: &mut ratatui::Frame<'_>, frame: &BrowseFrame, view: &ViewConfig) {
    let x = view.padding_left;
    let y = view.padding_top;

    let header = Paragraph::new(frame.header.clone())
        .style(standout())
        .alignment(Alignment::Center);
    render_clipped(canvas, header, x, y, view.width.saturating_sub(1), 1);

    let card_top = y.saturating_add(1);
    render_clipped(
        canvas,
        Block::default().borders(Borders::ALL),
        x,
        card_top,
        view.width,
        view.card_height,
    );

    let inner_x = x.saturating_add(2);
    let inner_y = y.saturating_add(2);
    let inner_width = view.width.saturating_sub(4);
    let inner_height = view.card_height.saturating_sub(2);

    render_clipped(
        canvas,
        Paragraph::new(frame.datetime.clone()),
        inner_x,
        inner_y,
        inner_width,
        1,
    );
    render_clipped(
        canvas,
        Paragraph::new(frame.position.clone()).style(if frame.saved { standout() } else { dim() }),
        inner_x,
        inner_y.saturating_add(2),
        inner_width,
        1,
    );

    let page_top = inner_y.saturating_add(4);
    let pagination_row = inner_y.saturating_add(inner_height.saturating_sub(2));
    render_clipped(
        canvas,
        Paragraph::new(frame.page.clone()),
        inner_x,
        page_top,
        inner_width,
        pagination_row.saturating_sub(page_top),
    );

    if let Some(pagination) = &frame.pagination {
        render_clipped(
            canvas,
            Paragraph::new(pagination.label.clone()),
            inner_x,
            pagination_row,
            inner_width,
            1,
        );
        let controls = control_line(&[&pagination.previous, &pagination.next]);
        let width = line_width(&controls).min(inner_width);
        render_clipped(
            canvas,
            Paragraph::new(controls),
            inner_x.saturating_add(inner_width - width),
            pagination_row,
            width,
            1,
        );
    }

    let bar: Vec<&Control> = frame.controls.iter().collect();
    render_clipped(
        canvas,
        Paragraph::new(control_line(&bar)),
        x,
        card_top.saturating_add(view.card_height),
        view.width,
        1,
    );
}
