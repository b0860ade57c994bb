//! TUI rendering for the dashboard.

pub mod event_detail;
pub mod event_list;

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};

use codered_core::role::Role;

use crate::app::App;

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw(f: &mut Frame, app: &App) {
  let area = f.area();

  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(area);

  draw_header(f, rows[0], app);
  draw_body(f, rows[1], app);
  draw_status(f, rows[2], app);
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
  let who = match &app.scope {
    Some(scope) => format!(" CODE RED  {} · {scope}", app.role),
    None => format!(" CODE RED  {}", app.role),
  };
  let left = Span::styled(
    who,
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );

  let freshness = match (app.snapshot.fetched_at, app.snapshot.stale) {
    (None, _) => "connecting…".to_string(),
    (Some(at), false) => format!("updated {}", at.format("%H:%M:%S")),
    (Some(at), true) => format!("STALE since {}", at.format("%H:%M:%S")),
  };
  let right = Span::styled(
    format!("{freshness}  {} ", app.now.format("%H:%M:%S")),
    if app.snapshot.stale {
      Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(Color::Gray)
    },
  );

  let left_width = left.content.chars().count() as u16;
  let right_width = right.content.chars().count() as u16;
  let pad = area
    .width
    .saturating_sub(left_width)
    .saturating_sub(right_width);

  let line = Line::from(vec![
    left,
    Span::raw(" ".repeat(pad as usize)),
    right,
  ]);

  let block = Block::default().style(Style::default().bg(Color::Red));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_body(f: &mut Frame, area: Rect, app: &App) {
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
    .split(area);

  event_list::draw(f, cols[0], app);

  if app.selected_view().is_some() {
    event_detail::draw(f, cols[1], app);
  } else {
    draw_empty_detail(f, cols[1], app);
  }
}

fn draw_empty_detail(f: &mut Frame, area: Rect, app: &App) {
  let block = Block::default()
    .title(" Detail ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let message = if app.snapshot.fetched_at.is_none() {
    "Waiting for the first refresh…"
  } else {
    "No active Code Red."
  };
  f.render_widget(
    Paragraph::new(Line::from(vec![Span::styled(
      message,
      Style::default().fg(Color::DarkGray),
    )])),
    inner,
  );
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn hints(role: Role) -> &'static str {
  match role {
    Role::Lab => "↑↓/jk select  m mine  1-4 dispatch  b return  X resolve  q quit",
    Role::Runner => "↑↓/jk select  m mine  c claim  d delivered  b return  q quit",
    Role::Clinician => "↑↓/jk select  m mine  c claim  u consumed  X resolve  q quit",
  }
}

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
  let status = if !app.status_msg.is_empty() {
    app.status_msg.clone()
  } else if let Some(err) = &app.snapshot.last_error {
    err.to_string()
  } else {
    hints(app.role).to_string()
  };

  let mode_span = Span::styled(
    format!(" {} ", app.role.as_str().to_uppercase()),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(
    format!("  {status}"),
    Style::default().fg(Color::DarkGray),
  );

  let line = Line::from(vec![mode_span, hint_span]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::Black)),
    area,
  );
}
