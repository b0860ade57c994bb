//! Event detail pane, right panel.

use codered_core::pack::{Pack, PackState};
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::App;

// ─── Public entry ─────────────────────────────────────────────────────────────

/// Render the selected event into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let Some(view) = app.selected_view() else { return };
  let event = &view.event;

  let block = Block::default()
    .title(format!(" Code Red {} · {} ", event.id, event.lab_type))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Red));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let mut lines = vec![
    field("Location", event.location.clone()),
    field("MRN", event.patient_mrn.clone()),
    field(
      "Activated",
      event.activation_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    ),
    Line::from(vec![
      label("Elapsed"),
      Span::styled(
        app.elapsed(view),
        Style::default()
          .fg(Color::Yellow)
          .add_modifier(Modifier::BOLD),
      ),
    ]),
    slot_line("Runner", event.assigned_runner_id.as_deref()),
    slot_line("Clinician", event.assigned_clinician_id.as_deref()),
    Line::from(""),
  ];

  let counts = view.pack_counts;
  lines.push(Line::from(vec![Span::styled(
    format!(
      "Packs  {} total · {} dispatched · {} delivered · {} consumed · {} returned",
      counts.total, counts.dispatched, counts.delivered, counts.consumed, counts.returned
    ),
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
  )]));

  if event.packs.is_empty() {
    lines.push(Line::from(Span::styled(
      "  none dispatched yet",
      Style::default().fg(Color::DarkGray),
    )));
  }
  lines.extend(event.packs.iter().map(pack_line));

  f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
}

// ─── Line builders ────────────────────────────────────────────────────────────

fn label(name: &str) -> Span<'static> {
  Span::styled(
    format!("{name:<11}"),
    Style::default()
      .fg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  )
}

fn field(name: &str, value: String) -> Line<'static> {
  Line::from(vec![label(name), Span::raw(value)])
}

fn slot_line(name: &str, holder: Option<&str>) -> Line<'static> {
  match holder {
    Some(id) => field(name, id.to_string()),
    None => Line::from(vec![
      label(name),
      Span::styled(
        "unassigned",
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
      ),
    ]),
  }
}

fn pack_line(pack: &Pack) -> Line<'static> {
  let state_color = match pack.state {
    PackState::Dispatched => Color::Yellow,
    PackState::Delivered => Color::Green,
    PackState::Consumed => Color::DarkGray,
    PackState::Returned => Color::Magenta,
  };
  let mut spans = vec![
    Span::raw(format!("  {:>2}. ", pack.sequence)),
    Span::raw(format!("{:<16}", pack.product.label())),
    Span::styled(
      format!("{:<11}", pack.state.as_str()),
      Style::default().fg(state_color),
    ),
  ];
  if let Some(unit) = &pack.unit_number {
    spans.push(Span::styled(
      unit.clone(),
      Style::default().fg(Color::DarkGray),
    ));
  }
  Line::from(spans)
}
