//! Active event list, left panel.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState},
};

use crate::app::App;

/// Render every active event into `area`, most recent first.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let rows = app.rows();

  let block = Block::default()
    .title(format!(" Active ({}) ", rows.len()))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let items: Vec<ListItem> = rows
    .iter()
    .map(|view| {
      let event = &view.event;
      // Mark the event the server picked for this role.
      let marker = if app.is_mine(view) { "▶ " } else { "  " };
      let unassigned = event.assigned_runner_id.is_none()
        || event.assigned_clinician_id.is_none();

      ListItem::new(Line::from(vec![
        Span::styled(marker, Style::default().fg(Color::Red)),
        Span::styled(
          format!("{:<5}", event.id.to_string()),
          Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::raw(format!("{:<20} ", truncate(&event.location, 20))),
        Span::styled(
          format!("{:>7}", app.elapsed(view)),
          Style::default().fg(Color::Yellow),
        ),
        Span::styled(
          format!("  {} packs", view.pack_counts.total),
          Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
          if unassigned { "  !" } else { "" },
          Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
      ]))
    })
    .collect();

  let mut state = ListState::default();
  state.select(
    app
      .selected
      .and_then(|id| rows.iter().position(|v| v.event.id == id)),
  );

  f.render_stateful_widget(
    List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol(""),
    area,
    &mut state,
  );
}

fn truncate(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    return s.to_string();
  }
  let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
  out.push('…');
  out
}

#[cfg(test)]
mod tests {
  use super::truncate;

  #[test]
  fn long_locations_are_cut_with_ellipsis() {
    assert_eq!(truncate("ED", 5), "ED");
    assert_eq!(truncate("Emergency Resus Bay 4", 10), "Emergency…");
    assert_eq!(truncate("Emergency…", 10).chars().count(), 10);
  }
}
