use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::{
    App, EventsLoad, Focus, JoinField, JoinForm, MessageLevel, MSG_EMPTY, MSG_LOADING,
    MSG_LOAD_ERROR,
};
use crate::ui::styles;
use crate::utils::truncate_string;

/// Interior width of a form input field
const FIELD_WIDTH: usize = 24;

/// Widest title the list column renders before truncating
const MAX_TITLE_COLUMN: usize = 40;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    match app.events_load {
        EventsLoad::Loading => render_state_message(frame, MSG_LOADING, styles::muted_style(), area),
        EventsLoad::Failed => render_state_message(frame, MSG_LOAD_ERROR, styles::error_style(), area),
        EventsLoad::Empty => render_state_message(frame, MSG_EMPTY, styles::muted_style(), area),
        EventsLoad::Loaded => {
            let chunks = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
                .split(area);

            render_event_list(frame, app, chunks[0]);
            render_event_panel(frame, app, chunks[1]);
        }
    }
}

/// Full-area page state: loading, load error, or empty list
fn render_state_message(frame: &mut Frame, text: &str, style: ratatui::style::Style, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::muted_style());

    let lines = vec![Line::from(""), Line::from(Span::styled(format!("  {}", text), style))];
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_event_list(frame: &mut Frame, app: &App, area: Rect) {
    let focused = matches!(app.focus, Focus::List);

    let header = Row::new([
        Cell::from("Titre"),
        Cell::from("Date"),
        Cell::from("Lieu"),
        Cell::from("Inscrits"),
    ])
    .style(styles::title_style())
    .height(1);

    let sorted_events = app.get_sorted_events();

    let rows: Vec<Row> = sorted_events
        .iter()
        .map(|event| {
            let date = match event.time() {
                Some(time) => format!("{} {}", event.formatted_date(), time),
                None => event.formatted_date(),
            };
            Row::new(vec![
                Cell::from(truncate_string(&event.title, MAX_TITLE_COLUMN)),
                Cell::from(date),
                Cell::from(event.place().unwrap_or("-")),
                Cell::from(format!("{}", event.participant_count)),
            ])
            .style(styles::list_item_style())
        })
        .collect();

    let widths = [
        Constraint::Fill(1),
        Constraint::Length(17),
        Constraint::Length(16),
        Constraint::Length(8),
    ];

    let title = format!(
        " Événements ({}) - [t]itre [d]ate [l]ieu ",
        app.events.len()
    );

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(focused)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.event_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

/// Selected event details plus its inline registration form
fn render_event_panel(frame: &mut Frame, app: &App, area: Rect) {
    let focused = matches!(app.focus, Focus::Form);
    let selected = app.selected_event();

    let content = match selected {
        Some(event) => {
            let mut lines = vec![];

            lines.push(Line::from(Span::styled(&event.title, styles::title_style())));
            lines.push(Line::from(""));

            if let Some(date_line) = event.date_line() {
                lines.push(Line::from(vec![
                    Span::styled("Date :     ", styles::muted_style()),
                    Span::raw(date_line),
                ]));
            }
            if let Some(place) = event.place() {
                lines.push(Line::from(vec![
                    Span::styled("Lieu :     ", styles::muted_style()),
                    Span::raw(place.to_string()),
                ]));
            }
            lines.push(Line::from(vec![
                Span::styled("Inscrits : ", styles::muted_style()),
                Span::raw(event.participants_label()),
            ]));

            if let Some(details) = event.details() {
                lines.push(Line::from(""));
                for line in wrap_text(details, (area.width as usize).saturating_sub(4)) {
                    lines.push(Line::from(line));
                }
            }

            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(
                "Je participe",
                styles::highlight_style(),
            )));

            let empty = JoinForm::default();
            let form = app.join_form(&event.id).unwrap_or(&empty);

            lines.push(input_line(
                "Nom :       ",
                &form.name,
                focused && app.join_field == JoinField::Name,
                "",
            ));
            lines.push(input_line(
                "Email :     ",
                &form.email,
                focused && app.join_field == JoinField::Email,
                " (optionnel)",
            ));
            lines.push(input_line(
                "Téléphone : ",
                &form.phone,
                focused && app.join_field == JoinField::Phone,
                " (optionnel)",
            ));

            lines.push(Line::from(""));
            let button_focused = focused && app.join_field == JoinField::Submit;
            lines.push(Line::from(vec![
                Span::raw("  ["),
                Span::styled(
                    if button_focused {
                        " ▶ Je participe ◀ "
                    } else {
                        "   Je participe   "
                    },
                    styles::field_style(button_focused),
                ),
                Span::raw("]"),
            ]));

            if let Some(msg) = app.join_message(&event.id) {
                let style = match msg.level {
                    MessageLevel::Success => styles::success_style(),
                    MessageLevel::Error => styles::error_style(),
                };
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled(format!("  {}", msg.text), style)));
            }

            lines
        }
        None => vec![Line::from(Span::styled(
            "Sélectionnez un événement dans la liste",
            styles::muted_style(),
        ))],
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(focused));

    frame.render_widget(Paragraph::new(content).block(block), area);
}

fn input_line(label: &str, value: &str, focused: bool, note: &str) -> Line<'static> {
    let cursor = if focused { "▌" } else { "" };
    let display = format!("{:<width$}", format!("{}{}", value, cursor), width = FIELD_WIDTH);

    Line::from(vec![
        Span::styled(label.to_string(), styles::muted_style()),
        Span::styled("[", styles::muted_style()),
        Span::styled(display, styles::field_style(focused)),
        Span::styled("]", styles::muted_style()),
        Span::styled(note.to_string(), styles::muted_style()),
    ])
}

fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.chars().count() + 1 + word.chars().count() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_text_respects_width() {
        let wrapped = wrap_text("tournoi de pétanque au parc", 12);
        assert!(wrapped.iter().all(|l| l.chars().count() <= 12));
        assert_eq!(wrapped.join(" "), "tournoi de pétanque au parc");
    }

    #[test]
    fn test_wrap_text_empty() {
        assert!(wrap_text("", 10).is_empty());
    }
}
