use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

use crate::app::{App, CreateField, MessageLevel};
use crate::ui::styles;

/// Interior width of a form input field
const FIELD_WIDTH: usize = 32;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = vec![];

    lines.push(Line::from(Span::styled(
        "Créer un événement",
        styles::title_style(),
    )));
    lines.push(Line::from(Span::styled(
        "Titre et date obligatoires",
        styles::muted_style(),
    )));
    lines.push(Line::from(""));

    lines.push(field_line(
        "Titre * :       ",
        &app.create_form.title,
        app.create_field == CreateField::Title,
        "",
    ));
    lines.push(field_line(
        "Date * :        ",
        &app.create_form.date,
        app.create_field == CreateField::Date,
        " (AAAA-MM-JJ)",
    ));
    lines.push(field_line(
        "Heure :         ",
        &app.create_form.time,
        app.create_field == CreateField::Time,
        " (HH:MM)",
    ));
    lines.push(field_line(
        "Lieu :          ",
        &app.create_form.location,
        app.create_field == CreateField::Location,
        "",
    ));
    lines.push(field_line(
        "Description :   ",
        &app.create_form.description,
        app.create_field == CreateField::Description,
        "",
    ));

    lines.push(Line::from(""));
    let button_focused = app.create_field == CreateField::Submit;
    lines.push(Line::from(vec![
        Span::raw("  ["),
        Span::styled(
            if button_focused {
                " ▶ Créer l'événement ◀ "
            } else {
                "   Créer l'événement   "
            },
            styles::field_style(button_focused),
        ),
        Span::raw("]"),
    ]));

    if let Some(ref msg) = app.create_message {
        let style = match msg.level {
            MessageLevel::Success => styles::success_style(),
            MessageLevel::Error => styles::error_style(),
        };
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!("  {}", msg.text), style)));
    }

    let block = Block::default()
        .title(" Nouvel événement ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn field_line(label: &str, value: &str, focused: bool, note: &str) -> Line<'static> {
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
