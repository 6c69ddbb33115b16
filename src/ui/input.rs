//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes. Printable keys are consumed by the focused
//! form field when one is active, so global shortcuts only apply from the
//! list.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent};

use crate::app::{
    can_add_field_char, App, AppState, CreateField, Focus, JoinField, Tab, MAX_DATE_LENGTH,
    MAX_DESCRIPTION_LENGTH, MAX_EMAIL_LENGTH, MAX_LOCATION_LENGTH, MAX_NAME_LENGTH,
    MAX_PHONE_LENGTH, MAX_TIME_LENGTH, MAX_TITLE_LENGTH,
};
use crate::models::EventSortColumn;

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    // Handle help overlay
    if matches!(app.state, AppState::ShowingHelp) {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
            app.state = AppState::Normal;
        }
        return Ok(false);
    }

    // Handle quit confirmation
    if matches!(app.state, AppState::ConfirmingQuit) {
        match key.code {
            KeyCode::Char('o') | KeyCode::Char('O') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                return Ok(true);
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
            }
            _ => {}
        }
        return Ok(false);
    }

    // Text-entry contexts consume printable keys
    if app.current_tab == Tab::Create {
        return handle_create_input(app, key);
    }
    if app.focus == Focus::Form {
        return handle_join_form_input(app, key);
    }

    // Global keys (events list)
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
        }
        KeyCode::Char('1') => {
            app.current_tab = Tab::Events;
        }
        KeyCode::Char('2') => {
            app.current_tab = Tab::Create;
        }
        KeyCode::Left => {
            app.current_tab = app.current_tab.prev();
        }
        KeyCode::Right => {
            app.current_tab = app.current_tab.next();
        }
        KeyCode::Char('u') => {
            app.reload_events();
        }
        KeyCode::Char('j') | KeyCode::Down => {
            app.select_next_event();
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.select_prev_event();
        }
        KeyCode::Home => {
            app.event_selection = 0;
        }
        KeyCode::End => {
            app.event_selection = app.events.len().saturating_sub(1);
        }
        KeyCode::Char('t') => {
            app.toggle_event_sort(EventSortColumn::Title);
        }
        KeyCode::Char('d') => {
            app.toggle_event_sort(EventSortColumn::Date);
        }
        KeyCode::Char('l') => {
            app.toggle_event_sort(EventSortColumn::Location);
        }
        KeyCode::Tab | KeyCode::Enter => {
            if app.selected_event().is_some() {
                app.focus = Focus::Form;
                app.join_field = JoinField::Name;
            }
        }
        _ => {}
    }

    Ok(false)
}

/// Keys while the registration form has focus
fn handle_join_form_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    let Some(event_id) = app.selected_event().map(|e| e.id.clone()) else {
        app.focus = Focus::List;
        return Ok(false);
    };

    match key.code {
        KeyCode::Esc => {
            app.focus = Focus::List;
        }
        KeyCode::Tab | KeyCode::Down => {
            app.join_field = app.join_field.next();
        }
        KeyCode::BackTab | KeyCode::Up => {
            app.join_field = app.join_field.prev();
        }
        KeyCode::Enter => {
            if app.join_field == JoinField::Submit {
                app.submit_registration();
            } else {
                app.join_field = app.join_field.next();
            }
        }
        KeyCode::Backspace => {
            let field = app.join_field;
            let form = app.join_form_mut(&event_id);
            match field {
                JoinField::Name => {
                    form.name.pop();
                }
                JoinField::Email => {
                    form.email.pop();
                }
                JoinField::Phone => {
                    form.phone.pop();
                }
                JoinField::Submit => {}
            }
        }
        KeyCode::Char(c) => {
            let field = app.join_field;
            let form = app.join_form_mut(&event_id);
            match field {
                JoinField::Name => {
                    if can_add_field_char(form.name.chars().count(), MAX_NAME_LENGTH, c) {
                        form.name.push(c);
                    }
                }
                JoinField::Email => {
                    if can_add_field_char(form.email.chars().count(), MAX_EMAIL_LENGTH, c) {
                        form.email.push(c);
                    }
                }
                JoinField::Phone => {
                    if can_add_field_char(form.phone.chars().count(), MAX_PHONE_LENGTH, c) {
                        form.phone.push(c);
                    }
                }
                JoinField::Submit => {}
            }
        }
        _ => {}
    }

    Ok(false)
}

/// Keys while the create-event tab is active
fn handle_create_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            app.current_tab = Tab::Events;
        }
        KeyCode::Tab | KeyCode::Down => {
            app.create_field = app.create_field.next();
        }
        KeyCode::BackTab | KeyCode::Up => {
            app.create_field = app.create_field.prev();
        }
        KeyCode::Enter => {
            if app.create_field == CreateField::Submit {
                app.submit_create();
            } else {
                app.create_field = app.create_field.next();
            }
        }
        KeyCode::Backspace => {
            match app.create_field {
                CreateField::Title => {
                    app.create_form.title.pop();
                }
                CreateField::Date => {
                    app.create_form.date.pop();
                }
                CreateField::Time => {
                    app.create_form.time.pop();
                }
                CreateField::Location => {
                    app.create_form.location.pop();
                }
                CreateField::Description => {
                    app.create_form.description.pop();
                }
                CreateField::Submit => {}
            }
        }
        KeyCode::Char(c) => {
            let form = &mut app.create_form;
            match app.create_field {
                CreateField::Title => {
                    if can_add_field_char(form.title.chars().count(), MAX_TITLE_LENGTH, c) {
                        form.title.push(c);
                    }
                }
                CreateField::Date => {
                    if can_add_field_char(form.date.chars().count(), MAX_DATE_LENGTH, c) {
                        form.date.push(c);
                    }
                }
                CreateField::Time => {
                    if can_add_field_char(form.time.chars().count(), MAX_TIME_LENGTH, c) {
                        form.time.push(c);
                    }
                }
                CreateField::Location => {
                    if can_add_field_char(form.location.chars().count(), MAX_LOCATION_LENGTH, c) {
                        form.location.push(c);
                    }
                }
                CreateField::Description => {
                    if can_add_field_char(
                        form.description.chars().count(),
                        MAX_DESCRIPTION_LENGTH,
                        c,
                    ) {
                        form.description.push(c);
                    }
                }
                CreateField::Submit => {}
            }
        }
        _ => {}
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Event;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn app_with_one_event() -> App {
        let mut app = App::new(Config::default()).expect("app should build");
        app.events = vec![Event {
            id: "ev-1".to_string(),
            title: "Repas".to_string(),
            event_date: Some("2024-06-01".to_string()),
            event_time: None,
            location: None,
            description: None,
            participant_count: 0,
        }];
        app.events_load = crate::app::EventsLoad::Loaded;
        app
    }

    #[test]
    fn test_enter_moves_focus_into_form_and_types() {
        let mut app = app_with_one_event();

        handle_input(&mut app, key(KeyCode::Enter)).unwrap();
        assert_eq!(app.focus, Focus::Form);
        assert_eq!(app.join_field, JoinField::Name);

        for c in "Alice".chars() {
            handle_input(&mut app, key(KeyCode::Char(c))).unwrap();
        }
        assert_eq!(app.join_form("ev-1").unwrap().name, "Alice");

        handle_input(&mut app, key(KeyCode::Backspace)).unwrap();
        assert_eq!(app.join_form("ev-1").unwrap().name, "Alic");
    }

    #[test]
    fn test_escape_returns_to_list() {
        let mut app = app_with_one_event();
        app.focus = Focus::Form;

        handle_input(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.focus, Focus::List);
    }

    #[test]
    fn test_global_q_asks_for_confirmation_but_form_q_types() {
        let mut app = app_with_one_event();

        handle_input(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert_eq!(app.state, AppState::ConfirmingQuit);

        handle_input(&mut app, key(KeyCode::Char('n'))).unwrap();
        assert_eq!(app.state, AppState::Normal);

        app.focus = Focus::Form;
        handle_input(&mut app, key(KeyCode::Char('q'))).unwrap();
        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.join_form("ev-1").unwrap().name, "q");
    }

    #[test]
    fn test_create_tab_field_cycle() {
        let mut app = app_with_one_event();
        app.current_tab = Tab::Create;

        handle_input(&mut app, key(KeyCode::Tab)).unwrap();
        assert_eq!(app.create_field, CreateField::Date);

        handle_input(&mut app, key(KeyCode::BackTab)).unwrap();
        assert_eq!(app.create_field, CreateField::Title);

        handle_input(&mut app, key(KeyCode::Esc)).unwrap();
        assert_eq!(app.current_tab, Tab::Events);
    }

    #[test]
    fn test_date_field_respects_cap() {
        let mut app = app_with_one_event();
        app.current_tab = Tab::Create;
        app.create_field = CreateField::Date;

        for c in "2024-06-0199".chars() {
            handle_input(&mut app, key(KeyCode::Char(c))).unwrap();
        }
        assert_eq!(app.create_form.date, "2024-06-01");
    }
}
