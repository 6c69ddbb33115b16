//! Application state management for fetecache.
//!
//! This module contains the core `App` struct that manages all application
//! state: the event list and its load states, the per-event registration
//! forms, the create-event form, and background task coordination.

use std::collections::HashMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::api::StoreClient;
use crate::cache::manager::age_display;
use crate::config::Config;
use crate::models::{Event, EventSortColumn, NewEvent, NewParticipant};
use crate::notify::{confirmation_message, confirmation_subject, Notifier, NotifyRequest};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
/// Registration and reload tasks produce one message each; 32 is headroom.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Per-field input caps. Generous for free text, tight for structured
/// fields (date is `YYYY-MM-DD`, time is `HH:MM`).
pub const MAX_NAME_LENGTH: usize = 60;
pub const MAX_EMAIL_LENGTH: usize = 60;
pub const MAX_PHONE_LENGTH: usize = 20;
pub const MAX_TITLE_LENGTH: usize = 80;
pub const MAX_DATE_LENGTH: usize = 10;
pub const MAX_TIME_LENGTH: usize = 5;
pub const MAX_LOCATION_LENGTH: usize = 60;
pub const MAX_DESCRIPTION_LENGTH: usize = 200;

// User-facing strings, verbatim from the registration surface.
pub const MSG_LOADING: &str = "Chargement...";
pub const MSG_LOAD_ERROR: &str = "Erreur chargement des événements.";
pub const MSG_EMPTY: &str = "Aucun événement pour le moment.";
pub const MSG_NAME_REQUIRED: &str = "Merci de renseigner au moins le nom.";
pub const MSG_REGISTERED: &str = "Inscription enregistrée.";
pub const MSG_REGISTERED_NO_CONTACT: &str = "Inscription enregistrée (sans moyen de contact).";
pub const MSG_REGISTER_ERROR: &str = "Erreur lors de l'enregistrement.";
pub const MSG_CREATE_REQUIRED: &str = "Titre + date obligatoires.";
pub const MSG_CREATED: &str = "Événement créé.";
pub const MSG_CREATE_ERROR: &str = "Erreur lors de la création.";

/// Reject control characters and enforce a per-field cap
pub fn can_add_field_char(current_len: usize, max_len: usize, c: char) -> bool {
    current_len < max_len && !c.is_control()
}

// ============================================================================
// UI State Types
// ============================================================================

/// Main navigation tabs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Events,
    Create,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Events => "Événements",
            Tab::Create => "Nouvel événement",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Tab::Events => Tab::Create,
            Tab::Create => Tab::Events,
        }
    }

    pub fn prev(&self) -> Self {
        // Two tabs: previous and next coincide
        self.next()
    }
}

/// Current UI focus area on the events tab
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    List,
    Form,
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

/// Field focus within the registration form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinField {
    Name,
    Email,
    Phone,
    Submit,
}

impl JoinField {
    pub fn next(&self) -> Self {
        match self {
            JoinField::Name => JoinField::Email,
            JoinField::Email => JoinField::Phone,
            JoinField::Phone => JoinField::Submit,
            JoinField::Submit => JoinField::Name,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            JoinField::Name => JoinField::Submit,
            JoinField::Email => JoinField::Name,
            JoinField::Phone => JoinField::Email,
            JoinField::Submit => JoinField::Phone,
        }
    }
}

/// Field focus within the create-event form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateField {
    Title,
    Date,
    Time,
    Location,
    Description,
    Submit,
}

impl CreateField {
    pub fn next(&self) -> Self {
        match self {
            CreateField::Title => CreateField::Date,
            CreateField::Date => CreateField::Time,
            CreateField::Time => CreateField::Location,
            CreateField::Location => CreateField::Description,
            CreateField::Description => CreateField::Submit,
            CreateField::Submit => CreateField::Title,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            CreateField::Title => CreateField::Submit,
            CreateField::Date => CreateField::Title,
            CreateField::Time => CreateField::Date,
            CreateField::Location => CreateField::Time,
            CreateField::Description => CreateField::Location,
            CreateField::Submit => CreateField::Description,
        }
    }
}

/// Terminal states of the event-list load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventsLoad {
    Loading,
    Loaded,
    Empty,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Success,
    Error,
}

/// An inline status line next to a form
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub text: String,
    pub level: MessageLevel,
}

impl StatusLine {
    fn success(text: &str) -> Self {
        Self {
            text: text.to_string(),
            level: MessageLevel::Success,
        }
    }

    fn error(text: &str) -> Self {
        Self {
            text: text.to_string(),
            level: MessageLevel::Error,
        }
    }
}

/// Registration inputs for one event card
#[derive(Debug, Clone, Default)]
pub struct JoinForm {
    pub name: String,
    pub email: String,
    pub phone: String,
}

/// Create-event form inputs
#[derive(Debug, Clone, Default)]
pub struct CreateForm {
    pub title: String,
    pub date: String,
    pub time: String,
    pub location: String,
    pub description: String,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Results sent from spawned tasks back to the main loop.
enum TaskResult {
    /// Event list fetched (possibly empty)
    EventsLoaded(Vec<Event>),
    /// Event list fetch failed
    EventsFailed,
    /// Registration inserted; `had_contact` picks the confirmation wording
    Registered { event_id: String, had_contact: bool },
    /// Registration insert rejected by the store
    RegisterFailed { event_id: String },
    /// Event insert succeeded
    EventCreated,
    /// Event insert rejected by the store
    CreateFailed,
}

/// Turn a raw form value into an optional field: trimmed, blank = absent
fn opt_field(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub store: StoreClient,
    pub notifier: Notifier,

    // UI state
    pub state: AppState,
    pub current_tab: Tab,
    pub focus: Focus,

    // Event list
    pub events: Vec<Event>,
    pub events_load: EventsLoad,
    pub event_selection: usize,
    pub event_sort_column: EventSortColumn,
    pub event_sort_ascending: bool,
    /// Last-fetched snapshot by id, rebuilt wholesale on every reload.
    /// Passed into the registration flow so composing a confirmation does
    /// not need a second fetch.
    event_index: HashMap<String, Event>,

    // Registration forms, one per event card
    pub join_forms: HashMap<String, JoinForm>,
    pub join_field: JoinField,
    pub join_messages: HashMap<String, StatusLine>,

    // Create form
    pub create_form: CreateForm,
    pub create_field: CreateField,
    pub create_message: Option<StatusLine>,

    // Background task channel
    task_rx: mpsc::Receiver<TaskResult>,
    task_tx: mpsc::Sender<TaskResult>,

    // Status bar
    pub last_loaded: Option<DateTime<Utc>>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Result<Self> {
        let store = StoreClient::new(config.store_config())?;
        let notifier = Notifier::new(config.notify_config())?;
        let (task_tx, task_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        Ok(Self {
            store,
            notifier,

            state: AppState::Normal,
            current_tab: Tab::Events,
            focus: Focus::List,

            events: Vec::new(),
            events_load: EventsLoad::Loading,
            event_selection: 0,
            event_sort_column: EventSortColumn::default(),
            event_sort_ascending: true,
            event_index: HashMap::new(),

            join_forms: HashMap::new(),
            join_field: JoinField::Name,
            join_messages: HashMap::new(),

            create_form: CreateForm::default(),
            create_field: CreateField::Title,
            create_message: None,

            task_rx,
            task_tx,

            last_loaded: None,
        })
    }

    // =========================================================================
    // Event list
    // =========================================================================

    /// Events in the current table order.
    /// The store's date-then-time ascending order is the default.
    pub fn get_sorted_events(&self) -> Vec<&Event> {
        let mut events: Vec<&Event> = self.events.iter().collect();

        events.sort_by(|a, b| {
            let ordering = match self.event_sort_column {
                EventSortColumn::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
                EventSortColumn::Date => {
                    // Missing dates sort last, matching the store's order
                    match (a.date(), b.date()) {
                        (Some(da), Some(db)) => da.cmp(db).then(a.time().cmp(&b.time())),
                        (Some(_), None) => std::cmp::Ordering::Less,
                        (None, Some(_)) => std::cmp::Ordering::Greater,
                        (None, None) => std::cmp::Ordering::Equal,
                    }
                }
                EventSortColumn::Location => a.place().cmp(&b.place()),
            };
            if self.event_sort_ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });

        events
    }

    pub fn toggle_event_sort(&mut self, column: EventSortColumn) {
        if self.event_sort_column == column {
            self.event_sort_ascending = !self.event_sort_ascending;
        } else {
            self.event_sort_column = column;
            self.event_sort_ascending = true;
        }
    }

    pub fn selected_event(&self) -> Option<&Event> {
        self.get_sorted_events()
            .get(self.event_selection)
            .copied()
    }

    pub fn select_next_event(&mut self) {
        let max = self.events.len().saturating_sub(1);
        self.event_selection = (self.event_selection + 1).min(max);
    }

    pub fn select_prev_event(&mut self) {
        self.event_selection = self.event_selection.saturating_sub(1);
    }

    /// Spawn a background reload of the event list
    pub fn reload_events(&mut self) {
        self.events_load = EventsLoad::Loading;

        let store = self.store.clone();
        let tx = self.task_tx.clone();

        tokio::spawn(async move {
            let result = match store.fetch_events().await {
                Ok(events) => TaskResult::EventsLoaded(events),
                Err(e) => {
                    error!(error = %e, "Events fetch failed");
                    TaskResult::EventsFailed
                }
            };
            Self::send_result(&tx, result).await;
        });
    }

    /// Age of the last successful load, for the status bar
    pub fn events_age(&self) -> String {
        match self.last_loaded {
            Some(at) => age_display(at),
            None => "never".to_string(),
        }
    }

    // =========================================================================
    // Registration flow
    // =========================================================================

    /// Form for an event card, created empty on first access
    pub fn join_form_mut(&mut self, event_id: &str) -> &mut JoinForm {
        self.join_forms.entry(event_id.to_string()).or_default()
    }

    pub fn join_form(&self, event_id: &str) -> Option<&JoinForm> {
        self.join_forms.get(event_id)
    }

    pub fn join_message(&self, event_id: &str) -> Option<&StatusLine> {
        self.join_messages.get(event_id)
    }

    /// Submit the registration form for the selected event.
    ///
    /// A blank name fails validation inline and issues no write. Otherwise
    /// the insert runs in the background; the confirmation notification is
    /// dispatched detached from inside that task and never affects the
    /// reported outcome.
    pub fn submit_registration(&mut self) {
        let Some(event) = self.selected_event() else {
            return;
        };
        let event_id = event.id.clone();
        // Snapshot passed explicitly into the flow; the task falls back to
        // a best-effort point lookup when the index somehow misses.
        let snapshot = self.event_index.get(&event_id).cloned();

        let form = self.join_forms.get(&event_id).cloned().unwrap_or_default();
        let name = form.name.trim().to_string();

        if name.is_empty() {
            self.join_messages
                .insert(event_id, StatusLine::error(MSG_NAME_REQUIRED));
            return;
        }

        let email = opt_field(&form.email);
        let phone = opt_field(&form.phone);
        let participant =
            NewParticipant::build(event_id.clone(), name.clone(), email.clone(), phone.clone());

        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let tx = self.task_tx.clone();

        tokio::spawn(async move {
            let result = Self::register_task(
                store, notifier, participant, snapshot, name, email, phone,
            )
            .await;
            Self::send_result(&tx, result).await;
        });
    }

    async fn register_task(
        store: StoreClient,
        notifier: Notifier,
        participant: NewParticipant,
        snapshot: Option<Event>,
        name: String,
        email: Option<String>,
        phone: Option<String>,
    ) -> TaskResult {
        let event_id = participant.event_id.clone();
        let had_contact = participant.has_contact();

        if let Err(e) = store.insert_participant(&participant).await {
            error!(error = %e, event_id = %event_id, "Registration insert failed");
            return TaskResult::RegisterFailed { event_id };
        }

        let contact_tag = participant
            .contact_type
            .map(|t| t.as_str())
            .unwrap_or("none");
        info!(event_id = %event_id, contact_type = contact_tag, "Registration recorded");

        if had_contact {
            // Resolve the event for the confirmation text: snapshot first,
            // then a point lookup whose failure is silently skipped.
            let event = match snapshot {
                Some(event) => Some(event),
                None => match store.fetch_event(&event_id).await {
                    Ok(event) => event,
                    Err(e) => {
                        debug!(error = %e, event_id = %event_id, "Event lookup for confirmation failed");
                        None
                    }
                },
            };

            if let Some(event) = event {
                notifier.dispatch_detached(NotifyRequest {
                    email,
                    phone,
                    subject: confirmation_subject(&event),
                    message: confirmation_message(&name, &event),
                });
            }
        }

        TaskResult::Registered {
            event_id,
            had_contact,
        }
    }

    // =========================================================================
    // Create flow
    // =========================================================================

    /// Submit the create-event form.
    /// Blank title or date fails validation inline and issues no write.
    pub fn submit_create(&mut self) {
        let title = self.create_form.title.trim().to_string();
        let date = self.create_form.date.trim().to_string();

        if title.is_empty() || date.is_empty() {
            self.create_message = Some(StatusLine::error(MSG_CREATE_REQUIRED));
            return;
        }

        let event = NewEvent {
            title,
            event_date: date,
            event_time: opt_field(&self.create_form.time),
            location: opt_field(&self.create_form.location),
            description: opt_field(&self.create_form.description),
        };

        let store = self.store.clone();
        let tx = self.task_tx.clone();

        tokio::spawn(async move {
            let result = match store.insert_event(&event).await {
                Ok(()) => {
                    info!(title = %event.title, "Event created");
                    TaskResult::EventCreated
                }
                Err(e) => {
                    error!(error = %e, "Event insert failed");
                    TaskResult::CreateFailed
                }
            };
            Self::send_result(&tx, result).await;
        });
    }

    // =========================================================================
    // Background task plumbing
    // =========================================================================

    /// Helper to send task results, logging any channel errors
    async fn send_result(tx: &mpsc::Sender<TaskResult>, result: TaskResult) {
        if tx.send(result).await.is_err() {
            error!("Failed to send task result - channel closed");
        }
    }

    /// Check for completed background tasks and process results
    pub fn check_background_tasks(&mut self) {
        while let Ok(result) = self.task_rx.try_recv() {
            self.process_task_result(result);
        }
    }

    fn process_task_result(&mut self, result: TaskResult) {
        match result {
            TaskResult::EventsLoaded(events) => {
                debug!(count = events.len(), "Events loaded");

                // Rebuild the snapshot index wholesale
                self.event_index = events
                    .iter()
                    .map(|e| (e.id.clone(), e.clone()))
                    .collect();

                self.events_load = if events.is_empty() {
                    EventsLoad::Empty
                } else {
                    EventsLoad::Loaded
                };
                self.event_selection = self
                    .event_selection
                    .min(events.len().saturating_sub(1));
                self.events = events;
                self.last_loaded = Some(Utc::now());
            }
            TaskResult::EventsFailed => {
                self.events_load = EventsLoad::Failed;
            }
            TaskResult::Registered {
                event_id,
                had_contact,
            } => {
                let text = if had_contact {
                    MSG_REGISTERED
                } else {
                    MSG_REGISTERED_NO_CONTACT
                };
                self.join_messages
                    .insert(event_id.clone(), StatusLine::success(text));
                self.join_forms.remove(&event_id);
                self.join_field = JoinField::Name;
                // Refresh the displayed participant count
                self.reload_events();
            }
            TaskResult::RegisterFailed { event_id } => {
                self.join_messages
                    .insert(event_id, StatusLine::error(MSG_REGISTER_ERROR));
            }
            TaskResult::EventCreated => {
                self.create_message = Some(StatusLine::success(MSG_CREATED));
                self.create_form = CreateForm::default();
                self.create_field = CreateField::Title;
                self.reload_events();
            }
            TaskResult::CreateFailed => {
                self.create_message = Some(StatusLine::error(MSG_CREATE_ERROR));
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
