use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A schedulable activity users can register for.
///
/// Rows are read-only from the list view's perspective: the list is always
/// re-fetched after a write, never patched in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub event_date: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub participant_count: i64,
}

/// Treat missing and empty-string fields the same way the original surface
/// does: both render as absent.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Event {
    pub fn date(&self) -> Option<&str> {
        non_empty(&self.event_date)
    }

    pub fn time(&self) -> Option<&str> {
        non_empty(&self.event_time)
    }

    pub fn place(&self) -> Option<&str> {
        non_empty(&self.location)
    }

    pub fn details(&self) -> Option<&str> {
        non_empty(&self.description)
    }

    /// Date joined to time with "à": `2024-06-01 à 12:00`.
    /// None when the event has no date; a time without a date is dropped.
    pub fn date_line(&self) -> Option<String> {
        let date = self.date()?;
        Some(match self.time() {
            Some(time) => format!("{} à {}", date, time),
            None => date.to_string(),
        })
    }

    /// Short date for the list view: `01/06/2024`, falling back to the raw
    /// stored string when it is not a plain calendar date.
    pub fn formatted_date(&self) -> String {
        match self.date() {
            Some(date) => match NaiveDate::parse_from_str(date, "%Y-%m-%d") {
                Ok(d) => d.format("%d/%m/%Y").to_string(),
                Err(_) => date.to_string(),
            },
            None => "-".to_string(),
        }
    }

    /// Participant count with the surface's pluralization: `1 inscrit`,
    /// `3 inscrits`.
    pub fn participants_label(&self) -> String {
        let plural = if self.participant_count > 1 { "s" } else { "" };
        format!("{} inscrit{}", self.participant_count, plural)
    }
}

/// Insert payload for the `events` collection.
/// Optional fields are serialized as explicit nulls, matching what the
/// store expects for cleared columns.
#[derive(Debug, Clone, Serialize)]
pub struct NewEvent {
    pub title: String,
    pub event_date: String,
    pub event_time: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

// Sorting options for the events table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSortColumn {
    Title,
    #[default]
    Date,
    Location,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(date: Option<&str>, time: Option<&str>, location: Option<&str>) -> Event {
        Event {
            id: "ev-1".to_string(),
            title: "Pique-nique".to_string(),
            event_date: date.map(String::from),
            event_time: time.map(String::from),
            location: location.map(String::from),
            description: None,
            participant_count: 0,
        }
    }

    #[test]
    fn test_date_line_with_time() {
        let ev = event(Some("2024-06-01"), Some("12:00"), Some("Parc"));
        assert_eq!(ev.date_line().unwrap(), "2024-06-01 à 12:00");
    }

    #[test]
    fn test_date_line_without_time() {
        let ev = event(Some("2024-06-01"), None, None);
        assert_eq!(ev.date_line().unwrap(), "2024-06-01");
    }

    #[test]
    fn test_date_line_empty_strings_count_as_absent() {
        let ev = event(Some(""), Some("12:00"), Some(""));
        assert!(ev.date_line().is_none());
        assert!(ev.place().is_none());
    }

    #[test]
    fn test_formatted_date() {
        assert_eq!(event(Some("2024-06-01"), None, None).formatted_date(), "01/06/2024");
        assert_eq!(event(Some("demain"), None, None).formatted_date(), "demain");
        assert_eq!(event(None, None, None).formatted_date(), "-");
    }

    #[test]
    fn test_participants_label_pluralization() {
        let mut ev = event(None, None, None);
        assert_eq!(ev.participants_label(), "0 inscrit");
        ev.participant_count = 1;
        assert_eq!(ev.participants_label(), "1 inscrit");
        ev.participant_count = 3;
        assert_eq!(ev.participants_label(), "3 inscrits");
    }

    #[test]
    fn test_participant_count_defaults_to_zero() {
        let ev: Event =
            serde_json::from_str(r#"{"id":"a","title":"Repas"}"#).expect("event should parse");
        assert_eq!(ev.participant_count, 0);
        assert!(ev.event_date.is_none());
    }
}
