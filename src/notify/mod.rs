//! Best-effort notification dispatch.
//!
//! This module provides the `Notifier` for calling the remote notify
//! function (mail/SMS fan-out happens on the other side) and the
//! fixed confirmation-message templates.

pub mod dispatcher;

pub use dispatcher::{
    confirmation_message, confirmation_subject, Notifier, NotifyConfig, NotifyRequest,
};
