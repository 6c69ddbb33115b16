use serde::{Deserialize, Serialize};

/// Wire tag describing which contact channels a registration carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContactType {
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "sms")]
    Sms,
    #[serde(rename = "email+sms")]
    EmailSms,
}

impl ContactType {
    /// Derive the tag from the supplied channels.
    /// Both present yields the combined tag; neither yields no tag at all.
    pub fn derive(email: Option<&str>, phone: Option<&str>) -> Option<Self> {
        match (email.is_some(), phone.is_some()) {
            (true, true) => Some(ContactType::EmailSms),
            (true, false) => Some(ContactType::Email),
            (false, true) => Some(ContactType::Sms),
            (false, false) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContactType::Email => "email",
            ContactType::Sms => "sms",
            ContactType::EmailSms => "email+sms",
        }
    }
}

/// Insert payload for the `event_participants` collection.
///
/// Built only through [`NewParticipant::build`], which keeps the contact
/// string and the contact-type tag consistent with each other.
#[derive(Debug, Clone, Serialize)]
pub struct NewParticipant {
    pub event_id: String,
    pub name: String,
    pub contact: Option<String>,
    pub contact_type: Option<ContactType>,
}

/// Normalize a form value: trimmed, with blank collapsing to absent.
fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl NewParticipant {
    /// Build a registration row from raw form values.
    /// Blank email/phone are treated as not supplied.
    pub fn build(
        event_id: String,
        name: String,
        email: Option<String>,
        phone: Option<String>,
    ) -> Self {
        let email = clean(email);
        let phone = clean(phone);

        let contact_type = ContactType::derive(email.as_deref(), phone.as_deref());

        let mut contact = String::new();
        if let Some(ref email) = email {
            contact.push_str("email:");
            contact.push_str(email);
        }
        if let Some(ref phone) = phone {
            if !contact.is_empty() {
                contact.push_str(" | ");
            }
            contact.push_str("tel:");
            contact.push_str(phone);
        }

        Self {
            event_id,
            name,
            contact: if contact.is_empty() { None } else { Some(contact) },
            contact_type,
        }
    }

    /// Whether any contact channel was supplied
    pub fn has_contact(&self) -> bool {
        self.contact_type.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(email: Option<&str>, phone: Option<&str>) -> NewParticipant {
        NewParticipant::build(
            "ev-1".to_string(),
            "Alice".to_string(),
            email.map(String::from),
            phone.map(String::from),
        )
    }

    #[test]
    fn test_both_channels_yield_combined_tag() {
        let p = build(Some("alice@example.com"), Some("0612345678"));
        assert_eq!(p.contact_type, Some(ContactType::EmailSms));
        assert_eq!(
            p.contact.as_deref(),
            Some("email:alice@example.com | tel:0612345678")
        );
    }

    #[test]
    fn test_single_channel_yields_that_tag() {
        let p = build(Some("alice@example.com"), None);
        assert_eq!(p.contact_type, Some(ContactType::Email));
        assert_eq!(p.contact.as_deref(), Some("email:alice@example.com"));

        let p = build(None, Some("0612345678"));
        assert_eq!(p.contact_type, Some(ContactType::Sms));
        assert_eq!(p.contact.as_deref(), Some("tel:0612345678"));
    }

    #[test]
    fn test_no_channel_yields_null_contact_and_tag() {
        let p = build(None, None);
        assert_eq!(p.contact_type, None);
        assert_eq!(p.contact, None);
        assert!(!p.has_contact());
    }

    #[test]
    fn test_blank_channels_count_as_absent() {
        let p = build(Some("   "), Some(""));
        assert_eq!(p.contact_type, None);
        assert_eq!(p.contact, None);
    }

    #[test]
    fn test_wire_tags() {
        assert_eq!(
            serde_json::to_string(&ContactType::EmailSms).unwrap(),
            r#""email+sms""#
        );
        assert_eq!(serde_json::to_string(&ContactType::Sms).unwrap(), r#""sms""#);

        let p = build(Some("a@b.fr"), None);
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains(r#""contact_type":"email""#));
    }
}
