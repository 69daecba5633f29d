//! Contact entity structures

use crate::{ContactId, LinkPrecedence, Timestamp};
use serde::{Deserialize, Serialize};

/// A persisted contact record.
///
/// Every record carries at least one of `email` / `phone_number`. A primary
/// record has no `linked_id`; a secondary record points at the primary of
/// its cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub id: ContactId,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub linked_id: Option<ContactId>,
    pub link_precedence: LinkPrecedence,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub deleted_at: Option<Timestamp>,
}

impl ContactRecord {
    pub fn is_primary(&self) -> bool {
        self.link_precedence == LinkPrecedence::Primary
    }

    pub fn is_secondary(&self) -> bool {
        self.link_precedence == LinkPrecedence::Secondary
    }

    /// Whether this record is already a secondary pointing at `primary`.
    pub fn is_linked_to(&self, primary: ContactId) -> bool {
        self.is_secondary() && self.linked_id == Some(primary)
    }

    /// Copy of this record demoted under `primary`.
    ///
    /// Only precedence, link and `updated_at` change; `created_at` is kept.
    pub fn demoted_under(&self, primary: ContactId, now: Timestamp) -> ContactRecord {
        ContactRecord {
            linked_id: Some(primary),
            link_precedence: LinkPrecedence::Secondary,
            updated_at: now,
            ..self.clone()
        }
    }
}

/// Insert payload for a contact record; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub linked_id: Option<ContactId>,
    pub link_precedence: LinkPrecedence,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl NewContact {
    /// A fresh primary carrying both identifying values.
    pub fn primary(email: &str, phone_number: &str, now: Timestamp) -> Self {
        Self {
            phone_number: Some(phone_number.to_string()),
            email: Some(email.to_string()),
            linked_id: None,
            link_precedence: LinkPrecedence::Primary,
            created_at: now,
            updated_at: now,
        }
    }

    /// A secondary carrying both identifying values, linked to `primary`.
    pub fn secondary(email: &str, phone_number: &str, primary: ContactId, now: Timestamp) -> Self {
        Self {
            phone_number: Some(phone_number.to_string()),
            email: Some(email.to_string()),
            linked_id: Some(primary),
            link_precedence: LinkPrecedence::Secondary,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check the record-level invariants before persisting.
    pub fn validate(&self) -> Result<(), String> {
        let has_email = self.email.as_deref().is_some_and(|e| !e.is_empty());
        let has_phone = self.phone_number.as_deref().is_some_and(|p| !p.is_empty());
        if !has_email && !has_phone {
            return Err("contact must carry an email or a phone number".to_string());
        }
        match (self.link_precedence, self.linked_id) {
            (LinkPrecedence::Primary, Some(_)) => {
                Err("primary contact must not be linked".to_string())
            }
            (LinkPrecedence::Secondary, None) => {
                Err("secondary contact must be linked to a primary".to_string())
            }
            _ => Ok(()),
        }
    }

    /// Materialize into a record once the store has assigned an id.
    pub fn into_record(self, id: ContactId) -> ContactRecord {
        ContactRecord {
            id,
            phone_number: self.phone_number,
            email: self.email,
            linked_id: self.linked_id,
            link_precedence: self.link_precedence,
            created_at: self.created_at,
            updated_at: self.updated_at,
            deleted_at: None,
        }
    }
}

/// An inbound identity fragment.
///
/// Empty strings are treated as absent. Values are exact-match keys and are
/// otherwise kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Observation {
    email: Option<String>,
    phone_number: Option<String>,
}

/// Which identifying attributes an observation carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationShape<'a> {
    Empty,
    PhoneOnly(&'a str),
    EmailOnly(&'a str),
    Both { email: &'a str, phone_number: &'a str },
}

impl Observation {
    pub fn new(email: Option<String>, phone_number: Option<String>) -> Self {
        Self {
            email: email.filter(|e| !e.is_empty()),
            phone_number: phone_number.filter(|p| !p.is_empty()),
        }
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.phone_number.as_deref()
    }

    pub fn shape(&self) -> ObservationShape<'_> {
        match (self.email(), self.phone_number()) {
            (None, None) => ObservationShape::Empty,
            (None, Some(phone)) => ObservationShape::PhoneOnly(phone),
            (Some(email), None) => ObservationShape::EmailOnly(email),
            (Some(email), Some(phone_number)) => ObservationShape::Both {
                email,
                phone_number,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_observation_treats_empty_strings_as_absent() {
        let obs = Observation::new(Some(String::new()), Some("123456".to_string()));
        assert_eq!(obs.email(), None);
        assert_eq!(obs.shape(), ObservationShape::PhoneOnly("123456"));

        let empty = Observation::new(Some(String::new()), None);
        assert_eq!(empty.shape(), ObservationShape::Empty);
    }

    #[test]
    fn test_observation_keeps_whitespace_verbatim() {
        let obs = Observation::new(Some(" doc@hill.valley ".to_string()), None);
        assert_eq!(obs.shape(), ObservationShape::EmailOnly(" doc@hill.valley "));
    }

    #[test]
    fn test_observation_both() {
        let obs = Observation::new(Some("a@b.c".to_string()), Some("1".to_string()));
        assert_eq!(
            obs.shape(),
            ObservationShape::Both {
                email: "a@b.c",
                phone_number: "1"
            }
        );
    }

    #[test]
    fn test_new_contact_validate() {
        assert!(NewContact::primary("a@b.c", "1", t0()).validate().is_ok());
        assert!(NewContact::secondary("a@b.c", "1", ContactId::new(1), t0())
            .validate()
            .is_ok());

        let mut blank = NewContact::primary("", "", t0());
        assert!(blank.validate().is_err());
        blank.email = None;
        blank.phone_number = None;
        assert!(blank.validate().is_err());

        let mut linked_primary = NewContact::primary("a@b.c", "1", t0());
        linked_primary.linked_id = Some(ContactId::new(9));
        assert!(linked_primary.validate().is_err());
    }

    #[test]
    fn test_demoted_under_keeps_created_at() {
        let record = NewContact::primary("a@b.c", "1", t0()).into_record(ContactId::new(2));
        let later = t0() + chrono::Duration::hours(1);
        let demoted = record.demoted_under(ContactId::new(1), later);

        assert!(demoted.is_linked_to(ContactId::new(1)));
        assert_eq!(demoted.created_at, record.created_at);
        assert_eq!(demoted.updated_at, later);
        assert_eq!(demoted.email, record.email);
        assert!(!record.is_linked_to(ContactId::new(1)));
    }

    #[test]
    fn test_contact_record_serializes_camel_case() -> Result<(), serde_json::Error> {
        let record = NewContact::secondary("a@b.c", "1", ContactId::new(1), t0())
            .into_record(ContactId::new(2));
        let json = serde_json::to_value(&record)?;
        assert_eq!(json["phoneNumber"], "1");
        assert_eq!(json["linkedId"], 1);
        assert_eq!(json["linkPrecedence"], "secondary");
        assert!(json["deletedAt"].is_null());
        Ok(())
    }
}
