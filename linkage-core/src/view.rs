//! Consolidated identity view

use crate::{ContactId, ContactRecord};
use serde::{Deserialize, Serialize};
use std::iter;

/// Aggregated identity for one resolved cluster.
///
/// Lists follow encounter order: the resolved primary first, then its linked
/// records in the order the store returned them. Values are not
/// de-duplicated; each record carrying a non-empty value contributes one
/// entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedView {
    pub primary_contact_id: ContactId,
    pub emails: Vec<String>,
    pub phone_numbers: Vec<String>,
    pub secondary_contact_ids: Vec<ContactId>,
}

impl ConsolidatedView {
    /// Assemble the view over `primary` followed by `linked`.
    ///
    /// `primary` is whatever record the caller resolved as the anchor; if it
    /// is itself a secondary its id also lands in `secondary_contact_ids`.
    pub fn assemble(primary: &ContactRecord, linked: &[ContactRecord]) -> Self {
        let mut view = Self {
            primary_contact_id: primary.id,
            emails: Vec::with_capacity(linked.len() + 1),
            phone_numbers: Vec::with_capacity(linked.len() + 1),
            secondary_contact_ids: Vec::with_capacity(linked.len()),
        };

        for record in iter::once(primary).chain(linked) {
            if let Some(email) = record.email.as_deref().filter(|e| !e.is_empty()) {
                view.emails.push(email.to_string());
            }
            if let Some(phone) = record.phone_number.as_deref().filter(|p| !p.is_empty()) {
                view.phone_numbers.push(phone.to_string());
            }
            if record.is_secondary() {
                view.secondary_contact_ids.push(record.id);
            }
        }

        view
    }

    /// View over a lone record with nothing linked beneath it.
    pub fn single(record: &ContactRecord) -> Self {
        Self::assemble(record, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewContact;
    use chrono::{TimeZone, Utc};

    fn record(id: i64, email: Option<&str>, phone: Option<&str>, linked: Option<i64>) -> ContactRecord {
        let now = Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap();
        let mut contact = match linked {
            Some(primary) => NewContact::secondary("", "", ContactId::new(primary), now),
            None => NewContact::primary("", "", now),
        };
        contact.email = email.map(str::to_string);
        contact.phone_number = phone.map(str::to_string);
        contact.into_record(ContactId::new(id))
    }

    #[test]
    fn test_single_primary() {
        let primary = record(1, Some("lorraine@hillvalley.edu"), Some("123456"), None);
        let view = ConsolidatedView::single(&primary);

        assert_eq!(view.primary_contact_id, ContactId::new(1));
        assert_eq!(view.emails, vec!["lorraine@hillvalley.edu"]);
        assert_eq!(view.phone_numbers, vec!["123456"]);
        assert!(view.secondary_contact_ids.is_empty());
    }

    #[test]
    fn test_primary_first_then_linked_in_order() {
        let primary = record(1, Some("lorraine@hillvalley.edu"), Some("123456"), None);
        let linked = vec![
            record(23, Some("mcfly@hillvalley.edu"), Some("123456"), Some(1)),
            record(7, None, Some("717171"), Some(1)),
        ];
        let view = ConsolidatedView::assemble(&primary, &linked);

        assert_eq!(
            view.emails,
            vec!["lorraine@hillvalley.edu", "mcfly@hillvalley.edu"]
        );
        // Duplicate phone values are kept, one per record.
        assert_eq!(view.phone_numbers, vec!["123456", "123456", "717171"]);
        assert_eq!(
            view.secondary_contact_ids,
            vec![ContactId::new(23), ContactId::new(7)]
        );
    }

    #[test]
    fn test_empty_values_are_skipped() {
        let primary = record(1, Some(""), Some("123456"), None);
        let linked = vec![record(2, Some("x@y.z"), Some(""), Some(1))];
        let view = ConsolidatedView::assemble(&primary, &linked);

        assert_eq!(view.emails, vec!["x@y.z"]);
        assert_eq!(view.phone_numbers, vec!["123456"]);
    }

    #[test]
    fn test_secondary_anchor_lists_itself_as_secondary() {
        let anchor = record(5, Some("a@b.c"), Some("1"), Some(1));
        let view = ConsolidatedView::single(&anchor);

        assert_eq!(view.primary_contact_id, ContactId::new(5));
        assert_eq!(view.secondary_contact_ids, vec![ContactId::new(5)]);
    }

    #[test]
    fn test_view_serializes_camel_case() -> Result<(), serde_json::Error> {
        let primary = record(1, Some("a@b.c"), Some("1"), None);
        let json = serde_json::to_value(ConsolidatedView::single(&primary))?;

        assert_eq!(json["primaryContactId"], 1);
        assert_eq!(json["emails"][0], "a@b.c");
        assert_eq!(json["phoneNumbers"][0], "1");
        assert_eq!(json["secondaryContactIds"], serde_json::json!([]));
        Ok(())
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// Linked record shape: optional email, optional phone. Ids are
        /// assigned by position.
        fn arb_linked() -> impl Strategy<Value = Vec<(Option<String>, Option<String>)>> {
            let value = prop_oneof![
                Just(None),
                Just(Some(String::new())),
                "[a-z]{1,6}".prop_map(Some),
            ];
            prop::collection::vec((value.clone(), value), 0..8)
        }

        fn non_empty(values: impl Iterator<Item = Option<String>>) -> Vec<String> {
            values.flatten().filter(|v| !v.is_empty()).collect()
        }

        proptest! {
            #[test]
            fn prop_view_follows_encounter_order(shapes in arb_linked()) {
                let primary = record(1, Some("anchor@hillvalley.edu"), Some("100"), None);
                let linked: Vec<ContactRecord> = shapes
                    .iter()
                    .enumerate()
                    .map(|(i, (email, phone))| {
                        record(i as i64 + 2, email.as_deref(), phone.as_deref(), Some(1))
                    })
                    .collect();

                let view = ConsolidatedView::assemble(&primary, &linked);

                let mut emails = vec!["anchor@hillvalley.edu".to_string()];
                emails.extend(non_empty(shapes.iter().map(|(e, _)| e.clone())));
                let mut phones = vec!["100".to_string()];
                phones.extend(non_empty(shapes.iter().map(|(_, p)| p.clone())));
                let secondaries: Vec<ContactId> = linked.iter().map(|r| r.id).collect();

                prop_assert_eq!(view.primary_contact_id, primary.id);
                prop_assert_eq!(view.emails, emails);
                prop_assert_eq!(view.phone_numbers, phones);
                prop_assert_eq!(view.secondary_contact_ids, secondaries);
            }
        }
    }
}
