//! Linkage Test Utilities
//!
//! Shared test infrastructure for the linkage workspace:
//! - Proptest generators for observations and contact records
//! - Fixtures for seeding a `MockContactStore`
//! - Assertions over store contents and consolidated views

pub use linkage_storage::{MockContactStore, StoreOperation};

pub use linkage_core::{
    ConsolidatedView, ContactId, ContactRecord, LinkPrecedence, NewContact, Observation,
    ReconcileError, ReconcileErrorKind, ReconcileResult, StoreError, Timestamp,
};

use chrono::{Duration, TimeZone, Utc};

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for reconciliation inputs.
    //!
    //! Emails and phone numbers are drawn from small pools so that generated
    //! sequences collide often enough to exercise attach and merge.

    use super::*;
    use proptest::prelude::*;

    pub const EMAIL_POOL: usize = 6;
    pub const PHONE_POOL: usize = 6;

    /// Generate an email from a small pool.
    pub fn arb_email() -> impl Strategy<Value = String> {
        (0..EMAIL_POOL).prop_map(|i| format!("user{}@hillvalley.edu", i))
    }

    /// Generate a phone number from a small pool.
    pub fn arb_phone() -> impl Strategy<Value = String> {
        (0..PHONE_POOL).prop_map(|i| format!("55501{:02}", i))
    }

    /// Generate an observation carrying both values.
    pub fn arb_pair() -> impl Strategy<Value = Observation> {
        (arb_email(), arb_phone()).prop_map(|(email, phone)| Observation::new(Some(email), Some(phone)))
    }

    /// Generate an observation carrying at least one value.
    pub fn arb_observation() -> impl Strategy<Value = Observation> {
        prop_oneof![
            3 => arb_pair(),
            1 => arb_email().prop_map(|email| Observation::new(Some(email), None)),
            1 => arb_phone().prop_map(|phone| Observation::new(None, Some(phone))),
        ]
    }

    /// Generate an observation with no usable value (absent or empty strings).
    pub fn arb_blank_observation() -> impl Strategy<Value = Observation> {
        (
            prop_oneof![Just(None), Just(Some(String::new()))],
            prop_oneof![Just(None), Just(Some(String::new()))],
        )
            .prop_map(|(email, phone)| Observation::new(email, phone))
    }

    /// Generate a sequence of pair observations.
    pub fn arb_pair_sequence(max_len: usize) -> impl Strategy<Value = Vec<Observation>> {
        prop::collection::vec(arb_pair(), 1..=max_len)
    }

    /// Generate a ContactId.
    pub fn arb_contact_id() -> impl Strategy<Value = ContactId> {
        (1i64..1_000_000).prop_map(ContactId::new)
    }

    /// Generate a Timestamp (DateTime<Utc>).
    pub fn arb_timestamp() -> impl Strategy<Value = Timestamp> {
        // 2020-2030
        (1577836800i64..1893456000i64).prop_map(|secs| {
            chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
        })
    }

    pub fn arb_link_precedence() -> impl Strategy<Value = LinkPrecedence> {
        prop_oneof![Just(LinkPrecedence::Primary), Just(LinkPrecedence::Secondary)]
    }

    /// Generate a standalone record; secondaries point at an arbitrary id.
    pub fn arb_contact_record() -> impl Strategy<Value = ContactRecord> {
        (
            arb_contact_id(),
            arb_contact_id(),
            arb_link_precedence(),
            arb_email(),
            arb_phone(),
            arb_timestamp(),
        )
            .prop_map(|(id, link, precedence, email, phone, created)| {
                let contact = match precedence {
                    LinkPrecedence::Primary => NewContact::primary(&email, &phone, created),
                    LinkPrecedence::Secondary => NewContact::secondary(&email, &phone, link, created),
                };
                contact.into_record(id)
            })
    }

    /// Generate a set of unrelated primaries with distinct values and
    /// distinct creation times.
    pub fn arb_primaries(max_len: usize) -> impl Strategy<Value = Vec<ContactRecord>> {
        prop::collection::vec(0i64..10_000, 1..=max_len).prop_map(|offsets| {
            offsets
                .into_iter()
                .enumerate()
                .map(|(i, offset)| {
                    let n = i as i64 + 1;
                    NewContact::primary(
                        &format!("seed{}@hillvalley.edu", n),
                        &format!("909{:04}", n),
                        fixtures::timestamp_at(offset * 16 + n),
                    )
                    .into_record(ContactId::new(n))
                })
                .collect()
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and stores for common scenarios.

    use super::*;

    /// Fixed base instant, offset by `minutes`.
    pub fn timestamp_at(minutes: i64) -> Timestamp {
        let base = Utc
            .with_ymd_and_hms(2023, 4, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        base + Duration::minutes(minutes)
    }

    /// Observation from borrowed values; empty strings count as absent.
    pub fn observation(email: Option<&str>, phone_number: Option<&str>) -> Observation {
        Observation::new(email.map(str::to_string), phone_number.map(str::to_string))
    }

    /// Primary record created `created` minutes after the base instant.
    pub fn primary_contact(id: i64, email: &str, phone_number: &str, created: i64) -> ContactRecord {
        NewContact::primary(email, phone_number, timestamp_at(created)).into_record(ContactId::new(id))
    }

    /// Secondary record linked to `primary`.
    pub fn secondary_contact(
        id: i64,
        email: &str,
        phone_number: &str,
        primary: i64,
        created: i64,
    ) -> ContactRecord {
        NewContact::secondary(email, phone_number, ContactId::new(primary), timestamp_at(created))
            .into_record(ContactId::new(id))
    }

    /// Store pre-populated with `records`.
    pub fn seeded_store(records: Vec<ContactRecord>) -> MockContactStore {
        let store = MockContactStore::new();
        for record in records {
            if let Err(e) = store.seed(record) {
                panic!("failed to seed mock store: {}", e);
            }
        }
        store
    }

    /// Two unrelated primaries, the first one hour older.
    pub fn two_primaries() -> Vec<ContactRecord> {
        vec![
            primary_contact(11, "george@hillvalley.edu", "919191", 0),
            primary_contact(27, "biffsucks@hillvalley.edu", "717171", 60),
        ]
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for reconciliation results and store contents.

    use super::*;
    use std::collections::{BTreeMap, HashSet};

    /// Assert that a reconciliation failed with the given kind.
    #[track_caller]
    pub fn assert_error_kind<T: std::fmt::Debug>(result: &ReconcileResult<T>, kind: ReconcileErrorKind) {
        match result {
            Err(e) => assert_eq!(e.kind(), kind, "Wrong error kind for {:?}", e),
            Ok(v) => panic!("Expected {:?} error, got Ok: {:?}", kind, v),
        }
    }

    /// Assert the record-level invariants over every stored record.
    #[track_caller]
    pub fn assert_store_invariants(records: &[ContactRecord]) {
        let by_id: BTreeMap<ContactId, &ContactRecord> = records.iter().map(|r| (r.id, r)).collect();

        for record in records {
            let has_email = record.email.as_deref().is_some_and(|e| !e.is_empty());
            let has_phone = record.phone_number.as_deref().is_some_and(|p| !p.is_empty());
            assert!(has_email || has_phone, "Record {} has no identifying value", record.id);

            match (record.link_precedence, record.linked_id) {
                (LinkPrecedence::Primary, None) => {}
                (LinkPrecedence::Secondary, Some(target)) => {
                    assert_ne!(target, record.id, "Record {} is linked to itself", record.id);
                    assert!(
                        by_id.contains_key(&target),
                        "Record {} is linked to missing record {}",
                        record.id,
                        target
                    );
                }
                (precedence, linked) => panic!(
                    "Record {} has precedence {} with link {:?}",
                    record.id, precedence, linked
                ),
            }
            assert!(record.updated_at >= record.created_at, "Record {} updated before creation", record.id);
        }
    }

    /// Assert the view lists the observation's values and no secondary twice.
    #[track_caller]
    pub fn assert_view_covers(view: &ConsolidatedView, observation: &Observation) {
        if let Some(email) = observation.email() {
            assert!(
                view.emails.iter().any(|e| e == email),
                "View {:?} is missing email {}",
                view,
                email
            );
        }
        if let Some(phone) = observation.phone_number() {
            assert!(
                view.phone_numbers.iter().any(|p| p == phone),
                "View {:?} is missing phone number {}",
                view,
                phone
            );
        }
        let unique: HashSet<_> = view.secondary_contact_ids.iter().collect();
        assert_eq!(
            unique.len(),
            view.secondary_contact_ids.len(),
            "Duplicate secondary ids in {:?}",
            view
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
