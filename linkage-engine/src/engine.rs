//! Reconciliation decision procedure.

use chrono::Utc;
use linkage_core::{
    ConsolidatedView, ContactId, ContactRecord, NewContact, Observation, ObservationShape,
    ReconcileError, ReconcileResult, StoreError,
};
use linkage_storage::ContactStore;
use std::sync::Arc;

// ============================================================================
// OUTCOMES
// ============================================================================

/// What a reconciliation did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcileOutcome {
    /// No match; a fresh primary was inserted.
    CreatedPrimary,
    /// One side matched; a secondary was inserted under it.
    AttachedSecondary,
    /// Two clusters met; the later candidate was demoted.
    Merged,
    /// Both values were already known to one cluster; nothing written.
    Unchanged,
    /// Single-attribute lookup; nothing written.
    Resolved,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::CreatedPrimary => "created_primary",
            ReconcileOutcome::AttachedSecondary => "attached_secondary",
            ReconcileOutcome::Merged => "merged",
            ReconcileOutcome::Unchanged => "unchanged",
            ReconcileOutcome::Resolved => "resolved",
        }
    }

    /// Whether the store was written to.
    pub fn wrote(&self) -> bool {
        matches!(
            self,
            ReconcileOutcome::CreatedPrimary
                | ReconcileOutcome::AttachedSecondary
                | ReconcileOutcome::Merged
        )
    }
}

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub view: ConsolidatedView,
    pub outcome: ReconcileOutcome,
}

impl Reconciliation {
    fn new(view: ConsolidatedView, outcome: ReconcileOutcome) -> Self {
        Self { view, outcome }
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Reconciles observations against a shared contact store.
///
/// The engine holds no per-request state. Concurrent merges touching the same
/// cluster rely on the store's isolation.
pub struct ReconciliationEngine<S: ContactStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ContactStore + ?Sized> Clone for ReconciliationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ContactStore + ?Sized> ReconciliationEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Resolve `observation` into a consolidated view, writing at most one
    /// record.
    #[tracing::instrument(
        skip_all,
        fields(
            has_email = observation.email().is_some(),
            has_phone = observation.phone_number().is_some(),
        )
    )]
    pub async fn reconcile(&self, observation: &Observation) -> ReconcileResult<Reconciliation> {
        match observation.shape() {
            ObservationShape::Empty => Err(ReconcileError::invalid_input(
                "either email or phone number is required",
            )),
            ObservationShape::PhoneOnly(phone_number) => self.resolve_by_phone(phone_number).await,
            ObservationShape::EmailOnly(email) => self.resolve_by_email(email).await,
            ObservationShape::Both {
                email,
                phone_number,
            } => self.reconcile_pair(email, phone_number).await,
        }
    }

    async fn resolve_by_phone(&self, phone_number: &str) -> ReconcileResult<Reconciliation> {
        let anchor = self
            .store
            .find_by_phone(phone_number)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ReconcileError::not_found("phone number"))?;

        // A secondary anchor is used as-is on this path.
        tracing::debug!(anchor = %anchor.id, secondary = anchor.is_secondary(), "Resolved phone anchor");

        let linked = self.linked_or_empty(anchor.id).await;
        Ok(Reconciliation::new(
            ConsolidatedView::assemble(&anchor, &linked),
            ReconcileOutcome::Resolved,
        ))
    }

    async fn resolve_by_email(&self, email: &str) -> ReconcileResult<Reconciliation> {
        let earliest = self
            .store
            .find_by_email(email)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ReconcileError::not_found("email"))?;

        let anchor = match earliest.linked_id {
            Some(primary_id) => self
                .store
                .find_by_id(primary_id)
                .await?
                .ok_or(StoreError::NotFound { id: primary_id })?,
            None => earliest,
        };
        tracing::debug!(anchor = %anchor.id, "Resolved email anchor");

        let linked = self.linked_or_empty(anchor.id).await;
        Ok(Reconciliation::new(
            ConsolidatedView::assemble(&anchor, &linked),
            ReconcileOutcome::Resolved,
        ))
    }

    async fn reconcile_pair(&self, email: &str, phone_number: &str) -> ReconcileResult<Reconciliation> {
        let by_email = self.store.find_by_email(email).await?.into_iter().next();
        let by_phone = self.store.find_by_phone(phone_number).await?.into_iter().next();

        match (by_email, by_phone) {
            (None, None) => self.create_primary(email, phone_number).await,
            (Some(candidate), None) | (None, Some(candidate)) => {
                self.attach_secondary(email, phone_number, candidate).await
            }
            (Some(email_side), Some(phone_side)) if email_side.id == phone_side.id => {
                tracing::debug!(contact = %email_side.id, "Observation already known");
                let view = self.view_of(&email_side).await?;
                Ok(Reconciliation::new(view, ReconcileOutcome::Unchanged))
            }
            (Some(email_side), Some(phone_side)) => {
                // Ties go to the phone side.
                let (earlier, later) = if email_side.created_at < phone_side.created_at {
                    (email_side, phone_side)
                } else {
                    (phone_side, email_side)
                };
                self.merge(earlier, later).await
            }
        }
    }

    async fn create_primary(&self, email: &str, phone_number: &str) -> ReconcileResult<Reconciliation> {
        let inserted = self
            .store
            .insert(&NewContact::primary(email, phone_number, Utc::now()))
            .await?;
        if !inserted.is_primary() {
            return Err(ReconcileError::precondition(format!(
                "inserted contact {} was not stored as primary",
                inserted.id
            )));
        }
        tracing::info!(contact = %inserted.id, "Created primary contact");

        Ok(Reconciliation::new(
            ConsolidatedView::single(&inserted),
            ReconcileOutcome::CreatedPrimary,
        ))
    }

    async fn attach_secondary(
        &self,
        email: &str,
        phone_number: &str,
        candidate: ContactRecord,
    ) -> ReconcileResult<Reconciliation> {
        let inserted = self
            .store
            .insert(&NewContact::secondary(email, phone_number, candidate.id, Utc::now()))
            .await?;
        if !inserted.is_linked_to(candidate.id) {
            return Err(ReconcileError::precondition(format!(
                "inserted contact {} is not linked to {}",
                inserted.id, candidate.id
            )));
        }
        tracing::info!(contact = %inserted.id, primary = %candidate.id, "Attached secondary contact");

        let view = self.view_of(&candidate).await?;
        Ok(Reconciliation::new(view, ReconcileOutcome::AttachedSecondary))
    }

    async fn merge(&self, earlier: ContactRecord, later: ContactRecord) -> ReconcileResult<Reconciliation> {
        if later.is_linked_to(earlier.id) {
            tracing::debug!(primary = %earlier.id, secondary = %later.id, "Clusters already merged");
            let view = self.view_of(&earlier).await?;
            return Ok(Reconciliation::new(view, ReconcileOutcome::Unchanged));
        }
        // Equal timestamps can put a primary behind its own secondary.
        if earlier.is_linked_to(later.id) {
            tracing::debug!(primary = %later.id, secondary = %earlier.id, "Clusters already merged");
            let view = self.view_of(&later).await?;
            return Ok(Reconciliation::new(view, ReconcileOutcome::Unchanged));
        }

        let demoted = self
            .store
            .update(&later.demoted_under(earlier.id, Utc::now()))
            .await?;
        if !demoted.is_linked_to(earlier.id) {
            return Err(ReconcileError::precondition(format!(
                "contact {} was not demoted under {}",
                demoted.id, earlier.id
            )));
        }
        tracing::info!(primary = %earlier.id, demoted = %demoted.id, "Merged contact clusters");

        let view = self.view_of(&earlier).await?;
        Ok(Reconciliation::new(view, ReconcileOutcome::Merged))
    }

    /// View over `anchor` and everything linked to it. Store failures propagate.
    async fn view_of(&self, anchor: &ContactRecord) -> ReconcileResult<ConsolidatedView> {
        let linked = self.store.find_by_linked_id(anchor.id).await?;
        Ok(ConsolidatedView::assemble(anchor, &linked))
    }

    /// Linked records of `anchor`, or none if the lookup fails.
    ///
    /// Single-attribute lookups still answer with the anchor alone when the
    /// linked fetch errors.
    async fn linked_or_empty(&self, anchor: ContactId) -> Vec<ContactRecord> {
        match self.store.find_by_linked_id(anchor).await {
            Ok(linked) => linked,
            Err(e) => {
                tracing::warn!(error = %e, anchor = %anchor, "Linked contact lookup failed; answering with anchor only");
                Vec::new()
            }
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use linkage_core::{LinkPrecedence, ReconcileErrorKind, StoreResult};
    use linkage_storage::{MockContactStore, StoreOperation};
    use linkage_test_utils::fixtures::{
        observation, primary_contact, secondary_contact, seeded_store, timestamp_at,
    };

    fn engine(store: &Arc<MockContactStore>) -> ReconciliationEngine<MockContactStore> {
        ReconciliationEngine::new(Arc::clone(store))
    }

    fn ids(raw: &[i64]) -> Vec<ContactId> {
        raw.iter().copied().map(ContactId::new).collect()
    }

    #[tokio::test]
    async fn test_empty_observation_is_invalid() {
        let store = Arc::new(MockContactStore::new());
        let err = engine(&store)
            .reconcile(&observation(Some(""), Some("")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ReconcileErrorKind::InvalidInput);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_new_pair_creates_primary() -> ReconcileResult<()> {
        let store = Arc::new(MockContactStore::new());
        let result = engine(&store)
            .reconcile(&observation(Some("lorraine@hillvalley.edu"), Some("123456")))
            .await?;

        assert_eq!(result.outcome, ReconcileOutcome::CreatedPrimary);
        assert_eq!(result.view.emails, vec!["lorraine@hillvalley.edu"]);
        assert_eq!(result.view.phone_numbers, vec!["123456"]);
        assert!(result.view.secondary_contact_ids.is_empty());

        let all = store.all()?;
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].link_precedence, LinkPrecedence::Primary);
        assert_eq!(all[0].id, result.view.primary_contact_id);
        Ok(())
    }

    #[tokio::test]
    async fn test_known_pair_writes_nothing() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![primary_contact(1, "a@b.c", "111", 0)]));
        let result = engine(&store)
            .reconcile(&observation(Some("a@b.c"), Some("111")))
            .await?;

        assert_eq!(result.outcome, ReconcileOutcome::Unchanged);
        assert_eq!(result.view.primary_contact_id, ContactId::new(1));
        assert_eq!(result.view.emails, vec!["a@b.c"]);
        assert_eq!(result.view.phone_numbers, vec!["111"]);
        assert_eq!(store.write_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_new_phone_attaches_secondary() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![primary_contact(
            1,
            "lorraine@hillvalley.edu",
            "123456",
            0,
        )]));
        let result = engine(&store)
            .reconcile(&observation(Some("lorraine@hillvalley.edu"), Some("717171")))
            .await?;

        assert_eq!(result.outcome, ReconcileOutcome::AttachedSecondary);
        assert_eq!(result.view.primary_contact_id, ContactId::new(1));
        assert_eq!(
            result.view.emails,
            vec!["lorraine@hillvalley.edu", "lorraine@hillvalley.edu"]
        );
        assert_eq!(result.view.phone_numbers, vec!["123456", "717171"]);
        assert_eq!(result.view.secondary_contact_ids, ids(&[2]));

        let inserted = store.get(ContactId::new(2))?.unwrap();
        assert!(inserted.is_linked_to(ContactId::new(1)));
        Ok(())
    }

    #[tokio::test]
    async fn test_new_email_attaches_to_phone_side() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![primary_contact(1, "a@b.c", "111", 0)]));
        let result = engine(&store)
            .reconcile(&observation(Some("new@b.c"), Some("111")))
            .await?;

        assert_eq!(result.outcome, ReconcileOutcome::AttachedSecondary);
        assert_eq!(result.view.emails, vec!["a@b.c", "new@b.c"]);
        assert_eq!(result.view.secondary_contact_ids, ids(&[2]));
        Ok(())
    }

    #[tokio::test]
    async fn test_bridging_pair_demotes_younger_primary() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![
            primary_contact(11, "george@hillvalley.edu", "919191", 0),
            primary_contact(27, "biffsucks@hillvalley.edu", "717171", 60),
        ]));
        let engine = engine(&store);

        let result = engine
            .reconcile(&observation(Some("george@hillvalley.edu"), Some("717171")))
            .await?;

        assert_eq!(result.outcome, ReconcileOutcome::Merged);
        assert_eq!(result.view.primary_contact_id, ContactId::new(11));
        assert_eq!(
            result.view.emails,
            vec!["george@hillvalley.edu", "biffsucks@hillvalley.edu"]
        );
        assert_eq!(result.view.phone_numbers, vec!["919191", "717171"]);
        assert_eq!(result.view.secondary_contact_ids, ids(&[27]));

        let demoted = store.get(ContactId::new(27))?.unwrap();
        assert!(demoted.is_linked_to(ContactId::new(11)));
        assert_eq!(demoted.created_at, timestamp_at(60));
        assert_eq!(store.write_count(), 1);

        for obs in [
            observation(Some("george@hillvalley.edu"), None),
            observation(Some("biffsucks@hillvalley.edu"), None),
            observation(None, Some("919191")),
        ] {
            let view = engine.reconcile(&obs).await?.view;
            assert_eq!(view.primary_contact_id, ContactId::new(11));
            assert_eq!(view.secondary_contact_ids, ids(&[27]));
        }

        // The demoted record's own phone anchors on the demoted record.
        let by_phone = engine.reconcile(&observation(None, Some("717171"))).await?.view;
        assert_eq!(by_phone.primary_contact_id, ContactId::new(27));
        assert_eq!(by_phone.secondary_contact_ids, ids(&[27]));
        Ok(())
    }

    #[tokio::test]
    async fn test_merge_picks_email_side_when_older() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![
            primary_contact(1, "old@b.c", "111", 0),
            primary_contact(2, "new@b.c", "222", 10),
        ]));
        let result = engine(&store)
            .reconcile(&observation(Some("old@b.c"), Some("222")))
            .await?;

        assert_eq!(result.view.primary_contact_id, ContactId::new(1));
        assert!(store.get(ContactId::new(2))?.unwrap().is_linked_to(ContactId::new(1)));
        Ok(())
    }

    #[tokio::test]
    async fn test_merge_tie_goes_to_phone_side() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![
            primary_contact(1, "e@b.c", "111", 5),
            primary_contact(2, "f@b.c", "222", 5),
        ]));
        let result = engine(&store)
            .reconcile(&observation(Some("e@b.c"), Some("222")))
            .await?;

        assert_eq!(result.view.primary_contact_id, ContactId::new(2));
        assert!(store.get(ContactId::new(1))?.unwrap().is_linked_to(ContactId::new(2)));
        Ok(())
    }

    #[tokio::test]
    async fn test_already_merged_pair_is_unchanged() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![
            primary_contact(1, "a@b.c", "111", 0),
            secondary_contact(2, "x@y.z", "222", 1, 10),
        ]));
        let result = engine(&store)
            .reconcile(&observation(Some("a@b.c"), Some("222")))
            .await?;

        assert_eq!(result.outcome, ReconcileOutcome::Unchanged);
        assert_eq!(result.view.secondary_contact_ids, ids(&[2]));
        assert_eq!(store.write_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_tied_secondary_never_links_back_to_itself() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![
            primary_contact(1, "a@b.c", "111", 0),
            secondary_contact(2, "x@y.z", "222", 1, 0),
        ]));
        let result = engine(&store)
            .reconcile(&observation(Some("a@b.c"), Some("222")))
            .await?;

        assert_eq!(result.outcome, ReconcileOutcome::Unchanged);
        assert_eq!(result.view.primary_contact_id, ContactId::new(1));
        assert!(store.get(ContactId::new(1))?.unwrap().is_primary());
        assert_eq!(store.write_count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_repeated_pair_is_idempotent() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![
            primary_contact(1, "a@b.c", "111", 0),
            primary_contact(2, "x@y.z", "222", 10),
        ]));
        let engine = engine(&store);
        let obs = observation(Some("a@b.c"), Some("222"));

        let first = engine.reconcile(&obs).await?;
        let writes = store.write_count();
        let second = engine.reconcile(&obs).await?;

        assert_eq!(first.view, second.view);
        assert_eq!(store.write_count(), writes);
        assert_eq!(second.outcome, ReconcileOutcome::Unchanged);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_phone_is_not_found() {
        let store = Arc::new(MockContactStore::new());
        let err = engine(&store)
            .reconcile(&observation(None, Some("000")))
            .await
            .unwrap_err();
        assert_eq!(err, ReconcileError::not_found("phone number"));
    }

    #[tokio::test]
    async fn test_unknown_email_is_not_found() {
        let store = Arc::new(MockContactStore::new());
        let err = engine(&store)
            .reconcile(&observation(Some("nobody@b.c"), None))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ReconcileErrorKind::NotFound);
    }

    /// Phone lookups answer from a secondary anchor while email lookups climb
    /// to its primary. Changing either side should be a deliberate decision.
    #[tokio::test]
    async fn test_phone_and_email_paths_resolve_secondary_anchor_differently() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![
            primary_contact(1, "a@b.c", "111", 0),
            secondary_contact(2, "x@y.z", "222", 1, 10),
        ]));
        let engine = engine(&store);

        let by_phone = engine.reconcile(&observation(None, Some("222"))).await?.view;
        assert_eq!(by_phone.primary_contact_id, ContactId::new(2));
        assert_eq!(by_phone.emails, vec!["x@y.z"]);
        assert_eq!(by_phone.secondary_contact_ids, ids(&[2]));

        let by_email = engine.reconcile(&observation(Some("x@y.z"), None)).await?.view;
        assert_eq!(by_email.primary_contact_id, ContactId::new(1));
        assert_eq!(by_email.emails, vec!["a@b.c", "x@y.z"]);
        assert_eq!(by_email.secondary_contact_ids, ids(&[2]));
        Ok(())
    }

    #[tokio::test]
    async fn test_demotion_does_not_cascade() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![
            primary_contact(1, "a@b.c", "111", 0),
            primary_contact(2, "x@y.z", "222", 10),
            secondary_contact(3, "x@y.z", "333", 2, 20),
        ]));
        let engine = engine(&store);

        engine.reconcile(&observation(Some("a@b.c"), Some("222"))).await?;

        assert!(store.get(ContactId::new(3))?.unwrap().is_linked_to(ContactId::new(2)));
        let view = engine.reconcile(&observation(Some("a@b.c"), None)).await?.view;
        assert_eq!(view.secondary_contact_ids, ids(&[2]));
        Ok(())
    }

    #[tokio::test]
    async fn test_single_attribute_lookup_tolerates_linked_fetch_failure() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![
            primary_contact(1, "a@b.c", "111", 0),
            secondary_contact(2, "a@b.c", "222", 1, 10),
        ]));
        store.fail_on(StoreOperation::FindByLinkedId)?;
        let engine = engine(&store);

        for obs in [observation(None, Some("111")), observation(Some("a@b.c"), None)] {
            let view = engine.reconcile(&obs).await?.view;
            assert_eq!(view.primary_contact_id, ContactId::new(1));
            assert_eq!(view.emails, vec!["a@b.c"]);
            assert!(view.secondary_contact_ids.is_empty());
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_pair_paths_propagate_linked_fetch_failure() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![primary_contact(1, "a@b.c", "111", 0)]));
        store.fail_on(StoreOperation::FindByLinkedId)?;

        let err = engine(&store)
            .reconcile(&observation(Some("a@b.c"), Some("999")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ReconcileErrorKind::Store);
        Ok(())
    }

    #[tokio::test]
    async fn test_lookup_failures_propagate() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![primary_contact(1, "a@b.c", "111", 0)]));
        store.fail_on(StoreOperation::FindByPhone)?;
        let engine = engine(&store);

        for obs in [observation(None, Some("111")), observation(Some("a@b.c"), Some("111"))] {
            let err = engine.reconcile(&obs).await.unwrap_err();
            assert!(matches!(
                err,
                ReconcileError::Store(StoreError::QueryFailed {
                    operation: "find_by_phone",
                    ..
                })
            ));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_write_failures_propagate() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![
            primary_contact(1, "a@b.c", "111", 0),
            primary_contact(2, "x@y.z", "222", 10),
        ]));
        store.fail_on(StoreOperation::Insert)?;
        store.fail_on(StoreOperation::Update)?;
        let engine = engine(&store);

        for obs in [
            observation(Some("new@b.c"), Some("999")),
            observation(Some("a@b.c"), Some("999")),
            observation(Some("a@b.c"), Some("222")),
        ] {
            let err = engine.reconcile(&obs).await.unwrap_err();
            assert_eq!(err.kind(), ReconcileErrorKind::Store);
        }
        assert!(!store.get(ContactId::new(2))?.unwrap().is_secondary());
        Ok(())
    }

    #[tokio::test]
    async fn test_dangling_link_on_email_path_is_store_error() -> ReconcileResult<()> {
        let store = Arc::new(seeded_store(vec![secondary_contact(5, "a@b.c", "111", 4, 0)]));
        let err = engine(&store)
            .reconcile(&observation(Some("a@b.c"), None))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ReconcileError::Store(StoreError::NotFound {
                id: ContactId::new(4)
            })
        );
        Ok(())
    }

    /// Store that acknowledges writes with something other than what was
    /// asked: inserts come back with their precedence flipped, updates are
    /// acknowledged without being applied.
    struct SkewedWrites {
        inner: MockContactStore,
    }

    #[async_trait::async_trait]
    impl ContactStore for SkewedWrites {
        async fn find_by_phone(&self, phone_number: &str) -> StoreResult<Vec<ContactRecord>> {
            self.inner.find_by_phone(phone_number).await
        }

        async fn find_by_email(&self, email: &str) -> StoreResult<Vec<ContactRecord>> {
            self.inner.find_by_email(email).await
        }

        async fn find_by_linked_id(&self, id: ContactId) -> StoreResult<Vec<ContactRecord>> {
            self.inner.find_by_linked_id(id).await
        }

        async fn find_by_id(&self, id: ContactId) -> StoreResult<Option<ContactRecord>> {
            self.inner.find_by_id(id).await
        }

        async fn insert(&self, contact: &NewContact) -> StoreResult<ContactRecord> {
            let mut record = self.inner.insert(contact).await?;
            if record.is_primary() {
                record.linked_id = Some(record.id);
                record.link_precedence = LinkPrecedence::Secondary;
            } else {
                record.linked_id = None;
                record.link_precedence = LinkPrecedence::Primary;
            }
            Ok(record)
        }

        async fn update(&self, contact: &ContactRecord) -> StoreResult<ContactRecord> {
            self.inner
                .get(contact.id)?
                .ok_or(StoreError::NotFound { id: contact.id })
        }
    }

    fn skewed(records: Vec<ContactRecord>) -> ReconciliationEngine<SkewedWrites> {
        ReconciliationEngine::new(Arc::new(SkewedWrites {
            inner: seeded_store(records),
        }))
    }

    #[tokio::test]
    async fn test_insert_acknowledged_as_secondary_violates_create() {
        let err = skewed(Vec::new())
            .reconcile(&observation(Some("new@b.c"), Some("999")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ReconcileErrorKind::PreconditionViolation);
        assert!(err.to_string().contains("not stored as primary"));
    }

    #[tokio::test]
    async fn test_insert_acknowledged_unlinked_violates_attach() {
        let err = skewed(vec![primary_contact(1, "a@b.c", "111", 0)])
            .reconcile(&observation(Some("a@b.c"), Some("999")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ReconcileErrorKind::PreconditionViolation);
        assert!(err.to_string().contains("is not linked to 1"));
    }

    #[tokio::test]
    async fn test_update_not_applied_violates_merge() {
        let err = skewed(vec![
            primary_contact(1, "a@b.c", "111", 0),
            primary_contact(2, "x@y.z", "222", 10),
        ])
        .reconcile(&observation(Some("a@b.c"), Some("222")))
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ReconcileErrorKind::PreconditionViolation);
        assert!(err.to_string().contains("was not demoted under 1"));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(ReconcileOutcome::CreatedPrimary.as_str(), "created_primary");
        assert!(ReconcileOutcome::Merged.wrote());
        assert!(!ReconcileOutcome::Unchanged.wrote());
        assert!(!ReconcileOutcome::Resolved.wrote());
    }
}
