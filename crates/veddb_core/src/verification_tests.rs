//! End-to-end checks across the connection, session and history services.
//!
//! These exercise the services together the way a host window does:
//! - Guided and text editing stay in sync on one canonical draft
//! - Portable files round-trip everything except the password
//! - Executions land in history exactly once, newest first
//! - Failed imports and concurrent executions leave state untouched
//! - State survives a reload from SQLite

#[cfg(test)]
mod tests {
    use crate::config::CoreConfig;
    use crate::error::VeddbError;
    use crate::models::{
        ConnectionProfile, DraftEdit, ProfileDraft, QueryDraft, QueryExecutionRecord,
        QueryResultSet, SortDirection,
    };
    use crate::services::{
        ConnectionStore, FilePicker, MemoryStore, ProfileCodec, QueryHistoryLedger, QuerySession,
        QueryTransport,
    };
    use crate::state::VeddbState;
    use serde_json::json;
    use std::num::NonZeroU32;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Transport returning `documents` empty documents after an optional delay.
    struct FixedTransport {
        documents: usize,
        delay: Duration,
    }

    impl FixedTransport {
        fn new(documents: usize) -> Self {
            Self { documents, delay: Duration::ZERO }
        }

        fn slow(documents: usize, delay: Duration) -> Self {
            Self { documents, delay }
        }
    }

    impl QueryTransport for FixedTransport {
        async fn execute(
            &self,
            _profile: &ConnectionProfile,
            _collection: &str,
            _draft: &QueryDraft,
        ) -> Result<QueryResultSet, VeddbError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(QueryResultSet::new(vec![json!({}); self.documents]))
        }
    }

    /// Picker answering with fixed paths.
    struct FixedPicker {
        save: Option<PathBuf>,
        open: Option<PathBuf>,
    }

    impl FilePicker for FixedPicker {
        fn pick_save_path(&self, _suggested_name: &str) -> Option<PathBuf> {
            self.save.clone()
        }

        fn pick_open_path(&self) -> Option<PathBuf> {
            self.open.clone()
        }
    }

    fn connected_session() -> (QuerySession, Arc<ConnectionStore>, QueryHistoryLedger) {
        let memory = Arc::new(MemoryStore::new());
        let connections = Arc::new(ConnectionStore::load(memory.clone()));
        let profile = connections.add(ProfileDraft::new("Local", "localhost")).unwrap();
        connections.set_active(Some(profile.id)).unwrap();
        let ledger = QueryHistoryLedger::load(memory, 100);
        (QuerySession::new(connections.clone()), connections, ledger)
    }

    // =========================================================================
    // Draft synchronization
    // =========================================================================

    /// After any mix of guided edits and successful text edits, the text
    /// parses back to the canonical draft.
    #[test]
    fn test_guided_and_text_edits_stay_in_sync() {
        let (mut session, _, _) = connected_session();
        session.set_field(DraftEdit::Collection(Some("orders".into())));

        let steps: Vec<Box<dyn Fn(&mut QuerySession)>> = vec![
            Box::new(|s: &mut QuerySession| {
                s.set_field(DraftEdit::FilterField { field: "status".into(), value: json!("open") })
            }),
            Box::new(|s: &mut QuerySession| {
                s.set_raw_text(r#"{"filter": {"total": {"$gt": 10}}, "limit": 3}"#).unwrap()
            }),
            Box::new(|s: &mut QuerySession| {
                s.set_field(DraftEdit::SortField {
                    field: "created_at".into(),
                    direction: SortDirection::Descending,
                })
            }),
            Box::new(|s: &mut QuerySession| {
                let _ = s.set_raw_text("{\"filter\": ");
            }),
            Box::new(|s: &mut QuerySession| s.set_field(DraftEdit::Limit(NonZeroU32::new(50)))),
            Box::new(|s: &mut QuerySession| {
                s.set_raw_text(r#"{"sort": {"name": "asc"}}"#).unwrap()
            }),
        ];

        for step in steps {
            step(&mut session);
            if session.has_parse_error() {
                continue;
            }
            let reparsed =
                QueryDraft::from_text(session.draft().collection.clone(), session.text()).unwrap();
            assert_eq!(&reparsed, session.draft());
        }

        assert_eq!(session.draft().collection.as_deref(), Some("orders"));
    }

    /// A broken text edit keeps the guided fields; `{}` then clears everything.
    #[test]
    fn test_invalid_text_then_empty_object() {
        let (mut session, _, _) = connected_session();
        session.set_field(DraftEdit::FilterField { field: "age".into(), value: json!(21) });
        let before = session.draft().clone();

        let err = session.set_raw_text("{invalid").unwrap_err();
        assert!(err.is_parse());
        assert_eq!(session.draft(), &before);

        session.set_raw_text("{}").unwrap();
        assert!(!session.has_parse_error());
        assert!(session.draft().filter.is_empty());
    }

    // =========================================================================
    // Portable connection files
    // =========================================================================

    #[test]
    fn test_prod_profile_export_import() {
        let temp_dir = TempDir::new().unwrap();
        let connections = ConnectionStore::load(Arc::new(MemoryStore::new()));
        let prod = connections
            .add(
                ProfileDraft::new("Prod", "db.internal")
                    .with_port(50051)
                    .with_password("s3cret")
                    .with_tls(true),
            )
            .unwrap();

        let path = temp_dir.path().join(ProfileCodec::suggested_file_name(&prod));
        let picker = FixedPicker { save: Some(path.clone()), open: Some(path.clone()) };

        let written = ProfileCodec::export_profile(&prod, &picker).unwrap();
        assert_eq!(written.as_deref(), Some(path.as_path()));
        assert!(!std::fs::read_to_string(&path).unwrap().contains("s3cret"));

        let imported = ProfileCodec::import_profile(&picker).unwrap().unwrap();
        assert_eq!(imported.name, "Prod");
        assert_eq!(imported.host, "db.internal");
        assert_eq!(imported.port, 50051);
        assert!(imported.tls_enabled);
        assert_eq!(imported.password, None);
        assert_eq!(imported, ProfileDraft { password: None, ..prod.to_draft() });
    }

    #[test]
    fn test_import_missing_host_leaves_store_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.veddb");
        std::fs::write(&path, r#"{"version": "1.0", "connection": {"name": "Broken", "port": 1}}"#)
            .unwrap();

        let connections = ConnectionStore::load(Arc::new(MemoryStore::new()));
        connections.add(ProfileDraft::new("Local", "localhost")).unwrap();
        let before = connections.snapshot();

        let picker = FixedPicker { save: None, open: Some(path) };
        let err = ProfileCodec::import_profile(&picker).unwrap_err();

        assert!(err.is_validation());
        assert_eq!(connections.snapshot(), before);
    }

    #[test]
    fn test_cancelled_dialogs() {
        let picker = FixedPicker { save: None, open: None };
        let profile = ConnectionProfile::from_draft(
            uuid::Uuid::new_v4(),
            ProfileDraft::new("Local", "localhost"),
        );

        assert_eq!(ProfileCodec::export_profile(&profile, &picker).unwrap(), None);
        assert_eq!(ProfileCodec::import_profile(&picker).unwrap(), None);
    }

    // =========================================================================
    // Execution and history
    // =========================================================================

    #[tokio::test]
    async fn test_execute_users_records_once() {
        let (mut session, _, ledger) = connected_session();
        session.set_field(DraftEdit::Collection(Some("users".into())));
        session.set_raw_text("{}").unwrap();

        let state = session.execute(&FixedTransport::new(4), &ledger).await.unwrap();
        assert!(state.is_succeeded());

        let records = ledger.search("", None);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].collection, "users");
        assert!(records[0].error().is_none());
        assert_eq!(records[0].result_count(), Some(4));
    }

    #[tokio::test]
    async fn test_second_execute_is_rejected() {
        let (mut session, _, ledger) = connected_session();
        session.set_field(DraftEdit::Collection(Some("users".into())));

        let pending = session.begin_execution().unwrap();
        let err = session.execute(&FixedTransport::new(1), &ledger).await.unwrap_err();
        assert!(err.is_invalid_state());
        assert!(ledger.is_empty());

        let completed = pending.run(&FixedTransport::new(1)).await;
        assert!(session.complete_execution(completed, &ledger));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_append_then_search_newest_first() {
        let ledger = QueryHistoryLedger::load(Arc::new(MemoryStore::new()), 50);
        let result = QueryResultSet::new(Vec::new());

        let ids: Vec<_> = (0..10)
            .map(|i| {
                let collection = if i % 2 == 0 { "users" } else { "orders" };
                let record = QueryExecutionRecord::from_result(
                    collection,
                    &format!("{{\"filter\": {{\"n\": {i}}}}}"),
                    &result,
                    i,
                );
                ledger.append(record).unwrap()
            })
            .collect();

        let everything = ledger.search("", None);
        let newest_first: Vec<_> = everything.iter().map(|r| r.id).collect();
        assert_eq!(newest_first, ids.iter().rev().copied().collect::<Vec<_>>());

        for term in ["users", "\"n\": 3", "ORDERS", "missing"] {
            let found = ledger.search(term, None);
            assert!(found.iter().all(|r| everything.contains(r)));
        }
        assert_eq!(ledger.search("users", None).len(), 5);
        assert_eq!(ledger.search("", Some("orders")).len(), 5);
        assert!(ledger.search("missing", None).is_empty());
    }

    #[test]
    fn test_history_capacity_drops_oldest() {
        let ledger = QueryHistoryLedger::load(Arc::new(MemoryStore::new()), 3);
        let result = QueryResultSet::new(Vec::new());

        let ids: Vec<_> = (0..5)
            .map(|i| {
                let text = format!("{{\"limit\": {}}}", i + 1);
                let record = QueryExecutionRecord::from_result("users", text, &result, 0);
                ledger.append(record).unwrap()
            })
            .collect();

        let kept: Vec<_> = ledger.records().iter().map(|r| r.id).collect();
        assert_eq!(kept, vec![ids[4], ids[3], ids[2]]);
    }

    /// The request runs on the shared runtime while the user keeps editing;
    /// history records the query as it was when issued.
    #[test]
    fn test_edits_during_execution_do_not_leak_into_history() {
        let state =
            VeddbState::with_store(Arc::new(MemoryStore::new()), CoreConfig::default()).unwrap();
        let profile = state.connections().add(ProfileDraft::new("Local", "localhost")).unwrap();
        state.connections().set_active(Some(profile.id)).unwrap();

        let mut session = state.new_session();
        session.set_field(DraftEdit::Collection(Some("users".into())));
        session.set_field(DraftEdit::FilterField { field: "active".into(), value: json!(true) });
        let issued_text = session.text().to_string();

        let pending = session.begin_execution().unwrap();
        let transport = Arc::new(FixedTransport::slow(2, Duration::from_millis(20)));
        let handle = state.spawn(async move { pending.run(transport.as_ref()).await });

        session.set_field(DraftEdit::FilterField { field: "age".into(), value: json!(40) });
        assert!(session.is_executing());

        let completed = state.block_on(handle).unwrap();
        assert!(session.complete_execution(completed, state.history()));

        let record = &state.history().records()[0];
        assert_eq!(record.serialized_query, issued_text);
        assert_ne!(record.serialized_query, session.text());
    }

    /// An abandoned request still lands in history but no longer drives the
    /// session.
    #[tokio::test]
    async fn test_abandoned_result_is_recorded_only() {
        let (mut session, _, ledger) = connected_session();
        session.set_field(DraftEdit::Collection(Some("users".into())));

        let pending = session.begin_execution().unwrap();
        let abandoned = session.abandon();
        assert_eq!(abandoned, Some(pending.execution_id()));

        let completed = pending.run(&FixedTransport::new(1)).await;
        assert!(!session.complete_execution(completed, &ledger));
        assert!(session.state().is_idle());
        assert_eq!(ledger.len(), 1);
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    #[test]
    fn test_history_and_connections_survive_reload() {
        let temp_dir = TempDir::new().unwrap();
        let config = CoreConfig::default().with_data_dir(temp_dir.path()).with_history_capacity(10);

        {
            let state = VeddbState::from_config(config.clone()).unwrap();
            let profile = state
                .connections()
                .add(ProfileDraft::new("Local", "localhost").with_password("pw"))
                .unwrap();
            state.connections().set_active(Some(profile.id)).unwrap();
            state.connections().set_connected(profile.id, true);

            let mut session = state.new_session();
            session.set_field(DraftEdit::Collection(Some("users".into())));
            let transport = FixedTransport::new(3);
            let history = state.history().clone();
            state.block_on(session.execute(&transport, &history)).unwrap();
        }

        let state = VeddbState::from_config(config).unwrap();
        let active = state.connections().active_profile().unwrap();
        assert_eq!(active.password.as_deref(), Some("pw"));
        assert!(!active.connected);

        let records = state.history().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].result_count(), Some(3));

        let mut session = state.new_session();
        session.load_from_history(&records[0]).unwrap();
        assert_eq!(session.draft().collection.as_deref(), Some("users"));
    }
}
