//! Shared fixtures for the engine and lifecycle tests: an in-memory store,
//! a throwaway vault and hand-rolled provider/notifier doubles.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::NaiveDate;
use gymbot_core::{ClassTime, Weekday};
use gymbot_notify::{BookingNotice, Notifier};
use gymbot_provider::{BookingProvider, CreateOutcome, ProviderError, ProviderSession};
use gymbot_store::{NewReservation, Reservation, Store};
use gymbot_vault::CredentialVault;
use rusqlite::Connection;

use crate::engine::{ExecutionEngine, RetryPolicy};

pub(crate) struct ScriptedProvider {
    auth_ok: AtomicBool,
    outcomes: Mutex<VecDeque<gymbot_provider::Result<CreateOutcome>>>,
    auth_calls: AtomicU32,
    create_calls: AtomicU32,
    cancel_calls: AtomicU32,
    call_instants: Mutex<Vec<Instant>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self {
            auth_ok: AtomicBool::new(true),
            outcomes: Mutex::new(VecDeque::new()),
            auth_calls: AtomicU32::new(0),
            create_calls: AtomicU32::new(0),
            cancel_calls: AtomicU32::new(0),
            call_instants: Mutex::new(Vec::new()),
        }
    }

    pub fn reject_auth(&self) {
        self.auth_ok.store(false, Ordering::SeqCst);
    }

    /// Queue the result of the next create_booking call.
    pub fn script(&self, outcome: gymbot_provider::Result<CreateOutcome>) {
        self.outcomes.lock().unwrap().push_back(outcome);
    }

    pub fn auth_calls(&self) -> u32 {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn cancel_calls(&self) -> u32 {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    pub fn gap_between_calls(&self, first: usize, second: usize) -> Duration {
        let instants = self.call_instants.lock().unwrap();
        instants[second] - instants[first]
    }
}

#[async_trait]
impl BookingProvider for ScriptedProvider {
    async fn authenticate(
        &self,
        _username: &str,
        _secret: &str,
    ) -> gymbot_provider::Result<ProviderSession> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.auth_ok.load(Ordering::SeqCst) {
            Ok(ProviderSession {
                token: "test-token".to_string(),
                user_id: 1,
                center_id: 134,
            })
        } else {
            Err(ProviderError::AuthRejected("bad credentials".to_string()))
        }
    }

    async fn create_booking(
        &self,
        _session: &ProviderSession,
        _center: &str,
        _class_date: NaiveDate,
        _class_time: ClassTime,
        _class_name: &str,
    ) -> gymbot_provider::Result<CreateOutcome> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.call_instants.lock().unwrap().push(Instant::now());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::Transport("unscripted call".to_string())))
    }

    async fn cancel_booking(
        &self,
        _session: &ProviderSession,
        _center: &str,
        _booking_id: &str,
    ) -> gymbot_provider::Result<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct CountingNotifier {
    count: AtomicU32,
}

impl CountingNotifier {
    pub fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for CountingNotifier {
    async fn notify(&self, _notice: &BookingNotice) -> gymbot_notify::Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub(crate) struct Fixtures {
    pub store: Store,
    pub vault: Arc<CredentialVault>,
    pub provider: Arc<ScriptedProvider>,
    pub notifier: Arc<CountingNotifier>,
    pub retry: RetryPolicy,
}

impl Fixtures {
    pub fn engine(&self) -> ExecutionEngine {
        ExecutionEngine::new(
            self.store.clone(),
            Arc::clone(&self.vault),
            self.provider.clone(),
            self.notifier.clone(),
            self.retry,
        )
    }

    /// A user (sealed password "secret") with one active Monday 10:00 slot.
    pub fn reservation(&self) -> Reservation {
        let cipher = self.vault.encrypt("secret").unwrap();
        self.store.upsert_user("member@example.com", &cipher).unwrap();
        self.store
            .create_reservation(&NewReservation {
                user_id: "member@example.com".to_string(),
                weekday: Weekday::Monday,
                time: "10:00".parse().unwrap(),
                center: "134".to_string(),
                class_name: "Cycling".to_string(),
            })
            .unwrap()
    }
}

pub(crate) fn fixtures() -> Fixtures {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
    gymbot_store::db::init_db(&conn).unwrap();

    Fixtures {
        store: Store::new(conn),
        vault: Arc::new(CredentialVault::from_base64_key(&CredentialVault::generate_key()).unwrap()),
        provider: Arc::new(ScriptedProvider::new()),
        notifier: Arc::new(CountingNotifier::new()),
        retry: RetryPolicy {
            attempts: 2,
            delay: Duration::from_millis(25),
        },
    }
}
