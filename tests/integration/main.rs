//! Integration tests. Most run against the in-memory store; `postgres_tests`
//! needs a live database and is ignored by default.

mod ledger_tests;

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use circulation_server::{
    config::{AppConfig, CirculationConfig},
    models::NewBook,
    repository::{memory::MemoryStore, Repository},
    services::{
        clock::{test_clock, Clock},
        notifier::LogNotifier,
        Services,
    },
    AppState,
};

pub struct Library {
    pub services: Services,
    pub repository: Repository,
    pub clock: TestClock,
}

pub fn library() -> Library {
    library_with_policy(CirculationConfig::default())
}

pub fn library_with_policy(policy: CirculationConfig) -> Library {
    library_on(Repository::in_memory(MemoryStore::new()), policy)
}

pub fn library_on(repository: Repository, policy: CirculationConfig) -> Library {
    let clock = test_clock(Utc.with_ymd_and_hms(2024, 9, 2, 10, 0, 0).unwrap());
    let services = Services::new(
        repository.clone(),
        policy,
        clock.clone(),
        Arc::new(LogNotifier),
    )
    .expect("valid policy");
    Library {
        services,
        repository,
        clock: TestClock(clock),
    }
}

/// Moves the frozen clock shared with the ledgers
pub struct TestClock(pub Clock);

impl TestClock {
    pub fn now(&self) -> DateTime<Utc> {
        self.0.now()
    }

    pub fn advance(&self, by: Duration) {
        self.0
            .test_control()
            .expect("test time source")
            .advance(by);
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.advance(to - self.now());
    }
}

impl Library {
    pub async fn add_book(&self, isbn: &str, copies: i32) -> i32 {
        self.repository
            .catalog
            .create_book(&NewBook {
                isbn: isbn.to_string(),
                title: format!("Book {}", isbn),
                author: "N. K. Jemisin".to_string(),
                publisher: Some("Orbit".to_string()),
                category: Some("fiction".to_string()),
                edition: None,
                year: Some(2015),
                total_copies: copies,
            })
            .await
            .expect("book created")
            .id
    }

    pub async fn available(&self, book_id: i32) -> i32 {
        self.repository
            .catalog
            .get_book(book_id)
            .await
            .unwrap()
            .expect("book exists")
            .available_copies
    }

    pub fn state(&self) -> AppState {
        AppState {
            config: Arc::new(AppConfig::default()),
            services: Arc::new(self.services.clone()),
        }
    }
}
