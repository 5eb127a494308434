//! Business logic services

pub mod borrows;
pub mod catalog;
pub mod clock;
pub mod fines;
pub mod notifier;
pub mod reservations;

use std::sync::Arc;

use crate::{config::CirculationConfig, error::AppResult, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub borrows: borrows::BorrowLedger,
    pub reservations: reservations::ReservationQueue,
    pub fines: fines::FineLedger,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(
        repository: Repository,
        policy: CirculationConfig,
        clock: clock::Clock,
        notifier: Arc<dyn notifier::ReservationNotifier>,
    ) -> AppResult<Self> {
        policy.validate()?;
        Ok(Self {
            catalog: catalog::CatalogService::new(repository.clone()),
            borrows: borrows::BorrowLedger::new(repository.clone(), policy, clock.clone(), notifier),
            reservations: reservations::ReservationQueue::new(repository.clone()),
            fines: fines::FineLedger::new(repository, clock),
        })
    }
}
