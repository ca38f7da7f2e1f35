//! Application state

use planledger_billing::{BillingService, LedgerStore};

use crate::{
    auth::{AuthState, JwtManager},
    config::Config,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub jwt_manager: JwtManager,
    pub billing: BillingService,
}

impl AppState {
    pub fn new(config: Config, store: LedgerStore) -> Self {
        let jwt_manager = JwtManager::new(&config.jwt_secret, config.jwt_expiry_hours);
        let billing = BillingService::new(store, &config.billing);
        Self {
            config,
            jwt_manager,
            billing,
        }
    }

    /// State handed to the authentication middleware
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt_manager: self.jwt_manager.clone(),
            pool: self.billing.store().pool().clone(),
        }
    }
}
