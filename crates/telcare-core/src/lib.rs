//! Core library crate for the telcare portal client: session lifecycle,
//! auth state, REST transport, and the product-change wizard.

pub mod api;
pub mod config;
pub mod guard;
pub mod logging;
pub mod restore;
pub mod services;
pub mod state;
pub mod store;
pub mod token;
pub mod types;
pub mod wizard;

pub use api::{
    ApiClient, ApiError, GENERIC_ERROR_MESSAGE, PortalClients, RequestOverrides,
    SESSION_EXPIRED_MESSAGE,
};
pub use config::{
    ConfigError, ConfigLoadResult, ConfigSource, FileConfig, PortalConfig, config_directory,
    config_path, load_config, load_config_from, save_config,
};
pub use guard::{DEFAULT_ROUTE, GuardDecision, LOGIN_ROUTE, RouteRequest, evaluate};
pub use logging::{LoggingDestination, LoggingError, current_log_path, init_logging};
pub use restore::{RestoreOutcome, restore_session};
pub use state::AuthStore;
pub use store::{SessionStore, StorageTier, StoreError};
pub use types::{
    PERMISSION_BILL_INQUIRY, PERMISSION_PRODUCT_CHANGE, Product, Session, UserPatch, UserProfile,
};
pub use wizard::{
    ChangeOutcome, ChangeSummary, ChangeWizard, CheckpointCallback, CheckpointEvent,
    VALIDATION_CHECKPOINTS, WizardError, WizardState, first_day_of_next_month,
    format_applied_from, format_processed_at,
};
