//! Backend service calls, one module per functional area.
//!
//! Services never swallow errors: varied backend shapes are normalized into
//! [`crate::api::ApiError`] with a human-readable message, and presentation
//! decides how to show it. The only tolerated failures are explicitly
//! best-effort calls (logout notification, post-registration seeding).

pub mod auth;
pub mod bill;
pub mod product;
