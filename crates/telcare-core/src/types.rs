use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::api::ApiError;

/// Permission string gating the bill inquiry views.
pub const PERMISSION_BILL_INQUIRY: &str = "BILL_INQUIRY";
/// Permission string gating the product change views.
pub const PERMISSION_PRODUCT_CHANGE: &str = "PRODUCT_CHANGE";

/// Authenticated user profile as mirrored into the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub line_number: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

impl UserProfile {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// Partial profile update fetched from the user service after login.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub phone_number: Option<String>,
    pub customer_id: Option<String>,
    pub line_number: Option<String>,
    pub permissions: Option<Vec<String>>,
}

impl UserPatch {
    /// Merge this patch into an existing profile, leaving absent fields alone.
    pub fn apply_to(&self, user: &mut UserProfile) {
        if let Some(ref value) = self.user_id {
            user.user_id = value.clone();
        }
        if let Some(ref value) = self.user_name {
            user.user_name = value.clone();
        }
        if let Some(ref value) = self.phone_number {
            user.phone_number = value.clone();
        }
        if let Some(ref value) = self.customer_id {
            user.customer_id = value.clone();
        }
        if let Some(ref value) = self.line_number {
            user.line_number = value.clone();
        }
        if let Some(ref value) = self.permissions {
            user.permissions = value.clone();
        }
    }
}

/// An authenticated session held in memory and mirrored into the store.
///
/// `expires_at` is epoch seconds taken from the unsigned token payload; it is
/// advisory only and never replaces server-side validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
    pub expires_at: i64,
}

impl Session {
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

/// Generic `{ success, data, error, message }` envelope used by the bill and
/// product services.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiErrorDetail>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub code: Option<String>,
    pub message: Option<String>,
    pub details: Option<String>,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap the payload, turning `success=false` into the envelope's own
    /// error message (or the supplied fallback).
    pub fn into_data(self, fallback: &str) -> Result<T, ApiError> {
        if self.success {
            if let Some(data) = self.data {
                return Ok(data);
            }
        }
        let message = self
            .error
            .and_then(|detail| detail.message)
            .or(self.message)
            .unwrap_or_else(|| fallback.to_string());
        Err(ApiError::Message(message))
    }
}

/// A subscribed product / tariff plan. Read-only on the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_code: String,
    pub product_name: String,
    pub monthly_fee: u32,
    #[serde(default)]
    pub data_allowance: String,
    #[serde(default)]
    pub voice_allowance: String,
    #[serde(default)]
    pub sms_allowance: String,
    #[serde(default)]
    pub operator_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub available: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    pub contract_date: String,
    pub term_end_date: String,
    pub early_termination_fee: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    pub customer_id: String,
    pub line_number: String,
    #[serde(default)]
    pub customer_name: String,
    pub current_product: Product,
    #[serde(default)]
    pub line_status: String,
    pub contract_info: Option<ContractInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableProducts {
    pub products: Vec<Product>,
    #[serde(default)]
    pub total_count: u32,
}

/// Outcome of the pre-change validation call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeValidation {
    pub validation_result: ValidationResult,
    #[serde(default)]
    pub validation_details: Vec<ValidationDetail>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationResult {
    Success,
    Failure,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationDetail {
    pub check_type: String,
    pub result: String,
    pub message: String,
}

/// Response of the commit call. Success requires `process_status` COMPLETED
/// and `result_code` "0000" together.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeResponse {
    pub request_id: String,
    pub process_status: String,
    pub result_code: String,
    #[serde(default)]
    pub result_message: String,
    pub changed_product: Option<Product>,
    pub processed_at: String,
}

impl ChangeResponse {
    pub fn is_success(&self) -> bool {
        self.process_status == "COMPLETED" && self.result_code == "0000"
    }
}

/// Bill inquiry menu: available months plus basic customer identifiers.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillMenu {
    pub customer_info: BillMenuCustomer,
    #[serde(default)]
    pub available_months: Vec<String>,
    #[serde(default)]
    pub current_month: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillMenuCustomer {
    pub customer_id: String,
    pub line_number: String,
}

/// Read-only bill projection for one (line, month). Never cached; every view
/// mount fetches a fresh copy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillSnapshot {
    pub request_id: String,
    #[serde(default)]
    pub proc_status: String,
    #[serde(default)]
    pub result_code: String,
    #[serde(default)]
    pub result_message: String,
    pub bill_info: BillInfo,
    pub customer_info: BillCustomer,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillInfo {
    pub line_number: String,
    pub billing_month: String,
    #[serde(default)]
    pub product_code: String,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub monthly_fee: u32,
    #[serde(default)]
    pub usage_fee: u32,
    #[serde(default)]
    pub discount_amount: u32,
    #[serde(default)]
    pub total_fee: u32,
    #[serde(default)]
    pub data_usage: String,
    #[serde(default)]
    pub voice_usage: String,
    #[serde(default)]
    pub sms_usage: String,
    #[serde(default)]
    pub bill_status: String,
    #[serde(default)]
    pub due_date: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillCustomer {
    #[serde(default)]
    pub customer_name: String,
    pub customer_id: String,
    #[serde(default)]
    pub operator_code: String,
    #[serde(default)]
    pub line_status: String,
}

/// Strip dashes from a line number for backends that want the bare digits.
pub fn dashless(line_number: &str) -> String {
    line_number.chars().filter(|c| *c != '-').collect()
}

/// Field-level error map returned by the register endpoint.
pub type FieldErrorMap = HashMap<String, String>;
