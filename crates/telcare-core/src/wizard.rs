use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use thiserror::Error;
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::services::product::{
    ChangeRequest, commit_change, fetch_customer_info, validate_change,
};
use crate::types::{ChangeResponse, ChangeValidation, Product, ValidationResult, dashless};

/// UI-only progress milestones walked during validation. One backend call
/// decides the outcome; these labels are presentation pacing.
pub const VALIDATION_CHECKPOINTS: [&str; 4] = ["약정 확인", "자격 검증", "요금 계산", "승인 완료"];

/// Observer for checkpoint progress while validation runs.
pub type CheckpointCallback = Arc<dyn Fn(CheckpointEvent) + Send + Sync + 'static>;

#[derive(Debug, Clone)]
pub struct CheckpointEvent {
    pub index: usize,
    pub total: usize,
    pub label: &'static str,
}

/// Wizard position. Linear: no state is reachable except through the one
/// before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    Selecting,
    Validating,
    Validated { passed: bool },
    Confirming,
    Applying,
    Completed { success: bool },
}

impl WizardState {
    fn name(self) -> &'static str {
        match self {
            WizardState::Selecting => "SELECTING",
            WizardState::Validating => "VALIDATING",
            WizardState::Validated { passed: true } => "VALIDATED(pass)",
            WizardState::Validated { passed: false } => "VALIDATED(fail)",
            WizardState::Confirming => "CONFIRMING",
            WizardState::Applying => "APPLYING",
            WizardState::Completed { .. } => "RESULT",
        }
    }
}

#[derive(Debug, Error)]
pub enum WizardError {
    /// Developer-facing: a caller tried to skip a stage.
    #[error("invalid wizard transition: cannot {action} while in {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
    #[error("변경할 상품을 선택해주세요.")]
    NoSelection,
    #[error("사용자 정보가 없습니다. 다시 로그인해주세요.")]
    MissingUser,
    #[error("상품 변경 정보가 없습니다. 상품 선택부터 다시 진행해주세요.")]
    MissingContext,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// What the confirmation dialog shows before commit.
#[derive(Debug, Clone)]
pub struct ChangeSummary {
    pub product_name: String,
    pub monthly_fee: u32,
    /// Signed difference versus the current product's fee.
    pub fee_delta: i64,
}

/// Final result of a completed wizard run.
#[derive(Debug, Clone)]
pub struct ChangeOutcome {
    pub success: bool,
    pub response: ChangeResponse,
    /// Best available product values for display: the authoritative
    /// follow-up fetch, else the commit echo, else the original selection.
    pub displayed_product: Product,
    /// First day of the month after `today`; changes take effect then.
    pub applied_from: NaiveDate,
}

/// The product-change flow: select, validate, confirm, apply.
///
/// Exactly one wizard exists per flow; it is dropped when the user leaves.
/// The commit call is only reachable from `Confirming`, which itself is
/// only reachable from a passed validation.
pub struct ChangeWizard {
    line_number: String,
    current: Product,
    selected: Option<Product>,
    state: WizardState,
    validation: Option<ChangeValidation>,
}

impl ChangeWizard {
    /// Start a fresh flow from the customer's current product.
    pub fn begin(line_number: impl Into<String>, current: Product) -> Self {
        Self {
            line_number: line_number.into(),
            current,
            selected: None,
            state: WizardState::Selecting,
            validation: None,
        }
    }

    /// Rebuild a flow from navigation context. Direct entry without the
    /// required products is rejected so the caller can bounce back to
    /// selection.
    pub fn from_context(
        line_number: impl Into<String>,
        current: Option<Product>,
        selected: Option<Product>,
    ) -> Result<Self, WizardError> {
        let (Some(current), Some(selected)) = (current, selected) else {
            return Err(WizardError::MissingContext);
        };
        let mut wizard = Self::begin(line_number, current);
        wizard.selected = Some(selected);
        Ok(wizard)
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn current_product(&self) -> &Product {
        &self.current
    }

    pub fn selected_product(&self) -> Option<&Product> {
        self.selected.as_ref()
    }

    pub fn validation(&self) -> Option<&ChangeValidation> {
        self.validation.as_ref()
    }

    /// Pick a target product. Only allowed while selecting; picking again
    /// replaces the previous choice and discards any stale validation.
    pub fn select(&mut self, product: Product) -> Result<(), WizardError> {
        if self.state != WizardState::Selecting {
            return Err(self.invalid("select a product"));
        }
        self.validation = None;
        self.selected = Some(product);
        Ok(())
    }

    /// Run the validation stage: walk the checkpoint labels for display,
    /// then ask the backend for the real decision.
    ///
    /// A transport failure returns the wizard to `Selecting`; a definitive
    /// FAILURE result parks it in `Validated(fail)`, which only `retreat`
    /// leaves.
    pub async fn run_validation(
        &mut self,
        client: &ApiClient,
        on_checkpoint: Option<CheckpointCallback>,
    ) -> Result<&ChangeValidation, WizardError> {
        if self.state != WizardState::Selecting {
            return Err(self.invalid("start validation"));
        }
        let Some(selected) = self.selected.clone() else {
            return Err(WizardError::NoSelection);
        };

        self.state = WizardState::Validating;
        if let Some(ref cb) = on_checkpoint {
            let total = VALIDATION_CHECKPOINTS.len();
            for (index, label) in VALIDATION_CHECKPOINTS.iter().enumerate() {
                cb(CheckpointEvent {
                    index,
                    total,
                    label,
                });
            }
        }

        // The change endpoints take the line number as bare digits; the
        // customer record fetch keeps the dashes.
        let request = ChangeRequest {
            line_number: dashless(&self.line_number),
            current_product_code: self.current.product_code.clone(),
            target_product_code: selected.product_code.clone(),
        };
        let outcome = match validate_change(client, &request).await {
            Ok(outcome) => outcome,
            Err(err) => {
                self.state = WizardState::Selecting;
                return Err(err.into());
            }
        };

        let passed = outcome.validation_result == ValidationResult::Success;
        if !passed {
            info!(
                reason = outcome.failure_reason.as_deref().unwrap_or("unspecified"),
                "product change validation failed"
            );
        }
        self.state = WizardState::Validated { passed };
        Ok(self.validation.insert(outcome))
    }

    /// Abandon the current attempt and return to selection. The stale
    /// validation result never carries over into the next attempt.
    pub fn retreat(&mut self) {
        self.state = WizardState::Selecting;
        self.validation = None;
    }

    /// Move from a passed validation into the confirmation dialog.
    pub fn request_confirmation(&mut self) -> Result<ChangeSummary, WizardError> {
        if self.state != (WizardState::Validated { passed: true }) {
            return Err(self.invalid("request confirmation"));
        }
        let Some(ref selected) = self.selected else {
            return Err(WizardError::NoSelection);
        };
        self.state = WizardState::Confirming;
        Ok(ChangeSummary {
            product_name: selected.product_name.clone(),
            monthly_fee: selected.monthly_fee,
            fee_delta: i64::from(selected.monthly_fee) - i64::from(self.current.monthly_fee),
        })
    }

    /// Back out of the confirmation dialog with no side effects.
    pub fn cancel_confirmation(&mut self) -> Result<(), WizardError> {
        if self.state != WizardState::Confirming {
            return Err(self.invalid("cancel confirmation"));
        }
        self.state = WizardState::Validated { passed: true };
        Ok(())
    }

    /// Commit the change. Success requires the backend to report both a
    /// COMPLETED process status and a "0000" result code; on success a
    /// follow-up fetch of the authoritative record is attempted for display
    /// only and its failure never downgrades the result.
    pub async fn apply(
        &mut self,
        client: &ApiClient,
        today: NaiveDate,
    ) -> Result<ChangeOutcome, WizardError> {
        if self.state != WizardState::Confirming {
            return Err(self.invalid("apply the change"));
        }
        let Some(selected) = self.selected.clone() else {
            return Err(WizardError::NoSelection);
        };

        self.state = WizardState::Applying;
        let request = ChangeRequest {
            line_number: dashless(&self.line_number),
            current_product_code: self.current.product_code.clone(),
            target_product_code: selected.product_code.clone(),
        };
        let response = match commit_change(client, &request).await {
            Ok(response) => response,
            Err(err) => {
                // The UI never retries a commit automatically; the user may
                // confirm again.
                self.state = WizardState::Confirming;
                return Err(err.into());
            }
        };

        let success = response.is_success();
        let mut displayed_product = response
            .changed_product
            .clone()
            .unwrap_or_else(|| selected.clone());
        if success {
            match fetch_customer_info(client, &self.line_number).await {
                Ok(info) => displayed_product = info.current_product,
                Err(err) => {
                    warn!(%err, "follow-up customer fetch failed; showing commit echo");
                }
            }
        }

        self.state = WizardState::Completed { success };
        Ok(ChangeOutcome {
            success,
            response,
            displayed_product,
            applied_from: first_day_of_next_month(today),
        })
    }

    fn invalid(&self, action: &'static str) -> WizardError {
        WizardError::InvalidTransition {
            state: self.state.name(),
            action,
        }
    }
}

/// First day of the month after `today`.
pub fn first_day_of_next_month(today: NaiveDate) -> NaiveDate {
    let (year, month) = if today.month() == 12 {
        (today.year() + 1, 1)
    } else {
        (today.year(), today.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(today)
}

/// `2025-09-01T09:30:00Z` style timestamps rendered as
/// `2025-09-01-09:30:00`; unparseable input passes through untouched.
pub fn format_processed_at(processed_at: &str) -> String {
    match chrono::DateTime::parse_from_rfc3339(processed_at) {
        Ok(parsed) => parsed.format("%Y-%m-%d-%H:%M:%S").to_string(),
        Err(_) => processed_at.to_string(),
    }
}

/// Applied date as shown to the user, e.g. `2025년 10월 1일`.
pub fn format_applied_from(date: NaiveDate) -> String {
    format!("{}년 {:02}월 1일", date.year(), date.month())
}
