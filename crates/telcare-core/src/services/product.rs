use serde::Serialize;

use crate::api::{ApiClient, ApiError};
use crate::types::{ApiEnvelope, AvailableProducts, ChangeResponse, ChangeValidation, CustomerInfo};

/// Current product and customer record for a line.
pub async fn fetch_customer_info(
    client: &ApiClient,
    line_number: &str,
) -> Result<CustomerInfo, ApiError> {
    let path = format!(
        "/products/customer?lineNumber={}",
        urlencoding::encode(line_number)
    );
    let envelope: ApiEnvelope<CustomerInfo> = client.get(&path).await?;
    envelope.into_data("고객 정보 조회에 실패했습니다.")
}

/// Products eligible as change targets, backend-filtered by the current
/// product code when one is known.
pub async fn fetch_available_products(
    client: &ApiClient,
    current_product_code: Option<&str>,
) -> Result<AvailableProducts, ApiError> {
    let path = match current_product_code {
        Some(code) => format!(
            "/products/available?currentProductCode={}",
            urlencoding::encode(code)
        ),
        None => "/products/available".to_string(),
    };
    let envelope: ApiEnvelope<AvailableProducts> = client.get(&path).await?;
    envelope.into_data("변경 가능한 상품 조회에 실패했습니다.")
}

/// Keys identifying one prospective change. The same triple feeds both the
/// validation and the commit call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub line_number: String,
    pub current_product_code: String,
    pub target_product_code: String,
}

/// Pre-check a prospective change.
pub async fn validate_change(
    client: &ApiClient,
    request: &ChangeRequest,
) -> Result<ChangeValidation, ApiError> {
    let envelope: ApiEnvelope<ChangeValidation> =
        client.post("/products/change/validation", request).await?;
    envelope.into_data("상품 변경 사전 체크에 실패했습니다.")
}

/// Commit a change. Callers must have observed a successful validation
/// first; this function does not re-check.
pub async fn commit_change(
    client: &ApiClient,
    request: &ChangeRequest,
) -> Result<ChangeResponse, ApiError> {
    let envelope: ApiEnvelope<ChangeResponse> = client.post("/products/change", request).await?;
    envelope.into_data("상품 변경 요청에 실패했습니다.")
}
