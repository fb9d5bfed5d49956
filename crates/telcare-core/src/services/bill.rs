use serde::{Deserialize, Serialize};

use crate::api::{ApiClient, ApiError};
use crate::types::{ApiEnvelope, BillMenu, BillSnapshot, dashless};

/// Load the bill inquiry menu (customer identifiers plus selectable months).
pub async fn fetch_bill_menu(client: &ApiClient) -> Result<BillMenu, ApiError> {
    let envelope: ApiEnvelope<BillMenu> = client.get("/bills/menu").await?;
    envelope.into_data("요금조회 메뉴 로딩에 실패하였습니다.")
}

/// One bill query. The line number keeps its dashes; the month loses them.
#[derive(Debug, Clone)]
pub struct BillInquiryInput {
    pub line_number: String,
    pub billing_month: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BillInquiryRequest<'a> {
    line_number: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    inquiry_month: Option<String>,
}

/// Fetch a bill for a (line, month) pair. The backend wants the month as
/// bare `YYYYMM` digits while the line number stays dashed.
pub async fn inquire_bill(
    client: &ApiClient,
    input: &BillInquiryInput,
) -> Result<BillSnapshot, ApiError> {
    let envelope: ApiEnvelope<BillSnapshot> = client
        .post(
            "/bills/inquiry",
            &BillInquiryRequest {
                line_number: &input.line_number,
                inquiry_month: input.billing_month.as_deref().map(dashless),
            },
        )
        .await?;
    envelope.into_data("요금 조회에 실패했습니다.")
}

/// The KOS mock speaks its own envelope dialect: `resultMessage` instead of
/// `message`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KosMonthsEnvelope {
    #[serde(default)]
    success: bool,
    data: Option<KosMonths>,
    result_message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KosMonths {
    available_months: Vec<String>,
}

/// Months with billing data for a line, straight from the KOS mock. The
/// line number is sent dashless.
pub async fn fetch_available_months(
    kos_client: &ApiClient,
    line_number: &str,
) -> Result<Vec<String>, ApiError> {
    let clean = dashless(line_number);
    let envelope: KosMonthsEnvelope = kos_client
        .get(&format!("/kos/bill/available-months/{clean}"))
        .await?;

    if envelope.success {
        if let Some(data) = envelope.data {
            return Ok(data.available_months);
        }
    }
    Err(ApiError::Message(envelope.result_message.unwrap_or_else(
        || "조회 가능한 월 정보를 가져오는데 실패했습니다.".to_string(),
    )))
}
