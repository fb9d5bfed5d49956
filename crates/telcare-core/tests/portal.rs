//! End-to-end portal flows against a mocked backend.

use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::json;
use tempfile::tempdir;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use telcare_core::api::{ApiClient, ApiError};
use telcare_core::services::{auth, bill, product};
use telcare_core::state::AuthStore;
use telcare_core::store::{SessionStore, StorageTier, TOKEN_KEY};
use telcare_core::wizard::{ChangeWizard, WizardError, WizardState};
use telcare_core::types::Product;

const NOW: i64 = 1_700_000_000;

fn client_for(server: &MockServer) -> (ApiClient, Arc<SessionStore>, tempfile::TempDir) {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(SessionStore::open(dir.path()));
    let client = ApiClient::new(server.uri(), Arc::clone(&store)).expect("client");
    (client, store, dir)
}

fn login_input() -> auth::LoginInput {
    auth::LoginInput {
        user_id: "u1".to_string(),
        password: "password123".to_string(),
        auto_login: false,
    }
}

fn sample_product(code: &str, name: &str, fee: u32) -> serde_json::Value {
    json!({
        "productCode": code,
        "productName": name,
        "monthlyFee": fee,
        "dataAllowance": "무제한",
        "voiceAllowance": "무제한",
        "smsAllowance": "기본제공",
        "operatorCode": "MVNO",
        "available": true
    })
}

#[tokio::test]
async fn login_populates_auth_state_and_mirrors_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_partial_json(json!({"userId": "u1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "t1",
            "refresh_token": "r1",
            "token_type": "Bearer",
            "expires_in": 3600,
            "user_id": "u1",
            "customer_id": "c1",
            "line_number": "010-1111-2222"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store, _dir) = client_for(&server);
    let session = auth::login(&client, &login_input(), NOW)
        .await
        .expect("login");

    assert_eq!(session.user.user_id, "u1");
    assert_eq!(session.user.customer_id, "c1");
    assert_eq!(session.user.line_number, "010-1111-2222");
    assert!(session.user.permissions.is_empty());
    // Opaque token: expiry comes from the advertised lifetime.
    assert_eq!(session.expires_at, NOW + 3600);

    let mut auth_state = AuthStore::new();
    auth_state.login_success(session, &store);
    assert!(auth_state.is_authenticated());

    let (tier, raw) = store
        .read_same_tier()
        .expect("read")
        .expect("session mirrored");
    assert_eq!(tier, StorageTier::Durable);
    assert_eq!(raw.token, "t1");
}

#[tokio::test]
async fn short_user_id_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _store, _dir) = client_for(&server);
    let input = auth::LoginInput {
        user_id: "ab".to_string(),
        password: "password123".to_string(),
        auto_login: false,
    };
    let err = auth::login(&client, &input, NOW).await.unwrap_err();
    match err {
        ApiError::Validation(message) => {
            assert!(message.contains("아이디는 3~20자로 입력해주세요"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn rejected_credentials_surface_the_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "error": {"code": "AUTH4001", "message": "아이디 또는 비밀번호가 올바르지 않습니다."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _store, _dir) = client_for(&server);
    let err = auth::login(&client, &login_input(), NOW).await.unwrap_err();
    match err {
        ApiError::Unauthorized { message } => {
            assert!(message.contains("올바르지 않습니다"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn stored_token_rides_along_as_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bills/menu"))
        .and(header("authorization", "Bearer t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "customerInfo": {"customerId": "c1", "lineNumber": "010-1111-2222"},
                "availableMonths": ["2025-06", "2025-07", "2025-08"],
                "currentMonth": "2025-08"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store, _dir) = client_for(&server);
    store
        .set(StorageTier::Durable, TOKEN_KEY, "t1")
        .expect("set token");

    let menu = bill::fetch_bill_menu(&client).await.expect("menu");
    assert_eq!(menu.customer_info.customer_id, "c1");
    assert_eq!(menu.available_months.len(), 3);
}

#[tokio::test]
async fn bill_inquiry_sends_dashless_month_and_dashed_line() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bills/inquiry"))
        .and(body_partial_json(json!({
            "lineNumber": "010-1234-7777",
            "inquiryMonth": "202508"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "requestId": "REQ-1",
                "procStatus": "COMPLETED",
                "resultCode": "0000",
                "billInfo": {
                    "lineNumber": "010-1234-7777",
                    "billingMonth": "2025-08",
                    "productName": "5G 스탠다드 플랜",
                    "monthlyFee": 59000,
                    "totalFee": 61500
                },
                "customerInfo": {"customerId": "c1", "customerName": "홍길동"}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _store, _dir) = client_for(&server);
    let snapshot = bill::inquire_bill(
        &client,
        &bill::BillInquiryInput {
            line_number: "010-1234-7777".to_string(),
            billing_month: Some("2025-08".to_string()),
        },
    )
    .await
    .expect("inquiry");

    assert_eq!(snapshot.bill_info.total_fee, 61500);
    assert_eq!(snapshot.customer_info.customer_id, "c1");
}

#[tokio::test]
async fn failed_bill_envelope_uses_backend_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bills/inquiry"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "message": "해당 월의 요금 정보가 없습니다."
        })))
        .mount(&server)
        .await;

    let (client, _store, _dir) = client_for(&server);
    let err = bill::inquire_bill(
        &client,
        &bill::BillInquiryInput {
            line_number: "010-1234-7777".to_string(),
            billing_month: Some("2020-01".to_string()),
        },
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("요금 정보가 없습니다"));
}

#[tokio::test]
async fn registration_survives_mock_seed_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .and(body_partial_json(json!({
            "userId": "hong",
            "permissions": ["BILL_INQUIRY", "PRODUCT_CHANGE"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/kos/mock-datas"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "success": false,
            "message": "seed failure"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _store, _dir) = client_for(&server);
    let input = auth::RegisterInput {
        user_id: "hong".to_string(),
        user_name: "홍길동".to_string(),
        line_number: "010-1234-5678".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
    };

    let customer_id = auth::register(&client, &client, &input)
        .await
        .expect("register succeeds despite seed failure");
    assert_eq!(customer_id.len(), 20);
}

#[tokio::test]
async fn register_maps_backend_field_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/register"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "입력값 오류",
            "fieldErrors": {"userId": "이미 사용 중인 아이디입니다."}
        })))
        .mount(&server)
        .await;

    let (client, _store, _dir) = client_for(&server);
    let input = auth::RegisterInput {
        user_id: "hong".to_string(),
        user_name: "홍길동".to_string(),
        line_number: "010-1234-5678".to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
    };

    let err = auth::register(&client, &client, &input).await.unwrap_err();
    match err {
        ApiError::FieldErrors { fields, .. } => {
            assert!(fields.contains_key("userId"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn unauthorized_request_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bills/menu"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"message": "토큰이 만료되었습니다."}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, store, _dir) = client_for(&server);
    store
        .set(StorageTier::Durable, TOKEN_KEY, "stale")
        .expect("set token");
    store
        .set(StorageTier::Durable, "refreshToken", "r1")
        .expect("set refresh");

    let err = bill::fetch_bill_menu(&client).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized { .. }));
}

fn plan(code: &str, fee: u32) -> Product {
    Product {
        product_code: code.to_string(),
        product_name: format!("{code} 플랜"),
        monthly_fee: fee,
        data_allowance: "무제한".to_string(),
        voice_allowance: "무제한".to_string(),
        sms_allowance: "기본제공".to_string(),
        operator_code: "MVNO".to_string(),
        description: None,
        available: true,
    }
}

#[tokio::test]
async fn wizard_happy_path_commits_and_fetches_authoritative_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/products/change/validation"))
        .and(body_partial_json(json!({
            "lineNumber": "01012345678",
            "currentProductCode": "PLAN-A",
            "targetProductCode": "PLAN-B"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "validationResult": "SUCCESS",
                "validationDetails": [
                    {"checkType": "CONTRACT", "result": "PASS", "message": "약정 확인 완료"},
                    {"checkType": "ELIGIBILITY", "result": "PASS", "message": "자격 검증 완료"}
                ]
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    // Commit also wants the bare digits while the follow-up customer fetch
    // below keeps the dashed form.
    Mock::given(method("POST"))
        .and(path("/products/change"))
        .and(body_partial_json(json!({"lineNumber": "01012345678"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "requestId": "REQ-77",
                "processStatus": "COMPLETED",
                "resultCode": "0000",
                "resultMessage": "정상 처리되었습니다.",
                "changedProduct": sample_product("PLAN-B", "PLAN-B 플랜", 59000),
                "processedAt": "2025-09-01T00:00:00Z"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/customer"))
        .and(query_param("lineNumber", "010-1234-5678"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "customerId": "c1",
                "lineNumber": "010-1234-5678",
                "customerName": "홍길동",
                "currentProduct": sample_product("PLAN-B", "5G 프리미엄 플랜", 59000),
                "lineStatus": "ACTIVE",
                "contractInfo": null
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _store, _dir) = client_for(&server);
    let mut wizard = ChangeWizard::begin("010-1234-5678", plan("PLAN-A", 49000));
    wizard.select(plan("PLAN-B", 59000)).expect("select");

    wizard
        .run_validation(&client, None)
        .await
        .expect("validation");
    assert_eq!(wizard.state(), WizardState::Validated { passed: true });

    let summary = wizard.request_confirmation().expect("confirm");
    assert_eq!(summary.fee_delta, 10000);

    let today = NaiveDate::from_ymd_opt(2025, 9, 15).expect("date");
    let outcome = wizard.apply(&client, today).await.expect("apply");

    assert!(outcome.success);
    assert_eq!(wizard.state(), WizardState::Completed { success: true });
    // Authoritative follow-up record wins over the commit echo.
    assert_eq!(outcome.displayed_product.product_name, "5G 프리미엄 플랜");
    assert_eq!(
        outcome.applied_from,
        NaiveDate::from_ymd_opt(2025, 10, 1).expect("date")
    );
}

#[tokio::test]
async fn wizard_failed_validation_never_offers_commit() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/products/change/validation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "validationResult": "FAILURE",
                "failureReason": "약정 기간 중"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/products/change"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _store, _dir) = client_for(&server);
    let mut wizard = ChangeWizard::begin("010-1234-5678", plan("PLAN-A", 49000));
    wizard.select(plan("PLAN-B", 59000)).expect("select");

    let validation = wizard
        .run_validation(&client, None)
        .await
        .expect("validation call")
        .clone();
    assert_eq!(
        validation.failure_reason.as_deref(),
        Some("약정 기간 중")
    );
    assert_eq!(wizard.state(), WizardState::Validated { passed: false });

    assert!(matches!(
        wizard.request_confirmation(),
        Err(WizardError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn wizard_failed_commit_still_reports_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/products/change/validation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"validationResult": "SUCCESS"}
        })))
        .mount(&server)
        .await;
    // COMPLETED alone is not success; the result code must be "0000" too.
    Mock::given(method("POST"))
        .and(path("/products/change"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "requestId": "REQ-78",
                "processStatus": "COMPLETED",
                "resultCode": "4002",
                "resultMessage": "처리에 실패했습니다.",
                "changedProduct": null,
                "processedAt": "2025-09-01T00:00:00Z"
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products/customer"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (client, _store, _dir) = client_for(&server);
    let mut wizard = ChangeWizard::begin("010-1234-5678", plan("PLAN-A", 49000));
    wizard.select(plan("PLAN-B", 59000)).expect("select");
    wizard
        .run_validation(&client, None)
        .await
        .expect("validation");
    wizard.request_confirmation().expect("confirm");

    let today = NaiveDate::from_ymd_opt(2025, 9, 15).expect("date");
    let outcome = wizard.apply(&client, today).await.expect("apply");

    assert!(!outcome.success);
    assert_eq!(wizard.state(), WizardState::Completed { success: false });
    // Without success there is no follow-up fetch; the selection stands in.
    assert_eq!(outcome.displayed_product.product_code, "PLAN-B");
}

#[tokio::test]
async fn available_products_filter_by_current_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products/available"))
        .and(query_param("currentProductCode", "PLAN-A"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "products": [
                    sample_product("PLAN-B", "5G 프리미엄 플랜", 59000),
                    sample_product("PLAN-C", "5G 라이트 플랜", 39000)
                ],
                "totalCount": 2
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (client, _store, _dir) = client_for(&server);
    let available = product::fetch_available_products(&client, Some("PLAN-A"))
        .await
        .expect("products");
    assert_eq!(available.products.len(), 2);
    assert_eq!(available.total_count, 2);
}
