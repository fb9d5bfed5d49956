use rand::RngExt;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{ApiClient, ApiError};
use crate::token::decode_expiry;
use crate::types::{
    ApiEnvelope, FieldErrorMap, PERMISSION_BILL_INQUIRY, PERMISSION_PRODUCT_CHANGE, Session,
    UserPatch, UserProfile, dashless,
};

pub const REGISTER_SUCCESS_MESSAGE: &str = "회원가입이 완료되었습니다. 로그인해주세요.";

/// Login form input.
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub user_id: String,
    pub password: String,
    pub auto_login: bool,
}

/// Local pre-submit validation. Nothing goes to the backend until this
/// passes.
pub fn validate_login(input: &LoginInput) -> Result<(), String> {
    if input.user_id.trim().is_empty() {
        return Err("아이디를 입력해주세요.".to_string());
    }
    if input.user_id.len() < 3 || input.user_id.len() > 20 {
        return Err("아이디는 3~20자로 입력해주세요.".to_string());
    }
    if input.password.trim().is_empty() {
        return Err("비밀번호를 입력해주세요.".to_string());
    }
    if input.password.len() < 8 {
        return Err("비밀번호는 8자 이상 입력해주세요.".to_string());
    }
    Ok(())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    user_id: &'a str,
    password: &'a str,
    auto_login: bool,
}

/// The login endpoint replies with a bare token payload, not the usual
/// success envelope.
#[derive(Debug, Deserialize)]
struct LoginWire {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    user_id: String,
    #[serde(default)]
    customer_id: String,
    #[serde(default)]
    line_number: String,
}

/// Authenticate and normalize the snake_case wire payload into a [`Session`].
///
/// The profile starts sparse: the backend returns identifiers only, so
/// `user_name` is empty and `permissions` stays empty until the profile
/// fetch enriches it.
pub async fn login(client: &ApiClient, input: &LoginInput, now: i64) -> Result<Session, ApiError> {
    validate_login(input).map_err(ApiError::Validation)?;

    let wire: LoginWire = client
        .post(
            "/auth/login",
            &LoginRequest {
                user_id: &input.user_id,
                password: &input.password,
                auto_login: input.auto_login,
            },
        )
        .await?;

    if wire.access_token.is_empty() || wire.user_id.is_empty() {
        return Err(ApiError::Message(
            "로그인 응답에 필요한 정보가 없습니다.".to_string(),
        ));
    }

    // The token's own exp claim wins when present; opaque tokens fall back
    // to the advertised lifetime.
    let expires_at = decode_expiry(&wire.access_token).unwrap_or(now + wire.expires_in);

    info!(user_id = %wire.user_id, "login succeeded");
    Ok(Session {
        user: UserProfile {
            user_id: wire.user_id,
            user_name: String::new(),
            phone_number: wire.line_number.clone(),
            customer_id: wire.customer_id,
            line_number: wire.line_number,
            permissions: Vec::new(),
        },
        access_token: wire.access_token,
        refresh_token: wire.refresh_token,
        expires_at,
    })
}

/// Best-effort server-side invalidation. A failure here never blocks the
/// client-side logout.
pub async fn logout(client: &ApiClient) {
    if let Err(err) = client
        .post_no_content("/auth/logout", &serde_json::json!({}))
        .await
    {
        warn!(%err, "logout notification failed; proceeding with client-side logout");
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshedToken {
    pub access_token: String,
    pub expires_in: i64,
}

/// Exchange the refresh token for a new access token.
///
/// Contract only for now: nothing in the 401 path calls this, so an expired
/// access token still surfaces as an authentication failure.
pub async fn refresh_token(
    client: &ApiClient,
    refresh_token: &str,
) -> Result<RefreshedToken, ApiError> {
    let envelope: ApiEnvelope<RefreshedToken> = client
        .post(
            "/auth/refresh",
            &serde_json::json!({ "refreshToken": refresh_token }),
        )
        .await?;
    envelope.into_data("토큰 갱신에 실패했습니다.")
}

/// Fetch the authoritative profile for a user. Returned as a patch so the
/// caller merges it over the sparse login-time profile.
pub async fn fetch_user_info(client: &ApiClient, user_id: &str) -> Result<UserPatch, ApiError> {
    client.get(&format!("/users/{user_id}")).await
}

/// Registration form input.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub user_id: String,
    pub user_name: String,
    pub line_number: String,
    pub password: String,
    pub confirm_password: String,
}

/// Field-level registration validation. Every failing field gets its own
/// message rather than stopping at the first.
pub fn validate_register(input: &RegisterInput) -> Result<(), FieldErrorMap> {
    let mut errors = FieldErrorMap::new();

    if input.user_id.trim().is_empty() {
        errors.insert("userId".to_string(), "사용자ID를 입력해주세요".to_string());
    }
    if input.user_name.trim().is_empty() {
        errors.insert("userName".to_string(), "사용자명을 입력해주세요".to_string());
    }
    if input.line_number.trim().is_empty() {
        errors.insert(
            "lineNumber".to_string(),
            "전화번호를 입력해주세요".to_string(),
        );
    } else if !phone_number_is_valid(&input.line_number) {
        errors.insert(
            "lineNumber".to_string(),
            "올바른 전화번호 형식이 아닙니다 (010-1234-5678)".to_string(),
        );
    }
    if input.password.trim().is_empty() {
        errors.insert("password".to_string(), "암호를 입력해주세요".to_string());
    } else if input.password.len() < 6 {
        errors.insert(
            "password".to_string(),
            "암호는 6자 이상이어야 합니다".to_string(),
        );
    }
    if input.confirm_password.trim().is_empty() {
        errors.insert(
            "confirmPassword".to_string(),
            "암호확인을 입력해주세요".to_string(),
        );
    } else if input.password != input.confirm_password {
        errors.insert(
            "confirmPassword".to_string(),
            "암호가 일치하지 않습니다".to_string(),
        );
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn phone_number_is_valid(line_number: &str) -> bool {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    PATTERN
        .get_or_init(|| regex::Regex::new(r"^010-\d{4}-\d{4}$").expect("phone pattern is valid"))
        .is_match(line_number)
}

/// 20-character customer id: the last 6 digits of the current epoch-millis
/// timestamp plus 14 random alphanumerics.
pub fn generate_customer_id() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let millis = chrono::Utc::now().timestamp_millis().to_string();
    let timestamp: String = millis
        .chars()
        .skip(millis.len().saturating_sub(6))
        .collect();
    let mut rng = rand::rng();
    let random: String = (0..14)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect();
    format!("{timestamp}{random}")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest<'a> {
    user_id: &'a str,
    customer_id: &'a str,
    line_number: &'a str,
    user_name: &'a str,
    password: &'a str,
    permissions: [&'a str; 2],
}

/// Create an account, then seed the mock backend for the new customer.
///
/// Seeding is best-effort: its failure is logged and never turns a
/// successful registration into an error. Returns the generated customer id.
pub async fn register(
    user_client: &ApiClient,
    kos_client: &ApiClient,
    input: &RegisterInput,
) -> Result<String, ApiError> {
    if let Err(fields) = validate_register(input) {
        return Err(ApiError::FieldErrors {
            message: "입력값을 확인해주세요.".to_string(),
            fields,
        });
    }

    let customer_id = generate_customer_id();
    user_client
        .post_no_content(
            "/auth/register",
            &RegisterRequest {
                user_id: &input.user_id,
                customer_id: &customer_id,
                line_number: &input.line_number,
                user_name: &input.user_name,
                password: &input.password,
                permissions: [PERMISSION_BILL_INQUIRY, PERMISSION_PRODUCT_CHANGE],
            },
        )
        .await?;

    let seed = serde_json::json!({
        "customerId": customer_id,
        "lineNumber": dashless(&input.line_number),
    });
    match kos_client.post_no_content("/kos/mock-datas", &seed).await {
        Ok(()) => info!(%customer_id, "mock data seeded for new customer"),
        Err(err) => warn!(%err, "mock data seeding failed; registration still succeeded"),
    }

    Ok(customer_id)
}
