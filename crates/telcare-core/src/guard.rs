use crate::state::AuthStore;

/// Route the portal lands on after login.
pub const DEFAULT_ROUTE: &str = "/bill";
pub const LOGIN_ROUTE: &str = "/login";

/// A navigation attempt to be screened.
#[derive(Debug, Clone)]
pub struct RouteRequest<'a> {
    pub path: &'a str,
    /// Permission the target route demands, if any.
    pub required_permission: Option<&'a str>,
}

/// Outcome of screening a navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Not authenticated: send to login, remembering where the user was
    /// headed so login can return there.
    RedirectToLogin { from: String },
    /// Authenticated but lacking the required permission.
    RedirectToDefault,
}

/// Screen a navigation attempt against the current auth state.
///
/// Pure over its inputs; the decision changes only when the auth state or
/// the request does.
pub fn evaluate(auth: &AuthStore, request: &RouteRequest<'_>) -> GuardDecision {
    if !auth.is_authenticated() {
        return GuardDecision::RedirectToLogin {
            from: request.path.to_string(),
        };
    }

    if let Some(required) = request.required_permission {
        let permitted = auth
            .user()
            .map(|user| user.has_permission(required))
            .unwrap_or(false);
        if !permitted {
            return GuardDecision::RedirectToDefault;
        }
    }

    GuardDecision::Allow
}
