use crate::config::AdminCredentials;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Basic, Authorization, HeaderMapExt};
use sha2::{Digest, Sha256};

const REALM: &str = r#"Basic realm="Authorization Required""#;

pub async fn require_admin(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.admin.as_ref() else {
        tracing::warn!("Admin request rejected: no admin credentials configured");
        return unauthorized();
    };

    let credentials = request.headers().typed_get::<Authorization<Basic>>();
    match credentials {
        Some(Authorization(basic)) if credentials_match(expected, basic.username(), basic.password()) => {
            next.run(request).await
        }
        Some(_) => {
            tracing::warn!("Admin request rejected: invalid credentials");
            unauthorized()
        }
        None => unauthorized(),
    }
}

/// Compares SHA-256 digests so the comparison time does not depend on where
/// the supplied strings first differ.
pub fn credentials_match(expected: &AdminCredentials, login: &str, password: &str) -> bool {
    let login_ok = digest_eq(login, &expected.login);
    let password_ok = digest_eq(password, &expected.password);
    login_ok & password_ok
}

fn digest_eq(given: &str, expected: &str) -> bool {
    let given = Sha256::digest(given.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    given
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

fn unauthorized() -> Response {
    let mut response = StatusCode::UNAUTHORIZED.into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(REALM));
    response
}
