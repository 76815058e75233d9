use axum::http::HeaderMap;

use crate::{error::AppError, state::AppState};

/// Admin boundary: requests must carry the shared admin key, either as
/// `x-admin-key` or as a bearer token. Session handling and user identity
/// live in the public web app; this service only gates its admin surface.
pub fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let Some(expected) = state
        .config
        .admin_api_key
        .as_deref()
        .filter(|key| !key.is_empty())
    else {
        return Err(AppError::Dependency(
            "ADMIN_API_KEY is not configured.".to_string(),
        ));
    };

    let provided = headers
        .get("x-admin-key")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| {
            headers
                .get(axum::http::header::AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(str::trim)
        });

    match provided {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => Ok(()),
        Some(_) => Err(AppError::Forbidden("Invalid admin key.".to_string())),
        None => Err(AppError::Unauthorized(
            "Missing admin credentials.".to_string(),
        )),
    }
}

fn constant_time_eq(left: &[u8], right: &[u8]) -> bool {
    if left.len() != right.len() {
        return false;
    }
    left.iter()
        .zip(right)
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::constant_time_eq;

    #[test]
    fn compares_keys_without_prefix_matching() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
        assert!(!constant_time_eq(b"secre", b"secret"));
        assert!(!constant_time_eq(b"", b"secret"));
    }
}
