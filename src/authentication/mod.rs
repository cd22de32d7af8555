use jsonwebtoken::{Algorithm, DecodingKey, Validation};

use crate::JwtClaims;

/// Audience claim every teacher token must carry.
pub const AUDIENCE: &str = "lectern";

/// Rejection carrier for authentication and authorization failures, so the
/// recovery handler can answer them distinctly from lookups that missed.
#[derive(Debug)]
pub struct AuthError(pub String);

impl warp::reject::Reject for AuthError {}

/// Validate a presenter's `Authorization: Bearer <jwt>` header and return
/// the claims. The subject is the teacher's identity, which every session
/// mutation is checked against downstream.
pub fn verify_teacher(
    authorization: &str,
    signing_key: &[u8],
) -> Result<JwtClaims, warp::Rejection> {
    let token = authorization
        .strip_prefix("Bearer ")
        .or_else(|| authorization.strip_prefix("bearer "))
        .unwrap_or(authorization);

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUDIENCE]);

    let token = jsonwebtoken::decode::<JwtClaims>(
        token,
        &DecodingKey::from_secret(signing_key),
        &validation,
    )
    .map_err(|e| {
        error!("Teacher rejected due to JWT error: {e}");
        warp::reject::custom(AuthError("invalid authorization token".to_string()))
    })?;

    Ok(token.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token_for(sub: &str, aud: &str, key: &[u8]) -> String {
        let claims = JwtClaims {
            sub: sub.to_string(),
            exp: (chrono::Utc::now().timestamp() + 3600) as usize,
            aud: aud.to_string(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(key)).unwrap()
    }

    #[test]
    fn accepts_a_valid_bearer_token() {
        let token = token_for("alice", AUDIENCE, b"secret");
        let claims = verify_teacher(&format!("Bearer {token}"), b"secret").unwrap();
        assert_eq!(claims.sub, "alice");
    }

    #[test]
    fn rejects_a_token_signed_with_another_key() {
        let token = token_for("alice", AUDIENCE, b"other");
        assert!(verify_teacher(&format!("Bearer {token}"), b"secret").is_err());
    }

    #[test]
    fn rejects_a_token_for_another_audience() {
        let token = token_for("alice", "somewhere-else", b"secret");
        assert!(verify_teacher(&format!("Bearer {token}"), b"secret").is_err());
    }
}
