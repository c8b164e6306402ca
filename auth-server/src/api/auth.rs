// auth-server/src/api/auth.rs
use actix_web::{get, http::header, post, web, HttpRequest, HttpResponse};
use common::models::Identity;
use common::{
    AuthError, AuthResponse, ChallengeQuery, ChallengeResponse, ChangePasswordRequest, LoginRequest,
    LogoutResponse, RefreshTokenRequest, RegisterRequest, WalletLoginRequest,
};

use crate::error::ApiError;
use crate::service::AuthService;

/// Extract the bearer credential from the Authorization header
fn bearer_token(req: &HttpRequest) -> Option<String> {
    let value = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return None;
    }
    Some(token.trim().to_string())
}

async fn authenticated(req: &HttpRequest, service: &AuthService) -> Result<Identity, ApiError> {
    let token = bearer_token(req).ok_or_else(|| ApiError::bearer(AuthError::Unauthenticated))?;
    service.authenticate(&token).await.map_err(ApiError::bearer)
}

#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    let identifier = request.identifier.clone();

    match service.login(request).await {
        Ok((tokens, user)) => {
            tracing::info!("Login succeeded for {}", user.id);
            Ok(HttpResponse::Ok().json(AuthResponse::ok("Login successful", Some(tokens), Some(user))))
        }
        Err(e) => {
            tracing::info!("Login failed for {}: {}", identifier, e);
            Err(e.into())
        }
    }
}

#[post("/register")]
pub async fn register(
    body: web::Json<RegisterRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ApiError> {
    let registration = service.register(body.into_inner()).await.map_err(|e| {
        tracing::info!("Registration failed: {}", e);
        ApiError::from(e)
    })?;

    let message = if registration.tokens.is_some() {
        "User registered successfully"
    } else {
        "Registration successful. Please verify your email address"
    };
    Ok(HttpResponse::Ok().json(AuthResponse::ok(
        message,
        registration.tokens,
        Some(registration.identity),
    )))
}

#[post("/wallet-login")]
pub async fn wallet_login(
    body: web::Json<WalletLoginRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    let address = request.wallet_address.clone();

    match service.wallet_login(request).await {
        Ok((tokens, user)) => Ok(HttpResponse::Ok().json(AuthResponse::ok(
            "Wallet login successful",
            Some(tokens),
            Some(user),
        ))),
        Err(e) => {
            tracing::info!("Wallet login failed for {}: {}", address, e);
            Err(e.into())
        }
    }
}

#[post("/refresh")]
pub async fn refresh(
    body: web::Json<RefreshTokenRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ApiError> {
    let (tokens, user) = service.refresh(&body.refresh_token).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::ok(
        "Tokens refreshed successfully",
        Some(tokens),
        Some(user),
    )))
}

/// Revokes by bearer token, or by the refresh token in the body when the
/// access token is no longer usable.
#[post("/logout")]
pub async fn logout(
    req: HttpRequest,
    body: Option<web::Json<RefreshTokenRequest>>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ApiError> {
    match (authenticated(&req, &service).await, body) {
        (Ok(identity), _) => {
            service.logout(identity.id).await?;
        }
        (Err(_), Some(body)) => {
            service.revoke(&body.refresh_token).await?;
        }
        (Err(e), None) => return Err(e),
    }

    Ok(HttpResponse::Ok().json(LogoutResponse {
        success: true,
        message: "Logged out successfully".into(),
        code: None,
    }))
}

#[get("/me")]
pub async fn me(req: HttpRequest, service: web::Data<AuthService>) -> Result<HttpResponse, ApiError> {
    let identity = authenticated(&req, &service).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::ok("Authenticated", None, Some(identity))))
}

#[post("/change-password")]
pub async fn change_password(
    req: HttpRequest,
    body: web::Json<ChangePasswordRequest>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ApiError> {
    let identity = authenticated(&req, &service).await?;
    service.change_password(&identity, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::ok("Password changed successfully", None, None)))
}

#[get("/challenge")]
pub async fn challenge(
    query: web::Query<ChallengeQuery>,
    service: web::Data<AuthService>,
) -> Result<HttpResponse, ApiError> {
    let challenge = service.challenge(&query.address)?;
    Ok(HttpResponse::Ok().json(ChallengeResponse {
        success: true,
        message: "Sign this message with your wallet".into(),
        challenge: Some(challenge),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_bearer_parsing() {
        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def"));

        let req = TestRequest::default()
            .insert_header((header::AUTHORIZATION, "Basic abc"))
            .to_http_request();
        assert!(bearer_token(&req).is_none());

        let req = TestRequest::default().to_http_request();
        assert!(bearer_token(&req).is_none());
    }
}
