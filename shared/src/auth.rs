use aws_sdk_cognitoidentityprovider::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType, AuthenticationResultType};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use condo_core::session::{AuthTokens, LoginRequest, RefreshRequest, SignUpRequest};
use condo_core::types::{Profile, UpdateProfileRequest};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use crate::error::ApiError;
use crate::{profiles, roles, store, AppState};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize)]
pub struct SignUpResponse {
    pub user_id: String,
    pub message: &'static str,
}

/// Compute the SECRET_HASH for Cognito authentication
fn compute_secret_hash(username: &str, client_id: &str, client_secret: &str) -> Result<String, ApiError> {
    let message = format!("{}{}", username, client_id);
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .map_err(|_| ApiError::Config("COGNITO_CLIENT_SECRET is not a valid HMAC key"))?;
    mac.update(message.as_bytes());
    Ok(general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

/// User-facing text for Cognito error codes; anything else gets `fallback`.
fn cognito_message(code: Option<&str>, fallback: &'static str) -> &'static str {
    match code {
        Some("NotAuthorizedException") => "Incorrect email or password",
        Some("UserNotConfirmedException") => "Please verify your email before logging in",
        Some("UserNotFoundException") => "No account found with this email",
        Some("PasswordResetRequiredException") => "Password reset required",
        Some("TooManyRequestsException") => "Too many attempts. Please try again later",
        Some("InvalidPasswordException") => "Password does not meet the account policy",
        Some("UsernameExistsException") => "An account with this email already exists",
        Some("InvalidParameterException") => "Invalid email or password format",
        _ => fallback,
    }
}

fn auth_error<E, R>(err: SdkError<E, R>, fallback: &'static str, to: fn(String) -> ApiError) -> ApiError
where
    E: ProvideErrorMetadata + std::fmt::Debug,
    R: std::fmt::Debug,
{
    tracing::error!("Cognito error: {:?}", err);
    to(cognito_message(err.code(), fallback).to_string())
}

fn tokens(result: &AuthenticationResultType, refresh_token: Option<&str>) -> AuthTokens {
    AuthTokens {
        id_token: result.id_token().unwrap_or_default().to_string(),
        access_token: result.access_token().unwrap_or_default().to_string(),
        // Cognito does not rotate the refresh token on REFRESH_TOKEN_AUTH.
        refresh_token: result
            .refresh_token()
            .or(refresh_token)
            .unwrap_or_default()
            .to_string(),
        expires_in: result.expires_in(),
    }
}

/// Handle user login with Cognito
pub async fn login(state: &AppState, req: LoginRequest) -> Result<AuthTokens, ApiError> {
    let (client_id, client_secret) = state.config.cognito_credentials()?;
    tracing::info!("Authenticating user: {}", req.email);

    let secret_hash = compute_secret_hash(&req.email, client_id, client_secret)?;

    let response = state
        .cognito_client
        .initiate_auth()
        .auth_flow(AuthFlowType::UserPasswordAuth)
        .client_id(client_id)
        .auth_parameters("USERNAME", &req.email)
        .auth_parameters("PASSWORD", &req.password)
        .auth_parameters("SECRET_HASH", &secret_hash)
        .send()
        .await
        .map_err(|e| auth_error(e, "Login failed. Please check your credentials", ApiError::Unauthorized))?;

    let result = response.authentication_result().ok_or_else(|| {
        tracing::error!("No authentication result returned");
        ApiError::Unauthorized("No authentication result returned".to_string())
    })?;

    tracing::info!("Authentication successful for user: {}", req.email);
    Ok(tokens(result, None))
}

/// Creates the identity, then its profile and role rows, then persists the
/// unit and block in a second update.
pub async fn signup(state: &AppState, req: SignUpRequest) -> Result<SignUpResponse, ApiError> {
    req.validate()?;
    let (client_id, client_secret) = state.config.cognito_credentials()?;
    let table_name = state.table_name();
    tracing::info!("Signing up user: {} as {}", req.email, req.role);

    let secret_hash = compute_secret_hash(&req.email, client_id, client_secret)?;

    let response = state
        .cognito_client
        .sign_up()
        .client_id(client_id)
        .username(&req.email)
        .password(&req.password)
        .secret_hash(&secret_hash)
        .user_attributes(AttributeType::builder().name("email").value(&req.email).build()?)
        .user_attributes(AttributeType::builder().name("name").value(&req.full_name).build()?)
        .send()
        .await
        .map_err(|e| auth_error(e, "Signup failed. Please try again", ApiError::BadRequest))?;

    let user_id = response.user_sub().to_string();
    tracing::info!("Signup successful for user: {} ({})", req.email, user_id);

    if let Some(user_pool_id) = state.config.cognito_user_pool_id.as_deref() {
        if let Err(e) = state
            .cognito_client
            .admin_confirm_sign_up()
            .user_pool_id(user_pool_id)
            .username(&req.email)
            .send()
            .await
        {
            tracing::error!("Failed to auto-confirm user: {:?}", e);
            // Don't fail signup, user can still verify via email
        } else {
            tracing::info!("User auto-confirmed: {}", req.email);
        }
    } else {
        tracing::warn!("COGNITO_USER_POOL_ID not set; skipping auto-confirm");
    }

    let profile = Profile {
        user_id: user_id.clone(),
        full_name: req.full_name.trim().to_string(),
        email: req.email.clone(),
        phone: String::new(),
        avatar_url: None,
        unit: String::new(),
        block: String::new(),
        created_at: Utc::now(),
    };
    let assignment = roles::RoleAssignment {
        user_id: user_id.clone(),
        role: req.role,
    };

    state
        .dynamo_client
        .transact_write_items()
        .transact_items(store::create_once(table_name, profiles::to_item(&profile))?)
        .transact_items(store::create_once(table_name, roles::to_item(&assignment))?)
        .send()
        .await?;

    if let Some((unit, block)) = req.location() {
        let update = UpdateProfileRequest {
            unit: Some(unit),
            block: Some(block),
            ..Default::default()
        };
        if let Err(e) = profiles::update_profile(&state.dynamo_client, table_name, &user_id, update).await {
            tracing::error!("Failed to store unit/block for {}: {}", user_id, e);
            // Don't fail signup, the profile can be completed later
        }
    }

    Ok(SignUpResponse {
        user_id,
        message: "Signup successful",
    })
}

pub async fn refresh(state: &AppState, req: RefreshRequest) -> Result<AuthTokens, ApiError> {
    let (client_id, client_secret) = state.config.cognito_credentials()?;
    let secret_hash = compute_secret_hash(&req.email, client_id, client_secret)?;

    let response = state
        .cognito_client
        .initiate_auth()
        .auth_flow(AuthFlowType::RefreshTokenAuth)
        .client_id(client_id)
        .auth_parameters("REFRESH_TOKEN", &req.refresh_token)
        .auth_parameters("SECRET_HASH", &secret_hash)
        .send()
        .await
        .map_err(|e| auth_error(e, "Session expired. Please log in again", ApiError::Unauthorized))?;

    let result = response
        .authentication_result()
        .ok_or_else(|| ApiError::Unauthorized("Session expired. Please log in again".to_string()))?;
    Ok(tokens(result, Some(&req.refresh_token)))
}

/// Revokes every token of the identity behind `access_token`.
pub async fn logout(state: &AppState, access_token: &str) -> Result<(), ApiError> {
    state
        .cognito_client
        .global_sign_out()
        .access_token(access_token)
        .send()
        .await
        .map_err(|e| auth_error(e, "Logout failed", ApiError::Unauthorized))?;
    tracing::info!("User signed out");
    Ok(())
}
