use crate::accounts;
use crate::error::{json_response, ApiError};
use crate::types::{
    Account, AccountSummary, ExpertProfile, LoginRequest, LoginResponse, RegisterRequest, Role,
};
use aws_sdk_cognitoidentityprovider::Client as CognitoClient;
use aws_sdk_dynamodb::Client as DynamoClient;
use base64::{engine::general_purpose, Engine as _};
use hmac::{Hmac, Mac};
use lambda_http::{http::StatusCode, Body, Error, Response};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Compute the SECRET_HASH for Cognito authentication
fn compute_secret_hash(username: &str, client_id: &str, client_secret: &str) -> String {
    let message = format!("{}{}", username, client_id);
    let mut mac = HmacSha256::new_from_slice(client_secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(message.as_bytes());
    let result = mac.finalize();
    general_purpose::STANDARD.encode(result.into_bytes())
}

/// Register a new account. A plain registration creates a contributor; one
/// that supplies an expert profile together with an id-proof document enters
/// the pipeline as an expert applicant. Roles never change afterwards except
/// through the approval engine.
pub async fn register(
    cognito_client: &CognitoClient,
    dynamo_client: &DynamoClient,
    table_name: &str,
    client_id: &str,
    client_secret: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    tracing::info!("Registration request received");

    let req: RegisterRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to parse request body: {}", e);
            return ApiError::Validation(format!("invalid request body: {e}")).into_response();
        }
    };

    if req.username.trim().is_empty() || req.full_name.trim().is_empty() {
        return ApiError::Validation("username and full_name are required".to_string())
            .into_response();
    }

    let (role, expert_profile) = match req.expert_profile {
        None => (Role::Contributor, None),
        Some(profile) => {
            let id_proof_url = match profile.id_proof_url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => url.to_string(),
                _ => {
                    return ApiError::Validation(
                        "id_proof_url is required when applying as an expert".to_string(),
                    )
                    .into_response();
                }
            };
            if profile.expertise_area.trim().is_empty() || profile.workplace.trim().is_empty() {
                return ApiError::Validation(
                    "expertise_area and workplace are required when applying as an expert"
                        .to_string(),
                )
                .into_response();
            }
            (
                Role::ExpertApplicant,
                Some(ExpertProfile {
                    expertise_area: profile.expertise_area.trim().to_string(),
                    workplace: profile.workplace.trim().to_string(),
                    years_of_experience: profile.years_of_experience,
                    bio: profile.bio,
                    id_proof_url,
                }),
            )
        }
    };

    let secret_hash = compute_secret_hash(&req.username, client_id, client_secret);

    let mut signup = cognito_client
        .sign_up()
        .client_id(client_id)
        .username(&req.username)
        .password(&req.password)
        .secret_hash(&secret_hash);
    if let Some(email) = &req.email {
        signup = signup.user_attributes(
            aws_sdk_cognitoidentityprovider::types::AttributeType::builder()
                .name("email")
                .value(email)
                .build()?,
        );
    }

    let signup_result = match signup.send().await {
        Ok(response) => response,
        Err(e) => {
            let error_message = format!("{:?}", e);
            tracing::error!("Cognito signup error: {}", error_message);

            let user_message = if error_message.contains("InvalidPasswordException") {
                "Password must contain at least 8 characters with uppercase, lowercase, number, and special character".to_string()
            } else if error_message.contains("UsernameExistsException") {
                "An account with this username already exists".to_string()
            } else if error_message.contains("InvalidParameterException") {
                "Invalid username or password format".to_string()
            } else {
                "Registration failed. Please check your details and try again.".to_string()
            };

            return ApiError::Validation(user_message).into_response();
        }
    };

    let account = Account {
        account_id: signup_result.user_sub().to_string(),
        username: req.username.trim().to_string(),
        full_name: req.full_name.trim().to_string(),
        email: req.email,
        phone_number: req.phone_number,
        role,
        expert_profile,
        created_at: chrono::Utc::now().to_rfc3339(),
    };

    if let Err(e) = accounts::put_account(dynamo_client, table_name, &account).await {
        return e.into_response();
    }

    tracing::info!(
        "Registered {} as {}",
        account.username,
        account.role.as_str()
    );

    let message = match account.role {
        Role::ExpertApplicant => {
            "Registration received. Your expert application is awaiting administrator review."
        }
        _ => "Account registered successfully!",
    };

    json_response(
        StatusCode::CREATED,
        &serde_json::json!({
            "message": message,
            "account": AccountSummary {
                account_id: account.account_id,
                username: account.username,
                role: account.role,
            },
        }),
    )
}

/// Authenticate against Cognito and return tokens plus the account's
/// current role.
pub async fn login(
    cognito_client: &CognitoClient,
    dynamo_client: &DynamoClient,
    table_name: &str,
    client_id: &str,
    client_secret: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    tracing::info!("Login request received");

    let req: LoginRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!("Failed to parse request body: {}", e);
            return ApiError::Validation(format!("invalid request body: {e}")).into_response();
        }
    };

    let secret_hash = compute_secret_hash(&req.username, client_id, client_secret);

    let auth_result = cognito_client
        .initiate_auth()
        .auth_flow(aws_sdk_cognitoidentityprovider::types::AuthFlowType::UserPasswordAuth)
        .client_id(client_id)
        .auth_parameters("USERNAME", &req.username)
        .auth_parameters("PASSWORD", &req.password)
        .auth_parameters("SECRET_HASH", &secret_hash)
        .send()
        .await;

    let response = match auth_result {
        Ok(response) => response,
        Err(e) => {
            let error_message = format!("{:?}", e);
            tracing::error!("Cognito authentication error: {}", error_message);

            let user_message = if error_message.contains("NotAuthorizedException") {
                "Incorrect username or password".to_string()
            } else if error_message.contains("UserNotFoundException") {
                "No account found with this username".to_string()
            } else if error_message.contains("TooManyRequestsException") {
                "Too many login attempts. Please try again later".to_string()
            } else {
                "Login failed. Please check your credentials".to_string()
            };

            return Ok(Response::builder()
                .status(StatusCode::UNAUTHORIZED)
                .header("Content-Type", "application/json")
                .header("Access-Control-Allow-Origin", "*")
                .body(
                    serde_json::json!({"error": "AuthenticationFailed", "message": user_message})
                        .to_string()
                        .into(),
                )
                .map_err(Box::new)?);
        }
    };

    let Some(tokens) = response.authentication_result() else {
        tracing::error!("No authentication result returned");
        return Ok(Response::builder()
            .status(StatusCode::UNAUTHORIZED)
            .header("Content-Type", "application/json")
            .header("Access-Control-Allow-Origin", "*")
            .body(
                serde_json::json!({
                    "error": "AuthenticationFailed",
                    "message": "No authentication result returned"
                })
                .to_string()
                .into(),
            )
            .map_err(Box::new)?);
    };

    // Resolve the handle to the account record so the client learns its role.
    let account = match accounts::find_account_id_by_username(dynamo_client, table_name, &req.username)
        .await
    {
        Ok(account_id) => match accounts::get_account(dynamo_client, table_name, &account_id).await
        {
            Ok(account) => account,
            Err(e) => return e.into_response(),
        },
        Err(e) => return e.into_response(),
    };

    tracing::info!("Authentication successful for {}", account.username);

    let login_response = LoginResponse {
        id_token: tokens.id_token().unwrap_or_default().to_string(),
        access_token: tokens.access_token().unwrap_or_default().to_string(),
        refresh_token: tokens.refresh_token().unwrap_or_default().to_string(),
        expires_in: tokens.expires_in(),
        account: AccountSummary {
            account_id: account.account_id,
            username: account.username,
            role: account.role,
        },
    };

    json_response(StatusCode::OK, &login_response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_hash_is_deterministic() {
        let a = compute_secret_hash("neelam", "client-id", "client-secret");
        let b = compute_secret_hash("neelam", "client-id", "client-secret");
        assert_eq!(a, b);
        assert_ne!(a, compute_secret_hash("other", "client-id", "client-secret"));
    }
}
