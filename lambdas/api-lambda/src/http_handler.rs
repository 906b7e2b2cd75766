use hillherbs_shared::access::{self, Decision, RedirectHint};
use hillherbs_shared::types::Capability;
use hillherbs_shared::{accounts, approvals, auth, submissions, AppState};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use std::env;
use std::sync::Arc;

/// Main Lambda handler - routes requests through the access control gate to
/// the use cases.
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    tracing::info!("API Lambda invoked - Method: {} Path: {}", method, path);

    // Handle CORS preflight
    if method == Method::OPTIONS {
        return Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "GET,POST,PUT,OPTIONS")
            .header(
                "Access-Control-Allow-Headers",
                "Content-Type,Authorization,X-User-Id",
            )
            .body(Body::Empty)
            .map_err(Box::new)?);
    }

    let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| "hillherbs".to_string());
    let bucket =
        env::var("SUBMISSIONS_BUCKET").unwrap_or_else(|_| "hillherbs-submissions".to_string());
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let body = event.body();

    // Credential endpoints (no actor yet); the rest of /auth is the
    // authenticated self-service surface handled below.
    if matches!(parts.as_slice(), ["auth", "register"] | ["auth", "login"]) {
        let client_id = env::var("COGNITO_CLIENT_ID").expect("COGNITO_CLIENT_ID must be set");
        let client_secret =
            env::var("COGNITO_CLIENT_SECRET").expect("COGNITO_CLIENT_SECRET must be set");

        return match (&method, parts.as_slice()) {
            (&Method::POST, ["auth", "register"]) => {
                auth::register(
                    &state.cognito_client,
                    &state.dynamo_client,
                    &table_name,
                    &client_id,
                    &client_secret,
                    body,
                )
                .await
            }
            (&Method::POST, ["auth", "login"]) => {
                auth::login(
                    &state.cognito_client,
                    &state.dynamo_client,
                    &table_name,
                    &client_id,
                    &client_secret,
                    body,
                )
                .await
            }
            _ => not_found(),
        };
    }

    // Identify the actor: JWT `sub` claim (validated upstream by API
    // Gateway), with an X-User-Id override for local development. The role
    // comes from the account record; the JWT is never trusted for it.
    let actor_id = extract_actor_id(&event);
    let actor_role = match &actor_id {
        Some(id) => match accounts::get_actor_role(&state.dynamo_client, &table_name, id).await {
            Ok(role) => role,
            Err(e) => return e.into_response(),
        },
        None => None,
    };

    match (&method, parts.as_slice()) {
        // --- ACCOUNT SELF-SERVICE ---
        (&Method::GET, ["auth", "me"]) => {
            let Some(id) = actor_id.as_deref() else {
                return forbidden(RedirectHint::Login);
            };
            accounts::get_me(&state.dynamo_client, &table_name, id).await
        }
        (&Method::PUT, ["auth", "profile"]) => {
            let Some(id) = actor_id.as_deref() else {
                return forbidden(RedirectHint::Login);
            };
            accounts::update_profile(&state.dynamo_client, &table_name, id, body).await
        }
        (&Method::GET, ["auth", "profile", "id-proof"]) => {
            let Some(id) = actor_id.as_deref() else {
                return forbidden(RedirectHint::Login);
            };
            accounts::get_id_proof(&state.dynamo_client, &table_name, id).await
        }

        // --- SUBMISSIONS ---
        (&Method::POST, ["plants"]) => {
            if let Decision::Deny { redirect } = access::authorize(actor_role, Capability::SubmitPlant)
            {
                return forbidden(redirect);
            }
            let Some(submitter) = actor_id.as_deref() else {
                return forbidden(RedirectHint::Login);
            };
            submissions::create_submission(&state, &table_name, &bucket, submitter, body).await
        }
        (&Method::GET, ["plants", "pending"]) => {
            if let Decision::Deny { redirect } =
                access::authorize(actor_role, Capability::ViewPendingQueue)
            {
                return forbidden(redirect);
            }
            submissions::list_pending(&state.dynamo_client, &table_name).await
        }
        (&Method::GET, ["plants", "history"]) => {
            if let Decision::Deny { redirect } =
                access::authorize(actor_role, Capability::ViewOwnHistory)
            {
                return forbidden(redirect);
            }
            let Some(expert) = actor_id.as_deref() else {
                return forbidden(RedirectHint::Login);
            };
            submissions::list_expert_history(&state.dynamo_client, &table_name, expert).await
        }
        (&Method::GET, ["plants", "catalog"]) => {
            if let Decision::Deny { redirect } =
                access::authorize(actor_role, Capability::ViewPublicCatalog)
            {
                return forbidden(redirect);
            }
            submissions::list_catalog(&state.dynamo_client, &table_name, actor_role).await
        }
        (&Method::POST, ["plants", submission_id, "adjudicate"]) => {
            if let Decision::Deny { redirect } =
                access::authorize(actor_role, Capability::AdjudicateSubmission)
            {
                return forbidden(redirect);
            }
            let Some(expert) = actor_id.as_deref() else {
                return forbidden(RedirectHint::Login);
            };
            submissions::adjudicate(&state.dynamo_client, &table_name, expert, submission_id, body)
                .await
        }

        // --- EXPERT APPLICATIONS ---
        (&Method::GET, ["admin", "applications"]) => {
            if let Decision::Deny { redirect } =
                access::authorize(actor_role, Capability::ManageExpertApplications)
            {
                return forbidden(redirect);
            }
            let status_filter = event
                .query_string_parameters_ref()
                .and_then(|params| params.first("status"))
                .map(|s| s.to_string());
            approvals::list_applications(&state.dynamo_client, &table_name, status_filter.as_deref())
                .await
        }
        (&Method::POST, ["admin", "applications", account_id]) => {
            if let Decision::Deny { redirect } =
                access::authorize(actor_role, Capability::ManageExpertApplications)
            {
                return forbidden(redirect);
            }
            approvals::decide_application(&state.dynamo_client, &table_name, account_id, body).await
        }

        _ => {
            tracing::warn!("No route matched - Method: {} Path: {}", method, path);
            not_found()
        }
    }
}

fn extract_actor_id(event: &Request) -> Option<String> {
    event
        .headers()
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            event
                .request_context()
                .authorizer()
                .and_then(|auth| auth.jwt.as_ref())
                .and_then(|jwt| jwt.claims.get("sub"))
                .map(|s| s.to_string())
        })
}

/// Terse denial: no hint about which role would have been allowed, but the
/// body carries the redirect destination for the client router.
fn forbidden(redirect: RedirectHint) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::FORBIDDEN)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(
            serde_json::json!({
                "error": "Forbidden",
                "message": "forbidden",
                "redirect": redirect.path(),
            })
            .to_string()
            .into(),
        )
        .map_err(Box::new)?)
}

fn not_found() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::json!({"error": "Not found"}).to_string().into())
        .map_err(Box::new)?)
}
