use crate::accounts;
use crate::error::{json_response, ApiError};
use crate::types::{Account, ApplicationDecision, Role};
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ApplicationsResponse {
    pending: Vec<Account>,
    approved: Vec<Account>,
    rejected: Vec<Account>,
}

/// Expert applications grouped by pipeline state, optionally filtered with
/// `?status=pending|approved|rejected`.
pub async fn list_applications(
    client: &DynamoClient,
    table_name: &str,
    status_filter: Option<&str>,
) -> Result<Response<Body>, Error> {
    let accounts = match accounts::list_expert_pipeline(client, table_name).await {
        Ok(accounts) => accounts,
        Err(e) => return e.into_response(),
    };

    let mut grouped = ApplicationsResponse {
        pending: Vec::new(),
        approved: Vec::new(),
        rejected: Vec::new(),
    };
    for account in accounts {
        match account.role {
            Role::ExpertApplicant => grouped.pending.push(account),
            Role::Expert => grouped.approved.push(account),
            Role::ExpertRejected => grouped.rejected.push(account),
            _ => {}
        }
    }

    match status_filter {
        None => json_response(StatusCode::OK, &grouped),
        Some("pending") => json_response(StatusCode::OK, &grouped.pending),
        Some("approved") => json_response(StatusCode::OK, &grouped.approved),
        Some("rejected") => json_response(StatusCode::OK, &grouped.rejected),
        Some(other) => ApiError::Validation(format!(
            "unknown status filter '{other}'; expected pending, approved, or rejected"
        ))
        .into_response(),
    }
}

/// Decide an expert application: applicant -> expert on approval, applicant
/// -> expert_rejected on rejection. Both transitions are terminal and
/// guarded on the applicant role at write time; deciding an already-decided
/// application is a conflict. Rejected accounts are kept, never deleted.
pub async fn decide_application(
    client: &DynamoClient,
    table_name: &str,
    account_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let decision: ApplicationDecision = match serde_json::from_slice(body) {
        Ok(decision) => decision,
        Err(e) => {
            return ApiError::Validation(format!("invalid decision: {e}")).into_response();
        }
    };

    let account = match accounts::get_account(client, table_name, account_id).await {
        Ok(account) => account,
        Err(e) => return e.into_response(),
    };

    if let Err(e) = ensure_applicant(account.role) {
        return e.into_response();
    }

    let new_role = match decision {
        ApplicationDecision::Approve => Role::Expert,
        ApplicationDecision::Reject => Role::ExpertRejected,
    };

    if let Err(e) =
        accounts::transition_role(client, table_name, account_id, Role::ExpertApplicant, new_role)
            .await
    {
        return e.into_response();
    }

    tracing::info!(
        "Expert application for {} decided: {}",
        account.username,
        new_role.as_str()
    );

    let message = match new_role {
        Role::Expert => format!("Expert {} approved successfully.", account.username),
        _ => "Expert application rejected.".to_string(),
    };

    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "message": message,
            "account_id": account.account_id,
            "role": new_role,
        }),
    )
}

/// Only an account still awaiting review can be decided; a second decision
/// on the same application is a conflict, not a re-run.
fn ensure_applicant(role: Role) -> Result<(), ApiError> {
    if role != Role::ExpertApplicant {
        return Err(ApiError::Conflict(format!(
            "account is not awaiting review (current role: {})",
            role.as_str()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applicant_may_be_decided() {
        assert!(ensure_applicant(Role::ExpertApplicant).is_ok());
    }

    #[test]
    fn test_decided_application_conflicts_on_second_decision() {
        // Approved then re-decided, and rejected then re-decided.
        for role in [Role::Expert, Role::ExpertRejected] {
            match ensure_applicant(role) {
                Err(ApiError::Conflict(msg)) => {
                    assert!(msg.contains(role.as_str()), "message was: {msg}");
                }
                other => panic!("expected Conflict for {}, got {:?}", role.as_str(), other),
            }
        }
    }

    #[test]
    fn test_non_pipeline_roles_conflict() {
        assert!(matches!(
            ensure_applicant(Role::Contributor),
            Err(ApiError::Conflict(_))
        ));
        assert!(matches!(
            ensure_applicant(Role::Admin),
            Err(ApiError::Conflict(_))
        ));
    }
}
