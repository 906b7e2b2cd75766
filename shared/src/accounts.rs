use crate::error::{json_response, ApiError};
use crate::types::{Account, ExpertProfile, Role, UpdateProfileRequest};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{http::StatusCode, Body, Error, Response};
use std::collections::HashMap;

/// Account store. One item per account (PK=ACCOUNT#id) plus a handle pointer
/// item (PK=HANDLE#username) so login can resolve a handle to an account id.
///
/// Role transitions go exclusively through `transition_role`, which is
/// guarded on the current role at write time.
pub async fn put_account(
    client: &DynamoClient,
    table_name: &str,
    account: &Account,
) -> Result<(), ApiError> {
    let pk = format!("ACCOUNT#{}", account.account_id);

    let mut put_request = client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk.clone()))
        .item("SK", AttributeValue::S(pk))
        .item("account_id", AttributeValue::S(account.account_id.clone()))
        .item("username", AttributeValue::S(account.username.clone()))
        .item("full_name", AttributeValue::S(account.full_name.clone()))
        .item("role", AttributeValue::S(account.role.as_str().to_string()))
        .item("created_at", AttributeValue::S(account.created_at.clone()));

    if let Some(email) = &account.email {
        put_request = put_request.item("email", AttributeValue::S(email.clone()));
    }
    if let Some(phone) = &account.phone_number {
        put_request = put_request.item("phone_number", AttributeValue::S(phone.clone()));
    }
    if let Some(profile) = &account.expert_profile {
        put_request = put_request
            .item(
                "expertise_area",
                AttributeValue::S(profile.expertise_area.clone()),
            )
            .item("workplace", AttributeValue::S(profile.workplace.clone()))
            .item(
                "id_proof_url",
                AttributeValue::S(profile.id_proof_url.clone()),
            );
        if let Some(years) = profile.years_of_experience {
            put_request =
                put_request.item("years_of_experience", AttributeValue::N(years.to_string()));
        }
        if let Some(bio) = &profile.bio {
            put_request = put_request.item("bio", AttributeValue::S(bio.clone()));
        }
    }

    put_request.send().await.map_err(store_error)?;

    // Handle pointer for login lookups
    client
        .put_item()
        .table_name(table_name)
        .item(
            "PK",
            AttributeValue::S(format!("HANDLE#{}", account.username)),
        )
        .item(
            "SK",
            AttributeValue::S(format!("ACCOUNT#{}", account.account_id)),
        )
        .item("account_id", AttributeValue::S(account.account_id.clone()))
        .send()
        .await
        .map_err(store_error)?;

    Ok(())
}

pub async fn get_account(
    client: &DynamoClient,
    table_name: &str,
    account_id: &str,
) -> Result<Account, ApiError> {
    let pk = format!("ACCOUNT#{}", account_id);

    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await
        .map_err(store_error)?;

    let item = result.item().ok_or(ApiError::NotFound("account"))?;
    account_from_item(item)
}

/// The actor's current role, or `None` when no account exists for the id.
/// Used by the HTTP boundary to feed `access::authorize`.
pub async fn get_actor_role(
    client: &DynamoClient,
    table_name: &str,
    account_id: &str,
) -> Result<Option<Role>, ApiError> {
    match get_account(client, table_name, account_id).await {
        Ok(account) => Ok(Some(account.role)),
        Err(ApiError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Resolve a handle to its account id via the pointer item.
pub async fn find_account_id_by_username(
    client: &DynamoClient,
    table_name: &str,
    username: &str,
) -> Result<String, ApiError> {
    let pk = format!("HANDLE#{}", username);

    let result = client
        .query()
        .table_name(table_name)
        .key_condition_expression("PK = :pk AND begins_with(SK, :sk_prefix)")
        .expression_attribute_values(":pk", AttributeValue::S(pk))
        .expression_attribute_values(":sk_prefix", AttributeValue::S("ACCOUNT#".to_string()))
        .send()
        .await
        .map_err(store_error)?;

    result
        .items()
        .first()
        .and_then(|item| item.get("account_id"))
        .and_then(|v| v.as_s().ok())
        .map(|s| s.to_string())
        .ok_or(ApiError::NotFound("account"))
}

/// All accounts that ever entered the expert pipeline (applicant, expert,
/// rejected), newest first.
pub async fn list_expert_pipeline(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Vec<Account>, ApiError> {
    let result = client
        .scan()
        .table_name(table_name)
        .filter_expression("#role IN (:applicant, :expert, :rejected)")
        .expression_attribute_names("#role", "role")
        .expression_attribute_values(
            ":applicant",
            AttributeValue::S(Role::ExpertApplicant.as_str().to_string()),
        )
        .expression_attribute_values(
            ":expert",
            AttributeValue::S(Role::Expert.as_str().to_string()),
        )
        .expression_attribute_values(
            ":rejected",
            AttributeValue::S(Role::ExpertRejected.as_str().to_string()),
        )
        .send()
        .await
        .map_err(store_error)?;

    let mut accounts = Vec::new();
    for item in result.items() {
        if let Ok(account) = account_from_item(item) {
            accounts.push(account);
        }
    }
    accounts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(accounts)
}

/// The current account, for session restore after a page reload.
pub async fn get_me(
    client: &DynamoClient,
    table_name: &str,
    account_id: &str,
) -> Result<Response<Body>, Error> {
    match get_account(client, table_name, account_id).await {
        Ok(account) => json_response(StatusCode::OK, &account),
        Err(e) => e.into_response(),
    }
}

/// Expert fields are only writable for accounts already in the expert
/// pipeline; a contributor account never grows a partial profile.
fn ensure_profile_fields_allowed(role: Role, req: &UpdateProfileRequest) -> Result<(), ApiError> {
    if req.touches_expert_fields() && !role.in_expert_pipeline() {
        return Err(ApiError::Validation(
            "expert profile fields require an expert pipeline account".to_string(),
        ));
    }
    Ok(())
}

/// Self-service profile update. Builds a partial update expression from the
/// supplied fields. Role and id proof are untouchable through this path.
pub async fn update_profile(
    client: &DynamoClient,
    table_name: &str,
    account_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: UpdateProfileRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            return ApiError::Validation(format!("invalid request body: {e}")).into_response();
        }
    };

    let account = match get_account(client, table_name, account_id).await {
        Ok(account) => account,
        Err(e) => return e.into_response(),
    };
    if let Err(e) = ensure_profile_fields_allowed(account.role, &req) {
        return e.into_response();
    }

    let mut update_expr = vec![];
    let mut expr_values = HashMap::new();

    if let Some(full_name) = req.full_name {
        update_expr.push("full_name = :full_name");
        expr_values.insert(":full_name".to_string(), AttributeValue::S(full_name));
    }
    if let Some(email) = req.email {
        update_expr.push("email = :email");
        expr_values.insert(":email".to_string(), AttributeValue::S(email));
    }
    if let Some(phone) = req.phone_number {
        update_expr.push("phone_number = :phone_number");
        expr_values.insert(":phone_number".to_string(), AttributeValue::S(phone));
    }
    if let Some(expertise_area) = req.expertise_area {
        update_expr.push("expertise_area = :expertise_area");
        expr_values.insert(":expertise_area".to_string(), AttributeValue::S(expertise_area));
    }
    if let Some(workplace) = req.workplace {
        update_expr.push("workplace = :workplace");
        expr_values.insert(":workplace".to_string(), AttributeValue::S(workplace));
    }
    if let Some(years) = req.years_of_experience {
        update_expr.push("years_of_experience = :years_of_experience");
        expr_values.insert(
            ":years_of_experience".to_string(),
            AttributeValue::N(years.to_string()),
        );
    }
    if let Some(bio) = req.bio {
        update_expr.push("bio = :bio");
        expr_values.insert(":bio".to_string(), AttributeValue::S(bio));
    }

    if !update_expr.is_empty() {
        let pk = format!("ACCOUNT#{}", account_id);
        let mut builder = client
            .update_item()
            .table_name(table_name)
            .key("PK", AttributeValue::S(pk.clone()))
            .key("SK", AttributeValue::S(pk))
            .update_expression(format!("SET {}", update_expr.join(", ")));

        for (k, v) in expr_values {
            builder = builder.expression_attribute_values(k, v);
        }

        if let Err(e) = builder.send().await {
            return store_error(e).into_response();
        }
    }

    // Return the fresh account so the client can replace its cached copy.
    get_me(client, table_name, account_id).await
}

/// The actor's own identity-proof document reference, reviewable during an
/// expert application.
pub async fn get_id_proof(
    client: &DynamoClient,
    table_name: &str,
    account_id: &str,
) -> Result<Response<Body>, Error> {
    let account = match get_account(client, table_name, account_id).await {
        Ok(account) => account,
        Err(e) => return e.into_response(),
    };

    match account.expert_profile {
        Some(profile) if !profile.id_proof_url.is_empty() => json_response(
            StatusCode::OK,
            &serde_json::json!({ "id_proof_url": profile.id_proof_url }),
        ),
        _ => ApiError::NotFound("id proof").into_response(),
    }
}

/// Guarded role transition: the write succeeds only if the account still
/// holds `from` at write time. The losing side of a race gets a conflict,
/// never a silent overwrite.
pub async fn transition_role(
    client: &DynamoClient,
    table_name: &str,
    account_id: &str,
    from: Role,
    to: Role,
) -> Result<(), ApiError> {
    let pk = format!("ACCOUNT#{}", account_id);

    client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .update_expression("SET #role = :to")
        .condition_expression("#role = :from")
        .expression_attribute_names("#role", "role")
        .expression_attribute_values(":to", AttributeValue::S(to.as_str().to_string()))
        .expression_attribute_values(":from", AttributeValue::S(from.as_str().to_string()))
        .send()
        .await
        .map_err(|e| {
            let service_error = e.into_service_error();
            if service_error.is_conditional_check_failed_exception() {
                ApiError::Conflict("application has already been decided".to_string())
            } else {
                ApiError::Collaborator(format!("record store error: {service_error}"))
            }
        })?;

    Ok(())
}

fn account_from_item(item: &HashMap<String, AttributeValue>) -> Result<Account, ApiError> {
    let get_s = |name: &str| {
        item.get(name)
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
    };

    let account_id = get_s("account_id").ok_or(ApiError::NotFound("account"))?;
    let role_str = get_s("role").unwrap_or_default();
    let role = Role::parse(&role_str).ok_or_else(|| {
        ApiError::Collaborator(format!("account {account_id} has unrecognized role '{role_str}'"))
    })?;

    let expert_profile = if role.in_expert_pipeline() {
        Some(ExpertProfile {
            expertise_area: get_s("expertise_area").unwrap_or_default(),
            workplace: get_s("workplace").unwrap_or_default(),
            years_of_experience: item
                .get("years_of_experience")
                .and_then(|v| v.as_n().ok())
                .and_then(|n| n.parse::<u32>().ok()),
            bio: get_s("bio"),
            id_proof_url: get_s("id_proof_url").unwrap_or_default(),
        })
    } else {
        None
    };

    Ok(Account {
        account_id,
        username: get_s("username").unwrap_or_default(),
        full_name: get_s("full_name").unwrap_or_default(),
        email: get_s("email"),
        phone_number: get_s("phone_number"),
        role,
        expert_profile,
        created_at: get_s("created_at").unwrap_or_default(),
    })
}

fn store_error<E: std::fmt::Debug>(e: E) -> ApiError {
    tracing::error!("DynamoDB error: {:?}", e);
    ApiError::Collaborator("record store unavailable".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expert_fields() -> UpdateProfileRequest {
        UpdateProfileRequest {
            full_name: None,
            email: None,
            phone_number: None,
            expertise_area: Some("Ayurveda".to_string()),
            workplace: None,
            years_of_experience: None,
            bio: None,
        }
    }

    fn plain_fields() -> UpdateProfileRequest {
        UpdateProfileRequest {
            full_name: Some("Neelam Rai".to_string()),
            email: Some("neelam@example.com".to_string()),
            phone_number: None,
            expertise_area: None,
            workplace: None,
            years_of_experience: None,
            bio: None,
        }
    }

    #[test]
    fn test_contributor_cannot_grow_expert_fields() {
        let err = ensure_profile_fields_allowed(Role::Contributor, &expert_fields()).unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[test]
    fn test_pipeline_roles_may_update_expert_fields() {
        for role in [Role::ExpertApplicant, Role::Expert, Role::ExpertRejected] {
            assert!(ensure_profile_fields_allowed(role, &expert_fields()).is_ok());
        }
    }

    #[test]
    fn test_plain_fields_allowed_for_any_role() {
        for role in [
            Role::Contributor,
            Role::ExpertApplicant,
            Role::Expert,
            Role::ExpertRejected,
            Role::Admin,
        ] {
            assert!(ensure_profile_fields_allowed(role, &plain_fields()).is_ok());
        }
    }
}
