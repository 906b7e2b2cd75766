use crate::classify::Classification;
use crate::disclosure;
use crate::error::{json_response, ApiError};
use crate::medicinal;
use crate::s3;
use crate::types::{
    AdjudicationRequest, CatalogEntry, GeoPoint, PlantSubmission, Role, SubmissionStatus,
    SubmissionSummary, SubmitPlantRequest, SubmitPlantResponse,
};
use crate::AppState;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{http::StatusCode, Body, Error, Response};
use std::collections::HashMap;

/// The expert history endpoint returns at most this many records.
const HISTORY_LIMIT: usize = 20;

// ========== CREATION ==========

/// Create a submission: classify, gate against the medicinal reference set,
/// and only then store the image and persist the record. The ordering is
/// load-bearing: a non-medicinal image must never reach storage, and a
/// failed creation must leave nothing behind.
pub async fn create_submission(
    state: &AppState,
    table_name: &str,
    bucket: &str,
    submitter_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: SubmitPlantRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            return ApiError::Validation(format!("invalid request body: {e}")).into_response();
        }
    };

    let location = GeoPoint {
        longitude: req.longitude,
        latitude: req.latitude,
    };
    if !location.in_range() {
        return ApiError::Validation(
            "longitude must be within [-180, 180] and latitude within [-90, 90]".to_string(),
        )
        .into_response();
    }

    use base64::Engine;
    let image_bytes = match base64::engine::general_purpose::STANDARD.decode(&req.image_data) {
        Ok(bytes) if !bytes.is_empty() => bytes,
        Ok(_) => {
            return ApiError::Validation("image_data must not be empty".to_string())
                .into_response();
        }
        Err(e) => {
            return ApiError::Validation(format!("image_data is not valid base64: {e}"))
                .into_response();
        }
    };

    // 1. Classify before anything is stored.
    let classification = match state
        .classifier
        .classify(&image_bytes, &req.content_type)
        .await
    {
        Ok(classification) => classification,
        Err(e) => return e.into_response(),
    };

    // 2. Gate on the medicinal reference set.
    let label = match classification {
        Classification::Unidentifiable => {
            return classification_rejected("Unknown");
        }
        Classification::Identified {
            label,
            is_medicinal,
        } => {
            if !is_medicinal || !medicinal::is_recognized(&label) {
                return classification_rejected(&label);
            }
            label
        }
    };

    // 3. Store the image now that the gate has passed.
    let stored = match s3::upload_submission_image(
        &state.s3_client,
        bucket,
        image_bytes,
        &req.content_type,
    )
    .await
    {
        Ok(stored) => stored,
        Err(e) => return e.into_response(),
    };

    // 4. Persist the submission record with status pending.
    let submission_id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let pk = format!("SUBMISSION#{}", submission_id);

    let put_result = state
        .dynamo_client
        .put_item()
        .table_name(table_name)
        .item("PK", AttributeValue::S(pk.clone()))
        .item("SK", AttributeValue::S(pk))
        .item("submission_id", AttributeValue::S(submission_id.clone()))
        .item("submitted_by", AttributeValue::S(submitter_id.to_string()))
        .item("image_url", AttributeValue::S(stored.url.clone()))
        .item("image_key", AttributeValue::S(stored.key.clone()))
        .item("longitude", AttributeValue::N(location.longitude.to_string()))
        .item("latitude", AttributeValue::N(location.latitude.to_string()))
        .item("ai_suggested_name", AttributeValue::S(label.clone()))
        .item(
            "status",
            AttributeValue::S(SubmissionStatus::Pending.as_str().to_string()),
        )
        .item("created_at", AttributeValue::S(now))
        .send()
        .await;

    if let Err(e) = put_result {
        tracing::error!("Failed to persist submission: {:?}", e);
        return ApiError::Collaborator("record store unavailable".to_string()).into_response();
    }

    let response = SubmitPlantResponse {
        message: format!(
            "Successfully submitted! The AI has identified the plant as '{}'. It is now pending verification by one of our experts.",
            label
        ),
        submission: SubmissionSummary {
            submission_id,
            ai_suggested_name: label,
            image_url: stored.url,
            status: SubmissionStatus::Pending,
        },
    };

    json_response(StatusCode::CREATED, &response)
}

/// Distinct classification-rejected outcome: not a lifecycle state and not a
/// validation error. Nothing was persisted.
fn classification_rejected(label: &str) -> Result<Response<Body>, Error> {
    let envelope = serde_json::json!({
        "error": "ClassificationRejected",
        "message": format!(
            "Plant identified as '{}'. It was not recognized as a medicinal plant and was not submitted.",
            label
        ),
        "label": label,
    });
    Ok(Response::builder()
        .status(StatusCode::UNPROCESSABLE_ENTITY)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(envelope.to_string().into())
        .map_err(Box::new)?)
}

// ========== ADJUDICATION ==========

/// Field set a valid adjudication writes, derived from the intent before any
/// mutation. Construction is all-or-nothing: a missing required field fails
/// here and the record is never touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjudicationUpdate {
    pub status: SubmissionStatus,
    pub final_plant_name: String,
    pub verification_method: String,
    pub rejection_reason: String,
    pub medicinal_uses: String,
    pub importance: String,
    pub expert_notes: String,
}

impl AdjudicationUpdate {
    pub fn from_request(
        req: &AdjudicationRequest,
        ai_suggested_name: &str,
    ) -> Result<Self, ApiError> {
        match req {
            AdjudicationRequest::Approve {
                verification_method,
                medicinal_uses,
                importance,
                expert_notes,
            } => Ok(Self {
                status: SubmissionStatus::Verified,
                final_plant_name: require("ai_suggested_name", ai_suggested_name)?,
                verification_method: require("verification_method", verification_method)?,
                rejection_reason: String::new(),
                medicinal_uses: require("medicinal_uses", medicinal_uses)?,
                importance: optional(importance),
                expert_notes: optional(expert_notes),
            }),
            AdjudicationRequest::Correct {
                corrected_name,
                verification_method,
                medicinal_uses,
                importance,
                expert_notes,
            } => Ok(Self {
                status: SubmissionStatus::Verified,
                final_plant_name: require("corrected_name", corrected_name)?,
                verification_method: require("verification_method", verification_method)?,
                rejection_reason: String::new(),
                medicinal_uses: require("medicinal_uses", medicinal_uses)?,
                importance: optional(importance),
                expert_notes: optional(expert_notes),
            }),
            AdjudicationRequest::Reject {
                reason,
                expert_notes,
            } => Ok(Self {
                status: SubmissionStatus::Rejected,
                final_plant_name: String::new(),
                verification_method: String::new(),
                rejection_reason: require("reason", reason)?,
                medicinal_uses: String::new(),
                importance: String::new(),
                expert_notes: optional(expert_notes),
            }),
        }
    }
}

fn require(field: &str, value: &str) -> Result<String, ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn optional(value: &Option<String>) -> String {
    value.as_deref().unwrap_or("").trim().to_string()
}

/// Only a pending submission can be adjudicated; verified and rejected are
/// terminal.
fn ensure_pending(status: SubmissionStatus) -> Result<(), ApiError> {
    if status.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "submission is already {}",
            status.as_str()
        )));
    }
    Ok(())
}

/// Resolve a pending submission to verified or rejected. Exactly one
/// adjudication ever: the store write is conditioned on the record still
/// being pending, so a racing second expert receives a conflict and the
/// record is unchanged.
pub async fn adjudicate(
    client: &DynamoClient,
    table_name: &str,
    expert_id: &str,
    submission_id: &str,
    body: &[u8],
) -> Result<Response<Body>, Error> {
    let req: AdjudicationRequest = match serde_json::from_slice(body) {
        Ok(req) => req,
        Err(e) => {
            return ApiError::Validation(format!("invalid adjudication request: {e}"))
                .into_response();
        }
    };

    let submission = match get_submission(client, table_name, submission_id).await {
        Ok(submission) => submission,
        Err(e) => return e.into_response(),
    };

    if let Err(e) = ensure_pending(submission.status) {
        return e.into_response();
    }

    let update = match AdjudicationUpdate::from_request(&req, &submission.ai_suggested_name) {
        Ok(update) => update,
        Err(e) => return e.into_response(),
    };

    let now = chrono::Utc::now().to_rfc3339();
    let pk = format!("SUBMISSION#{}", submission_id);

    let update_result = client
        .update_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .update_expression(
            "SET #status = :status, verified_by = :verified_by, adjudicated_at = :adjudicated_at, \
             final_plant_name = :final_plant_name, verification_method = :verification_method, \
             rejection_reason = :rejection_reason, medicinal_uses = :medicinal_uses, \
             importance = :importance, expert_notes = :expert_notes",
        )
        .condition_expression("#status = :pending")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(
            ":status",
            AttributeValue::S(update.status.as_str().to_string()),
        )
        .expression_attribute_values(
            ":pending",
            AttributeValue::S(SubmissionStatus::Pending.as_str().to_string()),
        )
        .expression_attribute_values(":verified_by", AttributeValue::S(expert_id.to_string()))
        .expression_attribute_values(":adjudicated_at", AttributeValue::S(now.clone()))
        .expression_attribute_values(
            ":final_plant_name",
            AttributeValue::S(update.final_plant_name.clone()),
        )
        .expression_attribute_values(
            ":verification_method",
            AttributeValue::S(update.verification_method.clone()),
        )
        .expression_attribute_values(
            ":rejection_reason",
            AttributeValue::S(update.rejection_reason.clone()),
        )
        .expression_attribute_values(
            ":medicinal_uses",
            AttributeValue::S(update.medicinal_uses.clone()),
        )
        .expression_attribute_values(":importance", AttributeValue::S(update.importance.clone()))
        .expression_attribute_values(
            ":expert_notes",
            AttributeValue::S(update.expert_notes.clone()),
        )
        .send()
        .await;

    if let Err(e) = update_result {
        let service_error = e.into_service_error();
        if service_error.is_conditional_check_failed_exception() {
            // Another expert got there first.
            return ApiError::Conflict("submission has already been adjudicated".to_string())
                .into_response();
        }
        tracing::error!("Adjudication write failed: {}", service_error);
        return ApiError::Collaborator("record store unavailable".to_string()).into_response();
    }

    let adjudicated = PlantSubmission {
        status: update.status,
        verified_by: Some(expert_id.to_string()),
        adjudicated_at: Some(now),
        final_plant_name: update.final_plant_name,
        verification_method: update.verification_method,
        rejection_reason: update.rejection_reason,
        medicinal_uses: update.medicinal_uses,
        importance: update.importance,
        expert_notes: update.expert_notes,
        ..submission
    };

    json_response(
        StatusCode::OK,
        &serde_json::json!({
            "message": "Submission successfully adjudicated.",
            "submission": adjudicated,
        }),
    )
}

// ========== QUERIES ==========

pub async fn get_submission(
    client: &DynamoClient,
    table_name: &str,
    submission_id: &str,
) -> Result<PlantSubmission, ApiError> {
    let pk = format!("SUBMISSION#{}", submission_id);

    let result = client
        .get_item()
        .table_name(table_name)
        .key("PK", AttributeValue::S(pk.clone()))
        .key("SK", AttributeValue::S(pk))
        .send()
        .await
        .map_err(|e| {
            tracing::error!("DynamoDB error: {:?}", e);
            ApiError::Collaborator("record store unavailable".to_string())
        })?;

    let item = result.item().ok_or(ApiError::NotFound("submission"))?;
    submission_from_item(item).ok_or(ApiError::NotFound("submission"))
}

/// Pending submissions awaiting expert review, newest first.
pub async fn list_pending(
    client: &DynamoClient,
    table_name: &str,
) -> Result<Response<Body>, Error> {
    let result = client
        .scan()
        .table_name(table_name)
        .filter_expression("#status = :pending")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(
            ":pending",
            AttributeValue::S(SubmissionStatus::Pending.as_str().to_string()),
        )
        .send()
        .await;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("DynamoDB error: {:?}", e);
            return ApiError::Collaborator("record store unavailable".to_string())
                .into_response();
        }
    };

    let mut submissions: Vec<PlantSubmission> = result
        .items()
        .iter()
        .filter_map(submission_from_item)
        .collect();
    submissions.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    json_response(StatusCode::OK, &submissions)
}

/// Submissions this expert has adjudicated, newest first, capped at
/// `HISTORY_LIMIT`.
pub async fn list_expert_history(
    client: &DynamoClient,
    table_name: &str,
    expert_id: &str,
) -> Result<Response<Body>, Error> {
    let result = client
        .scan()
        .table_name(table_name)
        .filter_expression("verified_by = :expert AND #status IN (:verified, :rejected)")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(":expert", AttributeValue::S(expert_id.to_string()))
        .expression_attribute_values(
            ":verified",
            AttributeValue::S(SubmissionStatus::Verified.as_str().to_string()),
        )
        .expression_attribute_values(
            ":rejected",
            AttributeValue::S(SubmissionStatus::Rejected.as_str().to_string()),
        )
        .send()
        .await;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("DynamoDB error: {:?}", e);
            return ApiError::Collaborator("record store unavailable".to_string())
                .into_response();
        }
    };

    let mut history: Vec<PlantSubmission> = result
        .items()
        .iter()
        .filter_map(submission_from_item)
        .collect();
    history.sort_by(|a, b| b.adjudicated_at.cmp(&a.adjudicated_at));
    history.truncate(HISTORY_LIMIT);

    json_response(StatusCode::OK, &history)
}

/// The public verified catalog, sorted by final plant name, with the
/// disclosure policy applied per caller.
pub async fn list_catalog(
    client: &DynamoClient,
    table_name: &str,
    actor: Option<Role>,
) -> Result<Response<Body>, Error> {
    let result = client
        .scan()
        .table_name(table_name)
        .filter_expression("#status = :verified")
        .expression_attribute_names("#status", "status")
        .expression_attribute_values(
            ":verified",
            AttributeValue::S(SubmissionStatus::Verified.as_str().to_string()),
        )
        .send()
        .await;

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("DynamoDB error: {:?}", e);
            return ApiError::Collaborator("record store unavailable".to_string())
                .into_response();
        }
    };

    let mut entries: Vec<CatalogEntry> = result
        .items()
        .iter()
        .filter_map(submission_from_item)
        .map(|submission| {
            let disclosed = disclosure::disclose_location(actor, &submission.location);
            CatalogEntry {
                submission_id: submission.submission_id,
                final_plant_name: submission.final_plant_name,
                image_url: submission.image_url,
                location: disclosed.point(),
                location_precision: disclosed.precision(),
                medicinal_uses: submission.medicinal_uses,
                importance: submission.importance,
            }
        })
        .collect();
    entries.sort_by(|a, b| a.final_plant_name.cmp(&b.final_plant_name));

    json_response(StatusCode::OK, &entries)
}

fn submission_from_item(item: &HashMap<String, AttributeValue>) -> Option<PlantSubmission> {
    let get_s = |name: &str| {
        item.get(name)
            .and_then(|v| v.as_s().ok())
            .map(|s| s.to_string())
    };
    let get_n = |name: &str| {
        item.get(name)
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<f64>().ok())
    };

    let status = SubmissionStatus::parse(&get_s("status")?)?;

    Some(PlantSubmission {
        submission_id: get_s("submission_id")?,
        submitted_by: get_s("submitted_by").unwrap_or_default(),
        image_url: get_s("image_url").unwrap_or_default(),
        image_key: get_s("image_key").unwrap_or_default(),
        location: GeoPoint {
            longitude: get_n("longitude")?,
            latitude: get_n("latitude")?,
        },
        ai_suggested_name: get_s("ai_suggested_name").unwrap_or_default(),
        status,
        created_at: get_s("created_at").unwrap_or_default(),
        verified_by: get_s("verified_by"),
        adjudicated_at: get_s("adjudicated_at"),
        final_plant_name: get_s("final_plant_name").unwrap_or_default(),
        verification_method: get_s("verification_method").unwrap_or_default(),
        rejection_reason: get_s("rejection_reason").unwrap_or_default(),
        medicinal_uses: get_s("medicinal_uses").unwrap_or_default(),
        importance: get_s("importance").unwrap_or_default(),
        expert_notes: get_s("expert_notes").unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approve(verification_method: &str, medicinal_uses: &str) -> AdjudicationRequest {
        AdjudicationRequest::Approve {
            verification_method: verification_method.to_string(),
            medicinal_uses: medicinal_uses.to_string(),
            importance: None,
            expert_notes: None,
        }
    }

    #[test]
    fn test_approve_defaults_final_name_to_ai_suggestion() {
        let update =
            AdjudicationUpdate::from_request(&approve("field identification", "antiseptic"), "Neem")
                .unwrap();
        assert_eq!(update.status, SubmissionStatus::Verified);
        assert_eq!(update.final_plant_name, "Neem");
        assert_eq!(update.verification_method, "field identification");
        assert_eq!(update.medicinal_uses, "antiseptic");
        assert_eq!(update.rejection_reason, "");
    }

    #[test]
    fn test_correct_uses_corrected_name() {
        let req = AdjudicationRequest::Correct {
            corrected_name: "Azadirachta indica".to_string(),
            verification_method: "cross-referenced with regional flora guide".to_string(),
            medicinal_uses: "anti-inflammatory".to_string(),
            importance: None,
            expert_notes: None,
        };
        let update = AdjudicationUpdate::from_request(&req, "Neem").unwrap();
        assert_eq!(update.status, SubmissionStatus::Verified);
        assert_eq!(update.final_plant_name, "Azadirachta indica");
        assert_eq!(update.rejection_reason, "");
    }

    #[test]
    fn test_reject_clears_verification_fields() {
        let req = AdjudicationRequest::Reject {
            reason: "image too blurry to confirm species".to_string(),
            expert_notes: Some("ask for a leaf close-up".to_string()),
        };
        let update = AdjudicationUpdate::from_request(&req, "Neem").unwrap();
        assert_eq!(update.status, SubmissionStatus::Rejected);
        assert_eq!(update.rejection_reason, "image too blurry to confirm species");
        assert_eq!(update.final_plant_name, "");
        assert_eq!(update.verification_method, "");
        assert_eq!(update.medicinal_uses, "");
        assert_eq!(update.importance, "");
        assert_eq!(update.expert_notes, "ask for a leaf close-up");
    }

    #[test]
    fn test_empty_required_fields_fail_validation() {
        let err = AdjudicationUpdate::from_request(&approve("", "antiseptic"), "Neem").unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("verification_method")));

        let err = AdjudicationUpdate::from_request(&approve("guide", "   "), "Neem").unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("medicinal_uses")));

        let req = AdjudicationRequest::Correct {
            corrected_name: " ".to_string(),
            verification_method: "guide".to_string(),
            medicinal_uses: "tonic".to_string(),
            importance: None,
            expert_notes: None,
        };
        let err = AdjudicationUpdate::from_request(&req, "Neem").unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("corrected_name")));

        let req = AdjudicationRequest::Reject {
            reason: "".to_string(),
            expert_notes: None,
        };
        let err = AdjudicationUpdate::from_request(&req, "Neem").unwrap_err();
        assert!(matches!(err, ApiError::Validation(msg) if msg.contains("reason")));
    }

    #[test]
    fn test_verified_invariant_holds() {
        let update = AdjudicationUpdate::from_request(
            &approve("herbarium comparison", "wound care"),
            "Tulsi",
        )
        .unwrap();
        assert!(!update.final_plant_name.is_empty());
        assert!(!update.verification_method.is_empty());
        assert!(!update.medicinal_uses.is_empty());
        assert!(update.rejection_reason.is_empty());
    }

    #[test]
    fn test_optional_fields_default_to_empty() {
        let update = AdjudicationUpdate::from_request(&approve("guide", "tonic"), "Amla").unwrap();
        assert_eq!(update.importance, "");
        assert_eq!(update.expert_notes, "");
    }

    #[test]
    fn test_pending_submission_may_be_adjudicated() {
        assert!(ensure_pending(SubmissionStatus::Pending).is_ok());
    }

    #[test]
    fn test_adjudicated_submission_conflicts_on_second_adjudication() {
        for status in [SubmissionStatus::Verified, SubmissionStatus::Rejected] {
            match ensure_pending(status) {
                Err(ApiError::Conflict(msg)) => {
                    assert!(msg.contains(status.as_str()), "message was: {msg}");
                }
                other => panic!("expected Conflict for {}, got {:?}", status.as_str(), other),
            }
        }
    }
}
