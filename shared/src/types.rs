use serde::{Deserialize, Serialize};

// ========== ROLES ==========

/// The single authorization signal for every account. Exactly one at a time;
/// only the approval engine ever changes it (applicant -> expert/rejected).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Contributor,
    ExpertApplicant,
    Expert,
    ExpertRejected,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Contributor => "contributor",
            Role::ExpertApplicant => "expert_applicant",
            Role::Expert => "expert",
            Role::ExpertRejected => "expert_rejected",
            Role::Admin => "admin",
        }
    }

    /// Parse the role string stored in DynamoDB. An unknown string is a data
    /// error, never a silent default.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "contributor" => Some(Role::Contributor),
            "expert_applicant" => Some(Role::ExpertApplicant),
            "expert" => Some(Role::Expert),
            "expert_rejected" => Some(Role::ExpertRejected),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Roles in the expert pipeline carry an expert profile.
    pub fn in_expert_pipeline(&self) -> bool {
        matches!(
            self,
            Role::ExpertApplicant | Role::Expert | Role::ExpertRejected
        )
    }
}

/// Operations gated by the access control table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    SubmitPlant,
    ViewPendingQueue,
    AdjudicateSubmission,
    ViewOwnHistory,
    ManageExpertApplications,
    ViewPublicCatalog,
}

// ========== ACCOUNT ==========

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ExpertProfile {
    pub expertise_area: String,
    pub workplace: String,
    pub years_of_experience: Option<u32>,
    pub bio: Option<String>,
    pub id_proof_url: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Account {
    pub account_id: String,
    pub username: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub role: Role,
    /// Present exactly when `role.in_expert_pipeline()`.
    pub expert_profile: Option<ExpertProfile>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct ExpertProfileRequest {
    pub expertise_area: String,
    pub workplace: String,
    pub years_of_experience: Option<u32>,
    pub bio: Option<String>,
    pub id_proof_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub full_name: String,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    /// Supplying this (with an id proof) registers the account as an
    /// expert applicant instead of a contributor.
    pub expert_profile: Option<ExpertProfileRequest>,
}

/// Self-service profile update. Role and id proof are never updatable here;
/// the expert fields apply only to accounts in the expert pipeline.
#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub expertise_area: Option<String>,
    pub workplace: Option<String>,
    pub years_of_experience: Option<u32>,
    pub bio: Option<String>,
}

impl UpdateProfileRequest {
    pub fn touches_expert_fields(&self) -> bool {
        self.expertise_area.is_some()
            || self.workplace.is_some()
            || self.years_of_experience.is_some()
            || self.bio.is_some()
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccountSummary {
    pub account_id: String,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub id_token: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i32,
    pub account: AccountSummary,
}

/// Admin decision on an expert application.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ApplicationDecision {
    Approve,
    Reject,
}

// ========== SUBMISSION ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Verified,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Verified => "verified",
            SubmissionStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<SubmissionStatus> {
        match s {
            "pending" => Some(SubmissionStatus::Pending),
            "verified" => Some(SubmissionStatus::Verified),
            "rejected" => Some(SubmissionStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

impl GeoPoint {
    pub fn in_range(&self) -> bool {
        (-180.0..=180.0).contains(&self.longitude) && (-90.0..=90.0).contains(&self.latitude)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlantSubmission {
    pub submission_id: String,
    pub submitted_by: String,
    pub image_url: String,
    pub image_key: String,
    pub location: GeoPoint,
    pub ai_suggested_name: String,
    pub status: SubmissionStatus,
    pub created_at: String,
    // Adjudication fields. Empty/None while pending; filled exactly once.
    pub verified_by: Option<String>,
    pub adjudicated_at: Option<String>,
    pub final_plant_name: String,
    pub verification_method: String,
    pub rejection_reason: String,
    pub medicinal_uses: String,
    pub importance: String,
    pub expert_notes: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitPlantRequest {
    /// Base64-encoded image bytes.
    pub image_data: String,
    pub content_type: String,
    pub longitude: f64,
    pub latitude: f64,
}

#[derive(Debug, Serialize)]
pub struct SubmitPlantResponse {
    pub message: String,
    pub submission: SubmissionSummary,
}

#[derive(Debug, Serialize)]
pub struct SubmissionSummary {
    pub submission_id: String,
    pub ai_suggested_name: String,
    pub image_url: String,
    pub status: SubmissionStatus,
}

/// The three adjudication intents, each with its own required fields. The
/// tag dispatch makes a missing field a parse error rather than a runtime
/// branch.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum AdjudicationRequest {
    Approve {
        verification_method: String,
        medicinal_uses: String,
        #[serde(default)]
        importance: Option<String>,
        #[serde(default)]
        expert_notes: Option<String>,
    },
    Correct {
        corrected_name: String,
        verification_method: String,
        medicinal_uses: String,
        #[serde(default)]
        importance: Option<String>,
        #[serde(default)]
        expert_notes: Option<String>,
    },
    Reject {
        reason: String,
        #[serde(default)]
        expert_notes: Option<String>,
    },
}

/// Public catalog view of a verified submission, with the disclosure policy
/// already applied to the location.
#[derive(Debug, Serialize)]
pub struct CatalogEntry {
    pub submission_id: String,
    pub final_plant_name: String,
    pub image_url: String,
    pub location: GeoPoint,
    pub location_precision: &'static str,
    pub medicinal_uses: String,
    pub importance: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trip() {
        for role in [
            Role::Contributor,
            Role::ExpertApplicant,
            Role::Expert,
            Role::ExpertRejected,
            Role::Admin,
        ] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("superuser"), None);
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            SubmissionStatus::Pending,
            SubmissionStatus::Verified,
            SubmissionStatus::Rejected,
        ] {
            assert_eq!(SubmissionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SubmissionStatus::parse("archived"), None);
        assert!(!SubmissionStatus::Pending.is_terminal());
        assert!(SubmissionStatus::Verified.is_terminal());
        assert!(SubmissionStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_adjudication_request_tag_dispatch() {
        let req: AdjudicationRequest = serde_json::from_str(
            r#"{"action":"correct","corrected_name":"Azadirachta indica","verification_method":"flora guide","medicinal_uses":"anti-inflammatory"}"#,
        )
        .unwrap();
        assert!(matches!(req, AdjudicationRequest::Correct { .. }));

        // approve without its required fields fails at parse time
        assert!(serde_json::from_str::<AdjudicationRequest>(r#"{"action":"approve"}"#).is_err());
        // correct without the corrected name fails at parse time
        assert!(serde_json::from_str::<AdjudicationRequest>(
            r#"{"action":"correct","verification_method":"m","medicinal_uses":"u"}"#
        )
        .is_err());
        // unknown action fails
        assert!(serde_json::from_str::<AdjudicationRequest>(
            r#"{"action":"escalate","reason":"?"}"#
        )
        .is_err());
    }

    #[test]
    fn test_application_decision_parse() {
        assert!(matches!(
            serde_json::from_str::<ApplicationDecision>(r#"{"action":"approve"}"#).unwrap(),
            ApplicationDecision::Approve
        ));
        assert!(matches!(
            serde_json::from_str::<ApplicationDecision>(r#"{"action":"reject"}"#).unwrap(),
            ApplicationDecision::Reject
        ));
        assert!(serde_json::from_str::<ApplicationDecision>(r#"{"action":"delete"}"#).is_err());
    }

    #[test]
    fn test_geo_point_range() {
        assert!(GeoPoint { longitude: 77.5946, latitude: 12.9716 }.in_range());
        assert!(!GeoPoint { longitude: 200.0, latitude: 12.0 }.in_range());
        assert!(!GeoPoint { longitude: 77.0, latitude: -95.0 }.in_range());
    }
}
