use crate::types::{Capability, Role};

/// Where to send a denied actor. Computed from the actor's actual role so
/// client routing never bounces a denied actor back through the same gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectHint {
    Login,
    ContributorDashboard,
    AwaitingApproval,
    ExpertDashboard,
    AdminDashboard,
}

impl RedirectHint {
    pub fn path(&self) -> &'static str {
        match self {
            RedirectHint::Login => "/login",
            RedirectHint::ContributorDashboard => "/dashboard",
            RedirectHint::AwaitingApproval => "/pending-approval",
            RedirectHint::ExpertDashboard => "/expert-dashboard",
            RedirectHint::AdminDashboard => "/admin-dashboard",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny { redirect: RedirectHint },
}

/// The one place capability decisions are made. Pure and deterministic; no
/// call site re-derives role logic. `None` is an unauthenticated actor.
pub fn authorize(actor: Option<Role>, capability: Capability) -> Decision {
    let allowed = match capability {
        // Any authenticated actor except an applicant mid-review.
        Capability::SubmitPlant => matches!(
            actor,
            Some(Role::Contributor) | Some(Role::Expert) | Some(Role::ExpertRejected)
                | Some(Role::Admin)
        ),
        Capability::ViewPendingQueue
        | Capability::AdjudicateSubmission
        | Capability::ViewOwnHistory => matches!(actor, Some(Role::Expert)),
        Capability::ManageExpertApplications => matches!(actor, Some(Role::Admin)),
        Capability::ViewPublicCatalog => true,
    };

    if allowed {
        Decision::Allow
    } else {
        Decision::Deny {
            redirect: denied_redirect(actor),
        }
    }
}

/// Each role's home destination, so a denial never redirects into another
/// gate that would deny again.
fn denied_redirect(actor: Option<Role>) -> RedirectHint {
    match actor {
        None => RedirectHint::Login,
        Some(Role::ExpertApplicant) => RedirectHint::AwaitingApproval,
        Some(Role::Contributor) | Some(Role::ExpertRejected) => RedirectHint::ContributorDashboard,
        Some(Role::Expert) => RedirectHint::ExpertDashboard,
        Some(Role::Admin) => RedirectHint::AdminDashboard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTORS: [Option<Role>; 6] = [
        None,
        Some(Role::Contributor),
        Some(Role::ExpertApplicant),
        Some(Role::Expert),
        Some(Role::ExpertRejected),
        Some(Role::Admin),
    ];

    const ALL_CAPABILITIES: [Capability; 6] = [
        Capability::SubmitPlant,
        Capability::ViewPendingQueue,
        Capability::AdjudicateSubmission,
        Capability::ViewOwnHistory,
        Capability::ManageExpertApplications,
        Capability::ViewPublicCatalog,
    ];

    fn expected_allow(actor: Option<Role>, capability: Capability) -> bool {
        match capability {
            Capability::SubmitPlant => matches!(
                actor,
                Some(Role::Contributor)
                    | Some(Role::Expert)
                    | Some(Role::ExpertRejected)
                    | Some(Role::Admin)
            ),
            Capability::ViewPendingQueue
            | Capability::AdjudicateSubmission
            | Capability::ViewOwnHistory => actor == Some(Role::Expert),
            Capability::ManageExpertApplications => actor == Some(Role::Admin),
            Capability::ViewPublicCatalog => true,
        }
    }

    #[test]
    fn test_full_table() {
        for actor in ALL_ACTORS {
            for capability in ALL_CAPABILITIES {
                let decision = authorize(actor, capability);
                if expected_allow(actor, capability) {
                    assert_eq!(
                        decision,
                        Decision::Allow,
                        "expected allow for {:?} / {:?}",
                        actor,
                        capability
                    );
                } else {
                    assert!(
                        matches!(decision, Decision::Deny { .. }),
                        "expected deny for {:?} / {:?}",
                        actor,
                        capability
                    );
                }
            }
        }
    }

    #[test]
    fn test_deterministic() {
        for actor in ALL_ACTORS {
            for capability in ALL_CAPABILITIES {
                assert_eq!(
                    authorize(actor, capability),
                    authorize(actor, capability)
                );
            }
        }
    }

    #[test]
    fn test_redirects_avoid_loops() {
        // An applicant denied an expert capability lands on the waiting page,
        // not back at a gate that would deny again.
        assert_eq!(
            authorize(Some(Role::ExpertApplicant), Capability::AdjudicateSubmission),
            Decision::Deny {
                redirect: RedirectHint::AwaitingApproval
            }
        );
        // A contributor denied an expert capability goes to their own dashboard.
        assert_eq!(
            authorize(Some(Role::Contributor), Capability::ViewPendingQueue),
            Decision::Deny {
                redirect: RedirectHint::ContributorDashboard
            }
        );
        // Unauthenticated goes to login.
        assert_eq!(
            authorize(None, Capability::SubmitPlant),
            Decision::Deny {
                redirect: RedirectHint::Login
            }
        );
        // An expert denied an admin capability goes to the expert dashboard.
        assert_eq!(
            authorize(Some(Role::Expert), Capability::ManageExpertApplications),
            Decision::Deny {
                redirect: RedirectHint::ExpertDashboard
            }
        );
        // An admin is not an expert; the pending queue sends them home.
        assert_eq!(
            authorize(Some(Role::Admin), Capability::ViewPendingQueue),
            Decision::Deny {
                redirect: RedirectHint::AdminDashboard
            }
        );
    }

    #[test]
    fn test_applicant_cannot_submit_mid_review() {
        assert!(matches!(
            authorize(Some(Role::ExpertApplicant), Capability::SubmitPlant),
            Decision::Deny { .. }
        ));
    }

    #[test]
    fn test_catalog_is_public() {
        for actor in ALL_ACTORS {
            assert_eq!(
                authorize(actor, Capability::ViewPublicCatalog),
                Decision::Allow
            );
        }
    }
}
