//! Service domain entity and the exchange lifecycle state machine.
//!
//! A service is the unit of exchange: posted by a requester, accepted
//! and performed by a provider, settled in credits on confirmed
//! completion. All transition and ownership rules live here; the
//! service layer orchestrates persistence around them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::UserSummary;
use crate::errors::{AppError, AppResult};

/// Lifecycle status of a service exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceStatus {
    Available,
    Pending,
    InProgress,
    PendingConfirmation,
    Completed,
    Cancelled,
}

impl ServiceStatus {
    /// Stable wire/storage spelling
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceStatus::Available => "available",
            ServiceStatus::Pending => "pending",
            ServiceStatus::InProgress => "in-progress",
            ServiceStatus::PendingConfirmation => "pending-confirmation",
            ServiceStatus::Completed => "completed",
            ServiceStatus::Cancelled => "cancelled",
        }
    }

    /// The set of statuses reachable from this one
    pub fn allowed_next(self) -> &'static [ServiceStatus] {
        match self {
            ServiceStatus::Available => &[
                ServiceStatus::Pending,
                ServiceStatus::InProgress,
                ServiceStatus::Cancelled,
            ],
            ServiceStatus::Pending => &[ServiceStatus::InProgress, ServiceStatus::Cancelled],
            ServiceStatus::InProgress => &[
                ServiceStatus::PendingConfirmation,
                ServiceStatus::Completed,
                ServiceStatus::Cancelled,
            ],
            ServiceStatus::PendingConfirmation => &[ServiceStatus::Completed],
            ServiceStatus::Completed | ServiceStatus::Cancelled => &[],
        }
    }

    /// Check a transition against the table
    pub fn can_transition_to(self, next: ServiceStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Terminal statuses admit no further transitions
    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Statuses that imply an assigned provider
    pub fn requires_provider(self) -> bool {
        matches!(
            self,
            ServiceStatus::InProgress
                | ServiceStatus::PendingConfirmation
                | ServiceStatus::Completed
        )
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ServiceStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ServiceStatus::Available),
            "pending" => Ok(ServiceStatus::Pending),
            "in-progress" => Ok(ServiceStatus::InProgress),
            "pending-confirmation" => Ok(ServiceStatus::PendingConfirmation),
            "completed" => Ok(ServiceStatus::Completed),
            "cancelled" => Ok(ServiceStatus::Cancelled),
            other => Err(AppError::validation(format!(
                "Unknown service status: {}",
                other
            ))),
        }
    }
}

/// Which side of the exchange a user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Requester,
    Provider,
}

/// A milestone inside a service engagement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    pub id: Uuid,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

/// Terms agreed between the two parties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terms: Option<String>,
    #[serde(default)]
    pub accepted_by_requester: bool,
    #[serde(default)]
    pub accepted_by_provider: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
}

/// A single feedback entry left by one side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Feedback slots, at most one per role, overwritable per role
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_requester: Option<FeedbackEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_provider: Option<FeedbackEntry>,
}

/// Service domain entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub duration: String,
    /// Price of the exchange, always >= 1
    pub credits: i64,
    pub requester: Uuid,
    pub provider: Option<Uuid>,
    pub status: ServiceStatus,
    pub skills_required: Vec<String>,
    pub skills_offered: Vec<String>,
    pub milestones: Vec<Milestone>,
    pub agreement: Agreement,
    pub feedback: Feedback,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Service {
    /// The caller's role on this service, if any
    pub fn participant_role(&self, user: Uuid) -> Option<ParticipantRole> {
        if self.requester == user {
            Some(ParticipantRole::Requester)
        } else if self.provider == Some(user) {
            Some(ParticipantRole::Provider)
        } else {
            None
        }
    }

    /// Guard for Accept: available, unclaimed, and not the caller's own post
    pub fn ensure_can_accept(&self, caller: Uuid) -> AppResult<()> {
        if self.requester == caller {
            return Err(AppError::Forbidden);
        }
        if self.provider.is_some() {
            return Err(AppError::conflict("Service already has a provider"));
        }
        if self.status != ServiceStatus::Available {
            return Err(AppError::conflict(format!(
                "Service is not available for acceptance (current status: {})",
                self.status
            )));
        }
        Ok(())
    }

    /// Guard for MarkComplete: only the provider, only while in progress
    pub fn ensure_can_mark_complete(&self, caller: Uuid) -> AppResult<()> {
        if self.provider != Some(caller) {
            return Err(AppError::Forbidden);
        }
        if self.status != ServiceStatus::InProgress {
            return Err(AppError::conflict(
                "Service must be in progress to be marked as completed",
            ));
        }
        Ok(())
    }

    /// Guard for ConfirmCompletion: only the requester, only while pending confirmation
    pub fn ensure_can_confirm(&self, caller: Uuid) -> AppResult<()> {
        if self.requester != caller {
            return Err(AppError::Forbidden);
        }
        if self.status != ServiceStatus::PendingConfirmation {
            return Err(AppError::conflict(
                "Service must be in pending-confirmation status",
            ));
        }
        Ok(())
    }

    /// Guard for AddFeedback: participants only, completed services only
    pub fn ensure_feedback_allowed(&self, caller: Uuid) -> AppResult<ParticipantRole> {
        let role = self.participant_role(caller).ok_or(AppError::Forbidden)?;
        if self.status != ServiceStatus::Completed {
            return Err(AppError::conflict("Can only rate completed services"));
        }
        Ok(role)
    }

    /// Guard for the generic status transition entry point
    pub fn ensure_transition(&self, next: ServiceStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::conflict(format!(
                "Invalid status transition from {} to {}",
                self.status, next
            )));
        }
        Ok(())
    }

    /// Guard for Edit: requester only, and only before the exchange is engaged
    pub fn ensure_editable_by(&self, caller: Uuid) -> AppResult<()> {
        if self.requester != caller {
            return Err(AppError::Forbidden);
        }
        if !matches!(
            self.status,
            ServiceStatus::Available | ServiceStatus::Pending
        ) {
            return Err(AppError::conflict(format!(
                "Cannot edit a service in {} status",
                self.status
            )));
        }
        Ok(())
    }
}

/// Arithmetic mean of the given ratings; None when there are none.
///
/// Used for provider rating recomputation: an empty set must leave the
/// stored rating untouched rather than reset it.
pub fn average_rating(ratings: &[f64]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    Some(ratings.iter().sum::<f64>() / ratings.len() as f64)
}

/// Service response with participant identities resolved
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub category: String,
    pub location: String,
    pub duration: String,
    pub credits: i64,
    pub status: ServiceStatus,
    pub requester: UserSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<UserSummary>,
    pub skills_required: Vec<String>,
    pub skills_offered: Vec<String>,
    pub milestones: Vec<Milestone>,
    pub agreement: Agreement,
    pub feedback: Feedback,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceResponse {
    /// Assemble a response from the entity and resolved participants
    pub fn new(service: Service, requester: UserSummary, provider: Option<UserSummary>) -> Self {
        Self {
            id: service.id,
            title: service.title,
            description: service.description,
            category: service.category,
            location: service.location,
            duration: service.duration,
            credits: service.credits,
            status: service.status,
            requester,
            provider,
            skills_required: service.skills_required,
            skills_offered: service.skills_offered,
            milestones: service.milestones,
            agreement: service.agreement,
            feedback: service.feedback,
            completed_at: service.completed_at,
            created_at: service.created_at,
            updated_at: service.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service(status: ServiceStatus, requester: Uuid, provider: Option<Uuid>) -> Service {
        let now = Utc::now();
        Service {
            id: Uuid::new_v4(),
            title: "Logo design".to_string(),
            description: "Design a logo".to_string(),
            category: "Design".to_string(),
            location: "Remote".to_string(),
            duration: "1 week".to_string(),
            credits: 5,
            requester,
            provider,
            status,
            skills_required: vec!["design".to_string()],
            skills_offered: vec![],
            milestones: vec![],
            agreement: Agreement::default(),
            feedback: Feedback::default(),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn transition_table_matches_specification() {
        use ServiceStatus::*;

        let cases: &[(ServiceStatus, &[ServiceStatus])] = &[
            (Available, &[Pending, InProgress, Cancelled]),
            (Pending, &[InProgress, Cancelled]),
            (InProgress, &[PendingConfirmation, Completed, Cancelled]),
            (PendingConfirmation, &[Completed]),
            (Completed, &[]),
            (Cancelled, &[]),
        ];

        let all = [
            Available,
            Pending,
            InProgress,
            PendingConfirmation,
            Completed,
            Cancelled,
        ];

        for (from, allowed) in cases {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&to),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn terminal_statuses_admit_no_transitions() {
        assert!(ServiceStatus::Completed.is_terminal());
        assert!(ServiceStatus::Cancelled.is_terminal());
        assert!(!ServiceStatus::Available.is_terminal());
        assert!(!ServiceStatus::PendingConfirmation.is_terminal());
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            ServiceStatus::Available,
            ServiceStatus::Pending,
            ServiceStatus::InProgress,
            ServiceStatus::PendingConfirmation,
            ServiceStatus::Completed,
            ServiceStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<ServiceStatus>().unwrap(), status);
        }
        assert!("open".parse::<ServiceStatus>().is_err());
    }

    #[test]
    fn requester_cannot_accept_own_service() {
        let requester = Uuid::new_v4();
        let service = test_service(ServiceStatus::Available, requester, None);

        let result = service.ensure_can_accept(requester);
        assert!(matches!(result, Err(AppError::Forbidden)));
    }

    #[test]
    fn accept_rejected_when_provider_already_set() {
        let service = test_service(
            ServiceStatus::InProgress,
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
        );

        let result = service.ensure_can_accept(Uuid::new_v4());
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[test]
    fn accept_rejected_for_non_available_status() {
        let service = test_service(ServiceStatus::Cancelled, Uuid::new_v4(), None);

        let result = service.ensure_can_accept(Uuid::new_v4());
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[test]
    fn accept_allowed_for_available_unclaimed_service() {
        let service = test_service(ServiceStatus::Available, Uuid::new_v4(), None);
        assert!(service.ensure_can_accept(Uuid::new_v4()).is_ok());
    }

    #[test]
    fn only_provider_may_mark_complete() {
        let provider = Uuid::new_v4();
        let service = test_service(ServiceStatus::InProgress, Uuid::new_v4(), Some(provider));

        assert!(service.ensure_can_mark_complete(provider).is_ok());
        assert!(matches!(
            service.ensure_can_mark_complete(service.requester),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn mark_complete_requires_in_progress() {
        let provider = Uuid::new_v4();
        let service = test_service(ServiceStatus::Completed, Uuid::new_v4(), Some(provider));

        assert!(matches!(
            service.ensure_can_mark_complete(provider),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn only_requester_may_confirm() {
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let service = test_service(
            ServiceStatus::PendingConfirmation,
            requester,
            Some(provider),
        );

        assert!(service.ensure_can_confirm(requester).is_ok());
        assert!(matches!(
            service.ensure_can_confirm(provider),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn confirm_requires_pending_confirmation() {
        let requester = Uuid::new_v4();
        let service = test_service(ServiceStatus::InProgress, requester, Some(Uuid::new_v4()));

        assert!(matches!(
            service.ensure_can_confirm(requester),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn feedback_restricted_to_participants_of_completed_services() {
        let requester = Uuid::new_v4();
        let provider = Uuid::new_v4();
        let mut service = test_service(ServiceStatus::Completed, requester, Some(provider));

        assert_eq!(
            service.ensure_feedback_allowed(requester).unwrap(),
            ParticipantRole::Requester
        );
        assert_eq!(
            service.ensure_feedback_allowed(provider).unwrap(),
            ParticipantRole::Provider
        );
        assert!(matches!(
            service.ensure_feedback_allowed(Uuid::new_v4()),
            Err(AppError::Forbidden)
        ));

        service.status = ServiceStatus::InProgress;
        assert!(matches!(
            service.ensure_feedback_allowed(requester),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn edit_allowed_only_before_engagement() {
        let requester = Uuid::new_v4();

        let open = test_service(ServiceStatus::Available, requester, None);
        assert!(open.ensure_editable_by(requester).is_ok());
        assert!(matches!(
            open.ensure_editable_by(Uuid::new_v4()),
            Err(AppError::Forbidden)
        ));

        let engaged = test_service(ServiceStatus::InProgress, requester, Some(Uuid::new_v4()));
        assert!(matches!(
            engaged.ensure_editable_by(requester),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn average_rating_of_empty_set_is_none() {
        assert_eq!(average_rating(&[]), None);
    }

    #[test]
    fn average_rating_is_arithmetic_mean() {
        assert_eq!(average_rating(&[4.0]), Some(4.0));
        assert_eq!(average_rating(&[3.0, 5.0]), Some(4.0));
        assert_eq!(average_rating(&[1.0, 2.0, 3.0]), Some(2.0));
    }
}
