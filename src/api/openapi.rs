//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::api::handlers::{
    auth_handler, dashboard_handler, message_handler, service_handler, skill_handler, user_handler,
};
use crate::domain::{
    Agreement, ConversationSummary, Feedback, FeedbackEntry, LastMessage, MessageResponse,
    Milestone, ParticipantRole, PortfolioItem, ServiceResponse, ServiceStatus, Skill, SkillLevel,
    UserResponse, UserSummary,
};
use crate::services::{
    Activity, ActivityKind, CompletionReceipt, DashboardStats, EngagedService, RegisteredUser,
    TokenResponse, UserStats,
};

/// OpenAPI documentation for the SkillSwap API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SkillSwap API",
        version = "0.1.0",
        description = "Skill-bartering marketplace: post services, accept them, \
                       exchange credits on completion, message and rate participants",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Authentication endpoints
        auth_handler::register,
        auth_handler::login,
        auth_handler::forgot_password,
        auth_handler::reset_password,
        // Service endpoints
        service_handler::list_services,
        service_handler::recent_services,
        service_handler::accepted_services,
        service_handler::get_service,
        service_handler::create_service,
        service_handler::update_service,
        service_handler::delete_service,
        service_handler::accept_service,
        service_handler::complete_service,
        service_handler::confirm_completion,
        service_handler::add_feedback,
        service_handler::update_status,
        service_handler::update_milestone,
        // User endpoints
        user_handler::get_profile,
        user_handler::update_profile,
        user_handler::add_skill,
        user_handler::update_skill,
        user_handler::remove_skill,
        user_handler::add_portfolio_item,
        user_handler::update_portfolio_item,
        user_handler::remove_portfolio_item,
        user_handler::get_stats,
        user_handler::search_users,
        user_handler::get_activities,
        user_handler::get_user,
        // Skill catalogue endpoints
        skill_handler::list_skills,
        skill_handler::users_by_skill,
        skill_handler::verify_skill,
        // Message endpoints
        message_handler::list_messages,
        message_handler::send_message,
        message_handler::conversations,
        message_handler::conversation,
        message_handler::mark_read,
        // Dashboard endpoints
        dashboard_handler::dashboard_stats,
    ),
    components(
        schemas(
            // Domain types
            ServiceStatus,
            ParticipantRole,
            Milestone,
            Agreement,
            FeedbackEntry,
            Feedback,
            ServiceResponse,
            Skill,
            SkillLevel,
            PortfolioItem,
            UserResponse,
            UserSummary,
            MessageResponse,
            LastMessage,
            ConversationSummary,
            // Service layer views
            EngagedService,
            CompletionReceipt,
            TokenResponse,
            RegisteredUser,
            UserStats,
            DashboardStats,
            Activity,
            ActivityKind,
            // Request types
            auth_handler::RegisterRequest,
            auth_handler::LoginRequest,
            auth_handler::ForgotPasswordRequest,
            auth_handler::ResetPasswordRequest,
            service_handler::CreateServiceRequest,
            service_handler::UpdateServiceRequest,
            service_handler::UpdateStatusRequest,
            service_handler::FeedbackRequest,
            service_handler::MilestoneRequest,
            service_handler::MilestoneUpdateRequest,
            user_handler::UpdateProfileRequest,
            user_handler::AddSkillRequest,
            user_handler::UpdateSkillRequest,
            user_handler::PortfolioItemRequest,
            user_handler::UpdatePortfolioItemRequest,
            message_handler::SendMessageRequest,
            skill_handler::VerifySkillRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login and password reset"),
        (name = "Services", description = "Service lifecycle: post, accept, complete, confirm, rate"),
        (name = "Users", description = "Profiles, skills, portfolio and activity"),
        (name = "Skills", description = "Global skill catalogue"),
        (name = "Messages", description = "Direct messages and conversations"),
        (name = "Dashboard", description = "Per-user exchange statistics")
    )
)]
pub struct ApiDoc;

/// Security scheme modifier for JWT Bearer authentication
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT token obtained from /auth/login"))
                        .build(),
                ),
            );
        }
    }
}
