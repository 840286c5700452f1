//! Domain layer - Core business entities and logic
//!
//! This module contains the core domain models that represent
//! business concepts independent of infrastructure concerns.

pub mod message;
pub mod password;
pub mod service;
pub mod user;

pub use message::{ConversationSummary, LastMessage, Message, MessageResponse};
pub use password::Password;
pub use service::{
    average_rating, Agreement, Feedback, FeedbackEntry, Milestone, ParticipantRole, Service,
    ServiceResponse, ServiceStatus,
};
pub use user::{PortfolioItem, Skill, SkillLevel, User, UserResponse, UserSummary};
