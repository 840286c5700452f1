//! HTTP request handlers.

pub mod auth_handler;
pub mod dashboard_handler;
pub mod message_handler;
pub mod service_handler;
pub mod skill_handler;
pub mod user_handler;
pub mod ws_handler;

pub use auth_handler::auth_routes;
pub use dashboard_handler::dashboard_routes;
pub use message_handler::message_routes;
pub use service_handler::service_routes;
pub use skill_handler::skill_routes;
pub use user_handler::user_routes;
pub use ws_handler::ws_upgrade;
