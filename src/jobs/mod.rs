//! Background jobs processed by the worker command.

mod email_job;

pub use email_job::{email_job_handler, EmailJob};
