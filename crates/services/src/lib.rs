#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod export_service;
pub mod session_loop;
pub mod session_service;

pub use drill_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, ExportError, SessionError};
pub use export_service::ExportService;
pub use session_loop::{SessionLoopService, SubmitResult};
pub use session_service::{AnswerFeedback, SessionService};
