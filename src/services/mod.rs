pub mod notification;
pub mod orchestrator;
pub mod reservation;
pub mod templates;
