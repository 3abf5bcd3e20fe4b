pub mod export;
pub mod gesuch;
pub mod rapport;
pub mod service_job;
pub mod teilprojekt;
pub mod user;
pub mod webhook_log;
