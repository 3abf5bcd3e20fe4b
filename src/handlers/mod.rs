pub mod auth_handlers;
pub mod gesuch_handlers;
pub mod rapport_handlers;
pub mod user_handlers;
pub mod webhook_handlers;
