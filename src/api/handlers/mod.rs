pub mod activities;
pub mod announcements;
pub mod attendance;
pub mod auth;
pub mod core;
