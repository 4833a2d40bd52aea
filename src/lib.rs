pub mod activities;
pub mod announcements;
pub mod api;
pub mod attendance;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod model;
pub mod stats;
