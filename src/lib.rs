pub mod api;
pub mod classify;
pub mod config;
pub mod countdown;
pub mod error;
pub mod feed;
pub mod models;
pub mod observability;
pub mod orders;
pub mod routing;
pub mod state;
pub mod tracking;
pub mod viewport;
