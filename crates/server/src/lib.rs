pub mod config;
pub mod db;
pub mod error;
pub mod mailer;
pub mod routes;
pub mod session;
pub mod state;
