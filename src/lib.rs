pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payment;
pub mod routes;
pub mod storage;
