pub mod aggregate;
pub mod api;
pub mod auth;
pub mod cli;
pub mod clients;
pub mod commands;
pub mod config;
pub mod storage;
