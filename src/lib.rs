pub mod api;
pub mod config;
pub mod engine;
pub mod models;
pub mod redirect;
pub mod storage;
pub mod visitor;
