pub mod adapters;
pub mod bank;
pub mod config;
pub mod controllers;
pub mod handlers;
pub mod models;
pub mod ports;
