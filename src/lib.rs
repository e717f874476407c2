pub mod app;
pub mod config;
pub mod details;
pub mod error;
pub mod favorites;
pub mod listing;
pub mod models;
pub mod navigation;
pub mod present;
pub mod scope;
pub mod screens;
pub mod search;
pub mod tmdb;
pub mod toggle;
