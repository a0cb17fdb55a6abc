pub mod analysis;
pub mod app;
pub mod captures;
pub mod clock;
pub mod config;
pub mod db;
pub mod entries;
pub mod prefs;
pub mod state;
