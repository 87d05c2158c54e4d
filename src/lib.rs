pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod global;
pub mod poller;
pub mod presentation;
pub mod recorder;
pub mod storage;
