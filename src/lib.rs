pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod input_json;
pub mod output;
pub mod portal;
pub mod quality;
pub mod recolor;
pub mod selection;
