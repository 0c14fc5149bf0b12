pub mod args;
pub mod config;
pub mod diff;
pub mod document;
pub mod error;
pub mod image_search;
pub mod lexer;
pub mod patch;
pub mod pipeline;
pub mod resolver;
pub mod rules;
pub mod scale;
pub mod scanner;

pub use config::Config;
pub use error::InsertError;
pub use pipeline::{Edit, InsertRequest, plan_insert};
