pub mod domain;
pub mod errors;
pub mod pipeline;
pub mod service;
pub mod text;
pub mod traits;
