pub mod rest;

pub use rest::{AccountContext, ApiError, AppState, create_router};
