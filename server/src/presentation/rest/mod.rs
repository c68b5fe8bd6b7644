mod context;
mod dto;
mod error;
mod handlers;
mod router;

pub use context::{ACCOUNT_HEADER, AccountContext};
pub use dto::*;
pub use error::ApiError;
pub use router::{AppState, create_router};
