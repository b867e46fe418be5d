//! facegated: HTTP daemon matching captured photos against enrolled profiles.

pub mod config;
pub mod engine;
pub mod error;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;

pub use config::Config;
pub use error::{ErrorCode, MatchRequestError};
pub use response::{MatchResponse, Outcome};
pub use service::MatchService;
pub use state::AppState;
