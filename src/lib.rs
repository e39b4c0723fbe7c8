#[cfg(feature = "ssr")]
pub mod app;
pub mod brand_parser;
#[cfg(feature = "ssr")]
pub mod cancellable_stream;
pub mod client;
pub mod config;
#[cfg(feature = "ssr")]
pub mod handlers;
#[cfg(feature = "ssr")]
pub mod middleware;
pub mod services;
pub mod session;
pub mod state;
pub mod types;

pub use brand_parser::{derive_records, BrandRecord};
pub use session::{GenerationSession, Phase};
pub use types::{GenerationRequest, Tone, ValidationError};
