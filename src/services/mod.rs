#[cfg(feature = "ssr")]
pub mod openai;

#[cfg(feature = "ssr")]
pub use openai::*;
