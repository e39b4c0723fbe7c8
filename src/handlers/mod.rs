pub mod brandgen;

pub use brandgen::*;
