#![doc = include_str!("../README.md")]

pub mod error;
pub mod permission;
pub mod stream;
pub mod traits;
pub mod types;
pub mod wasm;

pub use error::*;
pub use permission::*;
pub use stream::*;
pub use traits::*;
pub use types::*;
pub use wasm::*;
