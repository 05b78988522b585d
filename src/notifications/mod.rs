pub mod entities;
pub mod error;
pub mod gateway;
pub mod service;

mod router;

pub use router::router;
