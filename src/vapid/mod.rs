pub mod keys;

mod router;

pub use router::router;
