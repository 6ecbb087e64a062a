pub mod state;

pub use ncaabase_api as api;
