pub mod discovery;
pub mod merge;
pub mod poller;
pub mod query;
pub mod refresher;
pub mod resolver;
pub mod settings;
pub mod shutdown;
pub mod store;
pub mod supervisor;
