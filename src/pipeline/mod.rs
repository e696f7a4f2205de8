pub mod matcher;
pub mod notify;
pub mod policy;
pub mod session;
pub mod store;
pub mod throttle;
