pub mod routes;
pub mod handlers;
