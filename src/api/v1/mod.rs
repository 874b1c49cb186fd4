/*
 * Responsibility
 * - v1 entry points (routes() re-export, extractors)
 */
pub mod extractors;
pub mod handlers;
mod routes;

pub use routes::routes;
