pub mod endpoints;
pub mod links;
pub mod routes;
pub mod utils;
