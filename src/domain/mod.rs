// Domain layer - core types and the capabilities the services depend on
pub mod clock;
pub mod errors;
pub mod models;
pub mod repositories;
