// Application layer - orchestrates the domain capabilities
pub mod dto;
pub mod errors;
pub mod services;
