// Persistence utilities
pub mod avatar_image;
pub mod file_system;
