// Data Transfer Objects
pub mod avatar_dto;
