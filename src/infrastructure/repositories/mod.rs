pub mod file_object_store;
pub mod file_profile_repository;
pub mod memory_object_store;
pub mod memory_profile_repository;
