// Capability interfaces implemented by the infrastructure layer
pub mod object_store;
pub mod profile_repository;
pub mod reachability_probe;
