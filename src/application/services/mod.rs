pub mod avatar_link_verifier;
pub mod avatar_retention_service;
pub mod avatar_service;
pub mod avatar_upload_service;
mod deadline;
