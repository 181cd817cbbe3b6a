pub mod entity_access_repo;
pub mod generation_usage_repo;
pub mod model_file_repo;
pub mod model_version_repo;
pub mod resource_repo;

pub use entity_access_repo::EntityAccessRepo;
pub use generation_usage_repo::GenerationUsageRepo;
pub use model_file_repo::ModelFileRepo;
pub use model_version_repo::ModelVersionRepo;
pub use resource_repo::ResourceRepo;
