pub mod model_file;
pub mod resource;

pub use model_file::{ModelFileRow, TrainingHistoryEntry, TrainingJobRow, TrainingResults};
pub use resource::ResourceRow;
