pub mod file;
pub mod memory;
pub mod ports;

pub use file::{FileLearningStateStore, FileRoadmapRepository};
pub use memory::{InMemoryLearningStateStore, InMemoryRoadmapRepository};
pub use ports::{LearningStateStore, RoadmapRepository};
