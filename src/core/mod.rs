pub mod analysis;
pub mod keywords;
pub mod model;
pub mod progress;
pub mod prompts;
pub mod retry;
pub mod storage;
pub mod trends;
pub mod youtube;

pub use analysis::*;
pub use model::Model;
pub use progress::{Progress, ProgressLog};
pub use prompts::PromptTemplates;
pub use storage::StorageService;
pub use youtube::YouTubeClient;
