pub mod category;
pub mod task;

pub use category::{Category, CategoryInfo};
pub use task::{
    ArchiveQuery, CompleteTaskRequest, NewTaskRequest, Task, TaskId, TaskIdsRequest,
    UpdateTaskRequest, DEFAULT_ARCHIVE_PAGE_SIZE,
};
