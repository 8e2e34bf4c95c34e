pub mod filters;
pub mod todo;
pub mod user;

pub use filters::{TodoFilters, TodoQuery};
pub use todo::{
    CreateTodoRequest, NewSubtask, NewTodo, Subtask, Todo, TodoChanges, TodoPriority, TodoRow,
    TodoStatus, UpdateTodoRequest,
};
pub use user::{NewUser, PublicUser, User};
