pub mod backend;
pub mod error_shapes;
pub mod openai_chat;
