pub mod chat_service;
pub mod session_service;
pub mod text_stream;
pub mod upload_service;
