pub mod chinese_order;
pub mod sse_buffer;
pub mod text;
