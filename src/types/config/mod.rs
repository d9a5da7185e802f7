pub mod pipeline;
pub mod sync;
