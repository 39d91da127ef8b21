pub mod dispatcher;
pub mod engine;
pub mod frame_sink;
pub mod processor;
