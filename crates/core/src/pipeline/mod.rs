pub mod analysis_loop;
pub mod error;
pub mod pipeline_events;
pub mod pipeline_logger;
pub mod pipeline_status;
pub mod privacy_pipeline;
pub mod render_loop;
pub mod shared_state;
