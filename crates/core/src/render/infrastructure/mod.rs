pub mod logging_display_sink;
pub mod snapshot_display_sink;
