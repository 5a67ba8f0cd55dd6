pub mod annotations;
pub mod compositor;
pub mod display_sink;
pub mod infrastructure;
pub mod status_overlay;
