pub mod cpu_frame_obscurer;
mod gaussian;
