pub mod frame_obscurer;
