pub mod smoothing;

pub use smoothing::{approach, finite_or, frame_decay, frame_factor, sanitize_dt};
