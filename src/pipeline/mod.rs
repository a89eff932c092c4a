pub mod acquisition;
pub mod alignment;
pub mod color_convert;
pub mod generator;

// Re-exports for convenience
pub use generator::{FrameGenerator, GeneratorConfig, start_frame_generator, synthetic_bundle};
