//! GPU timeline rendering
//!
//! Calls are instanced unit boxes: x is time relative to the live edge, y is
//! call depth over the deepest retained depth, z is the thread lane. GC
//! pauses are translucent boxes spanning every lane; READY and SUSPENDED
//! periods shade their own lane.

pub mod camera;
pub mod geometry;
pub mod gpu_types;
pub mod gpu_vec;
pub mod renderer;

pub use camera::Camera;
pub use gpu_types::{
    encode_time, method_color, time_offset_seconds, CallBox, CameraUniform, GcBox, IdleBox, IDLE_READY, IDLE_SUSPENDED,
    OPEN_END,
};
pub use gpu_vec::GpuVec;
pub use renderer::{Renderer, MAX_LANES};
