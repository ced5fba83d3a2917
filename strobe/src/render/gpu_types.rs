//! Instance and uniform layouts shared with `shader.wgsl`
//!
//! ## 64-bit time on the GPU
//!
//! WGSL has no 64-bit integers, so a nanosecond timestamp travels as two
//! `u32` words: the low 31 bits and the next 32 bits. Keeping the low word
//! below 2^31 leaves room for the borrow when the shader subtracts the
//! camera's `base_time`. The difference is converted to `f32` seconds only
//! after the subtraction, which keeps sub-microsecond precision near the
//! live edge regardless of how long the producer has been running.
//!
//! An `end_time` whose high word is [`OPEN_HIGH`] marks a call that has not
//! returned yet; the shader places its end at `base_time`.

use bytemuck::{Pod, Zeroable};

use crate::domain::Timestamp;
use strobe_common::ThreadState;

use crate::timeline::{CallInterval, GcInterval, IdleSpan};

/// High word reserved for "still open"
pub const OPEN_HIGH: u32 = 0xFFFF_FFFF;

/// Encoded end of an open interval
pub const OPEN_END: [u32; 2] = encode_time(u64::MAX);

const LOW_MASK: u64 = 0x7FFF_FFFF;
const LOW_RANGE: f32 = 2_147_483_648.0;

/// Split nanoseconds into `[low 31 bits, next 32 bits]`
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn encode_time(nanos: u64) -> [u32; 2] {
    [(nanos & LOW_MASK) as u32, ((nanos >> 31) & 0xFFFF_FFFF) as u32]
}

fn encode_end(end: Option<Timestamp>) -> [u32; 2] {
    end.map_or(OPEN_END, |t| encode_time(t.as_nanos()))
}

/// CPU mirror of the shader's `time_offset`: seconds from `base` to `time`
///
/// Negative for times before `base`. An open end maps to 0.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]
pub fn time_offset_seconds(time: [u32; 2], base: [u32; 2]) -> f32 {
    if time[1] == OPEN_HIGH {
        return 0.0;
    }
    let mut low = time[0].wrapping_sub(base[0]);
    let mut high = time[1].wrapping_sub(base[1]);
    if time[0] < base[0] {
        low = low.wrapping_add(0x8000_0000);
        high = high.wrapping_sub(1);
    }
    ((high as i32) as f32 * LOW_RANGE + low as f32) / 1e9
}

/// CPU mirror of the shader's `method_color`
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn method_color(method_id: u32) -> [f32; 3] {
    let channel = |k: u32| (method_id.wrapping_mul(k) % 255) as f32 / 255.0;
    [channel(123), channel(456), channel(789)]
}

/// One call rendered as a box (instance data)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct CallBox {
    pub start_time: [u32; 2],
    pub end_time: [u32; 2],
    pub method_id: u32,
    pub depth: u32,
}

const _: () = assert!(std::mem::size_of::<CallBox>() == 24);

impl CallBox {
    const ATTRIBUTES: [wgpu::VertexAttribute; 4] =
        wgpu::vertex_attr_array![1 => Uint32x2, 2 => Uint32x2, 3 => Uint32, 4 => Uint32];

    #[must_use]
    pub fn from_interval(interval: &CallInterval) -> Self {
        Self {
            start_time: encode_time(interval.start.as_nanos()),
            end_time: encode_end(interval.end),
            method_id: interval.method_id.gpu_id(),
            depth: interval.depth,
        }
    }

    #[must_use]
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// One GC pause rendered as a translucent full-height box
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct GcBox {
    pub start_time: [u32; 2],
    pub end_time: [u32; 2],
}

const _: () = assert!(std::mem::size_of::<GcBox>() == 16);

impl GcBox {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![1 => Uint32x2, 2 => Uint32x2];

    #[must_use]
    pub fn from_interval(interval: &GcInterval) -> Self {
        Self { start_time: encode_time(interval.start.as_nanos()), end_time: encode_end(interval.end) }
    }

    #[must_use]
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Shade selector for an idle span, matched by `vs_idle`
pub const IDLE_READY: u32 = 0;
pub const IDLE_SUSPENDED: u32 = 1;

/// One waiting period of a thread, shaded across its lane
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct IdleBox {
    pub start_time: [u32; 2],
    pub end_time: [u32; 2],
    pub state: u32,
}

const _: () = assert!(std::mem::size_of::<IdleBox>() == 20);

impl IdleBox {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![1 => Uint32x2, 2 => Uint32x2, 3 => Uint32];

    #[must_use]
    pub fn from_span(span: &IdleSpan) -> Self {
        let state = if span.state == ThreadState::Ready { IDLE_READY } else { IDLE_SUSPENDED };
        Self {
            start_time: encode_time(span.start.as_nanos()),
            end_time: encode_end(span.end),
            state,
        }
    }

    #[must_use]
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Per-frame camera state
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub base_time: [u32; 2],
    pub max_depth: u32,
    pub num_threads: u32,
}

const _: () = assert!(std::mem::size_of::<CameraUniform>() == 80);

/// Lane index bound with a dynamic offset per draw
///
/// Padded to 16 bytes, the minimum uniform binding size.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct LaneUniform {
    pub lane_id: u32,
    _pad: [u32; 3],
}

impl LaneUniform {
    #[must_use]
    pub const fn new(lane_id: u32) -> Self {
        Self { lane_id, _pad: [0; 3] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MethodId, ThreadId};
    use proptest::prelude::*;

    #[allow(clippy::cast_precision_loss)]
    fn reference_seconds(time: u64, base: u64) -> f64 {
        // Exact integer difference, rounded once
        (i128::from(time) - i128::from(base)) as f64 / 1e9
    }

    #[test]
    fn test_encode_time_words() {
        assert_eq!(encode_time(0), [0, 0]);
        assert_eq!(encode_time(0x7FFF_FFFF), [0x7FFF_FFFF, 0]);
        assert_eq!(encode_time(0x8000_0000), [0, 1]);
        assert_eq!(encode_time(u64::MAX)[1], OPEN_HIGH);
    }

    #[test]
    fn test_offset_with_borrow() {
        // base just below a low-word boundary, time just past it
        let base = 3 * 0x8000_0000 - 5;
        let time = 3 * 0x8000_0000 + 7;
        assert!(encode_time(time)[0] < encode_time(base)[0]);
        let offset = time_offset_seconds(encode_time(time), encode_time(base));
        assert!((f64::from(offset) - reference_seconds(time, base)).abs() < 1e-9);
    }

    #[test]
    fn test_open_end_maps_to_base() {
        let base = encode_time(123_456_789_000);
        assert!(time_offset_seconds(OPEN_END, base).abs() < f32::EPSILON);
    }

    #[test]
    fn test_call_box_from_interval() {
        let interval = CallInterval {
            thread_id: ThreadId(1),
            depth: 3,
            method_id: MethodId(0x1_0000_0002),
            start: Timestamp(0x8000_0001),
            end: None,
        };
        let call = CallBox::from_interval(&interval);
        assert_eq!(call.start_time, [1, 1]);
        assert_eq!(call.end_time[1], OPEN_HIGH);
        assert_eq!(call.method_id, 2);
        assert_eq!(call.depth, 3);
    }

    #[test]
    fn test_idle_box_from_span() {
        let waiting = IdleBox::from_span(&IdleSpan {
            state: ThreadState::Suspended,
            start: Timestamp(0x8000_0002),
            end: None,
        });
        assert_eq!(waiting, IdleBox { start_time: [2, 1], end_time: OPEN_END, state: IDLE_SUSPENDED });

        let ready = IdleBox::from_span(&IdleSpan {
            state: ThreadState::Ready,
            start: Timestamp(10),
            end: Some(Timestamp(40)),
        });
        assert_eq!(ready.end_time, [40, 0]);
        assert_eq!(ready.state, IDLE_READY);
    }

    #[test]
    fn test_method_color() {
        assert_eq!(method_color(0), [0.0, 0.0, 0.0]);
        let [r, g, b] = method_color(1);
        assert!((r - 123.0 / 255.0).abs() < f32::EPSILON);
        assert!((g - 201.0 / 255.0).abs() < f32::EPSILON);
        assert!((b - 24.0 / 255.0).abs() < f32::EPSILON);
        // 32-bit wrapping multiply, not 64-bit
        let id = 0x0200_0000u32;
        assert_eq!(method_color(id)[0], ((id.wrapping_mul(123) % 255) as f32) / 255.0);
    }

    proptest! {
        /// Offsets within a day of each other stay accurate for any producer uptime
        #[test]
        fn prop_time_split_accuracy(base in 0u64..(1 << 62), back in 0u64..86_400_000_000_000) {
            let time = base.saturating_sub(back);
            let offset = f64::from(time_offset_seconds(encode_time(time), encode_time(base)));
            let reference = reference_seconds(time, base);
            prop_assert!((offset - reference).abs() <= 1e-6 * reference.abs() + 1e-6,
                "offset {} vs reference {}", offset, reference);
        }
    }
}
