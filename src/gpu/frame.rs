//! Per-frame GPU work description and the submission state machine.
//!
//! A [`FrameSource`] turns the current viewer state into a backend-neutral
//! [`CommandSequence`]; the presenter encodes it. [`FrameSubmitter`] keeps at
//! most one sequence in flight per surface.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::gpu::backend::RenderBackend;
use crate::gpu::residency::CommittedResidency;
use crate::processing::kernels::ResampleKernel;
use crate::processing::scale_plan::{ScalePlan, Size};

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

/// Two triangles covering clip space; `v` is flipped so row 0 of the image is at the top.
pub const QUAD: [Vertex; 6] = [
    Vertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    Vertex { position: [1.0, -1.0], uv: [1.0, 1.0] },
    Vertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
    Vertex { position: [-1.0, -1.0], uv: [0.0, 1.0] },
    Vertex { position: [1.0, 1.0], uv: [1.0, 0.0] },
    Vertex { position: [-1.0, 1.0], uv: [0.0, 0.0] },
];

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct QuadUniforms {
    /// `(targetW / viewportW, targetH / viewportH)`.
    pub scale: [f32; 2],
    pub _pad: [f32; 2],
}

/// Fragment filter used for the quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Passthrough,
    Kernel(ResampleKernel),
}

/// Completion signal of a super-sampling pass within one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fence(pub u64);

pub struct SuperSamplePass<B: RenderBackend> {
    pub scaler: Arc<B::Scaler>,
    pub source: Arc<B::Texture>,
    pub input: Size,
    pub output: Size,
    pub signal: Fence,
}

pub enum SampleSource<B: RenderBackend> {
    Texture(Arc<B::Texture>),
    ScalerOutput(Arc<B::Scaler>),
}

/// Everything one redraw submits, in encoding order.
pub struct CommandSequence<B: RenderBackend> {
    pub frame: u64,
    pub plan: ScalePlan,
    pub residency: CommittedResidency<B>,
    pub super_sample: Option<SuperSamplePass<B>>,
    pub uniforms: QuadUniforms,
    pub source: SampleSource<B>,
    pub filter: FilterKind,
    /// Fence the draw waits on before its fragment stage.
    pub wait: Option<Fence>,
    pub vertex_count: u32,
}

impl<B: RenderBackend> CommandSequence<B> {
    /// A draw sampling scaler output must wait on exactly that pass's fence,
    /// and a draw without a pass must not wait at all.
    pub fn ordering_is_sound(&self) -> bool {
        match (&self.super_sample, self.wait, &self.source) {
            (Some(pass), Some(wait), SampleSource::ScalerOutput(s)) => {
                pass.signal == wait && Arc::ptr_eq(&pass.scaler, s)
            }
            (None, None, SampleSource::Texture(_)) => true,
            _ => false,
        }
    }
}

/// Produces the GPU work for one redraw of a surface of the given size.
pub trait FrameSource<B: RenderBackend> {
    /// `None` skips the frame (nothing loaded, or a zero-size surface).
    fn produce_frame(&mut self, viewport: Size) -> Option<CommandSequence<B>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    Idle,
    Encoding,
    Submitted,
}

/// Enforces one in-flight submission; redraws requested meanwhile collapse
/// into a single follow-up.
#[derive(Debug)]
pub struct FrameSubmitter {
    state: SubmitState,
    redraw_again: bool,
    submissions: u64,
}

impl Default for FrameSubmitter {
    fn default() -> Self {
        Self {
            state: SubmitState::Idle,
            redraw_again: false,
            submissions: 0,
        }
    }
}

impl FrameSubmitter {
    pub fn state(&self) -> SubmitState {
        self.state
    }

    /// Enters `Encoding` if idle. Otherwise records that one more redraw is owed.
    pub fn begin(&mut self) -> bool {
        if self.state != SubmitState::Idle {
            self.redraw_again = true;
            return false;
        }
        self.state = SubmitState::Encoding;
        true
    }

    /// Abandons an encoding that produced nothing to submit.
    pub fn cancel(&mut self) {
        if self.state == SubmitState::Encoding {
            self.state = SubmitState::Idle;
        }
    }

    pub fn submitted(&mut self) {
        if self.state == SubmitState::Encoding {
            self.state = SubmitState::Submitted;
            self.submissions += 1;
        }
    }

    /// Returns to `Idle`; `true` if a redraw was requested in the meantime.
    pub fn complete(&mut self) -> bool {
        if self.state != SubmitState::Submitted {
            return false;
        }
        self.state = SubmitState::Idle;
        std::mem::take(&mut self.redraw_again)
    }

    pub fn in_flight(&self) -> bool {
        self.state != SubmitState::Idle
    }

    pub fn submissions(&self) -> u64 {
        self.submissions
    }
}
