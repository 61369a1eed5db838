use std::sync::Arc;

use crate::gpu::backend::RenderBackend;

/// A resource one submission reads from.
pub enum Resident<B: RenderBackend> {
    Texture(Arc<B::Texture>),
    Scaler(Arc<B::Scaler>),
    /// The quad uniform buffer; owned by the presenter for the whole session.
    Uniforms,
}

impl<B: RenderBackend> Resident<B> {
    fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Texture(a), Self::Texture(b)) => Arc::ptr_eq(a, b),
            (Self::Scaler(a), Self::Scaler(b)) => Arc::ptr_eq(a, b),
            (Self::Uniforms, Self::Uniforms) => true,
            _ => false,
        }
    }
}

/// Set of resources declared in use before a submission.
///
/// Rebuilt from scratch for every frame: [`ResidencySet::clear`] drops what the
/// previous frame declared, then the frame adds everything it references and
/// [`ResidencySet::commit`] hands the set to the submission.
pub struct ResidencySet<B: RenderBackend> {
    staged: Vec<Resident<B>>,
}

impl<B: RenderBackend> Default for ResidencySet<B> {
    fn default() -> Self {
        Self { staged: Vec::new() }
    }
}

impl<B: RenderBackend> ResidencySet<B> {
    pub fn clear(&mut self) {
        self.staged.clear();
    }

    pub fn add(&mut self, resource: Resident<B>) {
        if !self.staged.iter().any(|r| r.same_as(&resource)) {
            self.staged.push(resource);
        }
    }

    pub fn commit(&mut self) -> CommittedResidency<B> {
        CommittedResidency {
            resources: std::mem::take(&mut self.staged),
        }
    }
}

/// Resources pinned by one in-flight submission.
///
/// Holding this keeps every referenced texture alive; it is dropped once the
/// GPU reports the submission complete, which is when replaced textures are
/// actually released.
pub struct CommittedResidency<B: RenderBackend> {
    resources: Vec<Resident<B>>,
}

impl<B: RenderBackend> CommittedResidency<B> {
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn holds_texture(&self, texture: &Arc<B::Texture>) -> bool {
        self.resources
            .iter()
            .any(|r| matches!(r, Resident::Texture(t) if Arc::ptr_eq(t, texture)))
    }

    pub fn holds_scaler(&self, scaler: &Arc<B::Scaler>) -> bool {
        self.resources
            .iter()
            .any(|r| matches!(r, Resident::Scaler(s) if Arc::ptr_eq(s, scaler)))
    }

    pub fn holds_uniforms(&self) -> bool {
        self.resources.iter().any(|r| matches!(r, Resident::Uniforms))
    }
}
