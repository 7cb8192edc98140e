//! Per-frame draw lists.
//!
//! Scene nodes report what they can draw as a flat list of [`Instanced`]
//! items; the frame loop sorts them into the lit or outline batch, collecting
//! shadow casters for the depth pass on the way.

use crate::data_structures::model::{GeometryBuffers, MaterialKind};

/// Data for instanced object rendering: geometry, material and instance buffer.
#[derive(Clone)]
pub struct Instanced<'a> {
    pub instance: &'a wgpu::Buffer,
    pub geometry: &'a GeometryBuffers,
    pub material: &'a wgpu::BindGroup,
    pub kind: MaterialKind,
    pub cast_shadow: bool,
    pub amount: usize,
}

/// A frame's draw lists.
#[derive(Default)]
pub struct Batches<'a> {
    pub lit: Vec<Instanced<'a>>,
    pub outlines: Vec<Instanced<'a>>,
    pub shadow_casters: Vec<Instanced<'a>>,
}

impl<'a> Batches<'a> {
    pub fn push(&mut self, instanced: Instanced<'a>) {
        if instanced.amount == 0 {
            log::warn!("you attempted to render something with zero instances");
            return;
        }
        if instanced.cast_shadow {
            self.shadow_casters.push(instanced.clone());
        }
        match instanced.kind {
            MaterialKind::Standard => self.lit.push(instanced),
            MaterialKind::Outline => self.outlines.push(instanced),
        }
    }
}

impl<'a> FromIterator<Instanced<'a>> for Batches<'a> {
    fn from_iter<I: IntoIterator<Item = Instanced<'a>>>(iter: I) -> Self {
        let mut batches = Batches::default();
        iter.into_iter().for_each(|i| batches.push(i));
        batches
    }
}
