use crate::filters::FilterKind;
use crate::models::error::CaptureError;

/// Static description of one filter parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamInfo {
    pub name: &'static str,
    pub default: f32,
    pub min: f32,
    pub max: f32,
}

impl ParamInfo {
    pub fn contains(&self, value: f32) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// In-place processor applied to every captured block.
///
/// Runs on the processing thread with the chain lock held, so implementations
/// may keep mutable state between blocks but must not block.
pub trait AudioFilter: Send {
    fn kind(&self) -> FilterKind;

    /// Parameters in id order.
    fn params(&self) -> &'static [ParamInfo];

    /// Current value of parameter `id`.
    fn get_param(&self, id: usize) -> Result<f32, CaptureError>;

    /// Update parameter `id`. Out-of-range handling is up to the filter.
    fn set_param(&mut self, id: usize, value: f32) -> Result<(), CaptureError>;

    /// Process interleaved normalized samples in place.
    fn apply(&mut self, samples: &mut [f32], channels: usize);

    /// Drop accumulated state, keeping parameters.
    fn reset(&mut self);
}
