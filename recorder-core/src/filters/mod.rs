//! In-place audio filters and the ordered chain that runs them.

pub mod auto_gain;
pub mod echo_cancellation;

use serde::{Deserialize, Serialize};

use crate::models::error::CaptureError;
use crate::traits::filter::{AudioFilter, ParamInfo};

pub use auto_gain::AutoGain;
pub use echo_cancellation::EchoCancellation;

/// Filter kinds known to the engine. At most one instance of each can be active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum FilterKind {
    AutoGain = 0,
    EchoCancellation = 1,
}

impl FilterKind {
    pub const ALL: [FilterKind; 2] = [FilterKind::AutoGain, FilterKind::EchoCancellation];

    pub fn instantiate(self, sample_rate: u32) -> Box<dyn AudioFilter> {
        match self {
            Self::AutoGain => Box::new(AutoGain::new(sample_rate)),
            Self::EchoCancellation => Box::new(EchoCancellation::new(sample_rate)),
        }
    }

    pub fn params(self) -> &'static [ParamInfo] {
        match self {
            Self::AutoGain => auto_gain::PARAMS,
            Self::EchoCancellation => echo_cancellation::PARAMS,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, CaptureError> {
        match code {
            0 => Ok(Self::AutoGain),
            1 => Ok(Self::EchoCancellation),
            _ => Err(CaptureError::FilterNotFound),
        }
    }
}

/// Active filters in insertion order.
pub struct FilterChain {
    sample_rate: u32,
    filters: Vec<Box<dyn AudioFilter>>,
}

impl FilterChain {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            filters: Vec::new(),
        }
    }

    pub fn add(&mut self, kind: FilterKind) -> Result<(), CaptureError> {
        if self.position(kind).is_some() {
            return Err(CaptureError::FilterAlreadyAdded);
        }
        self.filters.push(kind.instantiate(self.sample_rate));
        log::debug!("filter added: {:?}", kind);
        Ok(())
    }

    pub fn remove(&mut self, kind: FilterKind) -> Result<(), CaptureError> {
        let index = self.position(kind).ok_or(CaptureError::FilterNotFound)?;
        self.filters.remove(index);
        log::debug!("filter removed: {:?}", kind);
        Ok(())
    }

    /// Index of `kind` in the chain, or -1 if inactive.
    pub fn is_active(&self, kind: FilterKind) -> i32 {
        self.position(kind).map_or(-1, |i| i as i32)
    }

    pub fn parameter_names(kind: FilterKind) -> Vec<String> {
        kind.params().iter().map(|p| p.name.to_string()).collect()
    }

    /// Current value, or the default for a kind that isn't active.
    pub fn get_parameter(&self, kind: FilterKind, id: usize) -> Result<f32, CaptureError> {
        match self.position(kind) {
            Some(index) => self.filters[index].get_param(id),
            None => kind
                .params()
                .get(id)
                .map(|p| p.default)
                .ok_or(CaptureError::FilterParameterGetError(id)),
        }
    }

    pub fn set_parameter(&mut self, kind: FilterKind, id: usize, value: f32) -> Result<(), CaptureError> {
        let index = self.position(kind).ok_or(CaptureError::FilterNotFound)?;
        self.filters[index].set_param(id, value)
    }

    /// Run every active filter over one block.
    pub fn process(&mut self, samples: &mut [f32], channels: usize) {
        for filter in self.filters.iter_mut() {
            filter.apply(samples, channels);
        }
    }

    pub fn reset(&mut self) {
        for filter in self.filters.iter_mut() {
            filter.reset();
        }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    fn position(&self, kind: FilterKind) -> Option<usize> {
        self.filters.iter().position(|f| f.kind() == kind)
    }
}
