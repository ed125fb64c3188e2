//! Axis tick generation.
//!
//! A [`GridSpec`] describes one finite, evenly spaced run of tick values. The
//! same spec is shared by all three axes; the axis is only chosen when the
//! viewport places the labels.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::float_fmt::fmt_label;

/// Slack added before flooring the tick count so that ranges which are an exact
/// multiple of the step (e.g. `2.0 / 0.1`) don't lose their last tick to
/// rounding.
const COUNT_EPSILON: f64 = 1e-9;

/// Upper bound on ticks per axis. Every tick becomes a label on every frame.
pub const MAX_TICKS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    #[error("grid step must be a positive finite number (got {0})")]
    InvalidStep(f64),
    #[error("grid range is empty or not finite ({min} .. {max})")]
    InvalidRange { min: f64, max: f64 },
    #[error("grid would have {ticks} ticks per axis (at most {max})")]
    TooManyTicks { ticks: f64, max: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl GridSpec {
    pub fn new(min: f64, max: f64, step: f64) -> Result<Self, GridError> {
        let spec = Self { min, max, step };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<(), GridError> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(GridError::InvalidStep(self.step));
        }
        if !(self.min.is_finite() && self.max.is_finite() && self.max > self.min) {
            return Err(GridError::InvalidRange {
                min: self.min,
                max: self.max,
            });
        }
        let spans = self.spans();
        if !(spans < MAX_TICKS as f64) {
            return Err(GridError::TooManyTicks {
                ticks: spans + 1.0,
                max: MAX_TICKS,
            });
        }
        Ok(())
    }

    fn spans(&self) -> f64 {
        ((self.max - self.min) / self.step + COUNT_EPSILON).floor()
    }

    /// `floor((max - min) / step) + 1` for a valid spec, `0` otherwise.
    pub fn tick_count(&self) -> usize {
        if self.validate().is_err() {
            return 0;
        }
        // Bounded by MAX_TICKS once validated.
        self.spans() as usize + 1
    }

    /// Value of the `index`-th tick. Computed from `min` directly so the
    /// error does not accumulate along the axis.
    #[inline]
    pub fn value_at(&self, index: usize) -> f64 {
        self.min + index as f64 * self.step
    }

    /// A fresh pass over the ticks. Calling this again restarts from `min`.
    pub fn ticks(&self) -> GridTicks {
        generate(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridTick {
    pub index: usize,
    pub value: f64,
    pub label: String,
}

/// Lazy iterator over the ticks of a [`GridSpec`].
#[derive(Debug, Clone)]
pub struct GridTicks {
    spec: GridSpec,
    next: usize,
    end: usize,
}

impl Iterator for GridTicks {
    type Item = GridTick;

    fn next(&mut self) -> Option<GridTick> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let value = self.spec.value_at(index);
        Some(GridTick {
            index,
            value,
            label: fmt_label(value),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.end - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for GridTicks {}

/// Tick values paired with their fixed two-decimal labels.
///
/// An invalid spec yields an empty sequence; profiles are validated on load
/// so this only happens for hand-built specs.
pub fn generate(spec: &GridSpec) -> GridTicks {
    GridTicks {
        spec: *spec,
        next: 0,
        end: spec.tick_count(),
    }
}
