//! Caller-supplied row batch transforms.
//!
//! A transform runs on the inference sample and once on every chunk, so it
//! must be deterministic and keep no state between calls.

use anyhow::Result;

use crate::frame::Frame;

pub trait Transform {
    fn apply(&self, frame: Frame) -> Result<Frame>;
}

impl<F> Transform for F
where
    F: Fn(Frame) -> Result<Frame>,
{
    fn apply(&self, frame: Frame) -> Result<Frame> {
        self(frame)
    }
}

pub(crate) fn apply_optional(transform: Option<&dyn Transform>, frame: Frame) -> Result<Frame> {
    match transform {
        Some(transform) => transform.apply(frame),
        None => Ok(frame),
    }
}
