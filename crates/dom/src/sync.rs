//! Delivery of change batches to the renderer.
//!
//! The engine calls its hook at most once per mount or render, with the complete ordered
//! batch. A hook error rolls the engine back to its state before the pass.

use crate::change::Change;
use crate::error::BoxError;
use std::sync::mpsc::Sender;

pub trait SyncHook {
    fn sync(&mut self, batch: &[Change]) -> Result<(), BoxError>;
}

impl<F> SyncHook for F
where
    F: FnMut(&[Change]) -> Result<(), BoxError>,
{
    fn sync(&mut self, batch: &[Change]) -> Result<(), BoxError> {
        self(batch)
    }
}

/// Forwards each batch to a channel, typically drained by the renderer bridge.
impl SyncHook for Sender<Vec<Change>> {
    fn sync(&mut self, batch: &[Change]) -> Result<(), BoxError> {
        self.send(batch.to_vec())?;
        Ok(())
    }
}

/// Hook that drops every batch.
#[derive(Clone, Copy, Debug, Default)]
pub struct Discard;

impl SyncHook for Discard {
    fn sync(&mut self, _batch: &[Change]) -> Result<(), BoxError> {
        Ok(())
    }
}
