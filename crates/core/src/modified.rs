use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared "the song has unsaved changes" flag.
///
/// The song hands a clone to every track and clip it owns; edits set it and
/// saving clears it.
#[derive(Debug, Clone, Default)]
pub struct ModifiedFlag(Arc<AtomicBool>);

impl ModifiedFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
