// Copyright 2025-present Stele Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cooperative cancellation.
//!
//! Builders poll the token at chunk boundaries and unwind (removing partial
//! output) when it fires. Rankers poll it at the top of the
//! document-at-a-time loop and return the partial top-K accumulated so far.
//! There is no preemption: a cancelled operation stops at the next
//! checkpoint, not instantly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply clonable cancellation handle shared between a caller and a
/// running build or query.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}
