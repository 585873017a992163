//! Request-scoped deferral of log records.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_queue::ArrayQueue;

use crate::context::Context;
use crate::error::Error;
use crate::handler::Handler;
use crate::record::Record;

/// A deferred log call: the handler it was destined for, its context and
/// the record itself.
pub struct Entry {
    handler: Arc<dyn Handler>,
    cx: Context,
    record: Record,
    scope: u64,
}

impl Entry {
    pub fn new(handler: Arc<dyn Handler>, cx: &Context, record: Record) -> Self {
        Self {
            handler,
            cx: cx.detached(),
            record,
            scope: 0,
        }
    }

    fn emit(self) -> Result<(), Error> {
        self.handler.handle(&self.cx, self.record)
    }
}

const DRAINED: u64 = 1;

/// A bounded FIFO of deferred entries that spills into an unbounded
/// overflow list rather than dropping.
///
/// Entries in `overflow` are always older than those still in `entries`.
pub struct RecordBuffer {
    entries: ArrayQueue<Entry>,
    overflow: Mutex<Vec<Entry>>,
    /// Scope id in the high bits, [`DRAINED`] in the low bit.
    state: AtomicU64,
}

impl RecordBuffer {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: ArrayQueue::new(capacity),
            overflow: Mutex::new(Vec::new()),
            state: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Number of entries waiting to be drained.
    pub fn len(&self) -> usize {
        self.lock_overflow().len() + self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_drained(&self) -> bool {
        self.state.load(Ordering::SeqCst) & DRAINED != 0
    }

    /// Defer `entry`, or hand it straight to its handler once the buffer has
    /// been drained.
    pub fn append(&self, entry: Entry) -> Result<(), Error> {
        self.append_to_scope(self.scope(), entry)
    }

    /// Like [`append`](Self::append), but only while the buffer still belongs
    /// to `scope`. Entries for a released scope are dropped.
    pub(crate) fn append_to_scope(&self, scope: u64, mut entry: Entry) -> Result<(), Error> {
        let state = self.state.load(Ordering::SeqCst);
        if state >> 1 != scope {
            return Ok(());
        }
        if state & DRAINED != 0 {
            return entry.emit();
        }

        entry.scope = scope;
        while let Err(rejected) = self.entries.push(entry) {
            entry = rejected;
            let mut overflow = self.lock_overflow();
            if let Some(oldest) = self.entries.pop() {
                overflow.push(oldest);
            }
        }

        // A drain that finished while we were pushing would never see this entry.
        if self.state.load(Ordering::SeqCst) == scope << 1 | DRAINED {
            self.flush(scope);
        }
        Ok(())
    }

    /// Emit every deferred entry in arrival order. Only the first call after
    /// an arm does anything; handler errors are ignored.
    pub fn drain(&self) {
        let state = self.state.fetch_or(DRAINED, Ordering::SeqCst);
        if state & DRAINED == 0 {
            self.flush(state >> 1);
        }
    }

    /// Like [`drain`](Self::drain), but a no-op once `scope` has been released.
    pub(crate) fn drain_scope(&self, scope: u64) {
        let armed = scope << 1;
        if self
            .state
            .compare_exchange(armed, armed | DRAINED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.flush(scope);
        }
    }

    /// Re-arm the buffer, discarding anything not yet drained.
    pub fn reset(&self) {
        self.state.store(0, Ordering::SeqCst);
        while self.entries.pop().is_some() {}
        self.lock_overflow().clear();
    }

    pub(crate) fn scope(&self) -> u64 {
        self.state.load(Ordering::SeqCst) >> 1
    }

    /// Reset and hand the buffer to a new scope.
    fn arm(&self, scope: u64) {
        self.reset();
        self.state.store(scope << 1, Ordering::SeqCst);
    }

    // Entries left behind by an earlier scope are discarded, not emitted.
    fn flush(&self, scope: u64) {
        let overflow = std::mem::take(&mut *self.lock_overflow());
        for entry in overflow {
            if entry.scope == scope {
                let _ = entry.emit();
            }
        }
        while let Some(entry) = self.entries.pop() {
            if entry.scope == scope {
                let _ = entry.emit();
            }
        }
    }

    fn lock_overflow(&self) -> std::sync::MutexGuard<'_, Vec<Entry>> {
        self.overflow.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RecordBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordBuffer")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .field("drained", &self.is_drained())
            .field("scope", &self.scope())
            .finish()
    }
}

/// Free-list of idle buffers shared by a [`SamplingBuffer`](crate::SamplingBuffer)
/// and its derived handlers.
pub(crate) struct BufferPool {
    idle: ArrayQueue<Arc<RecordBuffer>>,
    buffer_capacity: usize,
    next_scope: AtomicU64,
}

impl BufferPool {
    pub(crate) fn new(pool_size: usize, buffer_capacity: usize) -> Self {
        Self {
            idle: ArrayQueue::new(pool_size),
            buffer_capacity,
            next_scope: AtomicU64::new(1),
        }
    }

    fn acquire(&self) -> (Arc<RecordBuffer>, u64) {
        let buffer = self
            .idle
            .pop()
            .unwrap_or_else(|| Arc::new(RecordBuffer::new(self.buffer_capacity)));
        let id = self.next_scope.fetch_add(1, Ordering::Relaxed);
        buffer.arm(id);
        (buffer, id)
    }

    fn release(&self, buffer: Arc<RecordBuffer>) {
        buffer.reset();
        if self.idle.push(buffer).is_err() {
            tracing::trace!(
                idle = self.idle.capacity(),
                "buffer pool full, dropping released buffer"
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn idle(&self) -> usize {
        self.idle.len()
    }
}

/// Open a buffer scope: returns a derived context bound to a pooled buffer,
/// and the guard that closes the scope.
pub(crate) fn open_scope(pool: &Arc<BufferPool>, cx: &Context) -> (Context, BufferGuard) {
    let (buffer, id) = pool.acquire();
    let scoped = cx.bind(buffer.clone(), id);
    let guard = BufferGuard {
        pool: pool.clone(),
        buffer: Some(buffer),
    };
    (scoped, guard)
}

/// Releases a buffer scope when dropped.
///
/// Records still deferred at release are discarded: the scope ended without a
/// record that warranted emitting them.
#[must_use = "dropping the guard immediately closes the buffer scope"]
pub struct BufferGuard {
    pool: Arc<BufferPool>,
    buffer: Option<Arc<RecordBuffer>>,
}

impl BufferGuard {
    /// Close the scope now. Equivalent to dropping the guard.
    pub fn release(self) {}
}

impl Drop for BufferGuard {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.pool.release(buffer);
        }
    }
}

impl fmt::Debug for BufferGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferGuard")
            .field("buffer", &self.buffer)
            .finish()
    }
}
