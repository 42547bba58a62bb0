use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, thiserror::Error)]
pub enum SlotError {
    #[error("slot pool closed")]
    Closed,
}

/// Fixed-capacity admission gate. Each [`Slot`] held is one operation allowed to run;
/// the slot goes back to the pool when dropped. Waiters are not served in any
/// guaranteed order.
pub struct SlotPool {
    sem: Arc<Semaphore>,
    capacity: usize,
}

impl Clone for SlotPool {
    fn clone(&self) -> Self { SlotPool { sem: self.sem.clone(), capacity: self.capacity } }
}

/// An occupied slot. Released on drop, whatever path the holder exits through.
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
}

impl SlotPool {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        SlotPool { sem: Arc::new(Semaphore::new(capacity)), capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    fn available(&self) -> usize {
        self.sem.available_permits()
    }

    /// Wait until a slot frees up.
    pub async fn acquire(&self) -> Result<Slot, SlotError> {
        let permit = self.sem.clone().acquire_owned().await.map_err(|_| SlotError::Closed)?;
        Ok(Slot { _permit: permit })
    }
}
