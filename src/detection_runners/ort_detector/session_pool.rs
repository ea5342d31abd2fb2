use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::{Mutex, MutexGuard};

/// Fixed set of exclusively borrowed slots, handed out round-robin.
///
/// `acquire` prefers a free slot and only blocks when every slot is busy.
pub struct SessionPool<T> {
    slots: Vec<Mutex<T>>,
    next: AtomicUsize,
}

impl<T> SessionPool<T> {
    /// `None` when `items` is empty.
    pub fn new(items: Vec<T>) -> Option<Self> {
        if items.is_empty() {
            return None;
        }
        Some(Self {
            slots: items.into_iter().map(Mutex::new).collect(),
            next: AtomicUsize::new(0),
        })
    }

    pub fn acquire(&self) -> MutexGuard<'_, T> {
        let n = self.slots.len();
        let start = self.next.fetch_add(1, Ordering::Relaxed) % n;
        for i in 0..n {
            if let Some(guard) = self.slots[(start + i) % n].try_lock() {
                return guard;
            }
        }
        self.slots[start].lock()
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn empty_pool_is_rejected() {
        assert!(SessionPool::<usize>::new(Vec::new()).is_none());
    }

    #[test]
    fn two_slots_serve_two_holders_at_once() {
        let pool = SessionPool::new(vec![0usize, 1]).unwrap();
        assert_eq!(pool.size(), 2);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_ne!(*a, *b);
    }

    #[test]
    fn busy_slots_skip_to_a_free_one() {
        let pool = SessionPool::new(vec![0usize, 1, 2]).unwrap();
        let held = pool.acquire();
        for _ in 0..6 {
            assert_ne!(*pool.acquire(), *held);
        }
    }

    #[test]
    fn single_slot_blocks_until_released() {
        let pool = Arc::new(SessionPool::new(vec![7usize]).unwrap());
        let acquired = Arc::new(AtomicBool::new(false));

        let guard = pool.acquire();
        let waiter = {
            let pool = Arc::clone(&pool);
            let acquired = Arc::clone(&acquired);
            thread::spawn(move || {
                let value = *pool.acquire();
                acquired.store(true, Ordering::SeqCst);
                value
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!acquired.load(Ordering::SeqCst));
        drop(guard);

        assert_eq!(waiter.join().unwrap(), 7);
        assert!(acquired.load(Ordering::SeqCst));
    }
}
