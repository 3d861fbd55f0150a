/// Bounded history. The last element is the one added last; once the
/// capacity is reached every push evicts the oldest entry.
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct FIFO<T> {
    data: VecDeque<T>,
    capacity: usize,
}

impl<T> FIFO<T> {
    pub fn new(capacity: usize) -> Self {
        FIFO {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns the evicted element, if any.
    pub fn push(&mut self, elem: T) -> Option<T> {
        if self.capacity == 0 {
            return Some(elem);
        }

        let evicted = if self.data.len() == self.capacity {
            self.data.pop_front()
        } else {
            None
        };

        self.data.push_back(elem);

        evicted
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    pub fn last(&self) -> Option<&T> {
        self.data.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.data.iter()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl<T> std::ops::Index<usize> for FIFO<T> {
    type Output = T;

    fn index(&self, idx: usize) -> &T {
        &self.data[idx]
    }
}

#[test]
fn test_fifo_evicts_oldest() {
    let mut fq = FIFO::<f64>::new(3);

    assert!(fq.is_empty());
    assert!(fq.last().is_none());

    assert_eq!(fq.push(1.0), None);
    assert_eq!(fq.push(2.0), None);
    assert_eq!(fq.push(3.0), None);
    assert!(fq.is_full());

    assert_eq!(fq.push(4.0), Some(1.0));

    assert_eq!(fq.len(), 3);
    assert_eq!(fq[0], 2.0);
    assert_eq!(fq[2], 4.0);
    assert_eq!(fq.last(), Some(&4.0));

    let collected: Vec<f64> = fq.iter().copied().collect();
    assert_eq!(collected, vec![2.0, 3.0, 4.0]);
}

#[test]
fn test_fifo_zero_capacity_keeps_nothing() {
    let mut fq = FIFO::<i32>::new(0);

    assert_eq!(fq.push(7), Some(7));
    assert!(fq.is_empty());
}

#[test]
fn test_fifo_clear() {
    let mut fq = FIFO::<i32>::new(2);

    fq.push(1);
    fq.push(2);
    fq.clear();

    assert_eq!(fq.len(), 0);
    assert_eq!(fq.capacity(), 2);
}
