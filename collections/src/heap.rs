use crate::heap::Entry::{In, Out};
use crate::ref_store::{Ref, RefMap};

/// An indexed binary min-heap: a mutable priority map from keys to priorities,
/// supporting insertion, extract-min and decrease-key. Keys must be declared
/// before use; a declared key keeps its priority while logically out of the
/// queue, which stands for the "absent" cutoff.
pub struct IdxHeap<K, P> {
    /// Binary heap ordered by priority, smallest first.
    heap: Vec<(K, P)>,
    index: RefMap<K, Entry<P>>,
}

enum Entry<P> {
    In(PlaceInHeap),
    Out(P),
}

/// Position inside the heap vector.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
struct PlaceInHeap(usize);

impl PlaceInHeap {
    const ROOT: PlaceInHeap = PlaceInHeap(0);

    pub fn above(self) -> PlaceInHeap {
        debug_assert!(self.0 > 0);
        PlaceInHeap((self.0 - 1) >> 1)
    }

    pub fn left(self) -> PlaceInHeap {
        PlaceInHeap(self.0 * 2 + 1)
    }

    pub fn right(self) -> PlaceInHeap {
        PlaceInHeap(self.0 * 2 + 2)
    }
}

impl From<usize> for PlaceInHeap {
    fn from(x: usize) -> Self {
        PlaceInHeap(x)
    }
}
impl From<PlaceInHeap> for usize {
    fn from(p: PlaceInHeap) -> Self {
        p.0
    }
}
impl<T> std::ops::Index<PlaceInHeap> for Vec<T> {
    type Output = T;

    fn index(&self, index: PlaceInHeap) -> &Self::Output {
        &self[usize::from(index)]
    }
}
impl<T> std::ops::IndexMut<PlaceInHeap> for Vec<T> {
    fn index_mut(&mut self, index: PlaceInHeap) -> &mut Self::Output {
        &mut self[usize::from(index)]
    }
}

impl<K: Ref, P: PartialOrd + Copy> Default for IdxHeap<K, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ref, P: PartialOrd + Copy> IdxHeap<K, P> {
    pub fn new() -> Self {
        IdxHeap {
            heap: Default::default(),
            index: Default::default(),
        }
    }

    /// Records a new key that is NOT placed in the queue, with the given
    /// resting priority.
    pub fn declare_element(&mut self, key: K, priority: P) {
        assert!(!self.index.contains(key));
        self.index.insert(key, Out(priority));
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_declared(&self, key: K) -> bool {
        self.index.contains(key)
    }

    pub fn is_enqueued(&self, key: K) -> bool {
        debug_assert!(self.is_declared(key), "Key is not declared");
        matches!(self.index[key], In(_))
    }

    pub fn peek(&self) -> Option<&(K, P)> {
        self.heap.first()
    }

    /// Removes and returns the entry with the smallest priority.
    pub fn pop(&mut self) -> Option<(K, P)> {
        if self.is_empty() {
            None
        } else {
            let (key, prio) = self.heap.swap_remove(0);
            self.index[key] = Out(prio);
            if !self.heap.is_empty() {
                self.sift_down(PlaceInHeap::ROOT);
            }
            Some((key, prio))
        }
    }

    /// Places a declared key into the queue at its current priority.
    /// No effect if it is already enqueued.
    pub fn enqueue(&mut self, key: K) {
        debug_assert!(self.is_declared(key), "Key not declared");
        match &self.index[key] {
            In(_) => {
                // already in queue, do nothing
            }
            Out(prio) => {
                let place = self.free();
                self.heap.push((key, *prio));
                self.sift_up(place);
            }
        }
    }

    /// Takes a key out of the queue, keeping its current priority as the
    /// resting one. No effect if it is not enqueued.
    pub fn remove(&mut self, key: K) {
        if let In(loc) = self.index[key] {
            let (_, prio) = self.heap[loc];
            self.heap.swap_remove(usize::from(loc));
            self.index[key] = Out(prio);
            // re-place the element swapped into the hole, if any
            if usize::from(loc) < self.heap.len() {
                self.sift_down(loc);
                self.sift_up(loc);
            }
        }
    }

    pub fn change_priority<F: Fn(&mut P)>(&mut self, key: K, f: F) {
        match &mut self.index[key] {
            In(loc) => {
                let loc = *loc;
                f(&mut self.heap[loc].1);
                self.sift_down(loc);
                self.sift_up(loc);
            }
            Out(p) => f(p),
        }
    }

    pub fn set_priority(&mut self, key: K, new_priority: P) {
        self.change_priority(key, |p| *p = new_priority);
    }

    pub fn priority(&self, k: K) -> P {
        match self.index[k] {
            In(p) => self.heap[p].1,
            Out(p) => p,
        }
    }

    fn sift_up(&mut self, mut i: PlaceInHeap) {
        let (key, prio) = self.heap[i];
        while i > PlaceInHeap::ROOT {
            let p = i.above();
            let (above_key, above_prio) = self.heap[p];
            if prio < above_prio {
                self.index[above_key] = In(i);
                self.heap.swap(usize::from(i), usize::from(p));
                i = p;
            } else {
                break;
            }
        }
        self.index[key] = In(i);
    }

    fn free(&self) -> PlaceInHeap {
        self.heap.len().into()
    }

    fn sift_down(&mut self, mut i: PlaceInHeap) {
        let len = self.free();
        let (key, prio) = self.heap[i];
        loop {
            let c = {
                let l = i.left();
                if l >= len {
                    break;
                }
                let r = i.right();
                if r < len && self.heap[r].1 < self.heap[l].1 {
                    r
                } else {
                    l
                }
            };

            if self.heap[c].1 < prio {
                self.index[self.heap[c].0] = In(i);
                self.heap.swap(c.into(), i.into());
                i = c;
            } else {
                break;
            }
        }

        self.index[key] = In(i);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::prelude::SeedableRng;
    use rand::prelude::SmallRng;
    use rand::Rng;

    #[test]
    fn test_min_extraction_order() {
        let mut heap: IdxHeap<usize, f64> = IdxHeap::new();
        let prios = [5.0, 1.0, 4.0, 0.5, 3.0, 2.0];
        for (k, &p) in prios.iter().enumerate() {
            heap.declare_element(k, p);
            heap.enqueue(k);
        }
        let mut extracted = Vec::new();
        while let Some((_, p)) = heap.pop() {
            extracted.push(p);
        }
        assert_eq!(extracted, vec![0.5, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_peek_does_not_mutate() {
        let mut heap: IdxHeap<usize, f64> = IdxHeap::new();
        for (k, p) in [(0, 2.0), (1, 0.5), (2, 1.0)] {
            heap.declare_element(k, p);
            heap.enqueue(k);
        }
        assert_eq!(heap.peek(), Some(&(1, 0.5)));
        // unlike pop, peeking leaves the queue untouched
        assert_eq!(heap.peek(), Some(&(1, 0.5)));
        assert!(heap.is_enqueued(1));
        assert_eq!(heap.pop(), Some((1, 0.5)));
        assert_eq!(heap.peek(), Some(&(2, 1.0)));
        heap.pop();
        heap.pop();
        assert_eq!(heap.peek(), None);
    }

    #[test]
    fn test_decrease_key() {
        let mut heap: IdxHeap<usize, f64> = IdxHeap::new();
        for k in 0..4 {
            heap.declare_element(k, k as f64);
            heap.enqueue(k);
        }
        heap.set_priority(3, -1.0);
        assert_eq!(heap.pop(), Some((3, -1.0)));
        assert_eq!(heap.pop(), Some((0, 0.0)));
    }

    #[test]
    fn test_out_of_queue_priority_update() {
        let mut heap: IdxHeap<usize, i64> = IdxHeap::new();
        heap.declare_element(0, 10);
        assert!(!heap.is_enqueued(0));
        // priority of a key outside of the queue is updated in place
        heap.set_priority(0, 3);
        assert_eq!(heap.priority(0), 3);
        heap.enqueue(0);
        heap.enqueue(0); // no duplicate entries
        assert_eq!(heap.pop(), Some((0, 3)));
        assert_eq!(heap.pop(), None);
    }

    #[test]
    fn test_remove_by_key() {
        let mut heap: IdxHeap<usize, i64> = IdxHeap::new();
        for k in 0..6 {
            heap.declare_element(k, k as i64);
            heap.enqueue(k);
        }
        heap.remove(0);
        heap.remove(3);
        heap.remove(3); // removing an absent key is a no-op
        assert!(!heap.is_enqueued(0));
        assert_eq!(heap.priority(3), 3);
        let mut extracted = Vec::new();
        while let Some((k, _)) = heap.pop() {
            extracted.push(k);
        }
        assert_eq!(extracted, vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_random_heap_sort() {
        let mut rng = SmallRng::seed_from_u64(0xD1F5);
        for _ in 0..50 {
            let n = rng.gen_range(1..40);
            let mut heap: IdxHeap<usize, i64> = IdxHeap::new();
            let mut prios: Vec<i64> = (0..n).map(|_| rng.gen_range(-100..100)).collect();
            for (k, &p) in prios.iter().enumerate() {
                heap.declare_element(k, p);
                heap.enqueue(k);
            }
            prios.sort_unstable();
            let mut extracted = Vec::new();
            while let Some((_, p)) = heap.pop() {
                extracted.push(p);
            }
            assert_eq!(extracted, prios);
        }
    }
}
