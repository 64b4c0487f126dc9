use itertools::Itertools;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::{Debug, Error, Formatter};
use std::hash::Hash;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// Marker for cheap integer-like keys usable in the containers of this module.
pub trait Ref: Into<usize> + From<usize> + Copy + PartialEq {}

impl<X> Ref for X where X: Into<usize> + From<usize> + Copy + PartialEq {}

/// Declares a `u32`-backed index type together with the conversions required by
/// the [Ref] trait and direct indexing into `Vec`.
#[macro_export]
macro_rules! create_ref_type {
    ($type_name:ident) => {
        #[derive(PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash, Debug)]
        pub struct $type_name(u32);

        impl $type_name {
            pub const fn to_u32(self) -> u32 {
                self.0
            }
            pub const fn from_u32(u: u32) -> Self {
                $type_name(u)
            }
        }
        impl From<usize> for $type_name {
            fn from(u: usize) -> Self {
                $type_name(u as u32)
            }
        }
        impl From<$type_name> for usize {
            fn from(v: $type_name) -> Self {
                v.0 as usize
            }
        }
        impl From<u32> for $type_name {
            fn from(u: u32) -> Self {
                $type_name(u)
            }
        }
        impl From<$type_name> for u32 {
            fn from(v: $type_name) -> Self {
                v.0
            }
        }

        impl<V> std::ops::Index<$type_name> for Vec<V> {
            type Output = V;

            fn index(&self, index: $type_name) -> &Self::Output {
                &self[usize::from(index)]
            }
        }

        impl<V> std::ops::IndexMut<$type_name> for Vec<V> {
            fn index_mut(&mut self, index: $type_name) -> &mut Self::Output {
                &mut self[usize::from(index)]
            }
        }
    };
}

/// An interning store: pushing a value yields an integer key, and the key of a
/// previously pushed value can be retrieved from the value itself.
#[derive(Clone)]
pub struct RefPool<Key, Val> {
    internal: Vec<Val>,
    rev: HashMap<Val, Key>,
}

impl<K, V: Hash + Eq> Default for RefPool<K, V> {
    fn default() -> Self {
        RefPool {
            internal: Default::default(),
            rev: HashMap::new(),
        }
    }
}

impl<K, V: Debug> Debug for RefPool<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{:?}", self.internal.iter().enumerate().format(", "))
    }
}

impl<K, V> RefPool<K, V>
where
    K: Ref,
{
    pub fn len(&self) -> usize {
        self.internal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.internal.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = K> {
        (0..self.len()).map(K::from)
    }

    pub fn push(&mut self, v: V) -> K
    where
        V: Eq + Hash + Clone + Debug,
    {
        assert!(!self.rev.contains_key(&v), "Duplicated value: {:?}", &v);
        let id: K = self.internal.len().into();
        self.rev.insert(v.clone(), id);
        self.internal.push(v);
        id
    }

    pub fn get(&self, k: K) -> &V {
        &self.internal[k.into()]
    }

    /// Key under which `v` was interned, if any.
    pub fn get_ref<W: ?Sized>(&self, v: &W) -> Option<K>
    where
        W: Eq + Hash,
        V: Eq + Hash + Borrow<W>,
    {
        self.rev.get(v).copied()
    }
}

impl<K: Ref, V> Index<K> for RefPool<K, V> {
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        self.get(index)
    }
}

/// A vector whose indices are typed keys, with keys densely assigned by `push`.
#[derive(Clone)]
pub struct RefVec<K, V> {
    values: Vec<V>,
    phantom: PhantomData<K>,
}

impl<K, V> Default for RefVec<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> RefVec<K, V> {
    pub fn new() -> Self {
        RefVec {
            values: Vec::new(),
            phantom: PhantomData,
        }
    }

    /// A new `RefVec` holding `num_items` copies of `value`.
    pub fn with_values(num_items: usize, value: V) -> Self
    where
        V: Clone,
    {
        RefVec {
            values: vec![value; num_items],
            phantom: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: V) -> K
    where
        K: From<usize>,
    {
        self.values.push(value);
        K::from(self.values.len() - 1)
    }

    pub fn keys(&self) -> impl Iterator<Item = K>
    where
        K: From<usize>,
    {
        (0..(self.values.len())).map(K::from)
    }

    pub fn entries(&self) -> impl Iterator<Item = (K, &V)>
    where
        K: From<usize>,
    {
        (0..(self.values.len())).map(move |i| (K::from(i), &self.values[i]))
    }
}

impl<K: Into<usize>, V> Index<K> for RefVec<K, V> {
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        &self.values[index.into()]
    }
}

impl<K: Into<usize>, V> IndexMut<K> for RefVec<K, V> {
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        &mut self.values[index.into()]
    }
}

/// A map from a typed integer key to values, backed by a dense vector of
/// options. Lookup is constant time; iteration skips absent entries.
#[derive(Clone)]
pub struct RefMap<K, V> {
    entries: Vec<Option<V>>,
    phantom: PhantomData<K>,
}

impl<K, V> Default for RefMap<K, V> {
    fn default() -> Self {
        RefMap {
            entries: Vec::new(),
            phantom: Default::default(),
        }
    }
}

impl<K: Ref, V> RefMap<K, V> {
    pub fn insert(&mut self, k: K, v: V) {
        let index = k.into();
        while self.entries.len() <= index {
            self.entries.push(None);
        }
        self.entries[index] = Some(v);
    }

    pub fn clear(&mut self) {
        for x in &mut self.entries {
            *x = None
        }
    }

    pub fn contains(&self, k: K) -> bool {
        let index = k.into();
        index < self.entries.len() && self.entries[index].is_some()
    }

    pub fn get(&self, k: K) -> Option<&V> {
        let index = k.into();
        if index >= self.entries.len() {
            None
        } else {
            self.entries[index].as_ref()
        }
    }

    pub fn get_mut(&mut self, k: K) -> Option<&mut V> {
        let index = k.into();
        if index >= self.entries.len() {
            None
        } else {
            self.entries[index].as_mut()
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        (0..self.entries.len()).map(K::from).filter(move |k| self.contains(*k))
    }

    pub fn entries(&self) -> impl Iterator<Item = (K, &V)> {
        self.entries
            .iter()
            .enumerate()
            .filter_map(|(idx, value)| value.as_ref().map(|v| (K::from(idx), v)))
    }
}

impl<K: Ref, V> Index<K> for RefMap<K, V> {
    type Output = V;

    fn index(&self, index: K) -> &Self::Output {
        self.get(index).expect("No such key")
    }
}

impl<K: Ref, V> IndexMut<K> for RefMap<K, V> {
    fn index_mut(&mut self, index: K) -> &mut Self::Output {
        self.get_mut(index).expect("No such key")
    }
}

impl<K: Ref + Debug, V: Debug> std::fmt::Debug for RefMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (k, v) in self.entries() {
            write!(f, "{:?} -> {:?}, ", k, v)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    create_ref_type!(TestKey);

    #[test]
    fn test_pool_interning() {
        let mut pool: RefPool<TestKey, String> = Default::default();
        let a = pool.push("a".to_string());
        let b = pool.push("b".to_string());
        assert_ne!(a, b);
        assert_eq!(pool.get_ref("a"), Some(a));
        assert_eq!(pool.get_ref("b"), Some(b));
        assert_eq!(pool.get_ref("c"), None);
        assert_eq!(&pool[a], "a");
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_ref_map() {
        let mut map: RefMap<TestKey, u64> = Default::default();
        let k3 = TestKey::from_u32(3);
        let k5 = TestKey::from_u32(5);
        map.insert(k5, 50);
        assert!(!map.contains(k3));
        assert!(map.contains(k5));
        map.insert(k3, 30);
        assert_eq!(map.entries().count(), 2);
        assert_eq!(map[k3], 30);
        map.clear();
        assert!(!map.contains(k5));
    }
}
