//! Table storage: a string-keyed chained-bucket hash table plus a
//! foreign-backed variant.
//!
//! Buckets use a prime capacity starting at 17 and rehash once the load
//! factor passes 0.75, into a fresh bucket vector sized to the next prime of
//! at least double the capacity. Keys are copied into the arena on insert;
//! iteration order is unspecified.

use crate::arena::{Arena, Slot};
use crate::value::Value;
use std::rc::Rc;

const TABLE_INIT_CAPACITY: usize = 17;
const TABLE_LOAD_FACTOR: f64 = 0.75;

/// Read hooks for a host-owned map wrapped without deep conversion.
pub trait ShallowTable {
    fn len(&self) -> usize;
    fn get(&self, arena: &Arena, key: &str) -> Option<Value>;
}

pub(crate) struct HashTable {
    buckets: Vec<Vec<(Rc<str>, Slot)>>,
    count: usize,
}

impl HashTable {
    pub(crate) fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); TABLE_INIT_CAPACITY],
            count: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn bucket_index(&self, key: &str) -> usize {
        hash_key(key) % self.buckets.len()
    }

    pub(crate) fn get(&self, key: &str) -> Option<Slot> {
        let bucket = &self.buckets[self.bucket_index(key)];
        bucket
            .iter()
            .find(|(existing, _)| existing.as_ref() == key)
            .map(|(_, slot)| *slot)
    }

    pub(crate) fn set(&mut self, key: &str, slot: Slot) {
        let index = self.bucket_index(key);
        let bucket = &mut self.buckets[index];
        if let Some(entry) = bucket.iter_mut().find(|(existing, _)| existing.as_ref() == key) {
            entry.1 = slot;
            return;
        }
        bucket.push((Rc::from(key), slot));
        self.count += 1;
        if self.count as f64 > self.buckets.len() as f64 * TABLE_LOAD_FACTOR {
            self.rehash();
        }
    }

    pub(crate) fn del(&mut self, key: &str) -> bool {
        let index = self.bucket_index(key);
        let bucket = &mut self.buckets[index];
        if let Some(position) = bucket.iter().position(|(existing, _)| existing.as_ref() == key) {
            bucket.swap_remove(position);
            self.count -= 1;
            return true;
        }
        false
    }

    /// Snapshot of every entry, in bucket order.
    pub(crate) fn entries(&self) -> Vec<(Rc<str>, Slot)> {
        let mut out = Vec::with_capacity(self.count);
        for bucket in &self.buckets {
            for (key, slot) in bucket {
                out.push((key.clone(), *slot));
            }
        }
        out
    }

    /// Relinks every entry into a fresh bucket vector of the next prime
    /// capacity of at least double the current one.
    fn rehash(&mut self) {
        let new_capacity = next_prime(self.buckets.len() * 2);
        let old_buckets = std::mem::replace(&mut self.buckets, vec![Vec::new(); new_capacity]);
        for bucket in old_buckets {
            for (key, slot) in bucket {
                let index = hash_key(&key) % new_capacity;
                self.buckets[index].push((key, slot));
            }
        }
    }
}

pub(crate) enum TableBuf {
    Owned(HashTable),
    Foreign {
        backing: Rc<dyn ShallowTable>,
        count: usize,
    },
}

impl TableBuf {
    pub(crate) fn len(&self) -> usize {
        match self {
            TableBuf::Owned(table) => table.len(),
            TableBuf::Foreign { count, .. } => *count,
        }
    }
}

/// djb2 over the key bytes.
fn hash_key(key: &str) -> usize {
    let mut hash: usize = 5381;
    for byte in key.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as usize);
    }
    hash
}

fn next_prime(n: usize) -> usize {
    if n <= 2 {
        return 2;
    }
    let mut candidate = if n % 2 == 0 { n + 1 } else { n };
    loop {
        let mut is_prime = true;
        let mut divisor = 3;
        while divisor * divisor <= candidate {
            if candidate % divisor == 0 {
                is_prime = false;
                break;
            }
            divisor += 2;
        }
        if is_prime {
            return candidate;
        }
        candidate += 2;
    }
}
