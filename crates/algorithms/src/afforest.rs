//! Lock-free union-find used by connected components (§4.6). `find` walks
//! to the root without compressing; `union` finds both roots, then CAS-links
//! the higher-valued root under the lower-valued one, retrying against
//! whatever root the CAS observed until it succeeds or the two roots turn
//! out to already agree.
//!
//! ```
//! use graph_algorithms::afforest::Afforest;
//!
//! let af = Afforest::<i32>::new(3);
//! af.union(0, 1);
//! af.compress();
//! assert_eq!(af.find(0), af.find(1));
//! ```

use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed};

use atomic::Atomic;
use graph_core::allocator::{Allocator, Tracked};
use graph_core::error::Result;
use graph_core::index::Idx;
use rayon::prelude::*;

pub struct Afforest<NI: Idx> {
    parent: Box<[Atomic<NI>]>,
}

impl<NI: Idx> Afforest<NI> {
    pub fn new(size: usize) -> Self {
        let parent: Vec<Atomic<NI>> = (0..size).into_par_iter().map(|i| Atomic::new(NI::new(i))).collect();
        Self {
            parent: parent.into_boxed_slice(),
        }
    }

    /// Like [`Afforest::new`], but the backing parent array is acquired
    /// through `allocator` so the net allocator balance over an entire
    /// algorithm invocation stays observable.
    pub fn with_allocator(allocator: &dyn Allocator, size: usize) -> Result<Self> {
        let mut tracked = Tracked::<Atomic<NI>>::with_capacity(allocator, size)?;
        *tracked.as_vec_mut() = (0..size).into_par_iter().map(|i| Atomic::new(NI::new(i))).collect();
        Ok(Self {
            parent: tracked.into_vec().into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.parent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    pub fn find(&self, mut node: NI) -> NI {
        loop {
            let parent = self.parent[node.index()].load(Relaxed);
            if parent == node {
                return node;
            }
            node = parent;
        }
    }

    pub fn union(&self, u: NI, v: NI) {
        let mut u_root = self.find(u);
        let mut v_root = self.find(v);

        loop {
            if u_root == v_root {
                return;
            }
            if u_root < v_root {
                std::mem::swap(&mut u_root, &mut v_root);
            }
            match self.parent[u_root.index()].compare_exchange(u_root, v_root, AcqRel, Acquire) {
                Ok(_) => return,
                Err(observed) => {
                    u_root = self.find(observed);
                    v_root = self.find(v_root);
                }
            }
        }
    }

    /// Overwrites every slot with its root, so that afterwards `parent[v] ==
    /// find(v)` in O(1).
    pub fn compress(&self) {
        (0..self.parent.len()).into_par_iter().for_each(|i| {
            let root = self.find(NI::new(i));
            self.parent[i].store(root, Relaxed);
        });
    }
}
