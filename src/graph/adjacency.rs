//! Per-vertex, per-direction edge sets with buffered/persisted merge
//! iteration and lookahead-based prefix narrowing.
//!
//! Buckets are keyed by complete infix (edge kind + full lookahead chain) and
//! hold edges in view-IID byte order, so the in-memory stream and a storage
//! prefix scan are both sorted the same way and can be merged in a single
//! forward pass with byte-equal duplicates suppressed.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::iter::Peekable;
use std::sync::Arc;
use std::vec;

use dashmap::DashMap;
use parking_lot::RwLock;
use smallvec::SmallVec;
use tracing::trace;

use crate::bytes::ByteArray;
use crate::encoding::iid::{scan_prefix, EdgeViewIid, InfixIid, VertexIid};
use crate::encoding::{Direction, EdgeKind};
use crate::error::Result;
use crate::graph::edge::{Edge, EdgeState, EdgeView};
use crate::storage::{Entry, Storage};

type Bucket = Arc<RwLock<BTreeMap<ByteArray, Arc<Edge>>>>;

/// Whether an adjacency is a pure write buffer or an overlay on storage.
pub enum AdjacencyMode {
    /// Transaction-local only; reads never touch storage.
    Buffered,
    /// The in-memory map is an overlay merged with storage prefix scans.
    Persisted {
        /// Handle to the durable store.
        storage: Arc<dyn Storage>,
    },
}

/// All edges of one vertex in one direction, partitioned by edge kind and
/// lookahead chain.
pub struct Adjacency {
    owner: VertexIid,
    direction: Direction,
    mode: AdjacencyMode,
    buckets: DashMap<InfixIid, Bucket>,
    // Maps each partial lookahead key to the fuller keys extending it,
    // populated as each insert walks its own lookahead chain.
    extensions: DashMap<InfixIid, BTreeSet<InfixIid>>,
}

impl Adjacency {
    /// Creates an empty adjacency for one vertex and direction.
    pub fn new(owner: VertexIid, direction: Direction, mode: AdjacencyMode) -> Self {
        Adjacency {
            owner,
            direction,
            mode,
            buckets: DashMap::new(),
            extensions: DashMap::new(),
        }
    }

    /// The vertex this adjacency belongs to.
    pub fn owner(&self) -> &VertexIid {
        &self.owner
    }

    /// The direction of the views held here.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// True when reads merge with durable storage.
    pub fn is_persisted(&self) -> bool {
        matches!(self.mode, AdjacencyMode::Persisted { .. })
    }

    /// Inserts one view of `edge` into its bucket and registers every
    /// lookahead prefix-to-extension pair.
    ///
    /// This is the non-recursive insert: it never mirrors to the other
    /// endpoint. Mirroring is the caller's responsibility (`Graph::put_edge`)
    /// and must happen exactly once per edge.
    pub(crate) fn insert(&self, edge: &Arc<Edge>) {
        let lookahead = edge.infix_lookahead();
        let infix = InfixIid::new(edge.kind(), self.direction, &lookahead);
        let iid = edge.iid(self.direction);
        trace!(owner = ?self.owner, iid = ?iid, "buffering edge view");
        let bucket = Arc::clone(self.buckets.entry(infix).or_default().value());
        bucket.write().insert(iid.bytes().clone(), Arc::clone(edge));
        for i in 0..lookahead.len() {
            let prefix = InfixIid::new(edge.kind(), self.direction, &lookahead[..i]);
            let extension = InfixIid::new(edge.kind(), self.direction, &lookahead[..=i]);
            self.extensions.entry(prefix).or_default().insert(extension);
        }
    }

    /// Read-path cache fill: inserts an edge discovered from storage without
    /// mirroring and without dirtying the owner.
    pub fn load(&self, edge: Arc<Edge>) {
        self.insert(&edge);
    }

    /// Removes one specific edge from the in-memory set only.
    pub fn remove(&self, edge: &Arc<Edge>) {
        let infix = InfixIid::new(edge.kind(), self.direction, &edge.infix_lookahead());
        let iid = edge.iid(self.direction);
        if let Some(bucket) = self.buckets.get(&infix) {
            let bucket = Arc::clone(bucket.value());
            bucket.write().remove(iid.bytes());
        }
    }

    /// Point lookup by kind, adjacent vertex, and optional optimised vertex.
    ///
    /// The buffer is consulted first (it covers both uncommitted edges and
    /// already-cached persisted edges); on a miss, a persisted adjacency
    /// probes storage by the exact view IID and caches the hit.
    pub fn edge(
        &self,
        kind: EdgeKind,
        adjacent: &VertexIid,
        optimised: Option<&VertexIid>,
    ) -> Result<Option<Arc<Edge>>> {
        assert_eq!(
            kind.is_optimised(),
            optimised.is_some(),
            "optimised vertex required iff the edge kind is optimised"
        );
        let mut lookahead: SmallVec<[VertexIid; 2]> = SmallVec::new();
        if let Some(opt) = optimised {
            lookahead.push(opt.type_iid());
        }
        let infix = InfixIid::new(kind, self.direction, &lookahead);
        let optimised_key = optimised.map(|o| o.key());
        let iid = EdgeViewIid::new(&self.owner, &infix, adjacent, optimised_key.as_ref());

        if let Some(bucket) = self.buckets.get(&infix) {
            let bucket = Arc::clone(bucket.value());
            let found = bucket.read().get(iid.bytes()).cloned();
            if found.is_some() {
                return Ok(found);
            }
        }
        if let AdjacencyMode::Persisted { storage } = &self.mode {
            if let Some(value) = storage.get(iid.bytes().as_slice())? {
                let edge = Arc::new(Edge::persisted(&iid, &value));
                self.load(Arc::clone(&edge));
                return Ok(Some(edge));
            }
        }
        Ok(None)
    }

    /// Sorted, deduplicated iteration over all edges matching a possibly
    /// partial `(kind, lookahead)` key.
    ///
    /// Buffered mode reads memory only. Persisted mode merges the in-memory
    /// stream with an ascending storage prefix scan; an edge present in both
    /// is reported exactly once, with the buffered instance winning.
    pub fn edges(&self, kind: EdgeKind, lookahead: &[VertexIid]) -> Result<EdgeIter<'_>> {
        assert!(
            lookahead.len() <= kind.lookahead_arity(),
            "{kind:?} admits at most {} lookahead components, got {}",
            kind.lookahead_arity(),
            lookahead.len()
        );
        let partial = InfixIid::new(kind, self.direction, lookahead);
        let mut complete = Vec::new();
        self.expand(partial, &mut complete);
        complete.sort();

        // Bucket keys all share the owner ‖ infix layout, so concatenating
        // bucket snapshots in infix order yields one globally sorted stream.
        let mut buffered = Vec::new();
        for infix in &complete {
            if let Some(bucket) = self.buckets.get(infix) {
                let bucket = Arc::clone(bucket.value());
                for (iid, edge) in bucket.read().iter() {
                    buffered.push(EdgeView::new(EdgeViewIid::of(iid.clone()), Arc::clone(edge)));
                }
            }
        }

        let stored = match &self.mode {
            AdjacencyMode::Persisted { storage } => {
                let prefix = scan_prefix(&self.owner, kind, self.direction, lookahead);
                Some(storage.iterate_prefix(prefix.as_slice())?.peekable())
            }
            AdjacencyMode::Buffered => None,
        };
        Ok(EdgeIter {
            buffered: buffered.into_iter().peekable(),
            stored,
        })
    }

    // Expands a partial lookahead key to every known complete extension.
    fn expand(&self, partial: InfixIid, out: &mut Vec<InfixIid>) {
        if partial.is_complete() {
            out.push(partial);
            return;
        }
        // Clone the extension set out before recursing so no shard lock is
        // held across nested map accesses.
        let extensions: Vec<InfixIid> = match self.extensions.get(&partial) {
            Some(set) => set.iter().cloned().collect(),
            None => return,
        };
        for extension in extensions {
            self.expand(extension, out);
        }
    }

    /// Snapshot of every edge currently buffered here, across all buckets.
    pub(crate) fn buffered_edges(&self) -> Vec<Arc<Edge>> {
        let mut out = Vec::new();
        for entry in self.buckets.iter() {
            let bucket = Arc::clone(entry.value());
            for edge in bucket.read().values() {
                out.push(Arc::clone(edge));
            }
        }
        out
    }

    /// Persists every buffered, non-inferred, non-deleted edge.
    ///
    /// Invoked on out-adjacencies only: each logical edge is buffered in
    /// exactly one out-adjacency, and `Edge::commit` is idempotent besides.
    pub fn commit(&self, storage: &dyn Storage) -> Result<()> {
        for edge in self.buffered_edges() {
            if edge.state() == EdgeState::Buffered && !edge.is_inferred() && !edge.is_deleted() {
                edge.commit(storage)?;
            }
        }
        Ok(())
    }
}

/// Merged sorted iterator over buffered and stored edge views.
///
/// Abandoning the iterator mid-scan drops the underlying storage cursor.
pub struct EdgeIter<'a> {
    buffered: Peekable<vec::IntoIter<EdgeView>>,
    stored: Option<Peekable<Box<dyn Iterator<Item = Result<Entry>> + 'a>>>,
}

impl EdgeIter<'_> {
    fn take_stored(&mut self) -> Result<EdgeView> {
        let (key, value) = self
            .stored
            .as_mut()
            .expect("stored stream present")
            .next()
            .expect("peeked entry present")?;
        let iid = EdgeViewIid::of(key);
        let edge = Arc::new(Edge::persisted(&iid, &value));
        Ok(EdgeView::new(iid, edge))
    }
}

impl Iterator for EdgeIter<'_> {
    type Item = Result<EdgeView>;

    fn next(&mut self) -> Option<Self::Item> {
        let stored_key = match self.stored.as_mut() {
            Some(iter) => match iter.peek() {
                Some(Ok((key, _))) => Some(key.clone()),
                Some(Err(_)) => {
                    let err = iter.next().expect("peeked entry present").unwrap_err();
                    return Some(Err(err));
                }
                None => None,
            },
            None => None,
        };
        match (self.buffered.peek(), stored_key) {
            (None, None) => None,
            (Some(_), None) => self.buffered.next().map(Ok),
            (None, Some(_)) => Some(self.take_stored()),
            (Some(buffered), Some(key)) => match buffered.iid().bytes().cmp(&key) {
                Ordering::Less => self.buffered.next().map(Ok),
                Ordering::Equal => {
                    // Same edge in both sources: report the buffered one.
                    let _ = self.stored.as_mut().expect("stored stream present").next();
                    self.buffered.next().map(Ok)
                }
                Ordering::Greater => Some(self.take_stored()),
            },
        }
    }
}
