//! Vertices, edges, and the transaction-scoped graph that owns them.
//!
//! A `Graph` is created over an injected [`Storage`] handle, buffers writes
//! in per-vertex adjacency structures, and flushes them on `commit`. Edges
//! are recorded redundantly on both endpoints (out-adjacency of the source,
//! in-adjacency of the destination) for O(1) directional traversal; the
//! mirrored insert happens exactly once, in [`Graph::put_edge`].

pub mod adjacency;
pub mod edge;

mod tests;

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::encoding::iid::{VertexIid, THING_IID_LENGTH, TYPE_IID_LENGTH};
use crate::encoding::key::KeyGenerator;
use crate::encoding::{Direction, EdgeKind, VertexKind};
use crate::error::Result;
use crate::storage::Storage;

use adjacency::{Adjacency, AdjacencyMode};
use edge::{Edge, EdgeView};

/// Whether a vertex was created in this write context or loaded from storage.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum VertexStatus {
    /// Created here; becomes persisted on commit.
    Buffered,
    /// Loaded from durable storage.
    Persisted,
}

/// A vertex and its two adjacency structures.
pub struct Vertex {
    iid: VertexIid,
    status: VertexStatus,
    outs: Adjacency,
    ins: Adjacency,
    modified: AtomicBool,
}

impl Vertex {
    fn new(iid: VertexIid, status: VertexStatus, storage: &Arc<dyn Storage>) -> Arc<Self> {
        let mode = || match status {
            VertexStatus::Buffered => AdjacencyMode::Buffered,
            VertexStatus::Persisted => AdjacencyMode::Persisted {
                storage: Arc::clone(storage),
            },
        };
        Arc::new(Vertex {
            outs: Adjacency::new(iid.clone(), Direction::Out, mode()),
            ins: Adjacency::new(iid.clone(), Direction::In, mode()),
            iid,
            status,
            modified: AtomicBool::new(false),
        })
    }

    /// The vertex identifier.
    pub fn iid(&self) -> &VertexIid {
        &self.iid
    }

    /// The vertex kind encoded in the IID prefix.
    pub fn kind(&self) -> VertexKind {
        self.iid.kind()
    }

    /// Buffered or persisted.
    pub fn status(&self) -> VertexStatus {
        self.status
    }

    /// The out-adjacency (forward edge views).
    pub fn outs(&self) -> &Adjacency {
        &self.outs
    }

    /// The in-adjacency (backward edge views).
    pub fn ins(&self) -> &Adjacency {
        &self.ins
    }

    /// The adjacency for the given direction.
    pub fn adjacency(&self, direction: Direction) -> &Adjacency {
        match direction {
            Direction::Out => &self.outs,
            Direction::In => &self.ins,
        }
    }

    /// Dirty flag consulted at commit time.
    pub fn is_modified(&self) -> bool {
        self.modified.load(AtomicOrdering::Acquire)
    }

    pub(crate) fn set_modified(&self) {
        self.modified.store(true, AtomicOrdering::Release);
    }
}

/// A transaction-scoped graph over an ordered key-value store.
///
/// Dropped wholesale after commit; committed state is re-read by the next
/// transaction's graph.
pub struct Graph {
    storage: Arc<dyn Storage>,
    keys: KeyGenerator,
    vertices: DashMap<VertexIid, Arc<Vertex>>,
}

impl Graph {
    /// Opens a graph over the given storage handle.
    ///
    /// Key counters are seeded past every persisted vertex record before any
    /// allocation can happen, so a fresh session can never reissue the IID of
    /// a vertex committed by an earlier one.
    pub fn open(storage: Arc<dyn Storage>) -> Result<Self> {
        let keys = KeyGenerator::new();
        Self::seed_keys(&storage, &keys)?;
        Ok(Graph {
            storage,
            keys,
            vertices: DashMap::new(),
        })
    }

    // Vertex records are the only stored keys of exactly IID length; longer
    // keys under the same prefix byte are edge views and are skipped.
    fn seed_keys(storage: &Arc<dyn Storage>, keys: &KeyGenerator) -> Result<()> {
        for kind in VertexKind::ALL {
            let expected = if kind.is_type() {
                TYPE_IID_LENGTH
            } else {
                THING_IID_LENGTH
            };
            for entry in storage.iterate_prefix(&[kind.prefix()])? {
                let (key, _) = entry?;
                if key.length() != expected {
                    continue;
                }
                let iid = VertexIid::of(key);
                if kind.is_type() {
                    keys.sync_type_key(kind, &iid.key());
                } else {
                    keys.sync_thing_key(&iid.type_iid(), &iid.key());
                }
            }
        }
        Ok(())
    }

    /// The shared storage handle.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// The key generator backing vertex IID allocation.
    pub fn keys(&self) -> &KeyGenerator {
        &self.keys
    }

    /// Creates a buffered schema vertex with a freshly generated IID.
    pub fn create_type_vertex(&self, kind: VertexKind) -> Result<Arc<Vertex>> {
        let iid = VertexIid::generate_type(&self.keys, kind)?;
        Ok(self.register(iid, VertexStatus::Buffered))
    }

    /// Creates a buffered thing vertex typed by `type_iid`.
    pub fn create_thing_vertex(&self, type_iid: &VertexIid) -> Arc<Vertex> {
        let iid = VertexIid::generate_thing(&self.keys, type_iid);
        self.register(iid, VertexStatus::Buffered)
    }

    fn register(&self, iid: VertexIid, status: VertexStatus) -> Arc<Vertex> {
        let vertex = self
            .vertices
            .entry(iid.clone())
            .or_insert_with(|| Vertex::new(iid, status, &self.storage));
        Arc::clone(vertex.value())
    }

    /// Resolves a vertex from memory, falling back to storage.
    ///
    /// A vertex found in storage is registered as persisted and its key is
    /// synced into the generator so later allocations cannot collide.
    pub fn vertex(&self, iid: &VertexIid) -> Result<Option<Arc<Vertex>>> {
        if let Some(vertex) = self.vertices.get(iid) {
            return Ok(Some(Arc::clone(vertex.value())));
        }
        if self.storage.get(iid.bytes().as_slice())?.is_some() {
            if iid.kind().is_type() {
                self.keys.sync_type_key(iid.kind(), &iid.key());
            } else {
                self.keys.sync_thing_key(&iid.type_iid(), &iid.key());
            }
            return Ok(Some(self.register(iid.clone(), VertexStatus::Persisted)));
        }
        Ok(None)
    }

    /// Number of vertices currently resident in memory.
    pub fn resident_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Creates a buffered edge `from -> to` and records both of its views.
    ///
    /// The forward view goes into `from`'s out-adjacency, the mirror into
    /// `to`'s in-adjacency via the non-mirroring insert, so the mirror is
    /// written exactly once. Both vertices are marked modified.
    pub fn put_edge(
        &self,
        kind: EdgeKind,
        from: &Arc<Vertex>,
        to: &Arc<Vertex>,
        optimised: Option<&VertexIid>,
        inferred: bool,
    ) -> Arc<Edge> {
        let edge = Arc::new(Edge::buffered(
            kind,
            from.iid().clone(),
            to.iid().clone(),
            optimised.cloned(),
            inferred,
        ));
        trace!(?edge, "put edge");
        from.outs().insert(&edge);
        to.ins().insert(&edge);
        from.set_modified();
        to.set_modified();
        edge
    }

    /// Deletes one edge from both endpoints' adjacency and from storage.
    ///
    /// Storage deletes are unconditional; deleting an absent key is a no-op,
    /// and a re-buffered edge may have durable keys even while its in-memory
    /// instance is buffered.
    pub fn delete_edge(&self, edge: &Arc<Edge>) -> Result<()> {
        edge.mark_deleted();
        if let Some(vertex) = self.vertices.get(edge.from()) {
            vertex.outs().remove(edge);
            vertex.set_modified();
        }
        if let Some(vertex) = self.vertices.get(edge.to()) {
            vertex.ins().remove(edge);
            vertex.set_modified();
        }
        self.storage.delete(edge.forward_iid().bytes().as_slice())?;
        self.storage.delete(edge.backward_iid().bytes().as_slice())?;
        Ok(())
    }

    /// Deletes every edge of `owner` matching a possibly partial key.
    pub fn delete_edges(
        &self,
        owner: &Vertex,
        direction: Direction,
        kind: EdgeKind,
        lookahead: &[VertexIid],
    ) -> Result<()> {
        let views: Vec<EdgeView> = owner
            .adjacency(direction)
            .edges(kind, lookahead)?
            .collect::<Result<_>>()?;
        for view in views {
            self.delete_edge(view.edge())?;
        }
        Ok(())
    }

    /// Removes every edge of every kind touching `vertex`, then the vertex
    /// record itself.
    pub fn delete_all(&self, vertex: &Vertex) -> Result<()> {
        for kind in EdgeKind::ALL {
            self.delete_edges(vertex, Direction::Out, kind, &[])?;
            self.delete_edges(vertex, Direction::In, kind, &[])?;
        }
        self.storage.delete(vertex.iid().bytes().as_slice())?;
        self.vertices.remove(vertex.iid());
        Ok(())
    }

    /// Flushes all buffered state: vertex records for vertices created here,
    /// then every buffered non-inferred edge, committed exactly once via the
    /// out-adjacency it is buffered in.
    pub fn commit(&self) -> Result<()> {
        let mut vertices_written = 0usize;
        for entry in self.vertices.iter() {
            let vertex = entry.value();
            if vertex.status() == VertexStatus::Buffered {
                self.storage.put(vertex.iid().bytes().as_slice(), &[])?;
                vertices_written += 1;
            }
            vertex.outs().commit(self.storage.as_ref())?;
        }
        debug!(vertices_written, "graph commit flushed");
        Ok(())
    }
}
