//! Directed, typed edges and their directional views.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use parking_lot::RwLock;
use smallvec::SmallVec;

use crate::bytes::ByteArray;
use crate::encoding::iid::{EdgeViewIid, InfixIid, VertexIid};
use crate::encoding::{Direction, EdgeKind};
use crate::error::Result;
use crate::storage::Storage;

/// Where an edge currently lives.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EdgeState {
    /// Created in an uncommitted write context; exists only in memory.
    Buffered,
    /// Durably stored; loaded by IID or committed earlier.
    Persisted,
}

/// A directed typed connection `from -> to`.
///
/// Schema edges may carry an overridden vertex (persisted in the stored
/// value); thing edges may carry an optimised (mediating) vertex and may be
/// inferred. Logical identity is `(kind, from, to, optimised)` — two edges
/// with the same identity are equal regardless of buffered/persisted state.
pub struct Edge {
    kind: EdgeKind,
    from: VertexIid,
    to: VertexIid,
    optimised: Option<VertexIid>,
    overridden: RwLock<Option<VertexIid>>,
    inferred: bool,
    state: EdgeState,
    committed: AtomicBool,
    deleted: AtomicBool,
}

impl Edge {
    /// Creates a buffered edge.
    ///
    /// Endpoint kinds must match the edge kind (schema edges connect type
    /// vertices, thing edges connect thing vertices), an optimised vertex is
    /// required exactly for optimised kinds, and only thing edges may be
    /// inferred. All violations are programming errors.
    pub fn buffered(
        kind: EdgeKind,
        from: VertexIid,
        to: VertexIid,
        optimised: Option<VertexIid>,
        inferred: bool,
    ) -> Self {
        assert_eq!(
            kind.is_schema(),
            from.kind().is_type(),
            "edge kind and from-vertex kind disagree"
        );
        assert_eq!(
            kind.is_schema(),
            to.kind().is_type(),
            "edge kind and to-vertex kind disagree"
        );
        assert_eq!(
            kind.is_optimised(),
            optimised.is_some(),
            "optimised vertex required iff the edge kind is optimised"
        );
        assert!(!(inferred && kind.is_schema()), "schema edges cannot be inferred");
        if let Some(opt) = &optimised {
            assert!(opt.kind().is_thing(), "optimised vertex must be a thing");
        }
        Edge {
            kind,
            from,
            to,
            optimised,
            overridden: RwLock::new(None),
            inferred,
            state: EdgeState::Buffered,
            committed: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
        }
    }

    /// Reconstructs a persisted edge from a stored key and value.
    ///
    /// The key's infix determines whether it is a forward or backward view;
    /// endpoints are assigned accordingly. A non-empty value on a schema edge
    /// is the overridden vertex IID.
    pub fn persisted(view: &EdgeViewIid, value: &ByteArray) -> Self {
        let infix = view.infix();
        let (from, to) = match infix.direction() {
            Direction::Out => (view.owner(), view.adjacent()),
            Direction::In => (view.adjacent(), view.owner()),
        };
        let kind = infix.kind();
        let overridden = if kind.is_schema() && !value.is_empty() {
            Some(VertexIid::of(value.clone()))
        } else {
            None
        };
        Edge {
            kind,
            from,
            to,
            optimised: view.optimised(),
            overridden: RwLock::new(overridden),
            inferred: false,
            state: EdgeState::Persisted,
            committed: AtomicBool::new(true),
            deleted: AtomicBool::new(false),
        }
    }

    /// The edge type tag.
    pub fn kind(&self) -> EdgeKind {
        self.kind
    }

    /// Source endpoint.
    pub fn from(&self) -> &VertexIid {
        &self.from
    }

    /// Destination endpoint.
    pub fn to(&self) -> &VertexIid {
        &self.to
    }

    /// The mediating vertex of an optimised edge.
    pub fn optimised(&self) -> Option<&VertexIid> {
        self.optimised.as_ref()
    }

    /// The vertex this edge's target has been overridden by, if any.
    pub fn overridden(&self) -> Option<VertexIid> {
        self.overridden.read().clone()
    }

    /// Records a schema-level override. Panics on thing edges.
    pub fn set_overridden(&self, vertex: VertexIid) {
        assert!(self.kind.is_schema(), "only schema edges carry an override");
        assert!(vertex.kind().is_type(), "override target must be a type vertex");
        *self.overridden.write() = Some(vertex);
    }

    /// True for derived edges that are recomputed each session.
    pub fn is_inferred(&self) -> bool {
        self.inferred
    }

    /// Buffered or persisted.
    pub fn state(&self) -> EdgeState {
        self.state
    }

    /// True once the edge has been retracted.
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(AtomicOrdering::Acquire)
    }

    pub(crate) fn mark_deleted(&self) {
        self.deleted.store(true, AtomicOrdering::Release);
    }

    /// Lookahead type components contributed by this edge to its infix.
    pub fn infix_lookahead(&self) -> SmallVec<[VertexIid; 2]> {
        let mut out = SmallVec::new();
        if self.kind.is_optimised() {
            let optimised = self.optimised.as_ref().expect("optimised edge");
            out.push(optimised.type_iid());
        }
        out
    }

    /// The owning vertex of the view in the given direction.
    pub fn owner(&self, direction: Direction) -> &VertexIid {
        match direction {
            Direction::Out => &self.from,
            Direction::In => &self.to,
        }
    }

    /// The far vertex of the view in the given direction.
    pub fn adjacent(&self, direction: Direction) -> &VertexIid {
        match direction {
            Direction::Out => &self.to,
            Direction::In => &self.from,
        }
    }

    /// The complete infix of the view in the given direction.
    pub fn infix(&self, direction: Direction) -> InfixIid {
        InfixIid::new(self.kind, direction, &self.infix_lookahead())
    }

    /// The full edge-view IID in the given direction.
    pub fn iid(&self, direction: Direction) -> EdgeViewIid {
        let optimised_key = self.optimised.as_ref().map(|o| o.key());
        EdgeViewIid::new(
            self.owner(direction),
            &self.infix(direction),
            self.adjacent(direction),
            optimised_key.as_ref(),
        )
    }

    /// The forward-view IID (owner = `from`).
    pub fn forward_iid(&self) -> EdgeViewIid {
        self.iid(Direction::Out)
    }

    /// The backward-view IID (owner = `to`).
    pub fn backward_iid(&self) -> EdgeViewIid {
        self.iid(Direction::In)
    }

    /// The stored value bytes: the overridden vertex IID, or empty.
    pub fn value(&self) -> ByteArray {
        match self.overridden.read().as_ref() {
            Some(v) => v.bytes().clone(),
            None => ByteArray::empty(),
        }
    }

    /// Writes both view keys to durable storage. Idempotent once both writes
    /// succeed; a failed write clears the committed flag so a later commit
    /// retries the edge. Panics when invoked on an inferred edge (they are
    /// never persisted).
    pub fn commit(&self, storage: &dyn Storage) -> Result<()> {
        assert!(!self.inferred, "inferred edges are never committed");
        if self.committed.swap(true, AtomicOrdering::AcqRel) {
            return Ok(());
        }
        let value = self.value();
        let result = storage
            .put(self.forward_iid().bytes().as_slice(), value.as_slice())
            .and_then(|()| storage.put(self.backward_iid().bytes().as_slice(), value.as_slice()));
        if result.is_err() {
            self.committed.store(false, AtomicOrdering::Release);
        }
        result
    }
}

impl PartialEq for Edge {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.from == other.from
            && self.to == other.to
            && self.optimised == other.optimised
    }
}

impl Eq for Edge {}

impl fmt::Debug for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Edge")
            .field("kind", &self.kind)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("optimised", &self.optimised)
            .field("state", &self.state)
            .field("inferred", &self.inferred)
            .finish()
    }
}

/// A directional projection of an edge, ordered by its view-IID bytes.
///
/// Views of logically equal edges compare equal regardless of whether the
/// underlying edges are buffered or persisted.
#[derive(Clone, Debug)]
pub struct EdgeView {
    iid: EdgeViewIid,
    edge: Arc<Edge>,
}

impl EdgeView {
    pub(crate) fn new(iid: EdgeViewIid, edge: Arc<Edge>) -> Self {
        EdgeView { iid, edge }
    }

    /// Builds the view of `edge` in the given direction.
    pub fn of(edge: &Arc<Edge>, direction: Direction) -> Self {
        EdgeView {
            iid: edge.iid(direction),
            edge: Arc::clone(edge),
        }
    }

    /// The view IID.
    pub fn iid(&self) -> &EdgeViewIid {
        &self.iid
    }

    /// The underlying edge.
    pub fn edge(&self) -> &Arc<Edge> {
        &self.edge
    }
}

impl PartialEq for EdgeView {
    fn eq(&self, other: &Self) -> bool {
        self.iid == other.iid
    }
}

impl Eq for EdgeView {}

impl PartialOrd for EdgeView {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EdgeView {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.iid.cmp(&other.iid)
    }
}
