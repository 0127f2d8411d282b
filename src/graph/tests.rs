#![cfg(test)]

use std::io;
use std::sync::atomic::AtomicUsize;

use super::*;
use crate::bytes::ByteArray;
use crate::error::GraphError;
use crate::graph::edge::EdgeState;
use crate::storage::{Entry, MemoryStorage};

fn setup() -> (Arc<MemoryStorage>, Graph) {
    let storage = Arc::new(MemoryStorage::new());
    let graph = Graph::open(storage.clone()).unwrap();
    (storage, graph)
}

fn reopen(storage: &Arc<MemoryStorage>) -> Graph {
    Graph::open(storage.clone()).unwrap()
}

struct People {
    person_type: VertexIid,
    name_type: VertexIid,
}

fn schema(graph: &Graph) -> People {
    let person_type = graph.create_type_vertex(VertexKind::EntityType).unwrap();
    let name_type = graph.create_type_vertex(VertexKind::AttributeType).unwrap();
    People {
        person_type: person_type.iid().clone(),
        name_type: name_type.iid().clone(),
    }
}

#[test]
fn mirrored_put_is_visible_from_both_endpoints() {
    let (_storage, graph) = setup();
    let people = schema(&graph);
    let alice = graph.create_thing_vertex(&people.person_type);
    let name = graph.create_thing_vertex(&people.name_type);

    graph.put_edge(EdgeKind::Has, &alice, &name, None, false);

    let forward = alice.outs().edge(EdgeKind::Has, name.iid(), None).unwrap();
    let backward = name.ins().edge(EdgeKind::Has, alice.iid(), None).unwrap();
    let forward = forward.expect("forward view present");
    let backward = backward.expect("backward view present");
    assert_eq!(forward.from(), alice.iid());
    assert_eq!(forward.to(), name.iid());
    assert_eq!(backward.from(), alice.iid());
    assert_eq!(backward.to(), name.iid());
    assert!(alice.is_modified());
    assert!(name.is_modified());
}

#[test]
fn commit_persists_both_view_keys_and_vertex_records() {
    let (storage, graph) = setup();
    let people = schema(&graph);
    let alice = graph.create_thing_vertex(&people.person_type);
    let name = graph.create_thing_vertex(&people.name_type);
    let edge = graph.put_edge(EdgeKind::Has, &alice, &name, None, false);

    graph.commit().unwrap();

    let fwd = storage.get(edge.forward_iid().bytes().as_slice()).unwrap();
    let bwd = storage.get(edge.backward_iid().bytes().as_slice()).unwrap();
    assert!(fwd.is_some());
    assert!(bwd.is_some());
    assert!(storage.get(alice.iid().bytes().as_slice()).unwrap().is_some());
    // Committing again must not duplicate or fail.
    graph.commit().unwrap();
}

#[test]
fn merged_iteration_reports_rebuffered_edge_once() {
    let (storage, graph) = setup();
    let people = schema(&graph);
    let alice = graph.create_thing_vertex(&people.person_type);
    let name = graph.create_thing_vertex(&people.name_type);
    graph.put_edge(EdgeKind::Has, &alice, &name, None, false);
    graph.commit().unwrap();

    // A later transaction sees the persisted edge and re-buffers the same
    // logical edge.
    let graph = reopen(&storage);
    let alice = graph.vertex(alice.iid()).unwrap().expect("persisted vertex");
    let name = graph.vertex(name.iid()).unwrap().expect("persisted vertex");
    assert_eq!(alice.status(), VertexStatus::Persisted);
    graph.put_edge(EdgeKind::Has, &alice, &name, None, false);

    let views: Vec<_> = alice
        .outs()
        .edges(EdgeKind::Has, &[])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(views.len(), 1, "duplicate across buffer and storage");
    assert_eq!(views[0].edge().state(), EdgeState::Buffered, "buffered wins");
}

#[test]
fn point_lookup_probes_storage_and_caches() {
    let (storage, graph) = setup();
    let people = schema(&graph);
    let alice = graph.create_thing_vertex(&people.person_type);
    let name = graph.create_thing_vertex(&people.name_type);
    graph.put_edge(EdgeKind::Has, &alice, &name, None, false);
    graph.commit().unwrap();

    let graph = reopen(&storage);
    let alice = graph.vertex(alice.iid()).unwrap().expect("persisted vertex");
    let found = alice
        .outs()
        .edge(EdgeKind::Has, name.iid(), None)
        .unwrap()
        .expect("edge found in storage");
    assert_eq!(found.state(), EdgeState::Persisted);
    assert_eq!(found.to(), name.iid());
    // Second lookup is served from the buffer.
    let again = alice
        .outs()
        .edge(EdgeKind::Has, name.iid(), None)
        .unwrap()
        .expect("cached edge");
    assert!(Arc::ptr_eq(&found, &again));
}

#[test]
fn lookahead_narrowing_expands_partial_queries() {
    let (storage, graph) = setup();
    let marriage_type = graph.create_type_vertex(VertexKind::RelationType).unwrap();
    let spouse_type = graph.create_type_vertex(VertexKind::RoleType).unwrap();
    let witness_type = graph.create_type_vertex(VertexKind::RoleType).unwrap();
    let person_type = graph.create_type_vertex(VertexKind::EntityType).unwrap();

    let marriage = graph.create_thing_vertex(marriage_type.iid());
    let alice = graph.create_thing_vertex(person_type.iid());
    let spouse_role = graph.create_thing_vertex(spouse_type.iid());
    graph.put_edge(
        EdgeKind::RolePlayer,
        &marriage,
        &alice,
        Some(spouse_role.iid()),
        false,
    );

    // Zero lookahead components: surfaced via prefix-extension expansion.
    let all: Vec<_> = marriage
        .outs()
        .edges(EdgeKind::RolePlayer, &[])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].edge().optimised(), Some(spouse_role.iid()));

    // Matching role narrows to the same edge; a different role excludes it.
    let matching: Vec<_> = marriage
        .outs()
        .edges(EdgeKind::RolePlayer, &[spouse_type.iid().clone()])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(matching.len(), 1);
    let other: Vec<_> = marriage
        .outs()
        .edges(EdgeKind::RolePlayer, &[witness_type.iid().clone()])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert!(other.is_empty());

    // Same narrowing behavior against storage after commit.
    graph.commit().unwrap();
    let graph = reopen(&storage);
    let marriage = graph.vertex(marriage.iid()).unwrap().expect("persisted");
    let all: Vec<_> = marriage
        .outs()
        .edges(EdgeKind::RolePlayer, &[])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].edge().optimised(), Some(spouse_role.iid()));
    let other: Vec<_> = marriage
        .outs()
        .edges(EdgeKind::RolePlayer, &[witness_type.iid().clone()])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert!(other.is_empty());
}

#[test]
fn inferred_edges_are_never_persisted() {
    let (storage, graph) = setup();
    let people = schema(&graph);
    let alice = graph.create_thing_vertex(&people.person_type);
    let name = graph.create_thing_vertex(&people.name_type);
    let edge = graph.put_edge(EdgeKind::Has, &alice, &name, None, true);
    assert!(edge.is_inferred());

    graph.commit().unwrap();
    assert!(storage
        .get(edge.forward_iid().bytes().as_slice())
        .unwrap()
        .is_none());
    // The inferred edge still traverses in-memory.
    let views: Vec<_> = alice
        .outs()
        .edges(EdgeKind::Has, &[])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(views.len(), 1);
}

#[test]
fn schema_override_roundtrips_through_storage() {
    let (storage, graph) = setup();
    let child = graph.create_type_vertex(VertexKind::EntityType).unwrap();
    let parent = graph.create_type_vertex(VertexKind::EntityType).unwrap();
    let grandparent = graph.create_type_vertex(VertexKind::EntityType).unwrap();

    let edge = graph.put_edge(EdgeKind::Sub, &child, &parent, None, false);
    edge.set_overridden(grandparent.iid().clone());
    graph.commit().unwrap();

    let graph = reopen(&storage);
    let child = graph.vertex(child.iid()).unwrap().expect("persisted");
    let loaded = child
        .outs()
        .edge(EdgeKind::Sub, parent.iid(), None)
        .unwrap()
        .expect("sub edge");
    assert_eq!(loaded.overridden(), Some(grandparent.iid().clone()));
}

#[test]
fn delete_edge_clears_memory_and_storage() {
    let (storage, graph) = setup();
    let people = schema(&graph);
    let alice = graph.create_thing_vertex(&people.person_type);
    let name = graph.create_thing_vertex(&people.name_type);
    let edge = graph.put_edge(EdgeKind::Has, &alice, &name, None, false);
    graph.commit().unwrap();

    graph.delete_edge(&edge).unwrap();
    assert!(edge.is_deleted());
    assert!(alice.outs().edge(EdgeKind::Has, name.iid(), None).unwrap().is_none());
    assert!(name.ins().edge(EdgeKind::Has, alice.iid(), None).unwrap().is_none());
    assert!(storage
        .get(edge.forward_iid().bytes().as_slice())
        .unwrap()
        .is_none());
    assert!(storage
        .get(edge.backward_iid().bytes().as_slice())
        .unwrap()
        .is_none());
}

#[test]
fn remove_is_memory_only() {
    let (storage, graph) = setup();
    let people = schema(&graph);
    let alice = graph.create_thing_vertex(&people.person_type);
    let name = graph.create_thing_vertex(&people.name_type);
    let edge = graph.put_edge(EdgeKind::Has, &alice, &name, None, false);
    graph.commit().unwrap();

    alice.outs().remove(&edge);
    assert!(alice.outs().edge(EdgeKind::Has, name.iid(), None).unwrap().is_none());
    // The backward view and durable keys are untouched.
    assert!(name.ins().edge(EdgeKind::Has, alice.iid(), None).unwrap().is_some());
    assert!(storage
        .get(edge.forward_iid().bytes().as_slice())
        .unwrap()
        .is_some());
}

#[test]
fn delete_all_removes_every_touching_edge() {
    let (storage, graph) = setup();
    let people = schema(&graph);
    let alice = graph.create_thing_vertex(&people.person_type);
    let first = graph.create_thing_vertex(&people.name_type);
    let second = graph.create_thing_vertex(&people.name_type);
    graph.put_edge(EdgeKind::Has, &alice, &first, None, false);
    graph.put_edge(EdgeKind::Has, &alice, &second, None, false);
    graph.commit().unwrap();

    let graph = reopen(&storage);
    let alice = graph.vertex(alice.iid()).unwrap().expect("persisted");
    graph.delete_all(&alice).unwrap();

    assert!(storage.get(alice.iid().bytes().as_slice()).unwrap().is_none());
    let graph = reopen(&storage);
    assert!(graph.vertex(alice.iid()).unwrap().is_none());
    let first = graph.vertex(first.iid()).unwrap().expect("still persisted");
    let leftovers: Vec<_> = first
        .ins()
        .edges(EdgeKind::Has, &[])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert!(leftovers.is_empty());
}

/// Fails the first `failures` writes of edge-view keys, then behaves like
/// [`MemoryStorage`]. Vertex-record writes always succeed.
struct FailingEdgePuts {
    inner: MemoryStorage,
    failures_left: AtomicUsize,
}

impl FailingEdgePuts {
    fn new(failures: usize) -> Self {
        FailingEdgePuts {
            inner: MemoryStorage::new(),
            failures_left: AtomicUsize::new(failures),
        }
    }
}

impl Storage for FailingEdgePuts {
    fn get(&self, key: &[u8]) -> Result<Option<ByteArray>> {
        self.inner.get(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        // Edge-view keys are strictly longer than any vertex record.
        if key.len() > crate::encoding::iid::THING_IID_LENGTH
            && self.failures_left.load(AtomicOrdering::Acquire) > 0
        {
            self.failures_left.fetch_sub(1, AtomicOrdering::AcqRel);
            return Err(GraphError::Io(io::Error::new(
                io::ErrorKind::Other,
                "injected write failure",
            )));
        }
        self.inner.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.inner.delete(key)
    }

    fn iterate_prefix<'a>(
        &'a self,
        prefix: &[u8],
    ) -> Result<Box<dyn Iterator<Item = Result<Entry>> + 'a>> {
        self.inner.iterate_prefix(prefix)
    }
}

#[test]
fn commit_retries_edges_after_storage_failure() {
    let storage = Arc::new(FailingEdgePuts::new(1));
    let graph = Graph::open(storage.clone()).unwrap();
    let people = schema(&graph);
    let alice = graph.create_thing_vertex(&people.person_type);
    let name = graph.create_thing_vertex(&people.name_type);
    let edge = graph.put_edge(EdgeKind::Has, &alice, &name, None, false);

    // The first edge write fails, so commit surfaces the error and the edge
    // stays uncommitted.
    assert!(graph.commit().is_err());
    assert!(storage
        .get(edge.forward_iid().bytes().as_slice())
        .unwrap()
        .is_none());

    // A later commit must retry the failed edge, not skip it.
    graph.commit().unwrap();
    assert!(storage
        .get(edge.forward_iid().bytes().as_slice())
        .unwrap()
        .is_some());
    assert!(storage
        .get(edge.backward_iid().bytes().as_slice())
        .unwrap()
        .is_some());
}

#[test]
fn merged_iteration_is_sorted_by_view_iid() {
    let (storage, graph) = setup();
    let people = schema(&graph);
    let alice = graph.create_thing_vertex(&people.person_type);
    for _ in 0..4 {
        let attr = graph.create_thing_vertex(&people.name_type);
        graph.put_edge(EdgeKind::Has, &alice, &attr, None, false);
    }
    graph.commit().unwrap();

    let graph = reopen(&storage);
    let alice = graph.vertex(alice.iid()).unwrap().expect("persisted");
    // Buffer two more edges so the merge interleaves sources.
    for _ in 0..2 {
        let attr = graph.create_thing_vertex(&people.name_type);
        graph.put_edge(EdgeKind::Has, &alice, &attr, None, false);
    }
    let views: Vec<_> = alice
        .outs()
        .edges(EdgeKind::Has, &[])
        .unwrap()
        .collect::<Result<_>>()
        .unwrap();
    assert_eq!(views.len(), 6);
    let mut sorted = views.clone();
    sorted.sort();
    assert_eq!(views, sorted, "merge must preserve view-IID order");
}
