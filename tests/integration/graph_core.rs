//! End-to-end exercises of the graph over [`MemoryStorage`]: concurrent
//! buffering, commit/reload cycles, and merged traversal across sessions.

use std::sync::{Arc, Barrier};
use std::thread;

use tessera::encoding::iid::VertexIid;
use tessera::encoding::{EdgeKind, VertexKind};
use tessera::graph::Graph;
use tessera::storage::MemoryStorage;
use tessera::Result;

const NUM_THREADS: usize = 8;
const EDGES_PER_THREAD: usize = 200;

fn init() {
    let _ = tessera::logging::init_logging(None);
}

#[test]
fn concurrent_edge_buffering_loses_nothing() -> Result<()> {
    init();
    let storage = Arc::new(MemoryStorage::new());
    let graph = Arc::new(Graph::open(storage)?);
    let person_type = graph.create_type_vertex(VertexKind::EntityType)?;
    let name_type = graph.create_type_vertex(VertexKind::AttributeType)?;
    let alice = graph.create_thing_vertex(person_type.iid());

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];
    for _ in 0..NUM_THREADS {
        let graph = Arc::clone(&graph);
        let barrier = Arc::clone(&barrier);
        let alice = Arc::clone(&alice);
        let name_type = name_type.iid().clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            for _ in 0..EDGES_PER_THREAD {
                let attr = graph.create_thing_vertex(&name_type);
                graph.put_edge(EdgeKind::Has, &alice, &attr, None, false);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let views: Vec<_> = alice
        .outs()
        .edges(EdgeKind::Has, &[])?
        .collect::<Result<_>>()?;
    assert_eq!(views.len(), NUM_THREADS * EDGES_PER_THREAD);
    // Every mirror landed too.
    let mut mirrored = 0usize;
    for view in &views {
        let attr = graph.vertex(view.edge().to())?.expect("attribute resident");
        if attr
            .ins()
            .edge(EdgeKind::Has, alice.iid(), None)?
            .is_some()
        {
            mirrored += 1;
        }
    }
    assert_eq!(mirrored, NUM_THREADS * EDGES_PER_THREAD);
    Ok(())
}

#[test]
fn concurrent_type_key_allocation_is_collision_free() -> Result<()> {
    init();
    let storage = Arc::new(MemoryStorage::new());
    let graph = Arc::new(Graph::open(storage)?);

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];
    for _ in 0..NUM_THREADS {
        let graph = Arc::clone(&graph);
        let barrier = Arc::clone(&barrier);
        handles.push(thread::spawn(move || -> Result<Vec<VertexIid>> {
            barrier.wait();
            let mut iids = Vec::new();
            for _ in 0..EDGES_PER_THREAD {
                let vertex = graph.create_type_vertex(VertexKind::EntityType)?;
                iids.push(vertex.iid().clone());
            }
            Ok(iids)
        }));
    }
    let mut all = Vec::new();
    for handle in handles {
        all.extend(handle.join().unwrap()?);
    }
    all.sort();
    let before = all.len();
    all.dedup();
    assert_eq!(all.len(), before, "generated IIDs must be unique");
    assert_eq!(graph.resident_vertices(), before);
    Ok(())
}

#[test]
fn commit_reload_roundtrip_preserves_the_graph() -> Result<()> {
    init();
    let storage = Arc::new(MemoryStorage::new());

    // Session one: schema, things, role-player structure.
    let graph = Graph::open(storage.clone())?;
    let person_type = graph.create_type_vertex(VertexKind::EntityType)?;
    let marriage_type = graph.create_type_vertex(VertexKind::RelationType)?;
    let spouse_type = graph.create_type_vertex(VertexKind::RoleType)?;
    graph.put_edge(EdgeKind::Relates, &marriage_type, &spouse_type, None, false);
    graph.put_edge(EdgeKind::Plays, &person_type, &spouse_type, None, false);

    let alice = graph.create_thing_vertex(person_type.iid());
    let bob = graph.create_thing_vertex(person_type.iid());
    let marriage = graph.create_thing_vertex(marriage_type.iid());
    let alice_role = graph.create_thing_vertex(spouse_type.iid());
    let bob_role = graph.create_thing_vertex(spouse_type.iid());
    graph.put_edge(
        EdgeKind::RolePlayer,
        &marriage,
        &alice,
        Some(alice_role.iid()),
        false,
    );
    graph.put_edge(
        EdgeKind::RolePlayer,
        &marriage,
        &bob,
        Some(bob_role.iid()),
        false,
    );
    graph.commit()?;

    // Session two: everything is reachable from storage alone.
    let graph = Graph::open(storage.clone())?;
    let marriage_type = graph
        .vertex(marriage_type.iid())?
        .expect("relation type persisted");
    let relates: Vec<_> = marriage_type
        .outs()
        .edges(EdgeKind::Relates, &[])?
        .collect::<Result<_>>()?;
    assert_eq!(relates.len(), 1);
    assert_eq!(relates[0].edge().to(), spouse_type.iid());

    let marriage = graph.vertex(marriage.iid())?.expect("relation persisted");
    let players: Vec<_> = marriage
        .outs()
        .edges(EdgeKind::RolePlayer, &[spouse_type.iid().clone()])?
        .collect::<Result<_>>()?;
    assert_eq!(players.len(), 2);
    let targets: Vec<_> = players.iter().map(|v| v.edge().to().clone()).collect();
    assert!(targets.contains(alice.iid()));
    assert!(targets.contains(bob.iid()));

    // Backward views resolve from the player side as well.
    let alice = graph.vertex(alice.iid())?.expect("entity persisted");
    let from_alice: Vec<_> = alice
        .ins()
        .edges(EdgeKind::RolePlayer, &[spouse_type.iid().clone()])?
        .collect::<Result<_>>()?;
    assert_eq!(from_alice.len(), 1);
    assert_eq!(from_alice[0].edge().from(), marriage.iid());
    Ok(())
}

#[test]
fn reload_then_extend_then_commit_accumulates() -> Result<()> {
    init();
    let storage = Arc::new(MemoryStorage::new());

    let graph = Graph::open(storage.clone())?;
    let person_type = graph.create_type_vertex(VertexKind::EntityType)?;
    let name_type = graph.create_type_vertex(VertexKind::AttributeType)?;
    let alice = graph.create_thing_vertex(person_type.iid());
    let first = graph.create_thing_vertex(name_type.iid());
    graph.put_edge(EdgeKind::Has, &alice, &first, None, false);
    graph.commit()?;

    // Second session adds another attribute to the persisted vertex. Its key
    // generator must not re-issue the first attribute's key.
    let graph = Graph::open(storage.clone())?;
    let alice = graph.vertex(alice.iid())?.expect("persisted");
    let first = graph.vertex(first.iid())?.expect("persisted");
    let second = graph.create_thing_vertex(name_type.iid());
    assert_ne!(second.iid(), first.iid());
    graph.put_edge(EdgeKind::Has, &alice, &second, None, false);
    graph.commit()?;

    let graph = Graph::open(storage)?;
    let alice = graph.vertex(alice.iid())?.expect("persisted");
    let views: Vec<_> = alice
        .outs()
        .edges(EdgeKind::Has, &[])?
        .collect::<Result<_>>()?;
    assert_eq!(views.len(), 2);
    Ok(())
}

#[test]
fn fresh_session_allocates_past_persisted_keys() -> Result<()> {
    init();
    let storage = Arc::new(MemoryStorage::new());

    let graph = Graph::open(storage.clone())?;
    let person_type = graph.create_type_vertex(VertexKind::EntityType)?;
    let alice = graph.create_thing_vertex(person_type.iid());
    let name_type = graph.create_type_vertex(VertexKind::AttributeType)?;
    let name = graph.create_thing_vertex(name_type.iid());
    graph.put_edge(EdgeKind::Has, &alice, &name, None, false);
    graph.commit()?;

    // Second session allocates immediately, without loading any persisted
    // vertex first. Counters are seeded at open, so nothing may collide.
    let graph = Graph::open(storage)?;
    let second_type = graph.create_type_vertex(VertexKind::EntityType)?;
    assert_ne!(second_type.iid(), person_type.iid());
    let bob = graph.create_thing_vertex(person_type.iid());
    assert_ne!(bob.iid(), alice.iid());

    // The fresh vertex is its own identity: no edges leak over from alice.
    let views: Vec<_> = bob
        .outs()
        .edges(EdgeKind::Has, &[])?
        .collect::<Result<_>>()?;
    assert!(views.is_empty());
    Ok(())
}
