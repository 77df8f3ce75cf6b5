//! Node registry integration tests
//!
//! Tests named-type registration, bound construction, and the thread-safe
//! read path through the public crate surface.

use std::sync::Arc;

use sonoflow::prelude::*;
use sonoflow::{NodeRole, Passthrough, RampSource, RegistryError};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

/// The default registry carries the builtin utility types plus the
/// inference stage.
#[test]
fn test_registry_default_types() {
    let registry = default_registry(doubling_runtime()).unwrap();

    for name in ["passthrough", "ramp_source", "trace_sink", "null_sink", "inference"] {
        assert!(registry.has_type(name), "Missing builtin type '{}'", name);
    }
    assert!(!registry.has_type("warp"));

    let types = registry.node_types();
    assert!(types.iter().any(|t| t == "inference"));
}

/// Factory methods bind the constructed node to the graph under the
/// requested id, preserving insertion order.
#[test]
fn test_registry_creates_bound_nodes() {
    let registry = default_registry(doubling_runtime()).unwrap();
    let graph = registry.create_graph();

    let camera = registry
        .create_input_device(&graph, "camera", "ramp_source", 1)
        .unwrap();
    let denoise = registry
        .create_node(&graph, "denoise", "passthrough", false)
        .unwrap();
    let display = registry
        .create_output_device(&graph, "display", "trace_sink", true)
        .unwrap();

    assert_eq!(camera.id(), "camera");
    assert_eq!(denoise.id(), "denoise");
    assert_eq!(display.id(), "display");

    assert_eq!(graph.len(), 3);
    assert_eq!(graph.node_ids(), vec!["camera", "denoise", "display"]);
    assert_eq!(graph.node("denoise").unwrap().role(), NodeRole::Process);
}

/// An unregistered type name fails before anything touches the graph.
#[test]
fn test_registry_unknown_type_leaves_graph_empty() {
    let registry = default_registry(doubling_runtime()).unwrap();
    let graph = registry.create_graph();

    let result = registry.create_node(&graph, "mystery", "warp", false);
    match result {
        Err(RegistryError::UnknownNodeType(name)) => assert_eq!(name, "warp"),
        other => panic!("Expected UnknownNodeType, got {:?}", other.map(|n| n.id().to_string())),
    }
    assert!(graph.is_empty());
}

/// Type names are unique across all three role tables.
#[test]
fn test_registry_duplicate_type_rejected() {
    let registry = default_registry(doubling_runtime()).unwrap();

    // Same role.
    let result = registry.register_node("passthrough", |_graph, id, queueing| {
        Ok(Arc::new(Passthrough::new(id, queueing)) as Arc<dyn ProcessNode>)
    });
    assert!(matches!(result, Err(RegistryError::DuplicateType(name)) if name == "passthrough"));

    // Cross-role clash: "inference" is a process type.
    let result = registry.register_input("inference", |_graph, id, ports| {
        Ok(Arc::new(RampSource::new(id, ports)) as Arc<dyn InputDevice>)
    });
    assert!(matches!(result, Err(RegistryError::DuplicateType(name)) if name == "inference"));
}

/// Custom constructors receive the id and flags they were asked for.
#[test]
fn test_registry_custom_type_constructs() {
    let registry = NodeRegistry::new();
    registry
        .register_node("edge_enhance", |_graph, id, queueing| {
            Ok(Arc::new(Passthrough::new(id, queueing)) as Arc<dyn ProcessNode>)
        })
        .unwrap();

    let graph = registry.create_graph();
    let node = registry
        .create_node(&graph, "edges", "edge_enhance", true)
        .unwrap();

    assert_eq!(node.id(), "edges");
    assert!(node.queueing());
    assert_eq!(graph.len(), 1);
}

/// Construction from many threads against one registry is safe and
/// leaves every graph fully populated.
#[test]
fn test_registry_concurrent_construction() {
    let registry = default_registry(doubling_runtime()).unwrap();

    let mut workers = Vec::new();
    for worker in 0..8 {
        let registry = registry.clone();
        workers.push(std::thread::spawn(move || {
            let graph = registry.create_graph();
            for i in 0..16 {
                let id = format!("node-{}-{}", worker, i);
                registry.create_node(&graph, &id, "passthrough", false).unwrap();
            }
            graph.len()
        }));
    }

    for worker in workers {
        assert_eq!(worker.join().unwrap(), 16);
    }
}

/// Registered types stay visible to later lookups from other clones.
#[test]
fn test_registry_clone_shares_tables() {
    let registry = NodeRegistry::new();
    let clone = registry.clone();

    registry
        .register_node("late_type", |_graph, id, queueing| {
            Ok(Arc::new(Passthrough::new(id, queueing)) as Arc<dyn ProcessNode>)
        })
        .unwrap();

    assert!(clone.has_type("late_type"));
}
