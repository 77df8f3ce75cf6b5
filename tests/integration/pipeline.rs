//! Pipeline assembly integration tests
//!
//! Tests declarative specs through deserialization, assembly against the
//! registry, and manual frame flow across the assembled devices.

use std::sync::{Arc, Mutex};

use sonoflow::prelude::*;
use sonoflow::{params, AssemblyError, GraphError, LinkSpec, RegistryError, StageSpec};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

fn stage(id: &str, type_name: &str, role: StageRole) -> StageSpec {
    StageSpec {
        id: id.to_string(),
        type_name: type_name.to_string(),
        role,
        ports: 1,
        queueing: false,
        params: sonoflow::Params::new(),
    }
}

fn link(from: &str, to: &str) -> LinkSpec {
    LinkSpec {
        from: from.to_string(),
        from_port: 0,
        to: to.to_string(),
        to_port: 0,
    }
}

/// A TOML document deserializes into a spec and assembles into a bound
/// graph with the declared topology.
#[test]
fn test_pipeline_assemble_from_toml() {
    let doc = r#"
        [[stages]]
        id = "camera"
        type = "ramp_source"
        role = "input"

        [[stages]]
        id = "denoise"
        type = "passthrough"
        role = "process"
        queueing = true

        [[stages]]
        id = "display"
        type = "trace_sink"
        role = "output"

        [[links]]
        from = "camera"
        to = "denoise"

        [[links]]
        from = "denoise"
        to = "display"
    "#;

    let spec: PipelineSpec = toml::from_str(doc).unwrap();
    assert_eq!(spec.stages.len(), 3);
    assert_eq!(spec.stages[0].ports, 1);
    assert!(!spec.stages[0].queueing);
    assert!(spec.stages[1].queueing);
    assert_eq!(spec.links[0].from_port, 0);

    let registry = default_registry(doubling_runtime()).unwrap();
    let assembly = assemble(&registry, &spec).unwrap();

    assert_eq!(assembly.inputs.len(), 1);
    assert_eq!(assembly.processors.len(), 1);
    assert_eq!(assembly.outputs.len(), 1);
    assert_eq!(assembly.graph.node_ids(), vec!["camera", "denoise", "display"]);

    let edges = assembly.graph.edges();
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].from, "camera");
    assert_eq!(edges[0].to, "denoise");
    assert_eq!(edges[1].from, "denoise");
    assert_eq!(edges[1].to, "display");
}

/// Frames flow source to sink through an assembled pipeline, with the
/// capture sink registered as a custom output type.
#[test]
fn test_pipeline_frame_flow() {
    let registry = default_registry(doubling_runtime()).unwrap();

    let frames = vec![staircase_frame(), staircase_frame(), staircase_frame()];
    registry
        .register_input("replay", move |_graph, id, _ports| {
            Ok(Arc::new(ReplaySource::new(id, frames.clone())) as Arc<dyn InputDevice>)
        })
        .unwrap();

    let captured: Arc<Mutex<Vec<Arc<Tensor>>>> = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::clone(&captured);
    registry
        .register_output("capture_sink", move |_graph, id, _queueing| {
            Ok(Arc::new(CaptureSink::with_store(id, Arc::clone(&store))) as Arc<dyn OutputDevice>)
        })
        .unwrap();

    let spec = PipelineSpec {
        stages: vec![
            stage("camera", "replay", StageRole::Input),
            stage("denoise", "passthrough", StageRole::Process),
            stage("display", "capture_sink", StageRole::Output),
        ],
        links: vec![link("camera", "denoise"), link("denoise", "display")],
    };
    let assembly = assemble(&registry, &spec).unwrap();

    while let Some(frame) = assembly.inputs[0].produce() {
        let out = assembly.processors[0].process(frame).unwrap();
        assembly.outputs[0].consume(out).unwrap();
    }

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 3);
    for frame in captured.iter() {
        assert_frame_values(frame, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0], "passthrough flow");
    }
}

/// An inference stage configured from spec params runs its model inside
/// an assembled pipeline.
#[test]
fn test_pipeline_inference_stage_end_to_end() {
    let registry = default_registry(doubling_runtime()).unwrap();

    let frames = vec![staircase_frame(), staircase_frame()];
    registry
        .register_input("replay", move |_graph, id, _ports| {
            Ok(Arc::new(ReplaySource::new(id, frames.clone())) as Arc<dyn InputDevice>)
        })
        .unwrap();

    let captured: Arc<Mutex<Vec<Arc<Tensor>>>> = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::clone(&captured);
    registry
        .register_output("capture_sink", move |_graph, id, _queueing| {
            Ok(Arc::new(CaptureSink::with_store(id, Arc::clone(&store))) as Arc<dyn OutputDevice>)
        })
        .unwrap();

    let model_file = stub_model_file();
    let mut enhance = stage("enhance", "inference", StageRole::Process);
    enhance.params = params! {
        "model" => stub_model_path(&model_file).display().to_string(),
        "normalize" => "a + 1.0",
    };

    let spec = PipelineSpec {
        stages: vec![
            stage("camera", "replay", StageRole::Input),
            enhance,
            stage("display", "capture_sink", StageRole::Output),
        ],
        links: vec![link("camera", "enhance"), link("enhance", "display")],
    };
    let assembly = assemble(&registry, &spec).unwrap();

    while let Some(frame) = assembly.inputs[0].produce() {
        let out = assembly.processors[0].process(frame).unwrap();
        assembly.outputs[0].consume(out).unwrap();
    }

    // Normalize adds one, the stub model doubles, denormalize defaults
    // to identity: 2 * (v + 1).
    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 2);
    for frame in captured.iter() {
        let expected = f32_frame(&TEST_SHAPE, vec![2.0, 4.0, 6.0, 8.0, 10.0, 12.0]);
        assert_frames_close(frame, &expected, EXPR_EPSILON, "inference flow");
    }
}

/// An unknown stage type aborts assembly naming the stage.
#[test]
fn test_pipeline_unknown_stage_aborts() {
    let doc = r#"
        [[stages]]
        id = "mystery"
        type = "warp"
        role = "process"
    "#;
    let spec: PipelineSpec = toml::from_str(doc).unwrap();
    let registry = default_registry(doubling_runtime()).unwrap();

    match assemble(&registry, &spec) {
        Err(AssemblyError::Stage { id, source }) => {
            assert_eq!(id, "mystery");
            assert!(matches!(source, RegistryError::UnknownNodeType(name) if name == "warp"));
        }
        other => panic!("Expected stage error, got {:?}", other),
    }
}

/// A link naming a missing stage aborts assembly.
#[test]
fn test_pipeline_bad_link_aborts() {
    let registry = default_registry(doubling_runtime()).unwrap();
    let spec = PipelineSpec {
        stages: vec![stage("camera", "ramp_source", StageRole::Input)],
        links: vec![link("camera", "ghost")],
    };

    match assemble(&registry, &spec) {
        Err(AssemblyError::Link { to, source, .. }) => {
            assert_eq!(to, "ghost");
            assert!(matches!(source, GraphError::NoSuchNode(name) if name == "ghost"));
        }
        other => panic!("Expected link error, got {:?}", other),
    }
}
