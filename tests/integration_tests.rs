//! Integration tests for dagpipe

use dagpipe::{DotOptions, ErrorCode, Inputs, NodeSpec, Phase, Pipeline, PipelineError};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn as_i64(value: &dagpipe::Value) -> i64 {
    value.as_i64().unwrap_or(0)
}

fn as_f64(value: &dagpipe::Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

fn inputs(entries: &[(&str, dagpipe::Value)]) -> Inputs {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), value.clone()))
        .collect()
}

/// a = 1, b = a + 1, c = b * 2
fn chain_abc() -> Pipeline {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("a", |_| Ok(json!(1))))
        .unwrap()
        .add_node(NodeSpec::new("b", |i| Ok(json!(as_i64(&i["a"]) + 1))).dependencies(["a"]))
        .unwrap()
        .add_node(NodeSpec::new("c", |i| Ok(json!(as_i64(&i["b"]) * 2))).dependencies(["b"]))
        .unwrap();
    pipeline
}

#[test]
fn test_linear_chain() {
    let pipeline = chain_abc();

    let results = pipeline.execute(&["c"], Inputs::default()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results["c"], json!(4));

    // No outputs requested: all leaves, and c is the sole leaf.
    let results = pipeline.execute(&[], Inputs::default()).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results["c"], json!(4));
}

#[test]
fn test_virtual_input() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("b", |i| Ok(json!(as_i64(&i["a"]) + 1))).dependencies(["a"]))
        .unwrap();

    assert_eq!(pipeline.get_virtual_inputs(), ["a"]);
    assert!(pipeline.is_virtual_input("a"));

    let results = pipeline
        .execute(&["b"], inputs(&[("a", json!(10))]))
        .unwrap();
    assert_eq!(results["b"], json!(11));

    let err = pipeline.execute(&["b"], Inputs::default()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MissingInput);
    match err {
        PipelineError::MissingInputs { missing } => assert_eq!(missing, ["a"]),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_bypass_skips_computation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("a", move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(json!(1))
        }))
        .unwrap()
        .add_node(NodeSpec::new("b", |i| Ok(json!(as_i64(&i["a"]) + 1))).dependencies(["a"]))
        .unwrap()
        .add_node(NodeSpec::new("c", |i| Ok(json!(as_i64(&i["b"]) * 2))).dependencies(["b"]))
        .unwrap();

    let results = pipeline
        .execute(&["c"], inputs(&[("b", json!(100))]))
        .unwrap();
    assert_eq!(results["c"], json!(200));
    assert_eq!(calls.load(Ordering::SeqCst), 0, "bypassed ancestor ran");
}

#[test]
fn test_cycle_detection_leaves_state_untouched() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("a", |i| Ok(i["b"].clone())).dependencies(["b"]))
        .unwrap();

    let err = pipeline
        .add_node(NodeSpec::new("b", |i| Ok(i["a"].clone())).dependencies(["a"]))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::Cycle);

    // Only node a survives, with b still a virtual input.
    assert_eq!(pipeline.list_nodes(), ["a"]);
    assert!(!pipeline.has_node("b"));
    assert_eq!(pipeline.get_virtual_inputs(), ["b"]);
}

#[test]
fn test_multi_output_expansion() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(
            NodeSpec::new("_stats", |_| Ok(json!({"mean": 2.0, "std": 0.5})))
                .outputs(["mean", "std"]),
        )
        .unwrap()
        .add_node(
            NodeSpec::new("cv", |i| Ok(json!(as_f64(&i["std"]) / as_f64(&i["mean"]))))
                .dependencies(["mean", "std"]),
        )
        .unwrap();

    let results = pipeline.execute(&["cv"], Inputs::default()).unwrap();
    assert_eq!(results["cv"], json!(0.25));
}

#[test]
fn test_multi_output_source_called_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(
            NodeSpec::new("_raw", move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"x": 1, "y": 2}))
            })
            .outputs(["x", "y"]),
        )
        .unwrap();

    let results = pipeline.execute(&["x", "y"], Inputs::default()).unwrap();
    assert_eq!(results["x"], json!(1));
    assert_eq!(results["y"], json!(2));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_multi_output_rename_and_extractor_forms() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(
            NodeSpec::new("_raw", |_| Ok(json!({"x_internal": 1, "y": 2})))
                .output_key("x", "x_internal")
                .output_with("sum", |d| {
                    Ok(json!(as_i64(&d["x_internal"]) + as_i64(&d["y"])))
                }),
        )
        .unwrap();

    let results = pipeline.execute(&["x", "sum"], Inputs::default()).unwrap();
    assert_eq!(results["x"], json!(1));
    assert_eq!(results["sum"], json!(3));
}

#[test]
fn test_multi_output_children_follow_source_in_listing() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("seed", |_| Ok(json!(0))))
        .unwrap()
        .add_node(
            NodeSpec::new("_stats", |_| Ok(json!({"mean": 2.0, "std": 0.5})))
                .outputs(["mean", "std"]),
        )
        .unwrap();

    assert_eq!(pipeline.list_nodes(), ["seed", "_stats", "mean", "std"]);
}

#[test]
fn test_multi_output_missing_key_is_user_raised() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("_raw", |_| Ok(json!({"x": 1}))).outputs(["x", "missing"]))
        .unwrap();

    let err = pipeline.execute(&["missing"], Inputs::default()).unwrap_err();
    match err {
        PipelineError::NodeFailed { node, phase, .. } => {
            assert_eq!(node, "missing");
            assert_eq!(phase, Phase::Func);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_multi_output_non_object_is_user_raised() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("_raw", |_| Ok(json!(42))).outputs(["x"]))
        .unwrap();

    let err = pipeline.execute(&["x"], Inputs::default()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UserRaised);
    assert!(err.to_string().contains("did not return a JSON object"));
}

#[test]
fn test_subgraph_equivalence() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("root", |_| Ok(json!(3))))
        .unwrap()
        .add_node(
            NodeSpec::new("b1", |i| Ok(json!(as_i64(&i["root"]) * 2))).dependencies(["root"]),
        )
        .unwrap()
        .add_node(
            NodeSpec::new("b2", |i| Ok(json!(as_i64(&i["root"]) * 3))).dependencies(["root"]),
        )
        .unwrap();

    let subgraph = pipeline.extract_subgraph(&["b1"]).unwrap();
    assert_eq!(subgraph.list_nodes(), ["root", "b1"]);
    assert!(!subgraph.has_node("b2"));

    let full = pipeline.execute(&["b1"], Inputs::default()).unwrap();
    let sub = subgraph.execute(&["b1"], Inputs::default()).unwrap();
    assert_eq!(full["b1"], sub["b1"]);
}

#[test]
fn test_post_hook_failure_identifies_node_and_phase() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(
            NodeSpec::new("delta", |_| Ok(json!(-4))).post_hook(|value| {
                if value.as_i64().is_some_and(|v| v < 0) {
                    return Err("negative value".into());
                }
                Ok(())
            }),
        )
        .unwrap();

    let err = pipeline.execute(&["delta"], Inputs::default()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UserRaised);
    match err {
        PipelineError::NodeFailed { node, phase, source } => {
            assert_eq!(node, "delta");
            assert_eq!(phase, Phase::Post);
            assert!(source.to_string().contains("negative value"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_pre_hook_failure_aborts_before_func() {
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);

    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(
            NodeSpec::new("n", move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(json!(1))
            })
            .pre_hook(|_| Err("rejected".into())),
        )
        .unwrap();

    let err = pipeline.execute(&["n"], Inputs::default()).unwrap_err();
    match err {
        PipelineError::NodeFailed { phase, .. } => assert_eq!(phase, Phase::Pre),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_hooks_run_in_declaration_order() {
    let trace = Arc::new(std::sync::Mutex::new(Vec::new()));

    let t1 = Arc::clone(&trace);
    let t2 = Arc::clone(&trace);
    let t3 = Arc::clone(&trace);

    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(
            NodeSpec::new("n", |_| Ok(json!(1)))
                .pre_hook(move |_| {
                    t1.lock().unwrap().push("pre1");
                    Ok(())
                })
                .pre_hook(move |_| {
                    t2.lock().unwrap().push("pre2");
                    Ok(())
                })
                .post_hook(move |_| {
                    t3.lock().unwrap().push("post1");
                    Ok(())
                }),
        )
        .unwrap();

    pipeline.execute(&["n"], Inputs::default()).unwrap();
    assert_eq!(*trace.lock().unwrap(), ["pre1", "pre2", "post1"]);
}

#[test]
fn test_promotion() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("b", |i| Ok(json!(as_i64(&i["a"]) + 1))).dependencies(["a"]))
        .unwrap();
    assert_eq!(pipeline.get_virtual_inputs(), ["a"]);

    pipeline.add_node(NodeSpec::new("a", |_| Ok(json!(7)))).unwrap();
    assert!(pipeline.get_virtual_inputs().is_empty());
    assert!(!pipeline.is_virtual_input("a"));

    let results = pipeline.execute(&["b"], Inputs::default()).unwrap();
    assert_eq!(results["b"], json!(8));
}

#[test]
fn test_bypass_equals_redefinition() {
    // Bypassing b with 100 must match a pipeline where b is a constant.
    let bypassed = {
        let pipeline = chain_abc();
        pipeline
            .execute(&["c"], inputs(&[("b", json!(100))]))
            .unwrap()
    };

    let redefined = {
        let mut pipeline = Pipeline::new();
        pipeline
            .add_node(NodeSpec::new("a", |_| Ok(json!(1))))
            .unwrap()
            .add_node(NodeSpec::new("b", |_| Ok(json!(100))))
            .unwrap()
            .add_node(NodeSpec::new("c", |i| Ok(json!(as_i64(&i["b"]) * 2))).dependencies(["b"]))
            .unwrap();
        pipeline.execute(&["c"], Inputs::default()).unwrap()
    };

    assert_eq!(bypassed["c"], redefined["c"]);
}

#[test]
fn test_execute_is_deterministic() {
    let pipeline = chain_abc();
    let first = pipeline.execute(&["b", "c"], Inputs::default()).unwrap();
    let second = pipeline.execute(&["b", "c"], Inputs::default()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_list_nodes_is_topological_with_insertion_ties() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("root", |_| Ok(json!(0))))
        .unwrap()
        .add_node(NodeSpec::new("left", |i| Ok(i["root"].clone())).dependencies(["root"]))
        .unwrap()
        .add_node(NodeSpec::new("right", |i| Ok(i["root"].clone())).dependencies(["root"]))
        .unwrap()
        .add_node(
            NodeSpec::new("join", |i| {
                Ok(json!(as_i64(&i["left"]) + as_i64(&i["right"])))
            })
            .dependencies(["left", "right"]),
        )
        .unwrap();

    assert_eq!(pipeline.list_nodes(), ["root", "left", "right", "join"]);
}

#[test]
fn test_execute_default_outputs_multiple_leaves() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("root", |_| Ok(json!(1))))
        .unwrap()
        .add_node(
            NodeSpec::new("b1", |i| Ok(json!(as_i64(&i["root"]) + 1))).dependencies(["root"]),
        )
        .unwrap()
        .add_node(
            NodeSpec::new("b2", |i| Ok(json!(as_i64(&i["root"]) + 2))).dependencies(["root"]),
        )
        .unwrap();

    let results = pipeline.execute(&[], Inputs::default()).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results["b1"], json!(2));
    assert_eq!(results["b2"], json!(3));
}

#[test]
fn test_mixed_bypass_and_virtual_value() {
    // v → b → c; both a bypass for b and a value for v supplied.
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("b", |i| Ok(json!(as_i64(&i["v"]) + 1))).dependencies(["v"]))
        .unwrap()
        .add_node(NodeSpec::new("c", |i| Ok(json!(as_i64(&i["b"]) * 2))).dependencies(["b"]))
        .unwrap();

    let results = pipeline
        .execute(&["c"], inputs(&[("b", json!(5)), ("v", json!(10))]))
        .unwrap();
    assert_eq!(results["c"], json!(10));
}

#[test]
fn test_required_inputs_reflect_bypasses() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("b", |i| Ok(i["v"].clone())).dependencies(["v"]))
        .unwrap()
        .add_node(NodeSpec::new("c", |i| Ok(i["b"].clone())).dependencies(["b"]))
        .unwrap();

    assert_eq!(pipeline.get_required_inputs(&["c"], &[]).unwrap(), ["v"]);
    assert!(pipeline
        .get_required_inputs(&["c"], &["b"])
        .unwrap()
        .is_empty());
}

#[test]
fn test_chained_construction_style() {
    // Fluent construction of a small post-processing graph end to end.
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(
            NodeSpec::new("radiance", |i| Ok(i["raw"].clone()))
                .dependencies(["raw"])
                .description("Extract radiance from raw sensor data")
                .metadata("kind", "data"),
        )
        .unwrap()
        .add_node(
            NodeSpec::new("brf", |i| Ok(json!(as_f64(&i["radiance"]) / 3.0)))
                .dependencies(["radiance"])
                .metadata("kind", "data")
                .metadata("final", true),
        )
        .unwrap();

    let results = pipeline
        .execute(&["brf"], inputs(&[("raw", json!(6.0))]))
        .unwrap();
    assert_eq!(results["brf"], json!(2.0));

    let mut query = dagpipe::Metadata::new();
    query.insert("final".into(), json!(true));
    assert_eq!(pipeline.get_nodes_by_metadata(&query), ["brf"]);
}

#[test]
fn test_dot_export_stable_vocabulary() {
    let mut pipeline = Pipeline::new();
    pipeline
        .add_node(NodeSpec::new("b", |i| Ok(i["a"].clone())).dependencies(["a"]))
        .unwrap();

    let dot = pipeline.to_dot(&DotOptions::new().highlight(["b"]).legend(true));
    assert!(dot.contains("fillcolor=gold"));
    assert!(dot.contains("fillcolor=lightcoral"));
    assert!(dot.contains("shape=ellipse"));
    assert!(dot.contains("cluster_legend"));
    assert!(dot.contains("\"a\" -> \"b\";"));
}

#[test]
fn test_summary_lists_execution_order() {
    let pipeline = chain_abc();
    let summary = pipeline.summary();
    let a_pos = summary.find("1. a").unwrap();
    let b_pos = summary.find("2. b").unwrap();
    let c_pos = summary.find("3. c").unwrap();
    assert!(a_pos < b_pos && b_pos < c_pos);
}

#[test]
fn test_concurrent_read_only_executions() {
    let pipeline = Arc::new(chain_abc());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let shared = Arc::clone(&pipeline);
            std::thread::spawn(move || shared.execute(&["c"], Inputs::default()).unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap()["c"], json!(4));
    }
}
