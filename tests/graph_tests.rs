//! End-to-end frame graph tests against a recording backend.
//!
//! These drive the full declare, compile, execute pipeline and verify the
//! backend call stream: allocation bracketing, culling, render target
//! pooling, discard hints and failure cleanup.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use rstest::rstest;

use common::{BackendEvent, RecordingBackend};
use framegraph::{
    FrameGraph, RenderTargetDescriptor, RenderTargetInfo, TargetAttachments, TargetFlags,
    TargetHandle, TextureDescriptor, TextureFormat, TextureHandle, TextureId, TextureUsage,
};

fn color_desc() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        256,
        256,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
}

fn depth_desc() -> TextureDescriptor {
    TextureDescriptor::new_2d(
        256,
        256,
        TextureFormat::Depth32Float,
        TextureUsage::RENDER_ATTACHMENT,
    )
}

/// Linear chain: `A` writes `x`, `B` reads `x` and writes `y`, `y` is
/// presented. Both passes run in order; each texture is created and
/// destroyed exactly once.
#[test]
fn linear_chain_lifecycle() {
    let mut graph = FrameGraph::new();
    let mut backend = RecordingBackend::new();
    let order = Rc::new(RefCell::new(Vec::new()));

    let order_a = order.clone();
    let a = graph.add_pass(
        "a",
        |builder, data: &mut Option<TextureId>| {
            let x = builder.create_texture("x", color_desc());
            *data = Some(builder.write(x));
        },
        move |_, _, _| order_a.borrow_mut().push("a"),
    );
    let x = a.data().unwrap();

    let order_b = order.clone();
    let b = graph.add_pass(
        "b",
        |builder, data: &mut Option<TextureId>| {
            builder.read(x);
            let y = builder.create_texture("y", color_desc());
            *data = Some(builder.write(y));
        },
        move |_, _, _| order_b.borrow_mut().push("b"),
    );

    graph.present(b.data().unwrap());
    graph.compile();
    graph.execute(&mut backend).unwrap();

    assert_eq!(*order.borrow(), vec!["a", "b"]);
    assert_eq!(backend.texture_creations(), 2);
    assert_eq!(backend.texture_destructions(), 2);
    assert!(!backend.has_leaks());

    // `x` exists before the first pass flushes; `y` only appears for `b`.
    let first_flush = backend
        .events
        .iter()
        .position(|e| matches!(e, BackendEvent::Flush))
        .unwrap();
    let x_created = backend
        .events
        .iter()
        .position(|e| matches!(e, BackendEvent::CreateTexture(n, _) if n == "x"))
        .unwrap();
    let y_created = backend
        .events
        .iter()
        .position(|e| matches!(e, BackendEvent::CreateTexture(n, _) if n == "y"))
        .unwrap();
    assert!(x_created < first_flush);
    assert!(y_created > first_flush);

    // Execute resets the graph for the next frame.
    assert_eq!(graph.pass_count(), 0);
}

/// A branch nobody consumes is culled: its callback never runs and its
/// resources are never allocated.
#[test]
fn dead_branch_not_allocated() {
    let mut graph = FrameGraph::new();
    let mut backend = RecordingBackend::new();
    let ran = Rc::new(RefCell::new(Vec::new()));

    let a = graph.add_pass(
        "a",
        |builder, data: &mut Option<TextureId>| {
            let x = builder.create_texture("x", color_desc());
            *data = Some(builder.write(x));
        },
        |_, _, _| {},
    );
    let x = a.data().unwrap();

    let b = graph.add_pass(
        "b",
        |builder, data: &mut Option<TextureId>| {
            builder.read(x);
            let y = builder.create_texture("y", color_desc());
            *data = Some(builder.write(y));
        },
        |_, _, _| {},
    );

    let ran_c = ran.clone();
    let c = graph.add_pass(
        "c",
        |builder, data: &mut Option<TextureId>| {
            let z = builder.create_texture("z", color_desc());
            *data = Some(builder.write(z));
        },
        move |_, _, _| ran_c.borrow_mut().push("c"),
    );

    graph.present(b.data().unwrap());
    graph.compile();

    assert!(graph.is_culled(c.handle()));
    graph.execute(&mut backend).unwrap();

    assert!(ran.borrow().is_empty());
    assert!(backend.created_texture("z").is_none());
    assert!(!backend.has_leaks());
}

/// The execute-phase view resolves a declared handle to the concrete
/// texture the backend created for it.
#[test]
fn resources_resolve_to_concrete_textures() {
    let mut graph = FrameGraph::new();
    let mut backend = RecordingBackend::new();
    let seen = Rc::new(RefCell::new(Vec::new()));

    let a = graph.add_pass(
        "produce",
        |builder, data: &mut Option<TextureId>| {
            let x = builder.create_texture("x", color_desc());
            *data = Some(builder.write(x));
        },
        |_, _, _| {},
    );
    let x = a.data().unwrap();

    let seen_b = seen.clone();
    graph.add_pass(
        "consume",
        |builder, data: &mut Option<TextureId>| {
            *data = Some(builder.read(x));
            builder.side_effect();
        },
        move |resources, data: &Option<TextureId>, _| {
            seen_b.borrow_mut().push(resources.texture(data.unwrap()));
        },
    );

    graph.compile();
    graph.execute(&mut backend).unwrap();

    let created = backend.created_texture("x").unwrap();
    assert_eq!(*seen.borrow(), vec![created]);
}

/// Two render targets with the same shape and disjoint lifetimes share one
/// concrete backend target; the pooled attachment texture is reused too.
#[test]
fn render_target_pooling_across_disjoint_lifetimes() {
    let mut graph = FrameGraph::new();
    let mut backend = RecordingBackend::new();

    let out_desc = TextureDescriptor::new_2d(
        256,
        256,
        TextureFormat::Rgba16Float,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    );

    let p1 = graph.add_pass(
        "draw_first",
        |builder, data: &mut Option<TextureId>| {
            let t1 = builder.create_texture("t1", color_desc());
            *data = Some(builder.create_color_target("first_rt", t1, TargetFlags::COLOR0));
        },
        |_, _, _| {},
    );
    let t1 = p1.data().unwrap();

    let out_desc_1 = out_desc.clone();
    let p2 = graph.add_pass(
        "resolve_first",
        move |builder, data: &mut Option<TextureId>| {
            builder.read(t1);
            let out = builder.create_texture("out1", out_desc_1);
            *data = Some(builder.write(out));
        },
        |_, _, _| {},
    );

    let p3 = graph.add_pass(
        "draw_second",
        |builder, data: &mut Option<TextureId>| {
            let t2 = builder.create_texture("t2", color_desc());
            *data = Some(builder.create_color_target("second_rt", t2, TargetFlags::COLOR0));
        },
        |_, _, _| {},
    );
    let t2 = p3.data().unwrap();

    let out_desc_2 = out_desc.clone();
    let p4 = graph.add_pass(
        "resolve_second",
        move |builder, data: &mut Option<TextureId>| {
            builder.read(t2);
            let out = builder.create_texture("out2", out_desc_2);
            *data = Some(builder.write(out));
        },
        |_, _, _| {},
    );

    graph.present(p2.data().unwrap());
    graph.present(p4.data().unwrap());
    graph.compile();

    // t1 lives over [0, 1], t2 over [2, 3]: disjoint.
    assert_eq!(graph.resource_lifetime(t1), Some((0, 1)));
    assert_eq!(graph.resource_lifetime(t2), Some((2, 3)));

    graph.execute(&mut backend).unwrap();

    // One concrete target serves both virtual targets, and t2 reuses t1's
    // pooled texture: only t1, out1 and out2 hit the backend.
    assert_eq!(backend.target_creations(), 1);
    assert_eq!(backend.texture_creations(), 3);
    assert!(!backend.has_leaks());
}

/// A cleared color attachment is discarded at the start of its pass; a
/// depth attachment nobody reads afterwards is discarded at the end.
#[test]
fn discard_hints_at_target_boundaries() {
    let mut graph = FrameGraph::new();
    let mut backend = RecordingBackend::new();

    #[derive(Default, Clone)]
    struct GeometryData {
        color: Option<TextureId>,
    }

    let geometry = graph.add_pass(
        "geometry",
        |builder, data: &mut GeometryData| {
            let color = builder.create_texture("color", color_desc());
            let depth = builder.create_texture("depth", depth_desc());
            let color = builder.write(color);
            let depth = builder.write(depth);
            builder.create_render_target(
                "geometry_rt",
                RenderTargetDescriptor::new(
                    TargetAttachments::new()
                        .with_color(0, color)
                        .with_depth(depth),
                ),
                TargetFlags::COLOR0 | TargetFlags::DEPTH,
            );
            data.color = Some(color);
        },
        |_, _, _| {},
    );
    let color = geometry.data().color.unwrap();

    let shading = graph.add_pass(
        "shading",
        |builder, data: &mut Option<TextureId>| {
            builder.read(color);
            let out = builder.create_texture("out", color_desc());
            *data = Some(builder.write(out));
        },
        |_, _, _| {},
    );

    graph.present(shading.data().unwrap());
    graph.compile();
    graph.execute(&mut backend).unwrap();

    let begin = backend
        .events
        .iter()
        .find_map(|e| match e {
            BackendEvent::BeginPass(_, clear, discard_start) => Some((*clear, *discard_start)),
            _ => None,
        })
        .unwrap();
    assert_eq!(begin.0, TargetFlags::COLOR0 | TargetFlags::DEPTH);
    assert!(begin.1.contains(TargetFlags::COLOR0));
    assert!(begin.1.contains(TargetFlags::DEPTH));

    let end = backend
        .events
        .iter()
        .find_map(|e| match e {
            BackendEvent::EndPass(discard_end) => Some(*discard_end),
            _ => None,
        })
        .unwrap();
    // Color is read by the shading pass; only depth is discardable.
    assert_eq!(end, TargetFlags::DEPTH);
}

/// An imported render target is bound directly with its caller-supplied
/// discard flags, and is never created or destroyed by the graph.
#[test]
fn imported_target_bound_directly() {
    let mut graph = FrameGraph::new();
    let mut backend = RecordingBackend::new();
    let external = TargetHandle::from_raw(99);

    let backbuffer = graph.import_render_target(
        "backbuffer",
        RenderTargetInfo::new(1920, 1080),
        external,
        TargetFlags::COLOR0,
        TargetFlags::empty(),
    );

    graph.add_pass(
        "blit",
        |builder, _: &mut ()| {
            let attachment = builder.write(backbuffer);
            builder.create_render_target(
                "present_rt",
                RenderTargetDescriptor::new(TargetAttachments::new().with_color(0, attachment)),
                TargetFlags::empty(),
            );
        },
        |_, _, _| {},
    );

    // Writing an imported resource pins the pass; no present() needed.
    graph.compile();
    graph.execute(&mut backend).unwrap();

    assert_eq!(backend.target_creations(), 0);
    assert_eq!(
        backend.events.first(),
        Some(&BackendEvent::BeginPass(
            external,
            TargetFlags::empty(),
            TargetFlags::COLOR0,
        ))
    );
    assert!(!backend.has_leaks());
}

/// A backend failure mid-frame surfaces the error after every
/// already-instantiated resource has been destroyed.
#[test]
fn backend_failure_destroys_instantiated_resources() {
    let mut graph = FrameGraph::new();
    let mut backend = RecordingBackend::new();
    backend.fail_texture = Some("y".to_string());

    let a = graph.add_pass(
        "a",
        |builder, data: &mut Option<TextureId>| {
            let x = builder.create_texture("x", color_desc());
            *data = Some(builder.write(x));
        },
        |_, _, _| {},
    );
    let x = a.data().unwrap();

    let b = graph.add_pass(
        "b",
        |builder, data: &mut Option<TextureId>| {
            builder.read(x);
            let y = builder.create_texture("y", color_desc());
            *data = Some(builder.write(y));
        },
        |_, _, _| {},
    );

    graph.present(b.data().unwrap());
    graph.compile();

    let result = graph.execute(&mut backend);
    assert!(result.is_err());
    // `x` was created before the failure and must have been destroyed.
    assert_eq!(backend.texture_creations(), 1);
    assert_eq!(backend.texture_destructions(), 1);
    assert!(!backend.has_leaks());
}

/// Every way of pinning a sink keeps the producing chain alive.
#[rstest]
#[case::present("present")]
#[case::side_effect("side_effect")]
#[case::write_imported("write_imported")]
fn pinned_sinks_survive(#[case] pinning: &str) {
    let mut graph = FrameGraph::new();
    let mut backend = RecordingBackend::new();

    let a = graph.add_pass(
        "produce",
        |builder, data: &mut Option<TextureId>| {
            let x = builder.create_texture("x", color_desc());
            *data = Some(builder.write(x));
        },
        |_, _, _| {},
    );
    let x = a.data().unwrap();

    let imported = graph.import_texture(
        "external",
        color_desc(),
        TextureHandle::from_raw(1000),
    );

    let pinning = pinning.to_string();
    let sink = graph.add_pass(
        "sink",
        |builder, data: &mut Option<TextureId>| {
            builder.read(x);
            match pinning.as_str() {
                "present" => {
                    let out = builder.create_texture("out", color_desc());
                    *data = Some(builder.write(out));
                }
                "side_effect" => {
                    builder.side_effect();
                }
                "write_imported" => {
                    builder.write(imported);
                }
                other => panic!("unknown pinning mode {other}"),
            }
        },
        |_, _, _| {},
    );

    if let Some(out) = sink.data() {
        graph.present(*out);
    }
    graph.compile();

    assert!(!graph.is_culled(a.handle()));
    assert!(!graph.is_culled(sink.handle()));

    graph.execute(&mut backend).unwrap();
    assert!(!backend.has_leaks());
}

/// An empty graph compiles and executes without touching the backend.
#[test]
fn empty_graph_is_a_noop() {
    let mut graph = FrameGraph::new();
    let mut backend = RecordingBackend::new();

    graph.compile();
    graph.execute(&mut backend).unwrap();

    assert!(backend.events.is_empty());
}
