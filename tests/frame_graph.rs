//! End-to-end frame construction tests against the instrumented backend.

use std::sync::Arc;

use vermilion_graphics::{
    BufferDescriptor, BufferUsage, ClearValue, DummyBackend, GpuContext, GpuContextDesc, Handle,
    ImageGraphContext, PingPong, RenderGraph, RenderPass, TargetSetDescriptor, TextureFormat,
};

fn init() -> (Arc<DummyBackend>, Arc<GpuContext>) {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend = Arc::new(DummyBackend::new());
    let context = GpuContext::new(GpuContextDesc::default(), backend.clone()).unwrap();
    (backend, context)
}

fn gbuffer_desc() -> TargetSetDescriptor {
    TargetSetDescriptor::new(1280, 720)
        .with_color(TextureFormat::Rgba16Float)
        .with_color(TextureFormat::Rgb10a2Unorm)
        .with_depth(TextureFormat::Depth32Float)
}

/// A deferred-shading frame declared out of order still schedules
/// producer-first and survives submission.
#[test]
fn deferred_frame_schedules_and_submits() {
    let (backend, context) = init();
    let mut graph = RenderGraph::new();

    let gbuffer = graph.declare_target_set(gbuffer_desc());
    let lit = graph.declare_target_set(
        TargetSetDescriptor::new(1280, 720).with_color(TextureFormat::Rgba16Float),
    );

    // Declared back to front on purpose.
    graph.add_pass(
        RenderPass::new("post_process")
            .with_input(lit)
            .with_output(Handle::OUTPUT)
            .with_build(|record| {
                record.set_viewport(record.width(), record.height());
                record.draw(3, 1);
                Ok(())
            }),
    );
    graph.add_pass(
        RenderPass::new("lighting")
            .with_input(gbuffer)
            .with_output(lit)
            .with_build(|record| {
                record.draw(3, 1);
                Ok(())
            }),
    );
    graph.add_pass(
        RenderPass::new("gbuffer")
            .with_output(gbuffer)
            .with_clear(ClearValue::color(0.0, 0.0, 0.0, 1.0))
            .with_build(|record| {
                record.draw_indexed(36, 128);
                Ok(())
            }),
    );

    let view = context.begin_render_view();
    let commands = graph.build(&context, 1280, 720).unwrap();
    assert_eq!(
        commands.pass_names(),
        ["gbuffer", "lighting", "post_process"]
    );
    context.submit(&commands).unwrap();
    drop(view);

    let submissions = backend.submitted_pass_names();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0], ["gbuffer", "lighting", "post_process"]);
    // The view is gone, so every transient has been destroyed again.
    assert_eq!(backend.alive_target_sets(), 0);
}

/// History reprojection: the previous frame's target set is readable while
/// the current one is written, and roles swap every frame with no copies.
#[test]
fn history_double_buffering_swaps_roles() {
    let (backend, context) = init();
    let mut graph = RenderGraph::new();
    let desc = TargetSetDescriptor::new(640, 360).with_color(TextureFormat::Rgba16Float);

    let mut seen_current = Vec::new();
    for _frame in 0..4 {
        let current = graph.persistent_target_set("taa_history", desc.clone(), PingPong::Current);
        let previous =
            graph.persistent_target_set("taa_history", desc.clone(), PingPong::Previous);
        assert_ne!(current, previous);
        seen_current.push(current);

        graph.add_pass(
            RenderPass::new("taa_resolve")
                .with_input(previous)
                .with_output(current)
                .with_build(move |record| {
                    // Both slots must resolve to live, distinct target sets.
                    let current_set = record.target_set(current)?;
                    let previous_set = record.target_set(previous)?;
                    assert_ne!(current_set.id(), previous_set.id());
                    record.draw(3, 1);
                    Ok(())
                }),
        );
        let commands = graph.build(&context, 640, 360).unwrap();
        context.submit(&commands).unwrap();
    }

    // Exactly two physical target sets, alternating with period two.
    assert_eq!(backend.alive_target_sets(), 2);
    assert_eq!(seen_current[0], seen_current[2]);
    assert_eq!(seen_current[1], seen_current[3]);
    assert_ne!(seen_current[0], seen_current[1]);
}

/// Bloom-style chains reuse transient allocations whose live ranges do not
/// overlap, without changing the recorded pass order.
#[test]
fn transient_aliasing_reuses_allocations() {
    let (_backend, context) = init();
    let mut graph = RenderGraph::new();

    let desc = TargetSetDescriptor::new(320, 180).with_color(TextureFormat::Rgba16Float);
    let ping = graph.declare_target_set(desc.clone());
    let pong = graph.declare_target_set(desc.clone());
    let final_blur = graph.declare_target_set(desc);

    graph.add_pass(RenderPass::new("downsample").with_output(ping));
    graph.add_pass(
        RenderPass::new("blur_h")
            .with_input(ping)
            .with_output(pong),
    );
    // ping is dead after blur_h, so blur_v's output can reuse it.
    graph.add_pass(
        RenderPass::new("blur_v")
            .with_input(pong)
            .with_output(final_blur),
    );
    graph.add_pass(
        RenderPass::new("composite")
            .with_input(final_blur)
            .with_output(Handle::OUTPUT),
    );

    let commands = graph.build(&context, 320, 180).unwrap();
    assert_eq!(
        commands.pass_names(),
        ["downsample", "blur_h", "blur_v", "composite"]
    );
    assert_eq!(graph.stats().reused_allocations, 1);
    assert_eq!(graph.stats().transient_target_sets, 3);
}

/// Destruction requested while a frame is in flight waits for the view to
/// end and for the device to go idle before touching the backend.
#[test]
fn cleanup_defers_until_frame_completes() {
    let (backend, context) = init();

    let buffer = context
        .create_buffer(BufferDescriptor::new(
            1024,
            BufferUsage::STORAGE | BufferUsage::COPY_DST,
        ))
        .unwrap();
    let pool_buffers = backend.alive_buffers() - 1;

    let view = context.begin_render_view();
    let idle_before = backend.wait_idle_calls();
    context.destroy_buffer(buffer);
    assert_eq!(backend.alive_buffers(), pool_buffers + 1);

    drop(view);
    assert_eq!(backend.alive_buffers(), pool_buffers);
    assert!(backend.wait_idle_calls() > idle_before);
}

/// Image bindings resolve by name inside a pass closure, explicit bindings
/// winning over graph ones.
#[test]
fn image_context_resolves_named_bindings() {
    let (_backend, context) = init();
    let mut graph = RenderGraph::new();
    let mut images = ImageGraphContext::new();

    let gbuffer = graph.declare_target_set(gbuffer_desc());
    images.associate_texture_target_set("scene_albedo", gbuffer, 0);
    images.associate_texture_target_set_depth("scene_depth", gbuffer);
    images.set_technique_flag("use_ssao", true);

    let explicit = context
        .create_texture(vermilion_graphics::TextureDescriptor::new_2d(
            4,
            4,
            TextureFormat::Rgba8Unorm,
            vermilion_graphics::TextureUsage::TEXTURE_BINDING,
        ))
        .unwrap();
    images.associate_explicit_texture("blue_noise", explicit.clone());
    let explicit_id = explicit.id();

    let images_for_pass = images.clone();
    graph.add_pass(RenderPass::new("write_gbuffer").with_output(gbuffer));
    graph.add_pass(
        RenderPass::new("ssao")
            .with_input(gbuffer)
            .with_output(Handle::OUTPUT)
            .with_build(move |record| {
                assert!(images_for_pass.technique_flag("use_ssao"));
                let albedo = images_for_pass.find_texture("scene_albedo", record);
                let depth = images_for_pass.find_texture("scene_depth", record);
                let noise = images_for_pass.find_texture("blue_noise", record);
                assert!(albedo.is_some());
                assert!(depth.is_some());
                assert_eq!(noise.unwrap().id(), explicit_id);
                assert!(images_for_pass.find_texture("missing", record).is_none());
                Ok(())
            }),
    );

    graph.build(&context, 1280, 720).unwrap();
    context.destroy_texture(explicit);
}

/// Uniform uploads come out of the per-frame pool, aligned and disjoint,
/// and the pool resets when the next frame begins.
#[test]
fn uniform_allocations_rotate_with_frames() {
    let (_backend, context) = init();

    let view = context.begin_render_view();
    let a = context.allocate_uniforms(&[0u8; 64]).unwrap();
    let b = context.allocate_uniforms(&[0u8; 64]).unwrap();
    assert_ne!(a.offset, b.offset);
    assert_eq!(a.buffer.id(), b.buffer.id());
    drop(view);

    // Two frames in flight by default, so the pool from two frames ago is
    // reused from offset zero.
    let view = context.begin_render_view();
    drop(view);
    let view = context.begin_render_view();
    let c = context.allocate_uniforms(&[0u8; 64]).unwrap();
    assert_eq!(c.buffer.id(), a.buffer.id());
    assert_eq!(c.offset, a.offset);
    drop(view);
}

/// A graph with a dependency cycle fails to build and leaves the backend
/// untouched.
#[test]
fn cyclic_graph_fails_cleanly() {
    let (backend, context) = init();
    let mut graph = RenderGraph::new();

    let a = graph.declare_target_set(gbuffer_desc());
    let b = graph.declare_target_set(gbuffer_desc());
    graph.add_pass(RenderPass::new("x").with_input(b).with_output(a));
    graph.add_pass(RenderPass::new("y").with_input(a).with_output(b));

    assert!(!graph.validate());
    let before = backend.alive_target_sets();
    assert!(graph.build(&context, 64, 64).is_err());
    assert_eq!(backend.alive_target_sets(), before);

    // The failed frame was consumed; the next frame starts clean.
    graph.add_pass(RenderPass::new("present").with_output(Handle::OUTPUT));
    let commands = graph.build(&context, 64, 64).unwrap();
    assert_eq!(commands.pass_names(), ["present"]);
}
