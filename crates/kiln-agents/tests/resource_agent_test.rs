// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use image::{ImageFormat, Rgba, RgbaImage};
use kiln_agents::{ResetPhase, ResourceAgent, ResourceEvent, WorkerMode};
use kiln_core::asset::{
    DecodeError, DecodedResource, DecodedSound, LoadError, LoadState, Resource, ResourceKind,
};
use kiln_core::renderer::{BufferTarget, GpuContext};
use kiln_core::LoaderConfig;
use kiln_infra::{HeadlessConfig, HeadlessDevice};
use kiln_lanes::decode_lane::{DecoderLane, LaneError};
use kiln_lanes::{
    write_archive, ArchiveSource, DecoderRegistry, FinalizeLane, GpuUploadLane, LayeredSource,
    MemorySource,
};
use std::cell::{Cell, RefCell};
use std::io::Cursor;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([10, 200, 30, 255]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, ImageFormat::Png).unwrap();
    bytes.into_inner()
}

struct Harness {
    device: HeadlessDevice,
    ctx: GpuContext,
    source: Arc<MemorySource>,
    agent: ResourceAgent,
    /// Buffers held by the fallback objects.
    baseline_buffers: usize,
}

fn harness_with(config: LoaderConfig, registry: DecoderRegistry, mode: WorkerMode) -> Harness {
    init_logging();
    let device = HeadlessDevice::new(HeadlessConfig::default());
    let ctx = GpuContext::new(Arc::new(device.clone()));
    let source = Arc::new(MemorySource::new());
    source.insert("a.png", png(4, 2));
    source.insert("b.png", png(1, 1));
    source.insert("table.bin", vec![1, 2, 3, 4, 5, 6, 7, 8]);

    let agent = ResourceAgent::with_lanes(
        &ctx,
        config,
        source.clone(),
        registry,
        GpuUploadLane,
        mode,
    )
    .unwrap();
    let baseline_buffers = device.buffer_count();
    Harness {
        device,
        ctx,
        source,
        agent,
        baseline_buffers,
    }
}

fn harness() -> Harness {
    harness_with(
        LoaderConfig::default(),
        DecoderRegistry::with_defaults(),
        WorkerMode::Inline,
    )
}

#[test]
fn double_acquire_shares_one_handle_and_decodes_once() {
    let mut h = harness();
    let a = h.agent.acquire("a.png");
    let b = h.agent.acquire("a.png");
    assert!(a.ptr_eq(&b));
    assert_eq!(a.refcount(), 2);
    assert_eq!(h.agent.len(), 1);

    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.decoded, 1);
    assert_eq!(h.agent.worker_stats().executed, 1);
}

#[test]
fn texture_becomes_usable_once_its_fence_signals() {
    let mut h = harness();
    let pointer = h.agent.acquire("a.png");
    assert_eq!(pointer.state(), LoadState::Loading);
    assert_eq!(pointer.kind(), ResourceKind::Texture);

    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.finalized, 1);
    assert_eq!(report.uploads_in_flight, 1);

    // The GPU has not executed the upload: keep serving the fallback.
    for _ in 0..5 {
        h.agent.update(&mut h.ctx).unwrap();
        assert_eq!(pointer.state(), LoadState::Loading);
        assert!(Rc::ptr_eq(
            &pointer.get(),
            &h.agent.fallback(ResourceKind::Texture)
        ));
    }

    h.device.signal_all();
    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.promoted, 1);
    assert_eq!(pointer.state(), LoadState::Loaded);
    assert_eq!(pointer.loaded_on(), Some(thread::current().id()));

    let resource = pointer.get();
    let texture = resource.as_texture().unwrap();
    assert_eq!((texture.width, texture.height), (4, 2));
    assert!(!Rc::ptr_eq(&resource, &h.agent.fallback(ResourceKind::Texture)));

    assert_eq!(
        h.agent.events().drain(),
        vec![ResourceEvent::Loaded {
            path: "a.png".to_string(),
            kind: ResourceKind::Texture
        }]
    );
}

#[test]
fn missing_file_fails_within_one_tick_and_keeps_the_fallback() {
    let mut h = harness();
    let pointer = h.agent.acquire("missing.png");

    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(pointer.state(), LoadState::Failed);
    assert_eq!(
        pointer.error(),
        Some(LoadError::Decode(DecodeError::Missing {
            path: "missing.png".to_string()
        }))
    );

    for _ in 0..10 {
        h.device.signal_all();
        h.agent.update(&mut h.ctx).unwrap();
        assert_eq!(pointer.state(), LoadState::Failed);
        assert!(Rc::ptr_eq(
            &pointer.get(),
            &h.agent.fallback(ResourceKind::Texture)
        ));
    }

    let events = h.agent.events().drain();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ResourceEvent::Failed { path, .. } if path == "missing.png"));
}

#[test]
fn continuations_fire_once_and_only_after_the_transition() {
    let mut h = harness();
    let pointer = h.agent.acquire("b.png");
    let early = Rc::new(Cell::new(0));
    let counter = Rc::clone(&early);
    pointer.on_usable_once(move |resource| {
        assert_eq!(resource.kind(), ResourceKind::Texture);
        counter.set(counter.get() + 1);
    });

    h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(early.get(), 0);

    h.device.signal_all();
    h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(early.get(), 1);

    h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(early.get(), 1);

    let late = Rc::new(Cell::new(0));
    let counter = Rc::clone(&late);
    pointer.on_usable_once(move |_| counter.set(counter.get() + 1));
    assert_eq!(late.get(), 1);
}

#[test]
fn handle_losing_its_holders_mid_decode_completes_then_is_evicted() {
    let mut h = harness();
    let pointer = h.agent.acquire("a.png");
    drop(pointer);
    assert_eq!(h.agent.refcount("a.png"), Some(0));
    assert_eq!(h.agent.state("a.png"), Some(LoadState::Loading));

    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.decoded, 1);
    assert_eq!(report.discarded, 1);
    assert_eq!(report.evicted, 1);
    assert_eq!(h.agent.worker_stats().completed, 1);
    assert!(!h.agent.contains("a.png"));
    assert_eq!(h.device.buffer_count(), h.baseline_buffers);
}

#[test]
fn handle_losing_its_holders_mid_upload_releases_its_buffers() {
    let mut h = harness();
    let pointer = h.agent.acquire("a.png");
    h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(h.device.buffer_count(), h.baseline_buffers + 1);

    drop(pointer);
    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.discarded, 1);
    assert_eq!(report.evicted, 1);
    assert_eq!(h.agent.uploads_in_flight(), 0);
    assert_eq!(h.device.buffer_count(), h.baseline_buffers);
    assert_eq!(h.device.fence_count(), 0);
}

#[test]
fn loaded_handle_without_holders_is_evicted() {
    let mut h = harness();
    let pointer = h.agent.acquire("table.bin");
    h.agent.update(&mut h.ctx).unwrap();
    h.device.signal_all();
    h.agent.update(&mut h.ctx).unwrap();
    assert!(pointer.is_usable());
    assert_eq!(
        h.device
            .buffer_contents(pointer.get().as_buffer().unwrap().id())
            .unwrap(),
        vec![1, 2, 3, 4, 5, 6, 7, 8]
    );

    let copy = pointer.clone();
    drop(pointer);
    h.agent.update(&mut h.ctx).unwrap();
    assert!(h.agent.contains("table.bin"));

    drop(copy);
    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.evicted, 1);
    assert_eq!(h.device.buffer_count(), h.baseline_buffers);
    assert!(h
        .agent
        .events()
        .drain()
        .contains(&ResourceEvent::Evicted {
            path: "table.bin".to_string()
        }));
}

#[test]
fn reset_all_then_reload_all_redrives_every_handle() {
    let mut h = harness();
    let a = h.agent.acquire("a.png");
    let b = h.agent.acquire("b.png");
    h.agent.update(&mut h.ctx).unwrap();
    h.device.signal_all();
    h.agent.update(&mut h.ctx).unwrap();
    assert!(a.is_usable() && b.is_usable());

    assert_eq!(h.agent.reset_all(&mut h.ctx), 2);
    assert_eq!(a.state(), LoadState::Unloaded);
    assert_eq!(b.state(), LoadState::Unloaded);
    assert_eq!(a.refcount(), 1);
    assert!(Rc::ptr_eq(&a.get(), &h.agent.fallback(ResourceKind::Texture)));
    assert_eq!(h.device.buffer_count(), h.baseline_buffers);

    // Unloaded handles with holders are kept.
    h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(h.agent.len(), 2);

    assert_eq!(h.agent.reload_all(&mut h.ctx), 2);
    assert_eq!(a.state(), LoadState::Loading);
    h.agent.update(&mut h.ctx).unwrap();
    h.device.signal_all();
    h.agent.update(&mut h.ctx).unwrap();
    assert!(a.is_usable() && b.is_usable());
}

#[test]
fn acquiring_an_unloaded_handle_loads_it_again() {
    let mut h = harness();
    let pointer = h.agent.acquire("b.png");
    assert!(h.agent.unload("b.png", &mut h.ctx));
    assert_eq!(pointer.state(), LoadState::Unloaded);

    let again = h.agent.acquire("b.png");
    assert!(again.ptr_eq(&pointer));
    assert_eq!(again.state(), LoadState::Loading);
    assert!(!h.agent.unload("nothing.png", &mut h.ctx));
}

#[test]
fn reload_discards_the_superseded_result() {
    let mut h = harness();
    let pointer = h.agent.acquire("table.bin");
    h.source.insert("table.bin", vec![42; 4]);
    assert!(h.agent.reload("table.bin", &mut h.ctx));

    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.decoded, 2);
    assert_eq!(report.discarded, 1);
    assert_eq!(report.finalized, 1);

    h.device.signal_all();
    h.agent.update(&mut h.ctx).unwrap();
    let resource = pointer.get();
    let buffer = resource.as_buffer().unwrap();
    assert_eq!(h.device.buffer_contents(buffer.id()).unwrap(), vec![42; 4]);
}

/// Loads `path` to completion on the inline worker.
fn load(h: &mut Harness, path: &str) -> kiln_agents::ResourcePointer {
    let pointer = h.agent.acquire(path);
    h.agent.update(&mut h.ctx).unwrap();
    h.device.signal_all();
    h.agent.update(&mut h.ctx).unwrap();
    assert!(pointer.is_usable(), "'{path}' did not load");
    pointer
}

fn generated_buffer(h: &Harness, bytes: Vec<u8>) -> Resource {
    GpuUploadLane
        .finalize(&h.ctx, DecodedResource::Buffer(bytes))
        .unwrap()
}

#[test]
fn unload_while_the_object_is_borrowed_defers_its_release() {
    let mut h = harness();
    let pointer = load(&mut h, "table.bin");
    let id = pointer.get().as_buffer().unwrap().id();
    pointer
        .get()
        .as_buffer()
        .unwrap()
        .bind(&mut h.ctx, BufferTarget::Storage)
        .unwrap();

    let held = pointer.get();
    assert!(h.agent.unload("table.bin", &mut h.ctx));
    assert_eq!(h.agent.deferred_releases(), 1);
    assert!(h.ctx.bindings().is_bound(id));

    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.released, 0);
    assert_eq!(h.device.buffer_count(), h.baseline_buffers + 1);

    drop(held);
    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.released, 1);
    assert_eq!(h.agent.deferred_releases(), 0);
    assert!(!h.ctx.bindings().is_bound(id));
    assert_eq!(h.ctx.bindings().current(BufferTarget::Storage), None);
    assert_eq!(h.device.buffer_count(), h.baseline_buffers);
}

#[test]
fn linked_resource_survives_resets_until_freed() {
    let mut h = harness();
    let resource = generated_buffer(&h, vec![3; 4]);
    let pointer = h.agent.acquire_link("generated.bin", resource);
    assert!(pointer.is_usable());
    assert!(pointer.handle().is_linked());
    assert_eq!(pointer.kind(), ResourceKind::Buffer);
    assert_eq!(h.device.buffer_count(), h.baseline_buffers + 1);

    drop(pointer);
    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.evicted, 0);
    assert_eq!(h.agent.state("generated.bin"), Some(LoadState::Loaded));

    assert_eq!(h.agent.reset_all(&mut h.ctx), 0);
    assert!(!h.agent.unload("generated.bin", &mut h.ctx));
    assert!(!h.agent.reload("generated.bin", &mut h.ctx));
    assert_eq!(h.agent.state("generated.bin"), Some(LoadState::Loaded));

    assert!(h.agent.free("generated.bin", &mut h.ctx));
    assert!(!h.agent.contains("generated.bin"));
    assert_eq!(h.device.buffer_count(), h.baseline_buffers);
    assert!(!h.agent.free("generated.bin", &mut h.ctx));
    assert!(h
        .agent
        .events()
        .drain()
        .contains(&ResourceEvent::Freed {
            path: "generated.bin".to_string()
        }));
}

#[test]
fn linking_a_taken_name_returns_the_existing_handle() {
    let mut h = harness();
    let original = generated_buffer(&h, vec![1; 4]);
    let duplicate = generated_buffer(&h, vec![2; 4]);
    let first = h.agent.acquire_link("shared.bin", original);
    let second = h.agent.acquire_link("shared.bin", duplicate);
    assert!(first.ptr_eq(&second));
    assert_eq!(h.agent.deferred_releases(), 1);

    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.released, 1);
    assert_eq!(h.device.buffer_count(), h.baseline_buffers + 1);
    let id = first.get().as_buffer().unwrap().id();
    assert_eq!(h.device.buffer_contents(id).unwrap(), vec![1; 4]);
}

#[test]
fn freeing_a_managed_handle_falls_its_pointers_back() {
    let mut h = harness();
    let pointer = load(&mut h, "a.png");
    assert!(h.agent.free("a.png", &mut h.ctx));
    assert_eq!(pointer.state(), LoadState::Unloaded);
    assert!(Rc::ptr_eq(&pointer.get(), &h.agent.fallback(ResourceKind::Texture)));
    assert_eq!(h.device.buffer_count(), h.baseline_buffers);

    // A new request builds a new handle.
    let again = h.agent.acquire("a.png");
    assert!(!again.ptr_eq(&pointer));
    assert_eq!(again.state(), LoadState::Loading);
}

#[test]
fn result_of_a_freed_handle_never_reaches_its_successor() {
    let mut h = harness();
    let first = h.agent.acquire("table.bin");
    assert!(h.agent.free("table.bin", &mut h.ctx));
    let second = h.agent.acquire("table.bin");
    assert!(!second.ptr_eq(&first));

    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.decoded, 2);
    assert_eq!(report.discarded, 1);
    assert_eq!(report.finalized, 1);

    h.device.signal_all();
    h.agent.update(&mut h.ctx).unwrap();
    let resource = second.get();
    let id = resource.as_buffer().unwrap().id();
    assert_eq!(h.device.buffer_contents(id).unwrap(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(first.state(), LoadState::Unloaded);
}

#[test]
fn inactive_pointers_park_the_handle_until_reactivated() {
    let mut h = harness();
    let mut pointer = load(&mut h, "table.bin");

    pointer.set_active(false);
    assert_eq!(pointer.refcount(), 0);
    h.agent.update(&mut h.ctx).unwrap();
    assert!(h.agent.contains("table.bin"));
    assert!(pointer.handle().is_parked());
    assert_eq!(pointer.state(), LoadState::Unloaded);
    assert_eq!(h.device.buffer_count(), h.baseline_buffers);

    // Parking happens once.
    h.agent.update(&mut h.ctx).unwrap();
    assert!(pointer.handle().is_parked());

    pointer.set_active(true);
    h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(pointer.state(), LoadState::Loading);
    assert!(!pointer.handle().is_parked());
    h.agent.update(&mut h.ctx).unwrap();
    h.device.signal_all();
    h.agent.update(&mut h.ctx).unwrap();
    assert!(pointer.is_usable());

    pointer.set_active(false);
    drop(pointer);
    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.evicted, 1);
    assert_eq!(h.device.buffer_count(), h.baseline_buffers);
}

#[test]
fn reset_callbacks_follow_reset_and_reload() {
    let mut h = harness();
    let _pointer = load(&mut h, "b.png");
    let phases = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&phases);
    let token = h.agent.bind_reset(move |ctx, phase| {
        assert!(ctx.is_owner());
        sink.borrow_mut().push(phase);
    });
    assert_eq!(h.agent.reset_callbacks(), 1);

    h.agent.reset_all(&mut h.ctx);
    h.agent.reload_all(&mut h.ctx);
    assert_eq!(*phases.borrow(), vec![ResetPhase::Unload, ResetPhase::Reload]);

    assert!(h.agent.unbind_reset(token));
    assert!(!h.agent.unbind_reset(token));
    h.agent.reset_all(&mut h.ctx);
    assert_eq!(phases.borrow().len(), 2);
}

#[test]
fn archive_and_directory_feed_one_agent() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let archive = dir.path().join("assets.core");
    let packed = png(3, 3);
    let files: [(&str, &[u8]); 2] = [("packed.png", packed.as_slice()), ("table.bin", &[0; 4])];
    write_archive(&archive, &files).unwrap();
    let loose = dir.path().join("loose");
    std::fs::create_dir(&loose).unwrap();
    std::fs::write(loose.join("table.bin"), [9; 4]).unwrap();

    let source = LayeredSource::new()
        .with_layer(Arc::new(kiln_lanes::DirectorySource::new(&loose)))
        .with_layer(Arc::new(ArchiveSource::open(&archive).unwrap()));

    let device = HeadlessDevice::new(HeadlessConfig::default());
    let mut ctx = GpuContext::new(Arc::new(device.clone()));
    let mut agent = ResourceAgent::with_lanes(
        &ctx,
        LoaderConfig::default(),
        Arc::new(source),
        DecoderRegistry::with_defaults(),
        GpuUploadLane,
        WorkerMode::Inline,
    )
    .unwrap();

    let texture = agent.acquire("packed.png");
    let table = agent.acquire("table.bin");
    agent.update(&mut ctx).unwrap();
    device.signal_all();
    agent.update(&mut ctx).unwrap();

    let resource = texture.get();
    let image = resource.as_texture().unwrap();
    assert_eq!((image.width, image.height), (3, 3));
    let resource = table.get();
    let id = resource.as_buffer().unwrap().id();
    assert_eq!(device.buffer_contents(id).unwrap(), vec![9; 4]);
}

#[test]
fn finalize_work_is_spread_over_updates() {
    let config = LoaderConfig {
        finalize_budget_per_update: 1,
        ..Default::default()
    };
    let mut h = harness_with(config, DecoderRegistry::with_defaults(), WorkerMode::Inline);
    let pointers: Vec<_> = ["a.png", "b.png", "table.bin"]
        .into_iter()
        .map(|path| h.agent.acquire(path))
        .collect();

    let first = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!((first.decoded, first.finalized), (3, 1));
    let second = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!((second.decoded, second.finalized), (0, 1));
    let third = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(third.finalized, 1);

    h.device.signal_all();
    h.agent.update(&mut h.ctx).unwrap();
    assert!(pointers.iter().all(|p| p.is_usable()));
    assert!(h.agent.is_idle());
}

struct SilenceLane;

impl DecoderLane for SilenceLane {
    fn name(&self) -> &'static str {
        "Silence"
    }

    fn decode(&self, bytes: &[u8]) -> Result<DecodedResource, LaneError> {
        Ok(DecodedResource::Sound(DecodedSound {
            sample_rate: 8_000,
            channels: 1,
            samples: vec![0.0; bytes.len()],
        }))
    }
}

struct PanickingLane;

impl DecoderLane for PanickingLane {
    fn name(&self) -> &'static str {
        "Panicking"
    }

    fn decode(&self, _bytes: &[u8]) -> Result<DecodedResource, LaneError> {
        panic!("corrupt header");
    }
}

#[test]
fn host_only_resources_skip_the_fence() {
    let mut registry = DecoderRegistry::with_defaults();
    registry.register(ResourceKind::Sound, SilenceLane);
    let mut h = harness_with(LoaderConfig::default(), registry, WorkerMode::Inline);
    h.source.insert("beep.wav", vec![0; 800]);

    let pointer = h.agent.acquire("beep.wav");
    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.promoted, 1);
    assert_eq!(report.uploads_in_flight, 0);
    assert_eq!(pointer.get().as_sound().unwrap().samples.len(), 800);
}

#[test]
fn panicking_decoder_fails_the_handle() {
    let mut registry = DecoderRegistry::with_defaults();
    registry.register(ResourceKind::Texture, PanickingLane);
    let mut h = harness_with(LoaderConfig::default(), registry, WorkerMode::Inline);

    let pointer = h.agent.acquire("a.png");
    h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(pointer.state(), LoadState::Failed);
    let Some(LoadError::Decode(DecodeError::Malformed { message, .. })) = pointer.error() else {
        panic!("expected a malformed decode error, got {:?}", pointer.error());
    };
    assert!(message.contains("corrupt header"));
}

#[test]
fn fonts_without_a_decoder_fail_as_unsupported() {
    let mut h = harness();
    h.source.insert("ui.ttf", vec![0; 32]);
    let pointer = h.agent.acquire("ui.ttf");
    h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(pointer.state(), LoadState::Failed);
    assert!(matches!(
        pointer.error(),
        Some(LoadError::Decode(DecodeError::Unsupported {
            kind: ResourceKind::Font,
            ..
        }))
    ));
    assert!(pointer.get().as_font().is_some());
}

#[test]
fn device_loss_during_upload_fails_the_handle() {
    let mut h = harness();
    let pointer = h.agent.acquire("a.png");
    h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(h.agent.uploads_in_flight(), 1);

    h.device.lose_device();
    let report = h.agent.update(&mut h.ctx).unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(pointer.state(), LoadState::Failed);
    assert_eq!(pointer.error(), Some(LoadError::DeviceLost));
}

#[test]
fn oversized_resource_fails_without_affecting_others() {
    init_logging();
    // Large enough for the fallbacks, too small for a 16x16 texture.
    let device = HeadlessDevice::new(HeadlessConfig {
        max_buffer_size: 256,
        ..Default::default()
    });
    let mut ctx = GpuContext::new(Arc::new(device.clone()));
    let source = Arc::new(MemorySource::new());
    source.insert("big.png", png(16, 16));
    source.insert("small.png", png(2, 2));
    let mut agent = ResourceAgent::with_lanes(
        &ctx,
        LoaderConfig::default(),
        source,
        DecoderRegistry::with_defaults(),
        GpuUploadLane,
        WorkerMode::Inline,
    )
    .unwrap();

    let big = agent.acquire("big.png");
    let small = agent.acquire("small.png");
    agent.update(&mut ctx).unwrap();
    device.signal_all();
    agent.update(&mut ctx).unwrap();

    assert!(matches!(
        big.error(),
        Some(LoadError::GpuAllocation(_))
    ));
    assert!(small.is_usable());
}

#[test]
fn threaded_workers_feed_the_owning_thread() {
    let config = LoaderConfig {
        worker_count: 2,
        idle_sleep_us: 100,
        ..Default::default()
    };
    let mut h = harness_with(config, DecoderRegistry::with_defaults(), WorkerMode::Threaded);
    for i in 0..16 {
        h.source.insert(format!("tex{i}.png"), png(2, 2));
    }
    let pointers: Vec<_> = (0..16)
        .map(|i| h.agent.acquire(&format!("tex{i}.png")))
        .collect();

    let deadline = Instant::now() + Duration::from_secs(10);
    while !pointers.iter().all(|p| p.is_usable()) {
        assert!(Instant::now() < deadline, "resources did not load in time");
        h.device.signal_all();
        h.agent.update(&mut h.ctx).unwrap();
        thread::sleep(Duration::from_millis(1));
    }

    let owner = thread::current().id();
    assert!(pointers.iter().all(|p| p.loaded_on() == Some(owner)));
    assert_eq!(h.agent.worker_stats().completed, 16);

    drop(pointers);
    h.agent.update(&mut h.ctx).unwrap();
    assert!(h.agent.is_empty());
    let Harness {
        device,
        mut ctx,
        agent,
        baseline_buffers,
        ..
    } = h;
    assert_eq!(device.buffer_count(), baseline_buffers);
    agent.shutdown(&mut ctx);
    assert_eq!(device.buffer_count(), 0);
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "GpuContext owned by")]
fn updating_with_a_foreign_context_is_a_contract_violation() {
    let mut h = harness();
    let mut foreign = thread::spawn(|| GpuContext::new(Arc::new(HeadlessDevice::default())))
        .join()
        .unwrap();
    let _ = h.agent.update(&mut foreign);
}
