mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use common::{FakeBackend, RecordingTrash, write_png};
use slide_viewer::gpu::frame::{FilterKind, FrameSource, FrameSubmitter, SampleSource, SubmitState};
use slide_viewer::processing::kernels::ResampleKernel;
use slide_viewer::processing::scale_plan::Size;
use slide_viewer::tasks::viewer::{Session, SessionOptions};
use tempfile::{TempDir, tempdir};

fn options(kernel: ResampleKernel, scaling: bool) -> SessionOptions {
    SessionOptions {
        kernel,
        scaling,
        shuffle: false,
        seed: None,
        auto_advance_secs: 0,
        super_sampling: true,
        show_info: true,
    }
}

fn single_slide(
    width: u32,
    height: u32,
    backend: Arc<FakeBackend>,
    opts: SessionOptions,
) -> (TempDir, Session<FakeBackend>) {
    let tmp = tempdir().unwrap();
    let path = write_png(tmp.path(), "only.png", width, height);
    let session = Session::new(
        backend,
        vec![path],
        opts,
        Box::new(RecordingTrash::default()),
        Size::new(80, 60),
        Instant::now(),
    )
    .unwrap();
    (tmp, session)
}

#[test]
fn redraws_during_flight_collapse_into_one_more_submission() {
    let (_tmp, mut session) = single_slide(
        40,
        30,
        FakeBackend::new(false),
        options(ResampleKernel::Lanczos, true),
    );
    let mut submitter = FrameSubmitter::default();
    let mut submissions = Vec::new();

    assert!(submitter.begin());
    let seq = session.produce_frame(Size::new(80, 60)).unwrap();
    submitter.submitted();
    submissions.push(seq);

    assert!(!submitter.begin());
    assert!(!submitter.begin());
    assert_eq!(submitter.state(), SubmitState::Submitted);

    // GPU completion: exactly one follow-up frame is owed.
    assert!(submitter.complete());
    assert!(submitter.begin());
    submissions.push(session.produce_frame(Size::new(80, 60)).unwrap());
    submitter.submitted();
    assert!(!submitter.complete());

    assert_eq!(submitter.submissions(), 2);
    assert_eq!(submissions.len(), 2);
    assert!(submissions[1].frame > submissions[0].frame);
}

#[test]
fn upscale_encodes_super_sampling_before_the_draw() {
    let backend = FakeBackend::new(true);
    let (_tmp, mut session) =
        single_slide(20, 15, backend.clone(), options(ResampleKernel::Lanczos, true));

    let seq = session.produce_frame(Size::new(80, 60)).unwrap();
    assert!(seq.plan.is_upscale);
    let pass = seq.super_sample.as_ref().expect("super-sampling pass");
    assert_eq!(pass.input, Size::new(20, 15));
    assert_eq!(pass.output, Size::new(80, 60));
    assert_eq!(seq.wait, Some(pass.signal));
    assert!(seq.ordering_is_sound());
    assert_eq!(seq.filter, FilterKind::Passthrough);
    assert!(matches!(seq.source, SampleSource::ScalerOutput(_)));
    assert!(seq.residency.holds_scaler(&pass.scaler));
    assert!(seq.residency.holds_texture(&pass.source));
    assert!(seq.residency.holds_uniforms());
    assert_eq!(seq.residency.len(), 3);
    assert_eq!(seq.vertex_count, 6);
    assert_eq!(seq.uniforms.scale, [1.0, 1.0]);
    assert!(session.status().contains("super-sampling"));

    // Same sizes on the next frame reuse the scaler.
    let again = session.produce_frame(Size::new(80, 60)).unwrap();
    assert_ne!(again.wait, seq.wait);
    assert_eq!(backend.scalers_built(), 1);

    // A new viewport voids it.
    session.produce_frame(Size::new(160, 120)).unwrap();
    assert_eq!(backend.scalers_built(), 2);
}

#[test]
fn downscale_uses_the_configured_kernel_without_fence() {
    let (_tmp, mut session) = single_slide(
        160,
        90,
        FakeBackend::new(true),
        options(ResampleKernel::Jinc, true),
    );
    let seq = session.produce_frame(Size::new(80, 60)).unwrap();
    assert_eq!(seq.plan.target, Size::new(80, 45));
    assert!(seq.super_sample.is_none());
    assert_eq!(seq.wait, None);
    assert_eq!(seq.filter, FilterKind::Kernel(ResampleKernel::Jinc));
    assert!(matches!(seq.source, SampleSource::Texture(_)));
    assert_eq!(seq.residency.len(), 2);
    assert!(seq.ordering_is_sound());
    assert_eq!(
        session.status(),
        "Slide 1 of 1 | only.png | Input 160x90 | Output 80x45 | Downscaling: windowed Jinc"
    );
}

#[test]
fn scaling_off_draws_bilinear_at_native_size() {
    let (_tmp, mut session) = single_slide(
        160,
        120,
        FakeBackend::new(true),
        options(ResampleKernel::Lanczos, false),
    );
    let seq = session.produce_frame(Size::new(80, 60)).unwrap();
    assert_eq!(seq.filter, FilterKind::Passthrough);
    assert_eq!(seq.uniforms.scale, [2.0, 2.0]);
    assert!(seq.super_sample.is_none());
}

#[test]
fn missing_super_sampling_falls_back_to_the_kernel() {
    let (_tmp, mut session) = single_slide(
        20,
        15,
        FakeBackend::new(false),
        options(ResampleKernel::Lanczos, true),
    );
    let seq = session.produce_frame(Size::new(80, 60)).unwrap();
    assert!(!seq.plan.is_upscale);
    assert!(seq.plan.needs_resample);
    assert_eq!(seq.plan.target, Size::new(80, 60));
    assert_eq!(seq.filter, FilterKind::Kernel(ResampleKernel::Lanczos));
    assert!(seq.super_sample.is_none());
    assert!(session.status().ends_with("Upscaling: Lanczos-3"));
}

#[test]
fn scaler_build_failure_falls_back_and_is_not_retried_every_frame() {
    let backend = FakeBackend::new(true);
    backend.fail_scalers.store(true, Ordering::SeqCst);
    let (_tmp, mut session) =
        single_slide(20, 15, backend.clone(), options(ResampleKernel::Lanczos, true));

    for _ in 0..3 {
        let seq = session.produce_frame(Size::new(80, 60)).unwrap();
        assert_eq!(seq.filter, FilterKind::Kernel(ResampleKernel::Lanczos));
        assert!(seq.wait.is_none());
    }
    assert_eq!(backend.scalers_built(), 0);
}

#[test]
fn zero_viewport_skips_the_frame() {
    let (_tmp, mut session) = single_slide(
        20,
        15,
        FakeBackend::new(true),
        options(ResampleKernel::Lanczos, true),
    );
    assert!(session.produce_frame(Size::new(0, 0)).is_none());
    assert!(session.produce_frame(Size::new(80, 60)).is_some());
}
