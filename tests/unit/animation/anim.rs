use std::cell::RefCell;
use std::rc::Rc;

use super::*;
use crate::animation::timer::ManualTimer;
use crate::figure::Figure;
use crate::figure::raster::{ArtistShape, RasterFigure};
use crate::foundation::core::{Point, Rect, ViewSignature};

const MARKER: [u8; 4] = [200, 30, 30, 255];

fn figure() -> (RasterFigure, AxesId, ArtistId) {
    let mut fig = RasterFigure::new(2.0, 1.0, 20.0);
    let ax = fig.add_axes(Rect::new(0.0, 0.0, 1.0, 1.0), ViewSignature::default());
    let dot = fig.add_artist(
        ax,
        ArtistShape::Marker {
            center: Point::new(0.2, 0.5),
            radius: 3.0,
        },
        MARKER,
    );
    (fig, ax, dot)
}

fn recording() -> (Rc<RefCell<Vec<u64>>>, FuncDrawer<u64>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let drawer = FuncDrawer::new(move |frame: &u64, _canvas: &mut dyn Canvas| {
        sink.borrow_mut().push(*frame);
        None
    });
    (log, drawer)
}

fn same_dot(dot: ArtistId) -> FuncDrawer<u64> {
    FuncDrawer::new(move |_: &u64, _: &mut dyn Canvas| Some(vec![dot]))
}

fn opts(repeat: bool) -> AnimationOptions {
    AnimationOptions {
        interval_ms: 10,
        repeat,
        ..AnimationOptions::default()
    }
}

#[test]
fn finite_sequence_yields_k_minus_one_continues_then_stop() {
    let (mut fig, _, _) = figure();
    let (log, drawer) = recording();
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::count(3),
        drawer,
        Box::new(ManualTimer::new(0)),
        opts(false),
    );
    assert_eq!(anim.phase(), AnimationPhase::Idle);

    anim.handle_event(&mut fig, CanvasEvent::Draw).unwrap();
    assert_eq!(anim.phase(), AnimationPhase::Stepping);
    assert_eq!(anim.frame_index(), Some(0));

    let mut outcomes = Vec::new();
    while let Some(outcome) = anim.tick(&mut fig).unwrap() {
        outcomes.push(outcome);
    }
    assert_eq!(
        outcomes,
        vec![StepOutcome::Continue, StepOutcome::Continue, StepOutcome::Stop]
    );
    // The first entry is the clean base drawn from the first payload.
    assert_eq!(*log.borrow(), vec![0, 0, 1, 2]);
    assert_eq!(anim.phase(), AnimationPhase::Stopped);
    assert!(!anim.timer().unwrap().is_running());
}

#[test]
fn repeat_waits_repeat_delay_then_restarts_at_frame_zero() {
    let (mut fig, _, _) = figure();
    let (log, drawer) = recording();
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::count(2),
        drawer,
        Box::new(ManualTimer::new(0)),
        AnimationOptions {
            repeat_delay_ms: 50,
            ..opts(true)
        },
    );
    anim.start(&mut fig).unwrap();
    assert_eq!(anim.timer().unwrap().interval(), 10);

    assert_eq!(anim.tick(&mut fig).unwrap(), Some(StepOutcome::Continue));
    assert_eq!(anim.frame_index(), Some(1));

    // Exhausted: clean base redrawn, delay armed.
    assert_eq!(anim.tick(&mut fig).unwrap(), Some(StepOutcome::Continue));
    assert_eq!(anim.phase(), AnimationPhase::RepeatDelay);
    assert_eq!(anim.frame_index(), None);
    let timer = anim.timer().unwrap();
    assert_eq!(timer.interval(), 50);
    assert_eq!(timer.handlers(), vec![TickHandler::LoopDelay]);

    assert_eq!(anim.tick(&mut fig).unwrap(), Some(StepOutcome::Continue));
    assert_eq!(anim.phase(), AnimationPhase::Stepping);
    assert_eq!(anim.frame_index(), Some(0));
    let timer = anim.timer().unwrap();
    assert_eq!(timer.interval(), 10);
    assert_eq!(timer.handlers(), vec![TickHandler::Step]);

    assert_eq!(*log.borrow(), vec![0, 0, 1, 0, 0]);
}

#[test]
fn blitting_restores_background_and_redraws_only_modified_elements() {
    let (mut fig, ax, dot) = figure();
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::count(2),
        same_dot(dot),
        Box::new(ManualTimer::new(0)),
        AnimationOptions {
            blit: true,
            ..opts(false)
        },
    );
    assert!(anim.is_blitting());
    fig.reset_stats();

    anim.start(&mut fig).unwrap();
    assert!(fig.is_animated(dot));
    assert_eq!(anim.drawn(), &[dot]);
    assert!(anim.blit_cache().contains(ax));
    assert_eq!(fig.screen().get_pixel(8, 10).0, MARKER);

    fig.set_shape(
        dot,
        ArtistShape::Marker {
            center: Point::new(0.8, 0.5),
            radius: 3.0,
        },
    );
    assert_eq!(anim.tick(&mut fig).unwrap(), Some(StepOutcome::Continue));

    let bbox = fig.axes_bbox(ax);
    let stats = fig.stats();
    assert_eq!(stats.idle_draws, 1);
    assert_eq!(stats.snapshots, 1);
    assert_eq!(stats.restores, 1);
    assert_eq!(stats.artist_draws, 2);
    assert_eq!(stats.blits, vec![bbox, bbox]);

    assert_eq!(fig.screen().get_pixel(8, 10).0, [235, 235, 242, 255]);
    assert_eq!(fig.screen().get_pixel(32, 10).0, MARKER);
}

#[test]
fn blitting_requires_the_draw_function_to_report_elements() {
    let (mut fig, _, _) = figure();
    let (_, drawer) = recording();
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::count(2),
        drawer,
        Box::new(ManualTimer::new(0)),
        AnimationOptions {
            blit: true,
            ..opts(false)
        },
    );
    let err = anim.start(&mut fig).unwrap_err();
    assert!(matches!(err, FlipbookError::Animation(_)));
}

#[test]
fn blitting_draws_in_zorder() {
    let (mut fig, ax, low) = figure();
    let high = fig.add_artist(
        ax,
        ArtistShape::Rect(Rect::new(0.0, 0.0, 0.1, 0.1)),
        [0, 0, 255, 255],
    );
    fig.set_zorder(high, 10.0);
    fig.set_zorder(low, 1.0);
    let drawer = FuncDrawer::new(move |_: &u64, _: &mut dyn Canvas| Some(vec![high, low]));
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::count(1),
        drawer,
        Box::new(ManualTimer::new(0)),
        AnimationOptions {
            blit: true,
            ..opts(false)
        },
    );
    anim.start(&mut fig).unwrap();
    assert_eq!(anim.drawn(), &[low, high]);
}

#[test]
fn resize_pauses_until_the_next_draw() {
    let (mut fig, ax, dot) = figure();
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::unbounded(),
        same_dot(dot),
        Box::new(ManualTimer::new(0)),
        AnimationOptions {
            blit: true,
            ..opts(true)
        },
    );
    anim.handle_event(&mut fig, CanvasEvent::Draw).unwrap();
    assert!(anim.blit_cache().contains(ax));

    anim.handle_event(&mut fig, CanvasEvent::Resize).unwrap();
    assert!(!anim.timer().unwrap().is_running());
    assert!(anim.blit_cache().is_empty());
    assert_eq!(anim.tick(&mut fig).unwrap(), None);

    // A second resize before the redraw is ignored.
    anim.handle_event(&mut fig, CanvasEvent::Resize).unwrap();

    anim.handle_event(&mut fig, CanvasEvent::Draw).unwrap();
    assert!(anim.timer().unwrap().is_running());
    assert_eq!(anim.tick(&mut fig).unwrap(), Some(StepOutcome::Continue));
    assert!(anim.blit_cache().contains(ax));
}

#[test]
fn exhausted_animation_ignores_resize() {
    let (mut fig, ax, dot) = figure();
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::count(2),
        same_dot(dot),
        Box::new(ManualTimer::new(0)),
        AnimationOptions {
            blit: true,
            ..opts(false)
        },
    );
    anim.handle_event(&mut fig, CanvasEvent::Draw).unwrap();
    while anim.tick(&mut fig).unwrap().is_some() {}
    assert_eq!(anim.phase(), AnimationPhase::Stopped);
    assert!(anim.blit_cache().contains(ax));

    anim.handle_event(&mut fig, CanvasEvent::Resize).unwrap();
    assert!(anim.blit_cache().contains(ax));
    anim.handle_event(&mut fig, CanvasEvent::Draw).unwrap();
    assert!(!anim.timer().unwrap().is_running());
    assert_eq!(anim.tick(&mut fig).unwrap(), None);
}

#[test]
fn resize_is_ignored_without_blitting() {
    let (mut fig, _, _) = figure();
    let (_, drawer) = recording();
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::unbounded(),
        drawer,
        Box::new(ManualTimer::new(0)),
        opts(true),
    );
    anim.start(&mut fig).unwrap();
    anim.handle_event(&mut fig, CanvasEvent::Resize).unwrap();
    assert!(anim.timer().unwrap().is_running());
}

#[test]
fn close_stops_and_detaches_the_timer() {
    let (mut fig, _, _) = figure();
    let (_, drawer) = recording();
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::unbounded(),
        drawer,
        Box::new(ManualTimer::new(0)),
        opts(true),
    );
    anim.start(&mut fig).unwrap();
    anim.handle_event(&mut fig, CanvasEvent::Close).unwrap();
    assert_eq!(anim.phase(), AnimationPhase::Stopped);
    assert!(anim.timer().is_none());
    assert_eq!(anim.tick(&mut fig).unwrap(), None);

    anim.stop();
    assert!(anim.timer().is_none());
}

#[test]
fn start_is_deferred_while_saving() {
    let (mut fig, _, _) = figure();
    let (log, drawer) = recording();
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::count(2),
        drawer,
        Box::new(ManualTimer::new(0)),
        opts(false),
    );
    fig.set_saving(true);
    anim.handle_event(&mut fig, CanvasEvent::Draw).unwrap();
    assert_eq!(anim.phase(), AnimationPhase::Idle);
    assert!(log.borrow().is_empty());

    fig.set_saving(false);
    anim.handle_event(&mut fig, CanvasEvent::Draw).unwrap();
    assert_eq!(anim.phase(), AnimationPhase::Stepping);
}

#[test]
fn artist_frames_show_exactly_one_frame() {
    let (mut fig, ax, a) = figure();
    let b = fig.add_artist(
        ax,
        ArtistShape::Rect(Rect::new(0.5, 0.5, 0.6, 0.6)),
        [0, 128, 0, 255],
    );
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::from_items(vec![vec![a], vec![b]]),
        ArtistFrames,
        Box::new(ManualTimer::new(0)),
        opts(false),
    );
    anim.start(&mut fig).unwrap();
    assert!(fig.is_visible(a));
    assert!(!fig.is_visible(b));

    anim.tick(&mut fig).unwrap();
    assert!(!fig.is_visible(a));
    assert!(fig.is_visible(b));
}

#[test]
fn frame_cache_keeps_the_most_recent_payloads() {
    let (mut fig, _, _) = figure();
    let (_, drawer) = recording();
    let mut anim = Animation::new(
        &mut fig,
        FrameSource::count(5),
        drawer,
        Box::new(ManualTimer::new(0)),
        AnimationOptions {
            save_count: Some(2),
            ..opts(false)
        },
    );
    anim.start(&mut fig).unwrap();
    while anim.tick(&mut fig).unwrap().is_some() {}
    assert_eq!(anim.frame_cache.iter().copied().collect::<Vec<_>>(), vec![3, 4]);
    assert_eq!(anim.save_limit(), 2);
}

#[test]
fn fps_follows_interval() {
    let (mut fig, _, _) = figure();
    let (_, drawer) = recording();
    let anim = Animation::new(
        &mut fig,
        FrameSource::count(1),
        drawer,
        Box::new(ManualTimer::new(0)),
        AnimationOptions {
            interval_ms: 40,
            ..AnimationOptions::default()
        },
    );
    assert_eq!(anim.fps(), 25.0);
    assert_eq!(anim.save_limit(), 1);
}
