use std::collections::VecDeque;

use crate::animation::blit::BlitCache;
use crate::animation::frames::{DEFAULT_SAVE_COUNT, FrameSource};
use crate::animation::timer::{TickHandler, Timer};
use crate::figure::Canvas;
use crate::foundation::core::{ArtistId, AxesId};
use crate::foundation::error::{FlipbookError, FlipbookResult};

/// Result of advancing an animation by one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// A frame was drawn; keep ticking.
    Continue,
    /// The frame sequence is exhausted. This is normal termination, not an error.
    Stop,
}

/// Host events routed to [`Animation::handle_event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CanvasEvent {
    /// The canvas finished a draw.
    Draw,
    /// The canvas was resized.
    Resize,
    /// The canvas was closed.
    Close,
}

/// Lifecycle phase of an [`Animation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationPhase {
    /// Constructed; waiting for the first draw.
    Idle,
    /// Initial draw done, timer about to run.
    Started,
    /// Advancing one frame per tick.
    Stepping,
    /// Sequence exhausted with repeat on; waiting out the repeat delay.
    RepeatDelay,
    /// Exhausted without repeat, or stopped.
    Stopped,
}

/// Draws frames of type `T` onto a canvas.
pub trait FrameDrawer<T> {
    /// Draw a clean base frame. `first` is the first payload of a fresh pass, if any.
    ///
    /// Returning `Some` replaces the animation's list of drawn elements.
    fn init_draw(
        &mut self,
        canvas: &mut dyn Canvas,
        first: Option<&T>,
        all: &FrameSource<T>,
        blit: bool,
    ) -> FlipbookResult<Option<Vec<ArtistId>>>;

    /// Draw one frame and return the elements it modified, if known.
    fn draw_frame(
        &mut self,
        canvas: &mut dyn Canvas,
        frame: &T,
        blit: bool,
    ) -> FlipbookResult<Option<Vec<ArtistId>>>;
}

type DrawFn<T> = Box<dyn FnMut(&T, &mut dyn Canvas) -> Option<Vec<ArtistId>>>;
type InitFn = Box<dyn FnMut(&mut dyn Canvas) -> Option<Vec<ArtistId>>>;

/// Frame drawer backed by a user function.
///
/// With blitting the function must return every element it modified or created; those are
/// drawn in z-order on top of the cached background.
pub struct FuncDrawer<T> {
    draw: DrawFn<T>,
    init: Option<InitFn>,
}

impl<T> FuncDrawer<T> {
    /// Wrap a per-frame draw function.
    pub fn new(draw: impl FnMut(&T, &mut dyn Canvas) -> Option<Vec<ArtistId>> + 'static) -> Self {
        Self {
            draw: Box::new(draw),
            init: None,
        }
    }

    /// Use `init` to draw the clean base frame instead of the first payload.
    pub fn with_init(
        mut self,
        init: impl FnMut(&mut dyn Canvas) -> Option<Vec<ArtistId>> + 'static,
    ) -> Self {
        self.init = Some(Box::new(init));
        self
    }
}

impl<T> FrameDrawer<T> for FuncDrawer<T> {
    fn init_draw(
        &mut self,
        canvas: &mut dyn Canvas,
        first: Option<&T>,
        _all: &FrameSource<T>,
        blit: bool,
    ) -> FlipbookResult<Option<Vec<ArtistId>>> {
        let artists = match self.init.as_mut() {
            Some(init) => init(canvas),
            None => {
                return match first {
                    Some(frame) => self.draw_frame(canvas, frame, blit),
                    None => Ok(None),
                };
            }
        };
        if blit {
            let Some(artists) = artists.as_ref() else {
                return Err(FlipbookError::animation(
                    "the init function must return the elements it drew when blitting",
                ));
            };
            for &a in artists {
                canvas.set_animated(a, true);
            }
        }
        Ok(artists)
    }

    fn draw_frame(
        &mut self,
        canvas: &mut dyn Canvas,
        frame: &T,
        blit: bool,
    ) -> FlipbookResult<Option<Vec<ArtistId>>> {
        let artists = (self.draw)(frame, canvas);
        if !blit {
            return Ok(artists);
        }
        let Some(mut artists) = artists else {
            return Err(FlipbookError::animation(
                "the draw function must return the elements it modified when blitting",
            ));
        };
        artists.sort_by(|a, b| canvas.zorder(*a).total_cmp(&canvas.zorder(*b)));
        for &a in &artists {
            canvas.set_animated(a, true);
        }
        Ok(Some(artists))
    }
}

/// Frame drawer for a fixed list of element sets: each frame shows exactly its elements.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArtistFrames;

impl FrameDrawer<Vec<ArtistId>> for ArtistFrames {
    fn init_draw(
        &mut self,
        canvas: &mut dyn Canvas,
        _first: Option<&Vec<ArtistId>>,
        all: &FrameSource<Vec<ArtistId>>,
        blit: bool,
    ) -> FlipbookResult<Option<Vec<ArtistId>>> {
        for frame in all.iter() {
            for a in frame {
                canvas.set_visible(a, false);
                canvas.set_animated(a, blit);
            }
        }
        canvas.draw_idle();
        Ok(None)
    }

    fn draw_frame(
        &mut self,
        canvas: &mut dyn Canvas,
        frame: &Vec<ArtistId>,
        _blit: bool,
    ) -> FlipbookResult<Option<Vec<ArtistId>>> {
        for &a in frame {
            canvas.set_visible(a, true);
        }
        Ok(Some(frame.clone()))
    }
}

/// Timing and drawing options of an [`Animation`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnimationOptions {
    /// Delay between frames in milliseconds.
    pub interval_ms: u64,
    /// Restart from the first frame when the sequence is exhausted.
    pub repeat: bool,
    /// Extra delay before restarting, in milliseconds.
    pub repeat_delay_ms: u64,
    /// Redraw only modified elements over cached backgrounds (when the canvas supports it).
    pub blit: bool,
    /// Number of frames to save; defaults to the source length, then to 100.
    pub save_count: Option<usize>,
    /// Keep the most recently drawn payloads so saving replays what was shown.
    pub cache_frame_data: bool,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            interval_ms: 200,
            repeat: true,
            repeat_delay_ms: 0,
            blit: false,
            save_count: None,
            cache_frame_data: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResizeHook {
    Off,
    Listening,
    AwaitingRedraw,
}

/// Timer-driven animation over a [`FrameSource`].
///
/// The animation never schedules itself: the host routes canvas events to
/// [`Animation::handle_event`] and timer expiries to [`Animation::tick`].
pub struct Animation<T> {
    pub(crate) source: FrameSource<T>,
    cursor: Box<dyn Iterator<Item = T>>,
    frame_index: Option<usize>,
    drawer: Box<dyn FrameDrawer<T>>,
    timer: Option<Box<dyn Timer>>,
    pub(crate) opts: AnimationOptions,
    blit: bool,
    blit_cache: BlitCache,
    drawn: Vec<ArtistId>,
    phase: AnimationPhase,
    awaiting_first_draw: bool,
    close_hook: bool,
    resize_hook: ResizeHook,
    pub(crate) frame_cache: VecDeque<T>,
    pub(crate) saved_pass: Option<Box<dyn Iterator<Item = T>>>,
    pub(crate) pending_saved: Option<T>,
    pub(crate) html5_video: Option<String>,
    pub(crate) jshtml: Option<String>,
}

impl<T: Clone + 'static> Animation<T> {
    /// Build an animation. Blitting is enabled only if requested and supported by `canvas`.
    pub fn new(
        canvas: &mut dyn Canvas,
        source: FrameSource<T>,
        drawer: impl FrameDrawer<T> + 'static,
        mut timer: Box<dyn Timer>,
        opts: AnimationOptions,
    ) -> Self {
        timer.set_interval(opts.interval_ms);
        let blit = opts.blit && canvas.supports_blit();
        if opts.blit && !blit {
            tracing::debug!("canvas does not support blitting; using full redraws");
        }
        let mut anim = Self {
            cursor: source.iter(),
            source,
            frame_index: None,
            drawer: Box::new(drawer),
            timer: Some(timer),
            opts,
            blit,
            blit_cache: BlitCache::new(),
            drawn: Vec::new(),
            phase: AnimationPhase::Idle,
            awaiting_first_draw: true,
            close_hook: true,
            resize_hook: if blit {
                ResizeHook::Listening
            } else {
                ResizeHook::Off
            },
            frame_cache: VecDeque::new(),
            saved_pass: None,
            pending_saved: None,
            html5_video: None,
            jshtml: None,
        };
        if blit {
            anim.post_draw(canvas, blit);
        }
        anim
    }

    /// Route a canvas event.
    pub fn handle_event(
        &mut self,
        canvas: &mut dyn Canvas,
        event: CanvasEvent,
    ) -> FlipbookResult<()> {
        match event {
            CanvasEvent::Draw if self.awaiting_first_draw => self.start(canvas),
            CanvasEvent::Draw if self.resize_hook == ResizeHook::AwaitingRedraw => {
                self.end_redraw(canvas);
                Ok(())
            }
            CanvasEvent::Resize if self.resize_hook == ResizeHook::Listening => {
                self.on_resize(canvas)
            }
            CanvasEvent::Close if self.close_hook => {
                self.stop();
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Draw the clean base and the first frame, then start the timer.
    ///
    /// Does nothing while the canvas is being saved.
    pub fn start(&mut self, canvas: &mut dyn Canvas) -> FlipbookResult<()> {
        if canvas.is_saving() || !self.awaiting_first_draw {
            return Ok(());
        }
        self.awaiting_first_draw = false;
        self.phase = AnimationPhase::Started;
        self.init_draw(canvas)?;
        if self.blit {
            // Backgrounds are snapshotted from this draw; animated elements are excluded.
            canvas.draw_idle();
        }
        self.step(canvas)?;
        if let Some(timer) = self.timer.as_mut() {
            timer.on_tick(TickHandler::Step);
            timer.start();
        }
        self.phase = AnimationPhase::Stepping;
        tracing::debug!(interval_ms = self.opts.interval_ms, "animation started");
        Ok(())
    }

    /// Dispatch every handler registered on the timer.
    ///
    /// Returns `None` when the timer is stopped or detached. A handler returning
    /// [`StepOutcome::Stop`] is unregistered, and a timer left without handlers stops; the
    /// animation then ignores further resizes.
    pub fn tick(&mut self, canvas: &mut dyn Canvas) -> FlipbookResult<Option<StepOutcome>> {
        let handlers = match self.timer.as_ref() {
            Some(timer) if timer.is_running() => timer.handlers(),
            _ => return Ok(None),
        };
        let mut last = None;
        for handler in handlers {
            let outcome = match handler {
                TickHandler::Step => self.timed_step(canvas)?,
                TickHandler::LoopDelay => self.loop_delay(canvas)?,
            };
            if outcome == StepOutcome::Stop
                && let Some(timer) = self.timer.as_mut()
            {
                timer.remove_tick(handler);
            }
            last = Some(outcome);
        }
        if let Some(timer) = self.timer.as_mut()
            && timer.handlers().is_empty()
        {
            timer.stop();
            self.resize_hook = ResizeHook::Off;
            self.phase = AnimationPhase::Stopped;
        }
        Ok(last)
    }

    /// Pull the next payload and draw it.
    pub fn step(&mut self, canvas: &mut dyn Canvas) -> FlipbookResult<StepOutcome> {
        let Some(frame) = self.cursor.next() else {
            return Ok(StepOutcome::Stop);
        };
        self.frame_index = Some(self.frame_index.map_or(0, |i| i + 1));
        self.draw_next_frame(canvas, &frame, self.blit)?;
        Ok(StepOutcome::Continue)
    }

    /// Unregister every handler and detach the timer. Idempotent.
    pub fn stop(&mut self) {
        self.awaiting_first_draw = false;
        self.close_hook = false;
        self.resize_hook = ResizeHook::Off;
        if let Some(mut timer) = self.timer.take() {
            timer.remove_tick(TickHandler::Step);
            timer.remove_tick(TickHandler::LoopDelay);
            timer.stop();
            tracing::debug!("animation stopped");
        }
        self.phase = AnimationPhase::Stopped;
    }

    /// Start a fresh pass over the frame sequence.
    pub fn reset_frames(&mut self) {
        self.cursor = self.source.iter();
        self.frame_index = None;
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> AnimationPhase {
        self.phase
    }

    /// Index within the current pass of the most recently drawn frame.
    pub fn frame_index(&self) -> Option<usize> {
        self.frame_index
    }

    /// Whether blitting is in effect.
    pub fn is_blitting(&self) -> bool {
        self.blit
    }

    /// Elements drawn by the most recent frame.
    pub fn drawn(&self) -> &[ArtistId] {
        &self.drawn
    }

    /// Background cache used for blitting.
    pub fn blit_cache(&self) -> &BlitCache {
        &self.blit_cache
    }

    /// Attached timer; `None` once stopped.
    pub fn timer(&self) -> Option<&dyn Timer> {
        self.timer.as_deref()
    }

    /// Whether the animation restarts after the last frame.
    pub fn repeats(&self) -> bool {
        self.opts.repeat
    }

    /// Frame interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.opts.interval_ms
    }

    /// Frame rate implied by the interval.
    pub fn fps(&self) -> f64 {
        if self.opts.interval_ms == 0 {
            1000.0
        } else {
            1000.0 / self.opts.interval_ms as f64
        }
    }

    /// Upper bound on frames kept for saving.
    pub fn save_limit(&self) -> usize {
        self.opts
            .save_count
            .or(self.source.len())
            .unwrap_or(DEFAULT_SAVE_COUNT)
    }

    fn timed_step(&mut self, canvas: &mut dyn Canvas) -> FlipbookResult<StepOutcome> {
        let outcome = self.step(canvas)?;
        if outcome == StepOutcome::Continue || !self.opts.repeat {
            if outcome == StepOutcome::Stop {
                tracing::debug!("frame sequence exhausted");
            }
            return Ok(outcome);
        }

        self.init_draw(canvas)?;
        self.reset_frames();
        if let Some(timer) = self.timer.as_mut() {
            timer.remove_tick(TickHandler::Step);
            timer.on_tick(TickHandler::LoopDelay);
            timer.set_interval(self.opts.repeat_delay_ms);
        }
        self.phase = AnimationPhase::RepeatDelay;
        tracing::debug!(
            repeat_delay_ms = self.opts.repeat_delay_ms,
            "frame sequence exhausted; repeating"
        );
        Ok(StepOutcome::Continue)
    }

    fn loop_delay(&mut self, canvas: &mut dyn Canvas) -> FlipbookResult<StepOutcome> {
        if let Some(timer) = self.timer.as_mut() {
            timer.remove_tick(TickHandler::LoopDelay);
            timer.set_interval(self.opts.interval_ms);
            timer.on_tick(TickHandler::Step);
        }
        self.phase = AnimationPhase::Stepping;
        self.step(canvas)?;
        Ok(StepOutcome::Continue)
    }

    pub(crate) fn init_draw(&mut self, canvas: &mut dyn Canvas) -> FlipbookResult<()> {
        let first = self.source.iter().next();
        if let Some(artists) =
            self.drawer
                .init_draw(canvas, first.as_ref(), &self.source, self.blit)?
        {
            self.drawn = artists;
        }
        self.frame_cache.clear();
        Ok(())
    }

    pub(crate) fn draw_next_frame(
        &mut self,
        canvas: &mut dyn Canvas,
        frame: &T,
        blit: bool,
    ) -> FlipbookResult<()> {
        self.pre_draw(canvas, blit);
        if let Some(artists) = self.drawer.draw_frame(canvas, frame, blit)? {
            self.drawn = artists;
        }
        if !blit {
            for &a in &self.drawn {
                canvas.set_visible(a, true);
            }
        }
        if self.opts.cache_frame_data {
            self.frame_cache.push_back(frame.clone());
            let limit = self.save_limit();
            while self.frame_cache.len() > limit {
                self.frame_cache.pop_front();
            }
        }
        self.post_draw(canvas, blit);
        Ok(())
    }

    fn pre_draw(&mut self, canvas: &mut dyn Canvas, blit: bool) {
        if blit {
            for ax in unique_axes(canvas, &self.drawn) {
                self.blit_cache.restore(canvas, ax);
            }
        } else {
            for &a in &self.drawn {
                canvas.set_visible(a, false);
            }
        }
    }

    fn post_draw(&mut self, canvas: &mut dyn Canvas, blit: bool) {
        if blit && !self.drawn.is_empty() {
            self.blit_draw(canvas);
        } else {
            canvas.draw_idle();
        }
    }

    fn blit_draw(&mut self, canvas: &mut dyn Canvas) {
        let updated = unique_axes(canvas, &self.drawn);
        // Snapshot every background before drawing any foreground, so shared axes never cache
        // another element's pixels.
        for &ax in &updated {
            self.blit_cache.get_or_refresh(canvas, ax);
        }
        for &a in &self.drawn {
            canvas.draw_artist(a);
        }
        for &ax in &updated {
            let bbox = canvas.axes_bbox(ax);
            canvas.blit(bbox);
        }
    }

    fn on_resize(&mut self, canvas: &mut dyn Canvas) -> FlipbookResult<()> {
        self.resize_hook = ResizeHook::AwaitingRedraw;
        if let Some(timer) = self.timer.as_mut() {
            timer.stop();
        }
        self.blit_cache.clear();
        self.init_draw(canvas)?;
        tracing::debug!("canvas resized; paused until the next draw");
        Ok(())
    }

    fn end_redraw(&mut self, canvas: &mut dyn Canvas) {
        self.post_draw(canvas, false);
        if let Some(timer) = self.timer.as_mut() {
            timer.start();
        }
        self.resize_hook = ResizeHook::Listening;
    }
}

impl<T> std::fmt::Debug for Animation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Animation")
            .field("phase", &self.phase)
            .field("frame_index", &self.frame_index)
            .field("blit", &self.blit)
            .field("opts", &self.opts)
            .finish_non_exhaustive()
    }
}

fn unique_axes(canvas: &dyn Canvas, artists: &[ArtistId]) -> Vec<AxesId> {
    let mut out: Vec<AxesId> = Vec::new();
    for &a in artists {
        if let Some(ax) = canvas.artist_axes(a)
            && !out.contains(&ax)
        {
            out.push(ax);
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/animation/anim.rs"]
mod tests;
