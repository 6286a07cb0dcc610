//! # Scroll-Follow Controller
//!
//! Decides whether the viewport trails new content. Pure: it consumes
//! samples and returns a [`ScrollCommand`] for the renderer to carry out.
//!
//! ```text
//! distance = content_height - scroll_top - viewport_height
//! following = distance < threshold
//! ```
//!
//! Units are whatever the renderer measures in (pixels, terminal rows).

use log::debug;

/// Default "near bottom" threshold, in pixels.
pub const DEFAULT_NEAR_BOTTOM_THRESHOLD_PX: f64 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollSample {
    pub scroll_top: f64,
    pub content_height: f64,
    pub viewport_height: f64,
}

impl ScrollSample {
    pub fn new(scroll_top: f64, content_height: f64, viewport_height: f64) -> Self {
        Self {
            scroll_top,
            content_height,
            viewport_height,
        }
    }

    pub fn distance_from_bottom(&self) -> f64 {
        self.content_height - self.scroll_top - self.viewport_height
    }

    fn bottom(&self) -> f64 {
        (self.content_height - self.viewport_height).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollCommand {
    None,
    ScrollToBottom { animated: bool },
}

#[derive(Debug, Clone)]
pub struct ScrollFollow {
    threshold: f64,
    following: bool,
    last: ScrollSample,
}

impl Default for ScrollFollow {
    fn default() -> Self {
        Self::new(DEFAULT_NEAR_BOTTOM_THRESHOLD_PX)
    }
}

impl ScrollFollow {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            following: true,
            last: ScrollSample::default(),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn is_following(&self) -> bool {
        self.following
    }

    /// The "jump to latest" affordance is shown whenever we are not following.
    pub fn affordance_visible(&self) -> bool {
        !self.following
    }

    pub fn last_sample(&self) -> ScrollSample {
        self.last
    }

    /// A scroll event. Re-evaluates following from the sample alone.
    pub fn on_scroll(&mut self, sample: ScrollSample) {
        self.last = sample;
        self.evaluate();
    }

    /// Content grew or shrank. Following => scroll to bottom; otherwise the
    /// viewport stays put (clamped if the content shrank under it).
    pub fn on_content_change(&mut self, content_height: f64) -> ScrollCommand {
        self.last.content_height = content_height;

        if self.following {
            self.last.scroll_top = self.last.bottom();
            return ScrollCommand::ScrollToBottom { animated: true };
        }

        self.last.scroll_top = self.last.scroll_top.min(self.last.bottom());
        self.evaluate();
        ScrollCommand::None
    }

    /// Viewport resized. Following => stay pinned to the bottom.
    pub fn on_resize(&mut self, viewport_height: f64) -> ScrollCommand {
        self.last.viewport_height = viewport_height;

        if self.following {
            self.last.scroll_top = self.last.bottom();
            return ScrollCommand::ScrollToBottom { animated: false };
        }

        self.last.scroll_top = self.last.scroll_top.min(self.last.bottom());
        self.evaluate();
        ScrollCommand::None
    }

    /// The affordance was invoked.
    pub fn jump_to_latest(&mut self) -> ScrollCommand {
        self.following = true;
        self.last.scroll_top = self.last.bottom();
        debug!("Jump to latest");
        ScrollCommand::ScrollToBottom { animated: true }
    }

    fn evaluate(&mut self) {
        let following = self.last.distance_from_bottom() < self.threshold;
        if following != self.following {
            debug!(
                "Auto-follow {} (distance {})",
                if following { "resumed" } else { "paused" },
                self.last.distance_from_bottom()
            );
        }
        self.following = following;
    }
}
