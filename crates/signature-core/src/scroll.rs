//! Follow-the-bottom scrolling for a growing transcript.
//!
//! Measured in rendered lines. The controller follows new content only when
//! the viewport was already at (or close to) the bottom, so scrolling up to
//! reread something is never undone by an arriving fragment.

/// Distance from the bottom, in lines, that still counts as "at the bottom"
pub const NEAR_BOTTOM_LINES: u16 = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoScroll {
    offset: u16,
    content: u16,
    viewport: u16,
}

impl AutoScroll {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(&self) -> u16 {
        self.offset
    }

    fn max_offset(&self) -> u16 {
        self.content.saturating_sub(self.viewport)
    }

    pub fn is_near_bottom(&self) -> bool {
        self.max_offset() <= self.offset.saturating_add(NEAR_BOTTOM_LINES)
    }

    /// Whether to show the "new content below" affordance.
    pub fn new_content_below(&self) -> bool {
        !self.is_near_bottom()
    }

    /// Record a new measurement of the transcript and viewport.
    pub fn update(&mut self, content: u16, viewport: u16) {
        if content == self.content && viewport == self.viewport {
            return;
        }

        let follow = self.is_near_bottom();
        self.content = content;
        self.viewport = viewport;

        if follow {
            self.offset = self.max_offset();
        } else {
            self.offset = self.offset.min(self.max_offset());
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.offset = self.offset.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.offset = self.offset.saturating_add(lines).min(self.max_offset());
    }

    pub fn scroll_to_bottom(&mut self) {
        self.offset = self.max_offset();
    }
}
