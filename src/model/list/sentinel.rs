//! Viewport sentinel edge detection

/// Messages that can be sent to update the sentinel state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// The trailing marker entered (`true`) or left (`false`) the viewport
    VisibilityChanged(bool),
}

/// Tracks visibility of the trailing marker below the last item.
///
/// Only a transition from not-visible to visible counts as a crossing; repeated "visible"
/// reports while the marker stays on screen do not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sentinel {
    visible: bool,
}

impl Sentinel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Returns `true` when this message is a not-visible to visible crossing
    pub fn update(&mut self, message: Message) -> bool {
        match message {
            Message::VisibilityChanged(visible) => {
                let crossed = visible && !self.visible;
                self.visible = visible;
                crossed
            }
        }
    }
}
