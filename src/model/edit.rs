//! In-place caption/comment/reply editing

/// Messages that can be sent to update a pending edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The draft text changed
    DraftChanged(String),
    /// Saving the draft was started
    SaveStarted,
    /// The server accepted the draft
    SaveSucceeded,
    /// The server rejected the draft
    SaveFailed,
    /// The user abandoned the edit
    Cancelled,
}

/// What the owner should do after an edit message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Keep the edit open
    Editing,
    /// Send the draft to the server
    Save(String),
    /// Close the edit; the item keeps its server-confirmed text
    Closed,
}

/// Ephemeral state of one item being edited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    item_id: String,
    original_text: String,
    draft_text: String,
    is_saving: bool,
}

impl PendingEdit {
    /// Open edit mode with the item's current text
    pub fn open(item_id: impl Into<String>, original_text: impl Into<String>) -> Self {
        let original_text = original_text.into();
        Self {
            item_id: item_id.into(),
            draft_text: original_text.clone(),
            original_text,
            is_saving: false,
        }
    }

    pub fn item_id(&self) -> &str {
        &self.item_id
    }

    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn draft_text(&self) -> &str {
        &self.draft_text
    }

    pub fn is_saving(&self) -> bool {
        self.is_saving
    }

    pub fn is_dirty(&self) -> bool {
        self.draft_text.trim() != self.original_text.trim()
    }

    pub fn update(&mut self, message: Message) -> EditOutcome {
        match message {
            Message::DraftChanged(text) => {
                if !self.is_saving {
                    self.draft_text = text;
                }
                EditOutcome::Editing
            }
            Message::SaveStarted => {
                if self.is_saving {
                    return EditOutcome::Editing;
                }
                if !self.is_dirty() || self.draft_text.trim().is_empty() {
                    self.draft_text = self.original_text.clone();
                    return EditOutcome::Closed;
                }
                self.is_saving = true;
                EditOutcome::Save(self.draft_text.trim().to_string())
            }
            Message::SaveSucceeded | Message::SaveFailed => {
                self.is_saving = false;
                EditOutcome::Closed
            }
            Message::Cancelled => {
                self.draft_text = self.original_text.clone();
                self.is_saving = false;
                EditOutcome::Closed
            }
        }
    }
}
