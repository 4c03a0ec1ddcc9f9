use unicode_segmentation::UnicodeSegmentation;

/// Byte cursor into one editor field. Edits are computed against the current
/// text and only committed once the session accepts the new value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextCursor {
    position: usize,
}

/// A candidate edit: the full new text and where the cursor lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub text: String,
    pub cursor: TextCursor,
}

impl TextCursor {
    pub fn at_end(text: &str) -> Self {
        Self {
            position: text.len(),
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Keeps the cursor on a valid boundary after the text changed underneath
    /// it, e.g. on undo.
    pub fn clamp(&mut self, text: &str) {
        if self.position > text.len() || !text.is_char_boundary(self.position) {
            self.position = text.len();
        }
    }

    pub fn insert(&self, text: &str, ch: char) -> PendingEdit {
        let mut next = text.to_string();
        next.insert(self.position, ch);
        PendingEdit {
            text: next,
            cursor: Self {
                position: self.position + ch.len_utf8(),
            },
        }
    }

    pub fn backspace(&self, text: &str) -> Option<PendingEdit> {
        if self.position == 0 {
            return None;
        }
        let prev = prev_grapheme_boundary(text, self.position);
        let mut next = text.to_string();
        next.drain(prev..self.position);
        Some(PendingEdit {
            text: next,
            cursor: Self { position: prev },
        })
    }

    pub fn delete(&self, text: &str) -> Option<PendingEdit> {
        let end = next_grapheme_boundary(text, self.position);
        if end == self.position {
            return None;
        }
        let mut next = text.to_string();
        next.drain(self.position..end);
        Some(PendingEdit {
            text: next,
            cursor: *self,
        })
    }

    pub fn move_left(&mut self, text: &str) -> bool {
        if self.position == 0 {
            return false;
        }
        self.position = prev_grapheme_boundary(text, self.position);
        true
    }

    pub fn move_right(&mut self, text: &str) -> bool {
        let next = next_grapheme_boundary(text, self.position);
        if next == self.position {
            return false;
        }
        self.position = next;
        true
    }

    pub fn move_home(&mut self, text: &str) {
        self.position = text[..self.position]
            .rfind('\n')
            .map(|idx| idx + 1)
            .unwrap_or(0);
    }

    pub fn move_end(&mut self, text: &str) {
        self.position = text[self.position..]
            .find('\n')
            .map(|idx| self.position + idx)
            .unwrap_or(text.len());
    }
}

fn prev_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[..cursor]
        .grapheme_indices(true)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_grapheme_boundary(text: &str, cursor: usize) -> usize {
    text[cursor..]
        .graphemes(true)
        .next()
        .map(|grapheme| cursor + grapheme.len())
        .unwrap_or(text.len())
}
