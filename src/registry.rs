use crate::text_box::TextBoxRecord;

/// Ordered text boxes; later entries draw on top.
///
/// `focus` is the box receiving pointer input, `last_focus` the box shown in
/// the side editor. Both are kept valid across every mutation.
#[derive(Debug, Clone, Default)]
pub struct BoxRegistry {
    boxes: Vec<TextBoxRecord>,
    focus: Option<usize>,
    last_focus: Option<usize>,
}

impl BoxRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a box and focuses it.
    pub fn add(&mut self, record: TextBoxRecord) -> usize {
        self.boxes.push(record);
        let index = self.boxes.len() - 1;
        self.focus = Some(index);
        self.last_focus = Some(index);
        index
    }

    pub fn remove_at(&mut self, index: usize) -> Option<TextBoxRecord> {
        if index >= self.boxes.len() {
            return None;
        }
        let removed = self.boxes.remove(index);

        self.focus = match self.focus {
            Some(focus) if focus == index => None,
            Some(focus) if focus > index => Some(focus - 1),
            other => other,
        };
        self.last_focus = match self.last_focus {
            Some(last) if last == index => index.checked_sub(1),
            Some(last) if last > index => Some(last - 1),
            other => other,
        };
        if self.boxes.is_empty() {
            self.focus = None;
            self.last_focus = None;
        }
        Some(removed)
    }

    /// Replaces the whole record at `index`, returning the previous one.
    pub fn update_at(&mut self, index: usize, record: TextBoxRecord) -> Option<TextBoxRecord> {
        let slot = self.boxes.get_mut(index)?;
        Some(std::mem::replace(slot, record))
    }

    /// Returns `false` (and changes nothing) for an out-of-range index.
    pub fn set_focus(&mut self, index: Option<usize>) -> bool {
        if !self.in_range(index) {
            return false;
        }
        self.focus = index;
        true
    }

    pub fn set_last_focus(&mut self, index: Option<usize>) -> bool {
        if !self.in_range(index) {
            return false;
        }
        self.last_focus = index;
        true
    }

    fn in_range(&self, index: Option<usize>) -> bool {
        index.is_none_or(|index| index < self.boxes.len())
    }

    pub fn get(&self, index: usize) -> Option<&TextBoxRecord> {
        self.boxes.get(index)
    }

    pub fn boxes(&self) -> &[TextBoxRecord] {
        &self.boxes
    }

    pub fn iter(&self) -> impl Iterator<Item = &TextBoxRecord> {
        self.boxes.iter()
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn last_focus(&self) -> Option<usize> {
        self.last_focus
    }

    pub fn focused(&self) -> Option<&TextBoxRecord> {
        self.focus.and_then(|index| self.boxes.get(index))
    }

    pub fn last_focused(&self) -> Option<&TextBoxRecord> {
        self.last_focus.and_then(|index| self.boxes.get(index))
    }
}
