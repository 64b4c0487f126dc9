/// An undo log: a sequence of events recording the changes made to a data
/// structure, together with save points to which the structure can be
/// restored by undoing the events in reverse order.
pub struct Trail<Event> {
    trail: Vec<Event>,
    saved_states: Vec<usize>,
}

impl<Event> Trail<Event> {
    pub fn new() -> Self {
        Trail {
            trail: vec![],
            saved_states: vec![],
        }
    }

    pub fn push(&mut self, e: Event) {
        self.trail.push(e);
    }

    pub fn save_state(&mut self) -> u32 {
        self.saved_states.push(self.trail.len());
        self.saved_states.len() as u32 - 1
    }

    pub fn num_saved(&self) -> u32 {
        self.saved_states.len() as u32
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> &[Event] {
        &self.trail
    }

    /// Events recorded since the latest save point, in insertion order.
    /// All events if no state was ever saved.
    pub fn events_since_last_save(&self) -> &[Event] {
        let start = self.saved_states.last().copied().unwrap_or(0);
        &self.trail[start..]
    }

    /// Removes the latest save point, passing each event recorded after it to
    /// `f`, most recent first.
    pub fn restore_last_with(&mut self, mut f: impl FnMut(Event)) {
        let last_index = self.saved_states.pop().expect("No saved state");
        while self.trail.len() > last_index {
            let e = self.trail.pop().expect("No event left");
            f(e);
        }
    }
}

impl<Event> Default for Trail<Event> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_in_reverse_order() {
        let mut trail = Trail::new();
        trail.save_state();
        trail.push(1);
        trail.push(2);
        trail.save_state();
        trail.push(3);
        assert_eq!(trail.events_since_last_save(), &[3]);

        let mut undone = Vec::new();
        trail.restore_last_with(|e| undone.push(e));
        assert_eq!(undone, vec![3]);
        assert_eq!(trail.events_since_last_save(), &[1, 2]);

        trail.restore_last_with(|e| undone.push(e));
        assert_eq!(undone, vec![3, 2, 1]);
        assert_eq!(trail.num_saved(), 0);
    }
}
