use std::collections::VecDeque;

/// Arena of per-window results addressed by window id. Items come back out
/// strictly in id order, as soon as every earlier id has arrived.
pub(crate) struct ReorderBuffer<T> {
    next_id: u64,
    slots: VecDeque<Option<T>>,
}

impl<T> ReorderBuffer<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 0,
            slots: VecDeque::new(),
        }
    }

    /// Store `item` under `id` and return the run of items now ready.
    pub(crate) fn insert(&mut self, id: u64, item: T) -> Vec<T> {
        let Some(idx) = id.checked_sub(self.next_id) else {
            return Vec::new();
        };
        let idx = idx as usize;
        if self.slots.len() <= idx {
            self.slots.resize_with(idx + 1, || None);
        }
        self.slots[idx] = Some(item);

        let mut ready = Vec::new();
        while matches!(self.slots.front(), Some(Some(_))) {
            if let Some(Some(item)) = self.slots.pop_front() {
                ready.push(item);
                self.next_id += 1;
            }
        }
        ready
    }

    pub(crate) fn pending(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_items_in_id_order() {
        let mut buf = ReorderBuffer::new();
        assert!(buf.insert(2, "c").is_empty());
        assert!(buf.insert(1, "b").is_empty());
        assert_eq!(buf.pending(), 2);
        assert_eq!(buf.insert(0, "a"), vec!["a", "b", "c"]);
        assert_eq!(buf.insert(3, "d"), vec!["d"]);
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn ignores_ids_already_released() {
        let mut buf = ReorderBuffer::new();
        assert_eq!(buf.insert(0, 1), vec![1]);
        assert!(buf.insert(0, 2).is_empty());
    }
}
