/// A fixed-size list where some slots may not have a value yet
/// Filled progressively by the loader threads
#[derive(Debug, Clone)]
pub struct PageSlots<T> {
    items: Vec<Option<T>>,
}

impl<T> PageSlots<T> {
    /// Create a list of `size` empty slots
    pub fn new(size: usize) -> Self {
        Self {
            items: std::iter::repeat_with(|| None).take(size).collect(),
        }
    }

    /// Value at `index`, `None` if the slot is empty or out of range
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index).and_then(Option::as_ref)
    }

    /// Fill a slot, out of range indexes are ignored
    pub fn set(&mut self, index: usize, value: T) {
        if let Some(slot) = self.items.get_mut(index) {
            *slot = Some(value);
        }
    }

    /// Number of filled slots
    pub fn filled(&self) -> usize {
        self.items.iter().filter(|item| item.is_some()).count()
    }
}
