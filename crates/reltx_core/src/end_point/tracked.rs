//! Current/original value pair shared by all end-point kinds.

/// A value with its originally loaded counterpart and a touched flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Tracked<T> {
    current: T,
    original: T,
    touched: bool,
}

impl<T: Clone + PartialEq> Tracked<T> {
    pub(crate) fn new(value: T) -> Self {
        Self {
            original: value.clone(),
            current: value,
            touched: false,
        }
    }

    pub(crate) fn with_original(original: T, current: T) -> Self {
        Self {
            current,
            original,
            touched: false,
        }
    }

    pub(crate) fn current(&self) -> &T {
        &self.current
    }

    pub(crate) fn original(&self) -> &T {
        &self.original
    }

    /// Mutable access to the current value; marks the value touched.
    pub(crate) fn current_mut(&mut self) -> &mut T {
        self.touched = true;
        &mut self.current
    }

    pub(crate) fn has_changed(&self) -> bool {
        self.current != self.original
    }

    pub(crate) fn has_been_touched(&self) -> bool {
        self.touched
    }

    pub(crate) fn touch(&mut self) {
        self.touched = true;
    }

    pub(crate) fn commit(&mut self) {
        self.original = self.current.clone();
        self.touched = false;
    }

    pub(crate) fn rollback(&mut self) {
        self.current = self.original.clone();
        self.touched = false;
    }

    /// Takes over the current value of `source`, keeping our original.
    pub(crate) fn set_data_from(&mut self, source: &Tracked<T>) {
        self.current = source.current.clone();
        self.touched |= source.touched || source.has_changed();
    }
}
