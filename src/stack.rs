use arrayvec::ArrayVec;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    #[error("stack overflow")]
    Overflow,
    #[error("stack underflow")]
    Underflow,
}

/// Fixed-capacity stack. Never reallocates; pushing past `N` is an error.
#[derive(Debug)]
pub struct Stack<T, const N: usize> {
    items: ArrayVec<T, N>,
}

impl<T, const N: usize> Stack<T, N> {
    pub fn new() -> Self {
        Self {
            items: ArrayVec::new(),
        }
    }

    pub fn push(&mut self, value: T) -> Result<(), StackError> {
        self.items
            .try_push(value)
            .map_err(|_| StackError::Overflow)
    }

    pub fn pop(&mut self) -> Result<T, StackError> {
        self.items.pop().ok_or(StackError::Underflow)
    }

    /// Removes the top `count` items, returned bottom-first.
    pub fn pop_many(&mut self, count: usize) -> Result<Vec<T>, StackError> {
        let start = self
            .items
            .len()
            .checked_sub(count)
            .ok_or(StackError::Underflow)?;
        Ok(self.items.drain(start..).collect())
    }

    /// `distance` 0 is the top of the stack.
    pub fn peek(&self, distance: usize) -> Result<&T, StackError> {
        self.items
            .len()
            .checked_sub(distance + 1)
            .and_then(|idx| self.items.get(idx))
            .ok_or(StackError::Underflow)
    }

    pub fn last_mut(&mut self) -> Result<&mut T, StackError> {
        self.items.last_mut().ok_or(StackError::Underflow)
    }

    pub fn get(&self, index: usize) -> Result<&T, StackError> {
        self.items.get(index).ok_or(StackError::Underflow)
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<(), StackError> {
        let slot = self.items.get_mut(index).ok_or(StackError::Underflow)?;
        *slot = value;
        Ok(())
    }

    pub fn truncate(&mut self, len: usize) {
        self.items.truncate(len)
    }

    pub fn clear(&mut self) {
        self.items.clear()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }
}

impl<T, const N: usize> Default for Stack<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
