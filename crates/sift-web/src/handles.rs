/// Numeric handles handed out to JS.
/// A slot is emptied on release and
/// never reused, so a stale handle can
/// not release someone else's entry.
#[derive(Debug)]
pub struct HandleSlots<T> {
  slots: Vec<Option<T>>
}

impl<T> Default for HandleSlots<T> {
  fn default() -> Self {
    Self {
      slots: Vec::new()
    }
  }
}

impl<T> HandleSlots<T> {
  pub fn insert(
    &mut self,
    value: T
  ) -> usize {
    self.slots.push(Some(value));
    self.slots.len() - 1
  }

  pub fn release(
    &mut self,
    handle: usize
  ) -> Option<T> {
    self
      .slots
      .get_mut(handle)
      .and_then(Option::take)
  }

  pub fn live(&self) -> usize {
    self
      .slots
      .iter()
      .filter(|slot| slot.is_some())
      .count()
  }
}

#[cfg(test)]
mod tests {
  use super::HandleSlots;

  #[test]
  fn handles_are_sequential() {
    let mut slots = HandleSlots::default();
    assert_eq!(slots.insert("a"), 0);
    assert_eq!(slots.insert("b"), 1);
    assert_eq!(slots.live(), 2);
  }

  #[test]
  fn release_twice_returns_nothing() {
    let mut slots = HandleSlots::default();
    let handle = slots.insert("a");
    assert_eq!(
      slots.release(handle),
      Some("a")
    );
    assert_eq!(
      slots.release(handle),
      None
    );
    assert_eq!(slots.live(), 0);
  }

  #[test]
  fn unknown_handle_is_ignored() {
    let mut slots = HandleSlots::default();
    slots.insert("a");
    assert_eq!(slots.release(7), None);
    assert_eq!(slots.live(), 1);
  }

  #[test]
  fn released_slot_is_not_reused() {
    let mut slots = HandleSlots::default();
    let first = slots.insert("a");
    slots.release(first);
    let second = slots.insert("b");
    assert_ne!(first, second);
    assert_eq!(slots.release(first), None);
    assert_eq!(
      slots.release(second),
      Some("b")
    );
  }
}
