use std::rc::Rc;

use anyhow::anyhow;
use sift_core::{
  KeyValueStorage,
  NoopStorage,
  ThemeMode,
  ThemeSink
};

pub const DARK_CLASS: &str = "dark";

/// `window.localStorage`.
pub struct LocalStorage {
  storage: web_sys::Storage
}

impl LocalStorage {
  /// `None` when there is no window
  /// or the browser refuses storage
  /// access.
  pub fn from_window() -> Option<Self> {
    web_sys::window()
      .and_then(|window| {
        window
          .local_storage()
          .ok()
          .flatten()
      })
      .map(|storage| Self {
        storage
      })
  }
}

impl KeyValueStorage for LocalStorage {
  fn get(
    &self,
    key: &str
  ) -> anyhow::Result<Option<String>> {
    self.storage.get_item(key).map_err(
      |err| {
        anyhow!(
          "localStorage.getItem({key}) \
           failed: {err:?}"
        )
      }
    )
  }

  fn set(
    &self,
    key: &str,
    value: &str
  ) -> anyhow::Result<()> {
    self
      .storage
      .set_item(key, value)
      .map_err(|err| {
        anyhow!(
          "localStorage.setItem({key}) \
           failed: {err:?}"
        )
      })
  }

  fn remove(
    &self,
    key: &str
  ) -> anyhow::Result<()> {
    self
      .storage
      .remove_item(key)
      .map_err(|err| {
        anyhow!(
          "localStorage.removeItem({key}) \
           failed: {err:?}"
        )
      })
  }

  fn clear(&self) -> anyhow::Result<()> {
    self.storage.clear().map_err(
      |err| {
        anyhow!(
          "localStorage.clear failed: \
           {err:?}"
        )
      }
    )
  }
}

/// Real storage in a browser, a no-op
/// backend anywhere else (server-side
/// rendering, workers without
/// storage).
pub fn open_storage()
-> Rc<dyn KeyValueStorage> {
  match LocalStorage::from_window() {
    | Some(storage) => {
      tracing::debug!(
        "using window.localStorage"
      );
      Rc::new(storage)
    }
    | None => {
      tracing::warn!(
        "no localStorage available; \
         state will not persist"
      );
      Rc::new(NoopStorage)
    }
  }
}

/// Toggles the `dark` class on
/// `document.documentElement`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentRootTheme;

impl ThemeSink for DocumentRootTheme {
  fn apply(&self, mode: ThemeMode) {
    let Some(root) = web_sys::window()
      .and_then(|window| {
        window.document()
      })
      .and_then(|document| {
        document.document_element()
      })
    else {
      return;
    };

    if let Err(err) = root
      .class_list()
      .toggle_with_force(
        DARK_CLASS,
        mode.is_dark()
      )
    {
      tracing::error!(
        error = ?err,
        "failed toggling theme class"
      );
    }
  }
}
