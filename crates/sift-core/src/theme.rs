use std::fmt;
use std::rc::Rc;

use crate::storage::{
  KeyValueStorage,
  THEME_KEY
};

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
)]
pub enum ThemeMode {
  #[default]
  Light,
  Dark
}

impl ThemeMode {
  pub fn from_dark(dark: bool) -> Self {
    if dark {
      Self::Dark
    } else {
      Self::Light
    }
  }

  pub fn is_dark(self) -> bool {
    self == Self::Dark
  }

  pub fn next(self) -> Self {
    match self {
      | Self::Light => Self::Dark,
      | Self::Dark => Self::Light
    }
  }

  pub fn storage_value(
    self
  ) -> &'static str {
    match self {
      | Self::Light => "light",
      | Self::Dark => "dark"
    }
  }

  /// Anything other than `dark`
  /// reads as light.
  pub fn from_storage_value(
    raw: Option<&str>
  ) -> Self {
    match raw.map(str::trim) {
      | Some("dark") => Self::Dark,
      | _ => Self::Light
    }
  }
}

impl fmt::Display for ThemeMode {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.storage_value())
  }
}

/// Presentation side of the theme,
/// e.g. a class on the document root.
pub trait ThemeSink {
  fn apply(&self, mode: ThemeMode);
}

#[derive(
  Debug, Default, Clone, Copy,
)]
pub struct NoopThemeSink;

impl ThemeSink for NoopThemeSink {
  fn apply(&self, _mode: ThemeMode) {}
}

pub struct ThemeFlag {
  storage: Rc<dyn KeyValueStorage>,
  sink:    Box<dyn ThemeSink>,
  mode:    ThemeMode
}

impl fmt::Debug for ThemeFlag {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.debug_struct("ThemeFlag")
      .field("mode", &self.mode)
      .finish()
  }
}

impl ThemeFlag {
  #[tracing::instrument(skip_all)]
  pub fn load(
    storage: Rc<dyn KeyValueStorage>,
    sink: Box<dyn ThemeSink>
  ) -> Self {
    let stored = match storage
      .get(THEME_KEY)
    {
      | Ok(value) => value,
      | Err(error) => {
        tracing::warn!(
          error = %format!("{error:#}"),
          "failed reading theme; \
           using light"
        );
        None
      }
    };

    let mode =
      ThemeMode::from_storage_value(
        stored.as_deref()
      );
    tracing::debug!(%mode, "loaded theme");
    sink.apply(mode);

    Self {
      storage,
      sink,
      mode
    }
  }

  pub fn mode(&self) -> ThemeMode {
    self.mode
  }

  pub fn is_dark(&self) -> bool {
    self.mode.is_dark()
  }

  #[tracing::instrument(skip(self))]
  pub fn set_dark_mode(
    &mut self,
    dark: bool
  ) {
    self.mode =
      ThemeMode::from_dark(dark);
    if let Err(error) =
      self.storage.set(
        THEME_KEY,
        self.mode.storage_value()
      )
    {
      tracing::error!(
        error = %format!("{error:#}"),
        "failed persisting theme"
      );
    }
    self.sink.apply(self.mode);
  }

  pub fn toggle(&mut self) -> ThemeMode {
    self.set_dark_mode(
      self.mode.next().is_dark()
    );
    self.mode
  }
}
