pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod render;
pub mod storage;
pub mod store;
pub mod task;
pub mod theme;
pub mod views;

use std::ffi::OsString;
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use storage::{
  FileStorage,
  KeyValueStorage,
  MemoryStorage,
  NoopStorage
};
pub use store::{
  Subscription,
  TaskStore
};
pub use task::{
  Category,
  Filter,
  Notification,
  Task
};
pub use theme::{
  NoopThemeSink,
  ThemeFlag,
  ThemeMode,
  ThemeSink
};
pub use views::ViewSnapshot;

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let cli =
    cli::GlobalCli::parse_from(raw_args);

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting sift CLI"
  );

  let mut cfg = config::Config::load(
    cli.siftrc.as_deref()
  )?;
  cfg.apply_overrides(
    cli
      .rc_overrides
      .into_iter()
      .map(|kv| (kv.key, kv.value))
  );
  debug!(files = ?cfg.loaded_files, "configuration loaded");

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let storage = FileStorage::open(
    &data_dir
  )
  .with_context(|| {
    format!(
      "failed to open storage at {}",
      data_dir.display()
    )
  })?;

  let renderer =
    render::Renderer::new(&cfg)?;

  commands::dispatch(
    Rc::new(storage),
    &cfg,
    &renderer,
    cli.command
  )?;

  info!("done");
  Ok(())
}
