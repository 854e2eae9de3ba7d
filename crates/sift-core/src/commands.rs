use std::io::{self, Write};
use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::cli::{Command, ThemeArg};
use crate::config::Config;
use crate::datetime::{parse_when, to_iso_string};
use crate::render::Renderer;
use crate::storage::KeyValueStorage;
use crate::store::TaskStore;
use crate::task::{Category, Filter};
use crate::theme::{NoopThemeSink, ThemeFlag};
use crate::views;

#[instrument(skip(storage, cfg, renderer, command))]
pub fn dispatch(
    storage: Rc<dyn KeyValueStorage>,
    cfg: &Config,
    renderer: &Renderer,
    command: Option<Command>,
) -> anyhow::Result<()> {
    let now = Utc::now();
    let mut out = io::stdout().lock();

    if let Some(Command::Theme { mode }) = &command {
        return cmd_theme(storage, &mut out, *mode);
    }

    let mut store = TaskStore::create(storage).with_review_age(cfg.review_age()?);
    store.set_filter(cfg.default_filter()?);
    debug!(?command, "dispatching command");

    let result = match command {
        None => cmd_list(&mut store, renderer, &mut out, None, now),
        Some(Command::Add { content }) => cmd_add(&mut store, &mut out, &content, now),
        Some(Command::List { filter }) => {
            cmd_list(&mut store, renderer, &mut out, filter.as_deref(), now)
        }
        Some(Command::Review) => cmd_review(&store, renderer, &mut out, now),
        Some(Command::Count) => {
            writeln!(out, "{}", store.task_count())?;
            Ok(())
        }
        Some(Command::Info { id }) => cmd_info(&store, renderer, &mut out, &id),
        Some(Command::Move { id, category }) => cmd_move(&mut store, &mut out, &id, &category),
        Some(Command::Edit { id, content }) => cmd_edit(&mut store, &mut out, &id, &content),
        Some(Command::Done { id }) => cmd_done(&mut store, &mut out, &id),
        Some(Command::Delete { id }) => cmd_delete(&mut store, &mut out, &id),
        Some(Command::Notify { id, when, clear }) => {
            cmd_notify(&mut store, &mut out, &id, when.as_deref(), clear, now)
        }
        Some(Command::Theme { .. }) => Ok(()),
    };

    store.dispose();
    result
}

fn cmd_add<W: Write>(
    store: &mut TaskStore,
    out: &mut W,
    words: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let content = words.join(" ");
    if content.trim().is_empty() {
        anyhow::bail!("task content cannot be empty");
    }
    let id = store.add_at(content, now);
    info!(id = %id, "command add");
    writeln!(out, "Captured task {}.", short(&id))?;
    Ok(())
}

fn cmd_list<W: Write>(
    store: &mut TaskStore,
    renderer: &Renderer,
    out: &mut W,
    filter: Option<&str>,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    if let Some(raw) = filter {
        store.set_filter(raw.parse::<Filter>()?);
    }

    let snapshot = store.snapshot(now);
    if snapshot.filtered.is_empty() {
        writeln!(out, "No tasks ({}).", snapshot.filter)?;
        return Ok(());
    }

    renderer.write_task_table(&mut *out, &snapshot.filtered, now, store.review_age())?;
    writeln!(out)?;
    renderer.write_summary(&mut *out, &views::category_counts(store.tasks()), snapshot.count)?;
    if !snapshot.weekly_review.is_empty() {
        writeln!(
            out,
            "{} unclassified task(s) due for review; run `sift review`.",
            snapshot.weekly_review.len()
        )?;
    }
    Ok(())
}

fn cmd_review<W: Write>(
    store: &TaskStore,
    renderer: &Renderer,
    out: &mut W,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let stale = store.weekly_review_tasks_at(now);
    if stale.is_empty() {
        writeln!(out, "Nothing to review.")?;
        return Ok(());
    }
    renderer.write_task_table(&mut *out, &stale, now, store.review_age())?;
    Ok(())
}

fn cmd_info<W: Write>(
    store: &TaskStore,
    renderer: &Renderer,
    out: &mut W,
    token: &str,
) -> anyhow::Result<()> {
    let id = store.resolve_id(token)?;
    if let Some(task) = store.get(&id) {
        renderer.write_task_info(&mut *out, task)?;
    }
    Ok(())
}

fn cmd_move<W: Write>(
    store: &mut TaskStore,
    out: &mut W,
    token: &str,
    category: &str,
) -> anyhow::Result<()> {
    let category: Category = category.parse()?;
    let id = store.resolve_id(token)?;
    store.set_category(&id, category);
    writeln!(out, "Moved task {} to {category}.", short(&id))?;
    Ok(())
}

fn cmd_edit<W: Write>(
    store: &mut TaskStore,
    out: &mut W,
    token: &str,
    words: &[String],
) -> anyhow::Result<()> {
    let content = words.join(" ");
    if content.trim().is_empty() {
        anyhow::bail!("task content cannot be empty");
    }
    let id = store.resolve_id(token)?;
    store.set_content(&id, content);
    writeln!(out, "Updated task {}.", short(&id))?;
    Ok(())
}

fn cmd_done<W: Write>(store: &mut TaskStore, out: &mut W, token: &str) -> anyhow::Result<()> {
    let id = store.resolve_id(token)?;
    store.toggle_completed(&id);
    let state = match store.get(&id) {
        Some(task) if task.completed => "completed",
        _ => "reopened",
    };
    writeln!(out, "Task {} {state}.", short(&id))?;
    Ok(())
}

fn cmd_delete<W: Write>(store: &mut TaskStore, out: &mut W, token: &str) -> anyhow::Result<()> {
    let id = store.resolve_id(token)?;
    store.delete(&id);
    writeln!(out, "Deleted task {}.", short(&id))?;
    Ok(())
}

fn cmd_notify<W: Write>(
    store: &mut TaskStore,
    out: &mut W,
    token: &str,
    when: Option<&str>,
    clear: bool,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    let id = store.resolve_id(token)?;
    match when {
        Some(expr) if !clear => {
            let at = parse_when(expr, now)?;
            let datetime = to_iso_string(at);
            store.set_notification(&id, Some(datetime.clone()));
            writeln!(out, "Notification for task {} set to {datetime}.", short(&id))?;
        }
        _ => {
            store.set_notification(&id, None);
            writeln!(out, "Notification for task {} cleared.", short(&id))?;
        }
    }
    Ok(())
}

fn cmd_theme<W: Write>(
    storage: Rc<dyn KeyValueStorage>,
    out: &mut W,
    mode: Option<ThemeArg>,
) -> anyhow::Result<()> {
    let mut theme = ThemeFlag::load(storage, Box::new(NoopThemeSink));
    match mode {
        None => {}
        Some(ThemeArg::Dark) => theme.set_dark_mode(true),
        Some(ThemeArg::Light) => theme.set_dark_mode(false),
        Some(ThemeArg::Toggle) => {
            theme.toggle();
        }
    }
    writeln!(out, "{}", theme.mode())?;
    Ok(())
}

fn short(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
