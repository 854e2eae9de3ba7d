use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::{format_age, format_local};
use crate::task::{Category, Task};
use crate::views;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    /// Rows of id prefix, category, done marker, age and content. Tasks older
    /// than `review_age` that are still unclassified get highlighted.
    #[tracing::instrument(skip(self, out, tasks, now))]
    pub fn write_task_table<W: Write>(
        &self,
        out: W,
        tasks: &[Task],
        now: DateTime<Utc>,
        review_age: Duration,
    ) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Category".to_string(),
            "Done".to_string(),
            "Age".to_string(),
            "Content".to_string(),
        ];

        let cutoff = views::review_cutoff(now, review_age);
        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = self.paint(task.short_id(), "33");
            let category = if views::is_stale(task, cutoff) {
                self.paint(task.category.as_str(), "31")
            } else {
                task.category.to_string()
            };
            let done = if task.completed { "x" } else { "" }.to_string();
            let mut content = task.content.clone();
            if task.notification.is_some() {
                content.push_str(" [!]");
            }

            rows.push(vec![id, category, done, format_age(task.created_at, now), content]);
        }

        write_table(out, headers, rows)
    }

    #[tracing::instrument(skip(self, out, task))]
    pub fn write_task_info<W: Write>(&self, mut out: W, task: &Task) -> anyhow::Result<()> {
        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "content   {}", task.content)?;
        writeln!(out, "category  {}", task.category)?;
        writeln!(out, "completed {}", if task.completed { "yes" } else { "no" })?;
        writeln!(out, "created   {}", format_local(task.created_at))?;

        if let Some(notification) = &task.notification {
            let state = if notification.enabled { "on" } else { "off" };
            let when = DateTime::parse_from_rfc3339(&notification.datetime)
                .map(|dt| format_local(dt.with_timezone(&Utc)))
                .unwrap_or_else(|_| notification.datetime.clone());
            writeln!(out, "notify    {when} ({state})")?;
        }

        Ok(())
    }

    pub fn write_summary<W: Write>(
        &self,
        mut out: W,
        counts: &[(Category, usize)],
        total: usize,
    ) -> anyhow::Result<()> {
        let parts: Vec<String> = counts
            .iter()
            .filter(|(_, n)| *n > 0)
            .map(|(category, n)| format!("{category} {n}"))
            .collect();
        if parts.is_empty() {
            writeln!(out, "{total} tasks")?;
        } else {
            writeln!(out, "{total} tasks ({})", parts.join(", "))?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let last = column_count.saturating_sub(1);
    for (idx, header) in headers.iter().enumerate() {
        if idx == last {
            write!(writer, "{header}")?;
        } else {
            write!(writer, "{:width$} ", header, width = widths[idx])?;
        }
    }
    writeln!(writer)?;

    for (idx, width) in widths.iter().enumerate() {
        let sep = if idx == last { "" } else { " " };
        write!(writer, "{:-<width$}{sep}", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if idx == last {
                write!(writer, "{cell}")?;
                continue;
            }
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
