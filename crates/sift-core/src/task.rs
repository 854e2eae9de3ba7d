use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::iso_timestamp;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Ideas,
    Actions,
    Projects,
    Someday,
    #[default]
    Unclassified,
}

impl Category {
    /// Display order for summaries and pickers.
    pub const ALL: [Category; 5] = [
        Category::Ideas,
        Category::Actions,
        Category::Projects,
        Category::Someday,
        Category::Unclassified,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Ideas => "ideas",
            Category::Actions => "actions",
            Category::Projects => "projects",
            Category::Someday => "someday",
            Category::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == lower)
            .ok_or_else(|| {
                anyhow!("unknown category: {s} (expected ideas, actions, projects, someday or unclassified)")
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub datetime: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,

    pub content: String,

    #[serde(default)]
    pub category: Category,

    #[serde(with = "iso_timestamp")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
}

impl Task {
    /// A freshly captured, unclassified task. The timestamp is truncated to
    /// the millisecond precision it is stored with.
    pub fn new_unclassified(content: String, now: DateTime<Utc>) -> Self {
        Self {
            id: new_task_id(),
            content,
            category: Category::Unclassified,
            created_at: now.trunc_subsecs(3),
            completed: false,
            notification: None,
        }
    }

    pub fn short_id(&self) -> &str {
        self.id.get(..8).unwrap_or(&self.id)
    }
}

pub fn new_task_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// View selector over the task list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Category(Category),
}

impl Filter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Category(category) => task.category == *category,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => f.write_str("all"),
            Filter::Category(category) => category.fmt(f),
        }
    }
}

impl FromStr for Filter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Filter::All);
        }
        s.parse::<Category>().map(Filter::Category)
    }
}

impl From<Category> for Filter {
    fn from(category: Category) -> Self {
        Filter::Category(category)
    }
}
