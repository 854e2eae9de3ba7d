use std::fmt;
use std::rc::Rc;

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, warn};

use crate::storage::{KeyValueStorage, TASKS_KEY};
use crate::task::{Category, Filter, Notification, Task};
use crate::views::{self, ViewSnapshot};

type Listener = Box<dyn FnMut(&[Task])>;

/// Handle returned by [`TaskStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(u64);

/// Owns the canonical task list. Every mutation that changes the list writes
/// the whole list back to storage and then runs the listeners in
/// registration order.
pub struct TaskStore {
    storage: Rc<dyn KeyValueStorage>,
    tasks: Vec<Task>,
    filter: Filter,
    review_age: Duration,
    listeners: Vec<(Subscription, Listener)>,
    next_subscription: u64,
}

impl fmt::Debug for TaskStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStore")
            .field("tasks", &self.tasks.len())
            .field("filter", &self.filter)
            .field("review_age_days", &self.review_age.num_days())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl TaskStore {
    /// Loads the persisted list. Missing, unreadable or malformed data all
    /// start the store empty.
    #[tracing::instrument(skip(storage))]
    pub fn create(storage: Rc<dyn KeyValueStorage>) -> Self {
        let tasks = load_tasks(storage.as_ref());
        info!(count = tasks.len(), "task store created");
        Self {
            storage,
            tasks,
            filter: Filter::All,
            review_age: views::default_review_age(),
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn with_review_age(mut self, review_age: Duration) -> Self {
        self.review_age = review_age;
        self
    }

    #[tracing::instrument(skip(self))]
    pub fn dispose(mut self) {
        let listeners = self.listeners.len();
        self.listeners.clear();
        info!(count = self.tasks.len(), listeners, "task store disposed");
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn review_age(&self) -> Duration {
        self.review_age
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        debug!(%filter, "active filter changed");
        self.filter = filter;
    }

    pub fn subscribe<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut(&[Task]) + 'static,
    {
        let handle = Subscription(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((handle, Box::new(listener)));
        handle
    }

    pub fn unsubscribe(&mut self, handle: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(h, _)| *h != handle);
        self.listeners.len() != before
    }

    pub fn add(&mut self, content: impl Into<String>) -> String {
        self.add_at(content, Utc::now())
    }

    #[tracing::instrument(skip(self, content, now))]
    pub fn add_at(&mut self, content: impl Into<String>, now: DateTime<Utc>) -> String {
        let task = Task::new_unclassified(content.into(), now);
        let id = task.id.clone();
        self.tasks.insert(0, task);
        info!(id = %id, "task added");
        self.commit();
        id
    }

    #[tracing::instrument(skip(self))]
    pub fn delete(&mut self, id: &str) {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            debug!("delete ignored; no such task");
            return;
        }
        info!("task deleted");
        self.commit();
    }

    #[tracing::instrument(skip(self))]
    pub fn set_category(&mut self, id: &str, category: Category) {
        self.update(id, |t| t.category = category);
    }

    #[tracing::instrument(skip(self, content))]
    pub fn set_content(&mut self, id: &str, content: impl Into<String>) {
        let content = content.into();
        self.update(id, move |t| t.content = content);
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle_completed(&mut self, id: &str) {
        self.update(id, |t| t.completed = !t.completed);
    }

    /// `Some` schedules an enabled notification; `None` removes it entirely.
    #[tracing::instrument(skip(self))]
    pub fn set_notification(&mut self, id: &str, datetime: Option<String>) {
        self.update(id, move |t| {
            t.notification = datetime.map(|datetime| Notification {
                datetime,
                enabled: true,
            });
        });
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve_id(&self, token: &str) -> anyhow::Result<String> {
        let token = token.trim();
        if token.is_empty() {
            return Err(anyhow!("task id cannot be empty"));
        }
        if let Some(task) = self.get(token) {
            return Ok(task.id.clone());
        }

        let mut matches = self.tasks.iter().filter(|t| t.id.starts_with(token));
        let first = matches
            .next()
            .ok_or_else(|| anyhow!("no task matches id {token}"))?;
        if matches.next().is_some() {
            return Err(anyhow!("id prefix {token} is ambiguous"));
        }
        Ok(first.id.clone())
    }

    pub fn filtered_tasks(&self) -> Vec<Task> {
        views::filtered_tasks(&self.tasks, self.filter)
    }

    pub fn weekly_review_tasks(&self) -> Vec<Task> {
        self.weekly_review_tasks_at(Utc::now())
    }

    pub fn weekly_review_tasks_at(&self, now: DateTime<Utc>) -> Vec<Task> {
        views::weekly_review_tasks(&self.tasks, now, self.review_age)
    }

    pub fn task_count(&self) -> usize {
        views::task_count(&self.tasks)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> ViewSnapshot {
        ViewSnapshot::compute(&self.tasks, self.filter, now, self.review_age)
    }

    fn update<F>(&mut self, id: &str, apply: F)
    where
        F: FnOnce(&mut Task),
    {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!("update ignored; no such task");
            return;
        };
        apply(task);
        self.commit();
    }

    fn commit(&mut self) {
        self.persist();
        for (_, listener) in self.listeners.iter_mut() {
            listener(&self.tasks);
        }
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.tasks) {
            Ok(json) => json,
            Err(err) => {
                error!(error = %err, "failed serializing tasks");
                return;
            }
        };
        if let Err(err) = self.storage.set(TASKS_KEY, &json) {
            error!(error = %format!("{err:#}"), count = self.tasks.len(), "failed persisting tasks");
        }
    }
}

fn load_tasks(storage: &dyn KeyValueStorage) -> Vec<Task> {
    let raw = match storage.get(TASKS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            debug!("no persisted tasks; starting empty");
            return Vec::new();
        }
        Err(err) => {
            warn!(error = %format!("{err:#}"), "failed reading persisted tasks; starting empty");
            return Vec::new();
        }
    };

    let records = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
        Ok(records) => records,
        Err(err) => {
            error!(
                error = %err,
                bytes = raw.len(),
                "persisted tasks are malformed; starting empty, next change replaces them"
            );
            return Vec::new();
        }
    };

    let total = records.len();
    let tasks: Vec<Task> = records
        .into_iter()
        .enumerate()
        .filter_map(|(index, record)| match serde_json::from_value::<Task>(record) {
            Ok(task) => Some(task),
            Err(err) => {
                warn!(index, error = %err, "skipping unreadable task record");
                None
            }
        })
        .collect();
    if tasks.len() < total {
        warn!(kept = tasks.len(), total, "some persisted tasks were dropped on load");
    }
    tasks
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::{Duration, TimeZone, Utc};

    use super::TaskStore;
    use crate::storage::{KeyValueStorage, MemoryStorage, TASKS_KEY};
    use crate::task::{Category, Filter, Notification, Task};

    fn empty_store() -> (TaskStore, MemoryStorage) {
        let storage = MemoryStorage::new();
        let store = TaskStore::create(Rc::new(storage.clone()));
        (store, storage)
    }

    #[test]
    fn add_prepends_unclassified_task() {
        let (mut store, _) = empty_store();
        let first = store.add("first");
        let second = store.add("Buy milk");

        assert_eq!(store.task_count(), 2);
        let head = &store.tasks()[0];
        assert_eq!(head.id, second);
        assert_eq!(head.content, "Buy milk");
        assert_eq!(head.category, Category::Unclassified);
        assert!(!head.completed);
        assert_eq!(store.tasks()[1].id, first);
    }

    #[test]
    fn delete_removes_only_matching_task() {
        let (mut store, _) = empty_store();
        let keep = store.add("keep");
        let drop = store.add("drop");

        store.delete(&drop);
        assert_eq!(store.task_count(), 1);
        assert!(store.get(&drop).is_none());
        assert!(store.get(&keep).is_some());

        let before = store.tasks().to_vec();
        store.delete("missing");
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn recategorize_is_idempotent() {
        let (mut store, _) = empty_store();
        let id = store.add("Buy milk");
        store.set_category(&id, Category::Actions);
        let once = store.tasks().to_vec();
        store.set_category(&id, Category::Actions);
        assert_eq!(store.tasks(), once.as_slice());
    }

    #[test]
    fn buy_milk_scenario() {
        let (mut store, _) = empty_store();
        let id = store.add("Buy milk");
        store.set_category(&id, Category::Actions);

        store.set_filter(Filter::Category(Category::Actions));
        assert!(store.filtered_tasks().iter().any(|t| t.id == id));
        store.set_filter(Filter::Category(Category::Ideas));
        assert!(store.filtered_tasks().is_empty());
        store.set_filter(Filter::All);
        assert_eq!(store.filtered_tasks().len(), 1);
    }

    #[test]
    fn notification_set_then_cleared() {
        let (mut store, storage) = empty_store();
        let id = store.add("call dentist");

        store.set_notification(&id, Some("2025-01-01T10:00:00Z".to_string()));
        assert_eq!(
            store.get(&id).and_then(|t| t.notification.clone()),
            Some(Notification {
                datetime: "2025-01-01T10:00:00Z".to_string(),
                enabled: true,
            })
        );

        store.set_notification(&id, None);
        assert_eq!(store.get(&id).and_then(|t| t.notification.clone()), None);
        let raw = storage.get(TASKS_KEY).expect("get").expect("persisted");
        assert!(!raw.contains("notification"));
    }

    #[test]
    fn edits_and_toggles() {
        let (mut store, _) = empty_store();
        let id = store.add("draft");
        store.set_content(&id, "final");
        store.toggle_completed(&id);
        let task = store.get(&id).expect("task");
        assert_eq!(task.content, "final");
        assert!(task.completed);
        store.toggle_completed(&id);
        assert!(!store.get(&id).expect("task").completed);
    }

    #[test]
    fn every_change_is_persisted() {
        let (mut store, storage) = empty_store();
        let id = store.add("persist me");
        store.set_category(&id, Category::Someday);

        let raw = storage.get(TASKS_KEY).expect("get").expect("persisted");
        let persisted: Vec<Task> = serde_json::from_str(&raw).expect("parse");
        assert_eq!(persisted, store.tasks());
    }

    #[test]
    fn reload_yields_equal_list() {
        let storage = MemoryStorage::new();
        let mut store = TaskStore::create(Rc::new(storage.clone()));
        let a = store.add("one");
        store.add("two");
        store.set_category(&a, Category::Projects);
        store.set_notification(&a, Some("2025-06-01T09:00:00.000Z".to_string()));
        let expected = store.tasks().to_vec();
        store.dispose();

        let reopened = TaskStore::create(Rc::new(storage));
        assert_eq!(reopened.tasks(), expected.as_slice());
    }

    #[test]
    fn malformed_payload_falls_back_to_empty() {
        let storage = MemoryStorage::with_entries([(TASKS_KEY, "{not json")]);
        let mut store = TaskStore::create(Rc::new(storage.clone()));
        assert_eq!(store.task_count(), 0);

        store.add("fresh start");
        let raw = storage.get(TASKS_KEY).expect("get").expect("persisted");
        let persisted: Vec<Task> = serde_json::from_str(&raw).expect("valid json now");
        assert_eq!(persisted.len(), 1);
    }

    #[test]
    fn listeners_run_on_changes_only() {
        let (mut store, _) = empty_store();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let handle = store.subscribe(move |tasks| sink.borrow_mut().push(tasks.len()));

        let id = store.add("a");
        store.set_category(&id, Category::Ideas);
        store.set_category("missing", Category::Ideas);
        store.delete("missing");
        store.delete(&id);
        assert_eq!(*seen.borrow(), vec![1, 1, 0]);

        assert!(store.unsubscribe(handle));
        assert!(!store.unsubscribe(handle));
        store.add("b");
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn unknown_id_does_not_touch_storage() {
        let (mut store, storage) = empty_store();
        store.toggle_completed("nope");
        store.set_content("nope", "x");
        store.set_notification("nope", None);
        assert!(storage.is_empty());
    }

    #[test]
    fn resolve_id_by_prefix() {
        let storage = MemoryStorage::with_entries([(
            TASKS_KEY,
            r#"[
              {"id":"abc111","content":"x","category":"ideas","createdAt":"2025-01-01T00:00:00.000Z","completed":false},
              {"id":"abc222","content":"y","category":"ideas","createdAt":"2025-01-01T00:00:00.000Z","completed":false},
              {"id":"def333","content":"z","category":"ideas","createdAt":"2025-01-01T00:00:00.000Z","completed":false}
            ]"#,
        )]);
        let store = TaskStore::create(Rc::new(storage));
        assert_eq!(store.resolve_id("def").expect("unique"), "def333");
        assert_eq!(store.resolve_id("abc222").expect("exact"), "abc222");
        assert!(store.resolve_id("abc").is_err());
        assert!(store.resolve_id("zzz").is_err());
    }

    #[test]
    fn snapshot_uses_configured_review_age() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 10, 9, 0, 0)
            .single()
            .expect("valid now");
        let (store, _) = empty_store();
        let mut store = store.with_review_age(Duration::days(3));
        store.add_at("old enough", now - Duration::days(4));
        store.add_at("too new", now - Duration::days(2));

        let snap = store.snapshot(now);
        assert_eq!(snap.count, 2);
        assert_eq!(snap.filtered.len(), 2);
        assert_eq!(snap.weekly_review.len(), 1);
        assert_eq!(snap.weekly_review[0].content, "old enough");
    }

    #[test]
    fn huge_review_age_yields_empty_review() {
        let (store, _) = empty_store();
        let mut store = store.with_review_age(Duration::days(200_000_000));
        store.add_at("ancient", Utc::now() - Duration::days(365));
        assert!(store.weekly_review_tasks().is_empty());
    }

    #[test]
    fn unreadable_records_are_skipped_not_fatal() {
        let storage = MemoryStorage::new();
        storage
            .set(
                TASKS_KEY,
                r#"[
                    {"id":"keep","content":"Buy milk","category":"actions","createdAt":"2026-03-01T10:00:00.000Z","completed":false},
                    {"id":"bad-cat","content":"x","category":"chores","createdAt":"2026-03-01T10:00:00.000Z"},
                    {"id":"bad-date","content":"y","category":"ideas","createdAt":"yesterday"}
                ]"#,
            )
            .expect("seed");
        let store = TaskStore::create(Rc::new(storage));
        assert_eq!(store.task_count(), 1);
        assert_eq!(store.tasks()[0].id, "keep");
        assert_eq!(store.tasks()[0].category, Category::Actions);
    }
}
