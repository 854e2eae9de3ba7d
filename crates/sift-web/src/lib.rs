pub mod browser;
pub mod handles;

use sift_core::{
  Category,
  Filter,
  Subscription,
  Task,
  TaskStore,
  ThemeFlag
};
use wasm_bindgen::prelude::*;

use crate::browser::{
  DocumentRootTheme,
  open_storage
};
use crate::handles::HandleSlots;

#[wasm_bindgen(start)]
pub fn start() {
  console_error_panic_hook::set_once();
  wasm_tracing::set_as_global_default();

  tracing::info!(
    "starting Sift web frontend"
  );
}

fn to_js(
  tasks: &[Task]
) -> Result<JsValue, JsValue> {
  serde_wasm_bindgen::to_value(tasks)
    .map_err(JsValue::from)
}

fn js_error(
  err: anyhow::Error
) -> JsValue {
  JsValue::from_str(&format!(
    "{err:#}"
  ))
}

/// One state container per page,
/// driven by UI event handlers.
#[wasm_bindgen]
pub struct SiftApp {
  store:         TaskStore,
  theme:         ThemeFlag,
  subscriptions: HandleSlots<Subscription>
}

#[wasm_bindgen]
impl SiftApp {
  #[wasm_bindgen(constructor)]
  pub fn new() -> SiftApp {
    let storage = open_storage();
    let store =
      TaskStore::create(storage.clone());
    let theme = ThemeFlag::load(
      storage,
      Box::new(DocumentRootTheme)
    );
    SiftApp {
      store,
      theme,
      subscriptions: HandleSlots::default()
    }
  }

  #[wasm_bindgen(js_name = addTask)]
  pub fn add_task(
    &mut self,
    content: &str
  ) -> String {
    self.store.add(content)
  }

  #[wasm_bindgen(js_name = deleteTask)]
  pub fn delete_task(
    &mut self,
    id: &str
  ) {
    self.store.delete(id);
  }

  #[wasm_bindgen(
    js_name = updateTaskCategory
  )]
  pub fn update_task_category(
    &mut self,
    id: &str,
    category: &str
  ) -> Result<(), JsValue> {
    let category: Category =
      category.parse().map_err(js_error)?;
    self.store.set_category(id, category);
    Ok(())
  }

  #[wasm_bindgen(
    js_name = updateTaskContent
  )]
  pub fn update_task_content(
    &mut self,
    id: &str,
    content: &str
  ) {
    self.store.set_content(id, content);
  }

  #[wasm_bindgen(
    js_name = toggleTaskCompletion
  )]
  pub fn toggle_task_completion(
    &mut self,
    id: &str
  ) {
    self.store.toggle_completed(id);
  }

  #[wasm_bindgen(js_name = setNotification)]
  pub fn set_notification(
    &mut self,
    id: &str,
    datetime: Option<String>
  ) {
    self
      .store
      .set_notification(id, datetime);
  }

  #[wasm_bindgen(js_name = setFilter)]
  pub fn set_filter(
    &mut self,
    filter: &str
  ) -> Result<(), JsValue> {
    let filter: Filter =
      filter.parse().map_err(js_error)?;
    self.store.set_filter(filter);
    Ok(())
  }

  #[wasm_bindgen(getter)]
  pub fn filter(&self) -> String {
    self.store.filter().to_string()
  }

  pub fn tasks(
    &self
  ) -> Result<JsValue, JsValue> {
    to_js(self.store.tasks())
  }

  #[wasm_bindgen(js_name = filteredTasks)]
  pub fn filtered_tasks(
    &self
  ) -> Result<JsValue, JsValue> {
    to_js(&self.store.filtered_tasks())
  }

  /// Recomputed against the current
  /// clock on every call.
  #[wasm_bindgen(
    js_name = weeklyReviewTasks
  )]
  pub fn weekly_review_tasks(
    &self
  ) -> Result<JsValue, JsValue> {
    to_js(
      &self.store.weekly_review_tasks()
    )
  }

  #[wasm_bindgen(js_name = taskCount)]
  pub fn task_count(&self) -> usize {
    self.store.task_count()
  }

  #[wasm_bindgen(js_name = isDarkMode)]
  pub fn is_dark_mode(&self) -> bool {
    self.theme.is_dark()
  }

  #[wasm_bindgen(js_name = setDarkMode)]
  pub fn set_dark_mode(
    &mut self,
    dark: bool
  ) {
    self.theme.set_dark_mode(dark);
  }

  /// Calls `callback(tasks)` after
  /// every change. Returns a handle
  /// for `unsubscribe`.
  ///
  /// The call is queued as a microtask,
  /// so the callback runs once the
  /// mutating method has returned and
  /// may read `filteredTasks`,
  /// `weeklyReviewTasks` or `taskCount`
  /// on this object.
  pub fn subscribe(
    &mut self,
    callback: js_sys::Function
  ) -> usize {
    let subscription =
      self.store.subscribe(
        move |tasks: &[Task]| {
          let value = match to_js(tasks)
          {
            | Ok(value) => value,
            | Err(err) => {
              tracing::error!(
                error = ?err,
                "failed encoding tasks \
                 for subscriber"
              );
              return;
            }
          };
          let callback = callback.clone();
          wasm_bindgen_futures::spawn_local(
            async move {
              if let Err(err) = callback
                .call1(&JsValue::NULL, &value)
              {
                tracing::error!(
                  error = ?err,
                  "task subscriber threw"
                );
              }
            }
          );
        }
      );
    self.subscriptions.insert(subscription)
  }

  pub fn unsubscribe(
    &mut self,
    handle: usize
  ) -> bool {
    match self
      .subscriptions
      .release(handle)
    {
      | Some(subscription) => {
        self
          .store
          .unsubscribe(subscription)
      }
      | None => false
    }
  }

  /// Drops every subscriber. The JS
  /// handle is unusable afterwards.
  pub fn dispose(self) {
    self.store.dispose();
  }
}

impl Default for SiftApp {
  fn default() -> Self {
    Self::new()
  }
}
