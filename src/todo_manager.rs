use crate::models::{NewTodo, StoreData, Todo, TodoError, TodoPatch};
use crate::storage::Storage;
use std::sync::{Arc, Mutex, PoisonError};

/// Read-modify-write operations against a single store.
pub struct TodoManager {
    storage: Box<dyn Storage>,
}

impl TodoManager {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &dyn Storage {
        &*self.storage
    }

    fn load(&self) -> Result<StoreData, TodoError> {
        self.storage.load().map_err(|e| {
            tracing::warn!(store = %self.storage.location().display(), error = %e, "store unavailable");
            TodoError::StoreUnavailable(e.to_string())
        })
    }

    fn save(&self, data: &StoreData) -> Result<(), TodoError> {
        self.storage.save(data).map_err(|e| {
            tracing::error!(store = %self.storage.location().display(), error = %e, "store write failed");
            TodoError::StoreWriteFailed(e.to_string())
        })
    }

    pub fn list(&self) -> Result<Vec<Todo>, TodoError> {
        Ok(self.load()?.todos)
    }

    pub fn create(&self, input: NewTodo) -> Result<Todo, TodoError> {
        let mut data = self.load()?;
        let todo = Todo::new(data.allocate_id()?, input)?;
        data.todos.push(todo.clone());
        self.save(&data)?;

        tracing::info!(id = todo.id, name = %todo.name, "todo created");
        Ok(todo)
    }

    pub fn update(&self, id: u64, patch: TodoPatch) -> Result<Todo, TodoError> {
        let mut data = self.load()?;
        let index = data.position(id).ok_or(TodoError::NotFound(id))?;

        let mut todo = data.todos[index].clone();
        todo.apply(patch)?;
        data.todos[index] = todo.clone();
        self.save(&data)?;

        tracing::info!(id, "todo updated");
        Ok(todo)
    }

    pub fn delete(&self, id: u64) -> Result<Todo, TodoError> {
        let mut data = self.load()?;
        let index = data.position(id).ok_or(TodoError::NotFound(id))?;

        let removed = data.todos.remove(index);
        self.save(&data)?;

        tracing::info!(id, "todo deleted");
        Ok(removed)
    }
}

/// Shared handle to the one `TodoManager` a process owns.
///
/// Every call takes the same lock for its whole read-modify-write cycle, so
/// concurrent requests are applied one after another and none is lost. The
/// blocking store I/O runs on tokio's blocking pool.
#[derive(Clone)]
pub struct TodoStore {
    inner: Arc<Mutex<TodoManager>>,
}

impl TodoStore {
    pub fn new(storage: Box<dyn Storage>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TodoManager::new(storage))),
        }
    }

    async fn run<T, F>(&self, op: F) -> Result<T, TodoError>
    where
        T: Send + 'static,
        F: FnOnce(&TodoManager) -> Result<T, TodoError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            // The manager caches nothing between calls, so a panic elsewhere leaves it usable.
            let manager = inner.lock().unwrap_or_else(PoisonError::into_inner);
            op(&manager)
        })
        .await
        .map_err(|e| TodoError::Internal(format!("Store task failed: {}", e)))?
    }

    pub async fn list(&self) -> Result<Vec<Todo>, TodoError> {
        self.run(|m| m.list()).await
    }

    pub async fn create(&self, input: NewTodo) -> Result<Todo, TodoError> {
        self.run(move |m| m.create(input)).await
    }

    pub async fn update(&self, id: u64, patch: TodoPatch) -> Result<Todo, TodoError> {
        self.run(move |m| m.update(id, patch)).await
    }

    pub async fn delete(&self, id: u64) -> Result<Todo, TodoError> {
        self.run(move |m| m.delete(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::{sample_store, TestStore};
    use crate::storage::StorageType;

    fn manager_with(data: Option<StoreData>) -> (TodoManager, tempfile::TempDir) {
        let (storage, dir) = TestStore::new(StorageType::Json).into_parts();
        if let Some(data) = data {
            storage.save(&data).unwrap();
        }
        (TodoManager::new(storage), dir)
    }

    fn new_todo(name: &str) -> NewTodo {
        NewTodo {
            name: name.to_string(),
            description: None,
            client_token: None,
        }
    }

    #[test]
    fn test_list_empty_store() {
        let (manager, _dir) = manager_with(None);
        assert!(manager.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_missing_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = crate::storage::create_storage(
            StorageType::Json,
            &temp_dir.path().join("absent.json"),
        );
        let manager = TodoManager::new(storage);
        assert!(matches!(
            manager.list(),
            Err(TodoError::StoreUnavailable(_))
        ));
        assert!(matches!(
            manager.create(new_todo("x")),
            Err(TodoError::StoreUnavailable(_))
        ));
    }

    #[test]
    fn test_create_assigns_next_id() {
        let mut data = sample_store();
        data.todos.truncate(2);
        data.next_id = 3;
        let (manager, _dir) = manager_with(Some(data));

        let todo = manager.create(new_todo("Buy milk")).unwrap();
        assert_eq!(todo.id, 3);
        assert!(!todo.is_completed);
        assert_eq!(manager.list().unwrap().len(), 3);
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let (manager, _dir) = manager_with(Some(sample_store()));
        manager.delete(1).unwrap();
        let todo = manager.create(new_todo("Fresh")).unwrap();

        assert_eq!(todo.id, 4);
        let ids: Vec<u64> = manager.list().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);

        // Deleting the highest id must not free it either
        manager.delete(4).unwrap();
        assert_eq!(manager.create(new_todo("Later")).unwrap().id, 5);
    }

    #[test]
    fn test_update_only_completion() {
        let (manager, _dir) = manager_with(Some(sample_store()));
        let before = manager.list().unwrap()[1].clone();

        let updated = manager.update(2, TodoPatch::completed()).unwrap();
        assert!(updated.is_completed);
        assert_eq!(updated.name, before.name);
        assert_eq!(updated.description, before.description);
        assert_eq!(manager.list().unwrap()[1], updated);
    }

    #[test]
    fn test_update_missing_id_leaves_store_untouched() {
        let (manager, _dir) = manager_with(Some(sample_store()));
        let before = manager.storage().load().unwrap();

        let result = manager.update(42, TodoPatch::completed());
        assert!(matches!(result, Err(TodoError::NotFound(42))));
        assert_eq!(manager.storage().load().unwrap(), before);
    }

    #[test]
    fn test_update_rejects_blank_name() {
        let (manager, _dir) = manager_with(Some(sample_store()));
        let patch = TodoPatch {
            name: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            manager.update(1, patch),
            Err(TodoError::InvalidTodo(_))
        ));
        assert_eq!(manager.list().unwrap()[0].name, "Write report");
    }

    #[test]
    fn test_delete_preserves_order() {
        let (manager, _dir) = manager_with(Some(sample_store()));
        let removed = manager.delete(2).unwrap();
        assert_eq!(removed.id, 2);

        let names: Vec<String> = manager.list().unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["Write report", "Water plants"]);
        assert!(matches!(manager.delete(2), Err(TodoError::NotFound(2))));
    }

    #[tokio::test]
    async fn test_store_serializes_concurrent_creates() {
        let (storage, _dir) = TestStore::new(StorageType::Json).into_parts();
        let store = TodoStore::new(storage);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.create(new_todo(&format!("todo {}", i))).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let mut ids: Vec<u64> = store.list().await.unwrap().iter().map(|t| t.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_max_id_store_rejects_create_and_stays_usable() {
        let test_store = TestStore::new(StorageType::Json);
        std::fs::write(
            test_store.storage().location(),
            r#"[{"id":18446744073709551615,"name":"big"}]"#,
        )
        .unwrap();
        let (storage, _dir) = test_store.into_parts();
        let store = TodoStore::new(storage);

        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(matches!(
            store.create(new_todo("one more")).await,
            Err(TodoError::StoreUnavailable(_))
        ));
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    /// Panics on its first load, then behaves like an empty store.
    struct PanicOnceStorage {
        panicked: std::sync::atomic::AtomicBool,
        path: std::path::PathBuf,
    }

    impl Storage for PanicOnceStorage {
        fn load(&self) -> Result<StoreData, crate::storage::StorageError> {
            if !self.panicked.swap(true, std::sync::atomic::Ordering::SeqCst) {
                panic!("load blew up");
            }
            Ok(StoreData::new())
        }

        fn save(&self, _data: &StoreData) -> Result<(), crate::storage::StorageError> {
            Ok(())
        }

        fn init(&self, _force: bool) -> Result<(), crate::storage::StorageError> {
            Ok(())
        }

        fn location(&self) -> &std::path::Path {
            &self.path
        }
    }

    #[tokio::test]
    async fn test_store_recovers_after_panicking_operation() {
        let store = TodoStore::new(Box::new(PanicOnceStorage {
            panicked: std::sync::atomic::AtomicBool::new(false),
            path: std::path::PathBuf::from("panic-once.json"),
        }));

        assert!(matches!(store.list().await, Err(TodoError::Internal(_))));
        assert!(store.list().await.unwrap().is_empty());
        assert_eq!(store.create(new_todo("after")).await.unwrap().id, 1);
    }
}
