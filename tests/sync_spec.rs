use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use tally::models::*;
use tally::sync::{
    CacheKey, CacheStore, CacheValue, ListQueryEngine, MutationCoordinator, RemoteError,
    SyncError, TodoRemote,
};

/// In-memory stand-in for the server. Holds authoritative state behind a
/// mutex, counts fetches, and can be switched into a failing mode.
#[derive(Clone, Default)]
struct FakeRemote {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
struct FakeState {
    todos: Vec<DetailedTodo>,
    notes: Vec<NoteWithAuthor>,
    users: Vec<User>,
    fail: bool,
    fetch_count: u32,
}

impl FakeRemote {
    fn new() -> Self {
        Self::default()
    }

    fn fail_next_calls(&self) {
        self.state.lock().unwrap().fail = true;
    }

    fn fetch_count(&self) -> u32 {
        self.state.lock().unwrap().fetch_count
    }

    fn check_failure(&self) -> Result<(), RemoteError> {
        if self.state.lock().unwrap().fail {
            Err(RemoteError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

impl TodoRemote for FakeRemote {
    async fn create_todo(
        &self,
        owner: Uuid,
        input: CreateTodoInput,
    ) -> Result<DetailedTodo, RemoteError> {
        self.check_failure()?;
        let now = Utc::now();
        let todo = DetailedTodo {
            todo: Todo {
                id: RecordId::generate(),
                title: input.title,
                description: input.description.unwrap_or_default(),
                priority: input.priority.unwrap_or_default(),
                user_id: owner,
                created_at: now,
                updated_at: now,
            },
            tags: input
                .tags
                .unwrap_or_default()
                .into_iter()
                .map(|name| Tag {
                    id: Uuid::new_v4(),
                    name,
                })
                .collect(),
            notes: Vec::new(),
            mentions: Vec::new(),
        };
        self.state.lock().unwrap().todos.insert(0, todo.clone());
        Ok(todo)
    }

    async fn update_todo(
        &self,
        id: &RecordId,
        patch: TodoPatch,
    ) -> Result<DetailedTodo, RemoteError> {
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        let todo = state
            .todos
            .iter_mut()
            .find(|t| t.todo.id == *id)
            .ok_or_else(|| RemoteError::NotFound("Todo not found".to_string()))?;
        patch.apply(&mut todo.todo);
        Ok(todo.clone())
    }

    async fn delete_todo(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        let before = state.todos.len();
        state.todos.retain(|t| t.todo.id != *id);
        if state.todos.len() == before {
            return Err(RemoteError::NotFound("Todo not found".to_string()));
        }
        Ok(())
    }

    async fn create_note(
        &self,
        author: Uuid,
        input: CreateNoteInput,
    ) -> Result<NoteWithAuthor, RemoteError> {
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .iter()
            .find(|u| u.id == author)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound("User not found".to_string()))?;
        let note = NoteWithAuthor {
            note: Note {
                id: RecordId::generate(),
                todo_id: input.todo_id,
                user_id: author,
                content: input.content,
                created_at: Utc::now(),
            },
            user,
        };
        state.notes.insert(0, note.clone());
        Ok(note)
    }

    async fn fetch_todo(&self, id: &RecordId) -> Result<DetailedTodo, RemoteError> {
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        state.fetch_count += 1;
        state
            .todos
            .iter()
            .find(|t| t.todo.id == *id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound("Todo not found".to_string()))
    }

    async fn fetch_todos(
        &self,
        query: &TodoListQuery,
    ) -> Result<(Vec<DetailedTodo>, u64), RemoteError> {
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        state.fetch_count += 1;
        let matching: Vec<DetailedTodo> = state
            .todos
            .iter()
            .filter(|t| t.todo.user_id == query.user_id)
            .cloned()
            .collect();
        let total = matching.len() as u64;
        let start = ((query.page.max(1) - 1) * query.limit) as usize;
        let page = matching
            .into_iter()
            .skip(start)
            .take(query.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn fetch_notes(&self, todo_id: &RecordId) -> Result<Vec<NoteWithAuthor>, RemoteError> {
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        state.fetch_count += 1;
        Ok(state
            .notes
            .iter()
            .filter(|n| n.note.todo_id == *todo_id)
            .cloned()
            .collect())
    }

    async fn fetch_users(&self) -> Result<Vec<User>, RemoteError> {
        self.check_failure()?;
        let mut state = self.state.lock().unwrap();
        state.fetch_count += 1;
        Ok(state.users.clone())
    }
}

fn test_user(name: &str, username: &str) -> User {
    User {
        id: Uuid::new_v4(),
        name: name.to_string(),
        username: Some(username.to_string()),
        email: format!("{}@example.com", username),
        created_at: Utc::now(),
    }
}

fn simple_input(title: &str) -> CreateTodoInput {
    CreateTodoInput {
        title: title.to_string(),
        description: None,
        priority: None,
        tags: None,
    }
}

/// A cached page as the view would have rendered it before the mutation.
fn prime_list(cache: &CacheStore, view: &TodoListQuery, todos: Vec<DetailedTodo>) {
    let total = todos.len() as u64;
    cache.write(
        CacheKey::todo_list(view),
        CacheValue::Page(TodoPage {
            todos,
            pagination: Pagination::new(total, view.page, view.limit),
        }),
    );
}

fn read_list(cache: &CacheStore, view: &TodoListQuery) -> TodoPage {
    match cache.read(&CacheKey::todo_list(view)) {
        Some(CacheValue::Page(page)) => page,
        other => panic!("expected a cached page, got {:?}", other),
    }
}

mod create_todo {
    use super::*;

    #[tokio::test]
    async fn replaces_the_placeholder_with_the_authoritative_record() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let coordinator = MutationCoordinator::new(cache.clone(), remote);
        let author = test_user("Alice Smith", "alice");
        let view = TodoListQuery::for_user(author.id);
        prime_list(&cache, &view, Vec::new());

        let created = coordinator
            .create_todo(&view, &author, simple_input("Buy milk"))
            .await
            .expect("create failed");

        assert!(!created.todo.id.is_temporary());

        let page = read_list(&cache, &view);
        assert_eq!(page.todos.len(), 1);
        assert_eq!(page.todos[0].todo.id, created.todo.id);
        assert!(!page.todos.iter().any(|t| t.todo.id.is_temporary()));

        // The entity landed in the cache; the list was invalidated for the
        // next read-through.
        assert!(cache.read(&CacheKey::Todo(created.todo.id.clone())).is_some());
        assert!(cache.read_fresh(&CacheKey::todo_list(&view)).is_none());
    }

    #[tokio::test]
    async fn rolls_back_the_placeholder_on_failure() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let coordinator = MutationCoordinator::new(cache.clone(), remote.clone());
        let author = test_user("Alice Smith", "alice");
        let view = TodoListQuery::for_user(author.id);
        prime_list(&cache, &view, Vec::new());
        let before = read_list(&cache, &view);

        remote.fail_next_calls();
        let err = coordinator
            .create_todo(&view, &author, simple_input("Buy milk"))
            .await
            .expect_err("create should fail");

        assert!(matches!(err, SyncError::Remote(_)));
        assert_eq!(read_list(&cache, &view), before);
    }

    #[tokio::test]
    async fn rejects_invalid_input_without_touching_the_cache() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let coordinator = MutationCoordinator::new(cache.clone(), remote);
        let author = test_user("Alice Smith", "alice");
        let view = TodoListQuery::for_user(author.id);
        prime_list(&cache, &view, Vec::new());

        let err = coordinator
            .create_todo(&view, &author, simple_input(""))
            .await
            .expect_err("validation should fail");

        assert!(matches!(err, SyncError::Validation(_)));
        assert!(read_list(&cache, &view).todos.is_empty());
        assert!(cache.read_fresh(&CacheKey::todo_list(&view)).is_some());
    }
}

mod update_todo {
    use super::*;

    #[tokio::test]
    async fn patches_the_cached_entity_and_list_entry() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let coordinator = MutationCoordinator::new(cache.clone(), remote.clone());
        let author = test_user("Alice Smith", "alice");
        let view = TodoListQuery::for_user(author.id);

        let seeded = remote
            .create_todo(author.id, simple_input("Original"))
            .await
            .unwrap();
        prime_list(&cache, &view, vec![seeded.clone()]);
        cache.write(
            CacheKey::Todo(seeded.todo.id.clone()),
            CacheValue::Todo(seeded.clone()),
        );

        let updated = coordinator
            .update_todo(
                &view,
                &seeded.todo.id,
                TodoPatch {
                    title: Some("Edited".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("update failed");

        assert_eq!(updated.todo.title, "Edited");
        let page = read_list(&cache, &view);
        assert_eq!(page.todos[0].todo.title, "Edited");
        match cache.read(&CacheKey::Todo(seeded.todo.id.clone())) {
            Some(CacheValue::Todo(todo)) => assert_eq!(todo.todo.title, "Edited"),
            other => panic!("expected a cached todo, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn restores_both_keys_on_failure() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let coordinator = MutationCoordinator::new(cache.clone(), remote.clone());
        let author = test_user("Alice Smith", "alice");
        let view = TodoListQuery::for_user(author.id);

        let seeded = remote
            .create_todo(author.id, simple_input("Original"))
            .await
            .unwrap();
        prime_list(&cache, &view, vec![seeded.clone()]);
        cache.write(
            CacheKey::Todo(seeded.todo.id.clone()),
            CacheValue::Todo(seeded.clone()),
        );

        remote.fail_next_calls();
        coordinator
            .update_todo(
                &view,
                &seeded.todo.id,
                TodoPatch {
                    title: Some("Edited".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect_err("update should fail");

        assert_eq!(read_list(&cache, &view).todos[0].todo.title, "Original");
        match cache.read(&CacheKey::Todo(seeded.todo.id.clone())) {
            Some(CacheValue::Todo(todo)) => assert_eq!(todo.todo.title, "Original"),
            other => panic!("expected a cached todo, got {:?}", other),
        }
    }
}

mod delete_todo {
    use super::*;

    #[tokio::test]
    async fn removes_the_entry_and_its_entity_key() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let coordinator = MutationCoordinator::new(cache.clone(), remote.clone());
        let author = test_user("Alice Smith", "alice");
        let view = TodoListQuery::for_user(author.id);

        let seeded = remote
            .create_todo(author.id, simple_input("Doomed"))
            .await
            .unwrap();
        prime_list(&cache, &view, vec![seeded.clone()]);
        cache.write(
            CacheKey::Todo(seeded.todo.id.clone()),
            CacheValue::Todo(seeded.clone()),
        );

        coordinator
            .delete_todo(&view, &seeded.todo.id)
            .await
            .expect("delete failed");

        assert!(read_list(&cache, &view).todos.is_empty());
        assert!(cache.read(&CacheKey::Todo(seeded.todo.id.clone())).is_none());
    }

    #[tokio::test]
    async fn failure_restores_the_original_position() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let coordinator = MutationCoordinator::new(cache.clone(), remote.clone());
        let author = test_user("Alice Smith", "alice");
        let view = TodoListQuery::for_user(author.id);

        let first = remote
            .create_todo(author.id, simple_input("First"))
            .await
            .unwrap();
        let second = remote
            .create_todo(author.id, simple_input("Second"))
            .await
            .unwrap();
        let third = remote
            .create_todo(author.id, simple_input("Third"))
            .await
            .unwrap();
        prime_list(
            &cache,
            &view,
            vec![first.clone(), second.clone(), third.clone()],
        );

        remote.fail_next_calls();
        coordinator
            .delete_todo(&view, &second.todo.id)
            .await
            .expect_err("delete should fail");

        let page = read_list(&cache, &view);
        let ids: Vec<&RecordId> = page.todos.iter().map(|t| &t.todo.id).collect();
        assert_eq!(
            ids,
            vec![&first.todo.id, &second.todo.id, &third.todo.id]
        );
    }
}

mod create_note {
    use super::*;

    #[tokio::test]
    async fn prepends_the_note_everywhere_then_reconciles() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let coordinator = MutationCoordinator::new(cache.clone(), remote.clone());
        let author = test_user("Alice Smith", "alice");
        remote.state.lock().unwrap().users.push(author.clone());
        let view = TodoListQuery::for_user(author.id);

        let seeded = remote
            .create_todo(author.id, simple_input("Discuss"))
            .await
            .unwrap();
        prime_list(&cache, &view, vec![seeded.clone()]);
        cache.write(
            CacheKey::Todo(seeded.todo.id.clone()),
            CacheValue::Todo(seeded.clone()),
        );
        cache.write(
            CacheKey::Notes(seeded.todo.id.clone()),
            CacheValue::Notes(Vec::new()),
        );

        let created = coordinator
            .create_note(
                &view,
                &author,
                CreateNoteInput {
                    todo_id: seeded.todo.id.clone(),
                    content: "let's sync".to_string(),
                },
            )
            .await
            .expect("note failed");

        assert!(!created.note.id.is_temporary());
        match cache.read(&CacheKey::Notes(seeded.todo.id.clone())) {
            Some(CacheValue::Notes(notes)) => {
                assert_eq!(notes.len(), 1);
                assert_eq!(notes[0].note.id, created.note.id);
            }
            other => panic!("expected cached notes, got {:?}", other),
        }
        // All three touched keys were invalidated for the next read-through.
        assert!(cache
            .read_fresh(&CacheKey::Notes(seeded.todo.id.clone()))
            .is_none());
        assert!(cache.read_fresh(&CacheKey::todo_list(&view)).is_none());
        assert!(cache
            .read_fresh(&CacheKey::Todo(seeded.todo.id.clone()))
            .is_none());
    }

    #[tokio::test]
    async fn failure_restores_all_touched_keys() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let coordinator = MutationCoordinator::new(cache.clone(), remote.clone());
        let author = test_user("Alice Smith", "alice");
        remote.state.lock().unwrap().users.push(author.clone());
        let view = TodoListQuery::for_user(author.id);

        let seeded = remote
            .create_todo(author.id, simple_input("Discuss"))
            .await
            .unwrap();
        prime_list(&cache, &view, vec![seeded.clone()]);
        cache.write(
            CacheKey::Notes(seeded.todo.id.clone()),
            CacheValue::Notes(Vec::new()),
        );

        remote.fail_next_calls();
        coordinator
            .create_note(
                &view,
                &author,
                CreateNoteInput {
                    todo_id: seeded.todo.id.clone(),
                    content: "lost".to_string(),
                },
            )
            .await
            .expect_err("note should fail");

        match cache.read(&CacheKey::Notes(seeded.todo.id.clone())) {
            Some(CacheValue::Notes(notes)) => assert!(notes.is_empty()),
            other => panic!("expected cached notes, got {:?}", other),
        }
        assert!(read_list(&cache, &view).todos[0].notes.is_empty());
    }
}

mod overlapping_mutations {
    use super::*;

    /// A snapshot taken while another mutation is pending captures that
    /// mutation's tentative state, so rolling it back restores the
    /// intermediate state rather than the original. Overlapping edits are
    /// neither merged nor queued.
    #[test]
    fn a_later_snapshot_restores_the_intermediate_state() {
        let cache = CacheStore::new();
        let key = CacheKey::Users;
        let original = test_user("Alice Smith", "alice");
        let intermediate = test_user("Bob Jones", "bob");

        cache.write(key.clone(), CacheValue::Users(vec![original]));
        let first = cache.snapshot(&key);
        cache.write(key.clone(), CacheValue::Users(vec![intermediate.clone()]));
        let second = cache.snapshot(&key);
        cache.write(key.clone(), CacheValue::Users(Vec::new()));

        cache.restore(second).expect("restore failed");
        match cache.read(&key) {
            Some(CacheValue::Users(users)) => {
                assert_eq!(users.len(), 1);
                assert_eq!(users[0].id, intermediate.id);
            }
            other => panic!("expected cached users, got {:?}", other),
        }
        cache.discard(first);
    }
}

mod list_queries {
    use super::*;

    #[tokio::test]
    async fn serves_repeat_queries_from_the_cache() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let engine = ListQueryEngine::new(cache.clone(), remote.clone());
        let author = test_user("Alice Smith", "alice");
        remote
            .create_todo(author.id, simple_input("Cached"))
            .await
            .unwrap();

        let view = TodoListQuery::for_user(author.id);
        let first = engine.todos(&view).await.expect("fetch failed");
        let second = engine.todos(&view).await.expect("fetch failed");

        assert_eq!(first, second);
        assert_eq!(remote.fetch_count(), 1);
    }

    #[tokio::test]
    async fn refetches_after_invalidation() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let engine = ListQueryEngine::new(cache.clone(), remote.clone());
        let author = test_user("Alice Smith", "alice");

        let view = TodoListQuery::for_user(author.id);
        engine.todos(&view).await.expect("fetch failed");

        remote
            .create_todo(author.id, simple_input("New arrival"))
            .await
            .unwrap();
        cache.invalidate(&CacheKey::todo_list(&view));

        let page = engine.todos(&view).await.expect("fetch failed");
        assert_eq!(page.todos.len(), 1);
        assert_eq!(remote.fetch_count(), 2);
    }

    #[tokio::test]
    async fn distinct_parameters_use_distinct_entries() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let engine = ListQueryEngine::new(cache, remote.clone());
        let author = test_user("Alice Smith", "alice");
        for i in 0..12 {
            remote
                .create_todo(author.id, simple_input(&format!("Todo {}", i)))
                .await
                .unwrap();
        }

        let page1 = engine
            .todos(&TodoListQuery::for_user(author.id))
            .await
            .expect("fetch failed");
        let page2 = engine
            .todos(&TodoListQuery::for_user(author.id).with_page(2))
            .await
            .expect("fetch failed");

        assert_eq!(page1.todos.len(), 10);
        assert_eq!(page2.todos.len(), 2);
        assert_eq!(page1.pagination.total_pages, 2);
        assert_eq!(remote.fetch_count(), 2);
    }

    #[tokio::test]
    async fn surfaces_remote_failure_on_a_cold_cache() {
        let cache = CacheStore::new();
        let remote = FakeRemote::new();
        let engine = ListQueryEngine::new(cache, remote.clone());
        remote.fail_next_calls();

        let err = engine
            .todos(&TodoListQuery::for_user(Uuid::new_v4()))
            .await
            .expect_err("fetch should fail");
        assert!(matches!(err, SyncError::Remote(_)));
    }
}
