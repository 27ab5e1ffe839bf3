//! Orchestration of optimistic mutations: snapshot, tentative write,
//! remote submission, then reconcile or roll back.

use chrono::Utc;
use uuid::Uuid;

use crate::models::{
    CreateNoteInput, CreateTodoInput, DetailedTodo, Note, NoteWithAuthor, RecordId, Tag, Todo,
    TodoListQuery, TodoPage, TodoPatch, User,
};

use super::{CacheKey, CacheStore, CacheValue, RemoteError, SnapshotToken, SyncError, TodoRemote};

/// Lifecycle of one mutation invocation. `Succeeded` and `Failed` are both
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Pending,
    Succeeded,
    Failed,
}

/// One in-flight mutation: its phase plus the snapshots taken before the
/// tentative write. Consumed by exactly one of `commit` or `roll_back`.
struct InFlight {
    phase: MutationPhase,
    snapshots: Vec<SnapshotToken>,
}

impl InFlight {
    /// Capture the pre-mutation state of every affected key.
    fn begin(cache: &CacheStore, keys: &[CacheKey]) -> Self {
        Self {
            phase: MutationPhase::Pending,
            snapshots: keys.iter().map(|key| cache.snapshot(key)).collect(),
        }
    }

    /// The mutation landed: the snapshots are no longer needed.
    fn commit(mut self, cache: &CacheStore) -> MutationPhase {
        for token in self.snapshots.drain(..) {
            cache.discard(token);
        }
        self.phase = MutationPhase::Succeeded;
        self.phase
    }

    /// The mutation failed: restore every snapshotted key. All snapshots
    /// are attempted even if one is lost; a lost snapshot surfaces as
    /// [`SyncError::StateCorruption`] after its key was force-invalidated.
    fn roll_back(mut self, cache: &CacheStore) -> Result<MutationPhase, SyncError> {
        self.phase = MutationPhase::Failed;
        let mut corruption = None;
        for token in self.snapshots.drain(..) {
            if let Err(err) = cache.restore(token) {
                corruption = Some(err);
            }
        }
        match corruption {
            Some(err) => Err(err),
            None => Ok(self.phase),
        }
    }
}

/// Applies mutations optimistically against the shared [`CacheStore`] and
/// reconciles them with the remote collaborator.
///
/// At most one mutation is assumed in flight per entity. A second mutation
/// started before the first resolves snapshots the already-optimistic
/// intermediate state; its rollback then restores that intermediate state,
/// not the original. This is a known, accepted limitation — overlapping
/// edits are neither merged nor queued.
///
/// A submitted mutation is not cancellable: if the caller loses interest,
/// the terminal transition and its cache writes still happen when the
/// remote call eventually resolves. The cache, not the view, is the durable
/// target.
pub struct MutationCoordinator<R> {
    cache: CacheStore,
    remote: R,
}

impl<R: TodoRemote> MutationCoordinator<R> {
    pub fn new(cache: CacheStore, remote: R) -> Self {
        Self { cache, remote }
    }

    /// Create a todo. The rendered list `view` immediately shows a
    /// placeholder entity with a temporary id at the front; on success the
    /// placeholder is replaced by the authoritative record (the temporary
    /// id is dead from then on) and the list key is invalidated.
    pub async fn create_todo(
        &self,
        view: &TodoListQuery,
        author: &User,
        input: CreateTodoInput,
    ) -> Result<DetailedTodo, SyncError> {
        input.validate().map_err(SyncError::Validation)?;

        let list_key = CacheKey::todo_list(view);
        let in_flight = InFlight::begin(&self.cache, std::slice::from_ref(&list_key));

        let tentative = placeholder_todo(author, &input);
        let temp_id = tentative.todo.id.clone();
        edit_page(&self.cache, &list_key, |page| {
            page.todos.insert(0, tentative);
        });
        tracing::debug!(key = %list_key, id = %temp_id, "applied tentative create");

        match self.remote.create_todo(author.id, input).await {
            Ok(created) => {
                let authoritative = created.clone();
                edit_page(&self.cache, &list_key, |page| {
                    for todo in &mut page.todos {
                        if todo.todo.id == temp_id {
                            *todo = authoritative.clone();
                        }
                    }
                });
                self.cache.write(
                    CacheKey::Todo(created.todo.id.clone()),
                    CacheValue::Todo(created.clone()),
                );
                self.cache.invalidate(&list_key);
                in_flight.commit(&self.cache);
                Ok(created)
            }
            Err(err) => Err(self.fail(in_flight, err)),
        }
    }

    /// Update a todo with an explicit field patch. The cached entity and
    /// its entry in the `view` list reflect the patch immediately.
    pub async fn update_todo(
        &self,
        view: &TodoListQuery,
        id: &RecordId,
        patch: TodoPatch,
    ) -> Result<DetailedTodo, SyncError> {
        patch.validate().map_err(SyncError::Validation)?;

        let list_key = CacheKey::todo_list(view);
        let entity_key = CacheKey::Todo(id.clone());
        let in_flight = InFlight::begin(&self.cache, &[list_key.clone(), entity_key.clone()]);

        let fabricated_tags = patch.tags.as_deref().map(fabricate_tags);
        let apply_patch = |todo: &mut DetailedTodo| {
            patch.apply(&mut todo.todo);
            if let Some(ref tags) = fabricated_tags {
                todo.tags = tags.clone();
            }
        };
        edit_page(&self.cache, &list_key, |page| {
            for todo in page.todos.iter_mut().filter(|t| t.todo.id == *id) {
                apply_patch(todo);
            }
        });
        edit_todo(&self.cache, &entity_key, apply_patch);
        tracing::debug!(key = %list_key, id = %id, "applied tentative update");

        match self.remote.update_todo(id, patch).await {
            Ok(updated) => {
                let authoritative = updated.clone();
                edit_page(&self.cache, &list_key, |page| {
                    for todo in &mut page.todos {
                        if todo.todo.id == *id {
                            *todo = authoritative.clone();
                        }
                    }
                });
                self.cache
                    .write(entity_key, CacheValue::Todo(updated.clone()));
                self.cache.invalidate(&list_key);
                in_flight.commit(&self.cache);
                Ok(updated)
            }
            Err(err) => Err(self.fail(in_flight, err)),
        }
    }

    /// Delete a todo. It disappears from the `view` list immediately; on
    /// failure it reappears in its original position.
    pub async fn delete_todo(
        &self,
        view: &TodoListQuery,
        id: &RecordId,
    ) -> Result<(), SyncError> {
        let list_key = CacheKey::todo_list(view);
        let entity_key = CacheKey::Todo(id.clone());
        let in_flight = InFlight::begin(&self.cache, &[list_key.clone(), entity_key.clone()]);

        edit_page(&self.cache, &list_key, |page| {
            page.todos.retain(|todo| todo.todo.id != *id);
        });
        self.cache.remove(&entity_key);
        tracing::debug!(key = %list_key, id = %id, "applied tentative delete");

        match self.remote.delete_todo(id).await {
            Ok(()) => {
                self.cache.invalidate(&list_key);
                in_flight.commit(&self.cache);
                Ok(())
            }
            Err(err) => Err(self.fail(in_flight, err)),
        }
    }

    /// Create a note on a todo. The todo's note list (newest first), its
    /// cached entity, and its entry in the `view` list all gain the
    /// placeholder immediately.
    pub async fn create_note(
        &self,
        view: &TodoListQuery,
        author: &User,
        input: CreateNoteInput,
    ) -> Result<NoteWithAuthor, SyncError> {
        input.validate().map_err(SyncError::Validation)?;

        let todo_id = input.todo_id.clone();
        let notes_key = CacheKey::Notes(todo_id.clone());
        let list_key = CacheKey::todo_list(view);
        let entity_key = CacheKey::Todo(todo_id.clone());
        let in_flight = InFlight::begin(
            &self.cache,
            &[notes_key.clone(), list_key.clone(), entity_key.clone()],
        );

        let tentative = placeholder_note(author, &input);
        let temp_id = tentative.note.id.clone();
        edit_notes(&self.cache, &notes_key, |notes| {
            notes.insert(0, tentative.clone());
        });
        let tentative_note = tentative.note.clone();
        let prepend_note = |todo: &mut DetailedTodo| {
            todo.notes.insert(0, tentative_note.clone());
        };
        edit_page(&self.cache, &list_key, |page| {
            for todo in page.todos.iter_mut().filter(|t| t.todo.id == todo_id) {
                prepend_note(todo);
            }
        });
        edit_todo(&self.cache, &entity_key, prepend_note);
        tracing::debug!(key = %notes_key, "applied tentative note");

        match self.remote.create_note(author.id, input).await {
            Ok(created) => {
                let authoritative = created.clone();
                edit_notes(&self.cache, &notes_key, |notes| {
                    for note in notes.iter_mut() {
                        if note.note.id == temp_id {
                            *note = authoritative.clone();
                        }
                    }
                });
                self.cache.invalidate(&notes_key);
                self.cache.invalidate(&list_key);
                self.cache.invalidate(&entity_key);
                in_flight.commit(&self.cache);
                Ok(created)
            }
            Err(err) => Err(self.fail(in_flight, err)),
        }
    }

    /// Terminal failure path: roll back, then surface the mutation's own
    /// error — unless the rollback itself found corrupted state, which
    /// takes precedence.
    fn fail(&self, in_flight: InFlight, err: RemoteError) -> SyncError {
        tracing::warn!(error = %err, "mutation failed, rolling back");
        match in_flight.roll_back(&self.cache) {
            Ok(_) => err.into(),
            Err(corruption) => corruption,
        }
    }
}

/// Fabricate the tentative entity for a create: temporary id, submitted
/// fields, defaults for everything only the server knows.
fn placeholder_todo(author: &User, input: &CreateTodoInput) -> DetailedTodo {
    let now = Utc::now();
    DetailedTodo {
        todo: Todo {
            id: RecordId::temporary(),
            title: input.title.clone(),
            description: input.description.clone().unwrap_or_default(),
            priority: input.priority.unwrap_or_default(),
            user_id: author.id,
            created_at: now,
            updated_at: now,
        },
        tags: fabricate_tags(input.tags.as_deref().unwrap_or(&[])),
        notes: Vec::new(),
        mentions: Vec::new(),
    }
}

fn placeholder_note(author: &User, input: &CreateNoteInput) -> NoteWithAuthor {
    NoteWithAuthor {
        note: Note {
            id: RecordId::temporary(),
            todo_id: input.todo_id.clone(),
            user_id: author.id,
            content: input.content.clone(),
            created_at: Utc::now(),
        },
        user: author.clone(),
    }
}

/// Placeholder tags carry fabricated ids; the authoritative ids arrive with
/// the server response.
fn fabricate_tags(names: &[String]) -> Vec<Tag> {
    names
        .iter()
        .map(|name| Tag {
            id: Uuid::new_v4(),
            name: name.clone(),
        })
        .collect()
}

// Whole-value cache edits: read, modify a clone, write back. The store
// never hands out references into an entry.

fn edit_page(cache: &CacheStore, key: &CacheKey, edit: impl FnOnce(&mut TodoPage)) {
    if let Some(CacheValue::Page(mut page)) = cache.read(key) {
        edit(&mut page);
        cache.write(key.clone(), CacheValue::Page(page));
    }
}

fn edit_todo(cache: &CacheStore, key: &CacheKey, edit: impl FnOnce(&mut DetailedTodo)) {
    if let Some(CacheValue::Todo(mut todo)) = cache.read(key) {
        edit(&mut todo);
        cache.write(key.clone(), CacheValue::Todo(todo));
    }
}

fn edit_notes(cache: &CacheStore, key: &CacheKey, edit: impl FnOnce(&mut Vec<NoteWithAuthor>)) {
    if let Some(CacheValue::Notes(mut notes)) = cache.read(key) {
        edit(&mut notes);
        cache.write(key.clone(), CacheValue::Notes(notes));
    }
}
