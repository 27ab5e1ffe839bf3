mod schema;

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::Connection;
use uuid::Uuid;

use crate::mentions;
use crate::models::*;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "tally")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("tally.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    // ============================================================
    // User operations
    // ============================================================

    pub fn create_user(&self, input: CreateUserInput) -> Result<User> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = Uuid::new_v4();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO users (id, name, username, email, created_at) VALUES (?, ?, ?, ?, ?)",
            (
                id.to_string(),
                &input.name,
                &input.username,
                &input.email,
                now.to_rfc3339(),
            ),
        )?;

        Ok(User {
            id,
            name: input.name,
            username: input.username,
            email: input.email,
            created_at: now,
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, username, email, created_at FROM users WHERE id = ?",
        )?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(user_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, name, username, email, created_at FROM users WHERE email = ?",
        )?;

        let mut rows = stmt.query([email])?;
        if let Some(row) = rows.next()? {
            Ok(Some(user_from_row(row)?))
        } else {
            Ok(None)
        }
    }

    /// All users in directory iteration order (insertion order). Mention
    /// resolution depends on this order for its deterministic tie-break.
    pub fn get_all_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        all_users(&conn)
    }

    /// Resolve the mention tokens in `text` against the user directory,
    /// using the same matching algorithm the client preview uses.
    pub fn resolve_mentioned_users(&self, text: &str) -> Result<Vec<User>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let users = all_users(&conn)?;
        Ok(mentions::resolve_users(text, &users))
    }

    // ============================================================
    // Todo operations
    // ============================================================

    pub fn create_todo(&self, user_id: Uuid, input: CreateTodoInput) -> Result<DetailedTodo> {
        self.get_user(user_id)?
            .ok_or_else(|| anyhow::anyhow!("User not found"))?;

        let id = RecordId::generate();
        let description = input.description.unwrap_or_default();
        let priority = input.priority.unwrap_or_default();
        let now = Utc::now();

        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "INSERT INTO todos (id, title, description, priority, user_id, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                (
                    id.as_str(),
                    &input.title,
                    &description,
                    priority.as_str(),
                    user_id.to_string(),
                    now.to_rfc3339(),
                    now.to_rfc3339(),
                ),
            )?;

            set_tags(&conn, &id, &input.tags.unwrap_or_default())?;
        }

        self.replace_mentions(&id, &description)?;

        self.get_todo(&id)?
            .ok_or_else(|| anyhow::anyhow!("Todo vanished after insert"))
    }

    pub fn get_todo(&self, id: &RecordId) -> Result<Option<DetailedTodo>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, title, description, priority, user_id, created_at, updated_at
             FROM todos WHERE id = ?",
        )?;

        let mut rows = stmt.query([id.as_str()])?;
        let todo = match rows.next()? {
            Some(row) => todo_from_row(row)?,
            None => return Ok(None),
        };
        drop(rows);
        drop(stmt);

        Ok(Some(hydrate(&conn, todo)?))
    }

    pub fn update_todo(&self, id: &RecordId, patch: TodoPatch) -> Result<Option<DetailedTodo>> {
        let Some(existing) = self.get_todo(id)? else {
            return Ok(None);
        };

        let mut todo = existing.todo;
        patch.apply(&mut todo);
        let now = Utc::now();

        {
            let conn = self.conn.lock().expect("database lock poisoned");
            conn.execute(
                "UPDATE todos SET title = ?, description = ?, priority = ?, updated_at = ? WHERE id = ?",
                (
                    &todo.title,
                    &todo.description,
                    todo.priority.as_str(),
                    now.to_rfc3339(),
                    id.as_str(),
                ),
            )?;

            if let Some(ref tags) = patch.tags {
                conn.execute("DELETE FROM todo_tags WHERE todo_id = ?", [id.as_str()])?;
                set_tags(&conn, id, tags)?;
            }
        }

        // The mention set mirrors the description: recompute it wholesale
        // whenever the description changes, even to the empty set.
        if let Some(ref description) = patch.description {
            self.replace_mentions(id, description)?;
        }

        self.get_todo(id)
    }

    pub fn delete_todo(&self, id: &RecordId) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        // Tags survive; todo_tags links, notes and mentions cascade.
        let rows = conn.execute("DELETE FROM todos WHERE id = ?", [id.as_str()])?;
        Ok(rows > 0)
    }

    /// One page of todos matching the query, plus the total matching count.
    pub fn list_todos(&self, query: &TodoListQuery) -> Result<(Vec<DetailedTodo>, u64)> {
        let conn = self.conn.lock().expect("database lock poisoned");

        let mut clauses = vec!["user_id = ?".to_string()];
        let mut params: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(query.user_id.to_string())];

        if let Some(ref tag) = query.tag {
            clauses.push(
                "EXISTS (SELECT 1 FROM todo_tags tt JOIN tags t ON t.id = tt.tag_id
                 WHERE tt.todo_id = todos.id AND t.name = ?)"
                    .to_string(),
            );
            params.push(Box::new(tag.clone()));
        }

        if let Some(priority) = query.priority {
            clauses.push("priority = ?".to_string());
            params.push(Box::new(priority.as_str().to_string()));
        }

        if let Some(ref email) = query.mentioned_user {
            clauses.push(
                "EXISTS (SELECT 1 FROM mentions m JOIN users u ON u.id = m.user_id
                 WHERE m.todo_id = todos.id AND u.email = ?)"
                    .to_string(),
            );
            params.push(Box::new(email.clone()));
        }

        if let Some(ref search) = query.search {
            clauses.push(
                "(LOWER(title) LIKE ? OR LOWER(description) LIKE ?
                  OR EXISTS (SELECT 1 FROM todo_tags tt JOIN tags t ON t.id = tt.tag_id
                     WHERE tt.todo_id = todos.id AND LOWER(t.name) LIKE ?))"
                    .to_string(),
            );
            let needle = format!("%{}%", search.to_lowercase());
            params.push(Box::new(needle.clone()));
            params.push(Box::new(needle.clone()));
            params.push(Box::new(needle));
        }

        let where_sql = clauses.join(" AND ");
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM todos WHERE {}", where_sql),
            params_ref.as_slice(),
            |row| row.get(0),
        )?;

        // Priority sorts by urgency, not by its text representation.
        let order_expr = match query.sort_by {
            SortField::CreatedAt => "created_at",
            SortField::Priority => {
                "CASE priority WHEN 'HIGH' THEN 3 WHEN 'MEDIUM' THEN 2 ELSE 1 END"
            }
            SortField::Title => "title",
        };
        let direction = match query.sort_order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };

        let page = query.page.max(1);
        let sql = format!(
            "SELECT id, title, description, priority, user_id, created_at, updated_at
             FROM todos WHERE {} ORDER BY {} {} LIMIT ? OFFSET ?",
            where_sql, order_expr, direction
        );

        let mut params = params;
        params.push(Box::new(query.limit));
        params.push(Box::new((page - 1) * query.limit));
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn.prepare(&sql)?;
        let todos = stmt
            .query_map(params_ref.as_slice(), todo_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        let detailed = todos
            .into_iter()
            .map(|todo| hydrate(&conn, todo))
            .collect::<Result<Vec<_>>>()?;

        Ok((detailed, total))
    }

    /// Every todo owned by a user, newest first, fully hydrated. Feeds the
    /// export surface.
    pub fn get_todos_for_user(&self, user_id: Uuid) -> Result<Vec<DetailedTodo>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, title, description, priority, user_id, created_at, updated_at
             FROM todos WHERE user_id = ? ORDER BY created_at DESC",
        )?;

        let todos = stmt
            .query_map([user_id.to_string()], todo_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        drop(stmt);

        todos
            .into_iter()
            .map(|todo| hydrate(&conn, todo))
            .collect()
    }

    // ============================================================
    // Tag operations
    // ============================================================

    /// Find or create a tag by name (case-sensitive), without attaching it
    /// to any todo. Seeds the shared vocabulary.
    pub fn ensure_tag(&self, name: &str) -> Result<Tag> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let id = find_or_create_tag(&conn, name)?;
        Ok(Tag {
            id,
            name: name.to_string(),
        })
    }

    // ============================================================
    // Note operations
    // ============================================================

    pub fn create_note(&self, user_id: Uuid, input: CreateNoteInput) -> Result<NoteWithAuthor> {
        let author = self
            .get_user(user_id)?
            .ok_or_else(|| anyhow::anyhow!("User not found"))?;
        self.get_todo(&input.todo_id)?
            .ok_or_else(|| anyhow::anyhow!("Todo not found"))?;

        let conn = self.conn.lock().expect("database lock poisoned");
        let id = RecordId::generate();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO notes (id, todo_id, user_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
            (
                id.as_str(),
                input.todo_id.as_str(),
                user_id.to_string(),
                &input.content,
                now.to_rfc3339(),
            ),
        )?;

        Ok(NoteWithAuthor {
            note: Note {
                id,
                todo_id: input.todo_id,
                user_id,
                content: input.content,
                created_at: now,
            },
            user: author,
        })
    }

    /// Notes for a todo with their authors, newest first.
    pub fn get_notes(&self, todo_id: &RecordId) -> Result<Vec<NoteWithAuthor>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare(
            "SELECT n.id, n.todo_id, n.user_id, n.content, n.created_at,
                    u.id, u.name, u.username, u.email, u.created_at
             FROM notes n JOIN users u ON u.id = n.user_id
             WHERE n.todo_id = ? ORDER BY n.created_at DESC, n.rowid DESC",
        )?;

        let notes = stmt
            .query_map([todo_id.as_str()], |row| {
                Ok(NoteWithAuthor {
                    note: Note {
                        id: RecordId::from(row.get::<_, String>(0)?),
                        todo_id: RecordId::from(row.get::<_, String>(1)?),
                        user_id: parse_uuid(row.get::<_, String>(2)?),
                        content: row.get(3)?,
                        created_at: parse_datetime(row.get::<_, String>(4)?),
                    },
                    user: User {
                        id: parse_uuid(row.get::<_, String>(5)?),
                        name: row.get(6)?,
                        username: row.get(7)?,
                        email: row.get(8)?,
                        created_at: parse_datetime(row.get::<_, String>(9)?),
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notes)
    }

    // ============================================================
    // Mention operations
    // ============================================================

    /// Replace the todo's entire mention set with the users resolvable from
    /// `description`. The lookup runs first; the delete-all-then-insert-all
    /// happens in one transaction, so a failure anywhere leaves the prior
    /// mentions untouched.
    fn replace_mentions(&self, todo_id: &RecordId, description: &str) -> Result<()> {
        let mut conn = self.conn.lock().expect("database lock poisoned");
        let users = all_users(&conn)?;
        let resolved = mentions::resolve_users(description, &users);

        let tx = conn.transaction()?;
        tx.execute("DELETE FROM mentions WHERE todo_id = ?", [todo_id.as_str()])?;
        for user in &resolved {
            tx.execute(
                "INSERT INTO mentions (todo_id, user_id) VALUES (?, ?)",
                (todo_id.as_str(), user.id.to_string()),
            )?;
        }
        tx.commit()?;

        Ok(())
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

// ============================================================
// Row mapping and relation loading
// ============================================================

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(row.get::<_, String>(0)?),
        name: row.get(1)?,
        username: row.get(2)?,
        email: row.get(3)?,
        created_at: parse_datetime(row.get::<_, String>(4)?),
    })
}

fn todo_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Todo> {
    Ok(Todo {
        id: RecordId::from(row.get::<_, String>(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        priority: Priority::from_str(&row.get::<_, String>(3)?).unwrap_or_default(),
        user_id: parse_uuid(row.get::<_, String>(4)?),
        created_at: parse_datetime(row.get::<_, String>(5)?),
        updated_at: parse_datetime(row.get::<_, String>(6)?),
    })
}

fn all_users(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, username, email, created_at FROM users ORDER BY rowid",
    )?;
    let users = stmt
        .query_map([], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(users)
}

/// Load a todo's relations: tags in attach order, notes newest first,
/// mentioned users in directory order.
fn hydrate(conn: &Connection, todo: Todo) -> Result<DetailedTodo> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.name FROM todo_tags tt JOIN tags t ON t.id = tt.tag_id
         WHERE tt.todo_id = ? ORDER BY tt.rowid",
    )?;
    let tags = stmt
        .query_map([todo.id.as_str()], |row| {
            Ok(Tag {
                id: parse_uuid(row.get::<_, String>(0)?),
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT id, todo_id, user_id, content, created_at FROM notes
         WHERE todo_id = ? ORDER BY created_at DESC, rowid DESC",
    )?;
    let notes = stmt
        .query_map([todo.id.as_str()], |row| {
            Ok(Note {
                id: RecordId::from(row.get::<_, String>(0)?),
                todo_id: RecordId::from(row.get::<_, String>(1)?),
                user_id: parse_uuid(row.get::<_, String>(2)?),
                content: row.get(3)?,
                created_at: parse_datetime(row.get::<_, String>(4)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.username, u.email, u.created_at
         FROM mentions m JOIN users u ON u.id = m.user_id
         WHERE m.todo_id = ? ORDER BY u.rowid",
    )?;
    let mentions = stmt
        .query_map([todo.id.as_str()], user_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DetailedTodo {
        todo,
        tags,
        notes,
        mentions,
    })
}

/// Link the named tags to a todo, finding or creating each tag by name.
/// Duplicate names (case-sensitive) collapse to one link.
fn set_tags(conn: &Connection, todo_id: &RecordId, names: &[String]) -> Result<()> {
    let mut seen: Vec<&str> = Vec::new();
    for name in names {
        if name.is_empty() || seen.contains(&name.as_str()) {
            continue;
        }
        seen.push(name);

        let tag_id = find_or_create_tag(conn, name)?;
        conn.execute(
            "INSERT OR IGNORE INTO todo_tags (todo_id, tag_id) VALUES (?, ?)",
            (todo_id.as_str(), tag_id.to_string()),
        )?;
    }
    Ok(())
}

fn find_or_create_tag(conn: &Connection, name: &str) -> Result<Uuid> {
    let existing: Option<String> = conn
        .query_row("SELECT id FROM tags WHERE name = ?", [name], |row| {
            row.get(0)
        })
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(other),
        })?;

    if let Some(id) = existing {
        return Ok(parse_uuid(id));
    }

    let id = Uuid::new_v4();
    conn.execute(
        "INSERT INTO tags (id, name) VALUES (?, ?)",
        (id.to_string(), name),
    )?;
    Ok(id)
}

fn parse_uuid(s: String) -> Uuid {
    Uuid::parse_str(&s).unwrap_or_else(|_| Uuid::nil())
}

fn parse_datetime(s: String) -> chrono::DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
