//! JSON and CSV export of a user's todos with relations resolved.

use crate::models::DetailedTodo;

/// Fixed CSV column order.
const CSV_HEADERS: [&str; 8] = [
    "id",
    "title",
    "description",
    "priority",
    "createdAt",
    "tags",
    "mentions",
    "notes",
];

/// The full todo set as a pretty-printed JSON array, relations inlined.
pub fn to_json(todos: &[DetailedTodo]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(todos)
}

/// The full todo set as CSV. Multi-valued fields are joined with `", "`
/// (tags, mentions) or `"; "` (notes); every cell is quoted with embedded
/// quotes doubled.
pub fn to_csv(todos: &[DetailedTodo]) -> String {
    let mut lines = Vec::with_capacity(todos.len() + 1);
    lines.push(CSV_HEADERS.join(","));

    for todo in todos {
        let tags: Vec<&str> = todo.tags.iter().map(|t| t.name.as_str()).collect();
        let mentions: Vec<&str> = todo.mentions.iter().map(|u| u.name.as_str()).collect();
        let notes: Vec<&str> = todo.notes.iter().map(|n| n.content.as_str()).collect();

        let row = [
            todo.todo.id.as_str().to_string(),
            todo.todo.title.clone(),
            todo.todo.description.clone(),
            todo.todo.priority.as_str().to_string(),
            todo.todo.created_at.to_rfc3339(),
            tags.join(", "),
            mentions.join(", "),
            notes.join("; "),
        ];

        let cells: Vec<String> = row.iter().map(|cell| quote(cell)).collect();
        lines.push(cells.join(","));
    }

    lines.join("\n")
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}
