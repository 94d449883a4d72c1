use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde_json::Value;

use crate::internal_error::InternalResult;

use super::data::*;

/// Accepts a reference id sent either as a JSON number or a numeric string.
pub fn parse_reference_id(value: &Value) -> Option<i64> {
    let id = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };

    if id > 0 {
        Some(id)
    } else {
        None
    }
}

pub fn get_task_types(db_connection: &Connection) -> InternalResult<Vec<TaskType>> {
    let mut statement = db_connection.prepare("SELECT rowid, name FROM task_types ORDER BY rowid")?;

    let rows = statement.query_map([], |row| {
        Ok(TaskType {
            id: row.get(0)?,
            name: row.get(1)?,
        })
    })?;

    let mut task_types = vec![];
    for row_result in rows {
        task_types.push(row_result?);
    }

    Ok(task_types)
}

pub fn task_type_exists(task_type_id: TaskTypeID, db_connection: &Connection) -> InternalResult<bool> {
    let found = db_connection
        .query_row(
            "SELECT rowid FROM task_types WHERE rowid = (?1)",
            params![task_type_id],
            |row| row.get::<usize, i64>(0),
        )
        .optional()?;

    Ok(found.is_some())
}

pub fn category_exists(category_id: CategoryID, db_connection: &Connection) -> InternalResult<bool> {
    let found = db_connection
        .query_row(
            "SELECT rowid FROM categories WHERE rowid = (?1)",
            params![category_id],
            |row| row.get::<usize, i64>(0),
        )
        .optional()?;

    Ok(found.is_some())
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        task_type: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn get_categories(db_connection: &Connection) -> InternalResult<Vec<Category>> {
    let mut statement = db_connection.prepare(
        "SELECT rowid, name, description, task_type_id, created_at, updated_at FROM categories ORDER BY rowid",
    )?;

    let rows = statement.query_map([], category_from_row)?;

    let mut categories = vec![];
    for row_result in rows {
        categories.push(row_result?);
    }

    Ok(categories)
}

/// Categories with their task type populated. A category whose type has
/// vanished is still listed, with an empty type name.
pub fn get_categories_with_types(db_connection: &Connection) -> InternalResult<Vec<Category<NamedRef>>> {
    let mut statement = db_connection.prepare(
        "SELECT c.rowid, c.name, c.description, c.task_type_id, c.created_at, c.updated_at, t.name
         FROM categories c LEFT JOIN task_types t ON t.rowid = c.task_type_id
         ORDER BY c.rowid",
    )?;

    let rows = statement.query_map([], |row| {
        let category = category_from_row(row)?;
        let type_name: Option<String> = row.get(6)?;

        Ok(Category {
            id: category.id,
            name: category.name,
            description: category.description,
            task_type: NamedRef {
                id: category.task_type,
                name: type_name.unwrap_or_default(),
            },
            created_at: category.created_at,
            updated_at: category.updated_at,
        })
    })?;

    let mut categories = vec![];
    for row_result in rows {
        categories.push(row_result?);
    }

    Ok(categories)
}

pub fn find_category(
    name: &str,
    task_type_id: TaskTypeID,
    db_connection: &Connection,
) -> InternalResult<Option<Category>> {
    let category = db_connection
        .query_row(
            "SELECT rowid, name, description, task_type_id, created_at, updated_at FROM categories
             WHERE name = (?1) AND task_type_id = (?2)",
            params![name, task_type_id],
            category_from_row,
        )
        .optional()?;

    Ok(category)
}

pub fn add_category_to_db(
    name: &str,
    description: Option<&str>,
    task_type_id: TaskTypeID,
    db_connection: &Connection,
) -> InternalResult<Category> {
    let now = Utc::now();

    db_connection.execute(
        "INSERT INTO categories VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, description, task_type_id, now, now],
    )?;

    Ok(Category {
        id: db_connection.last_insert_rowid(),
        name: name.to_string(),
        description: description.map(String::from),
        task_type: task_type_id,
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::init_database;
    use serde_json::json;

    fn connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        init_database(&connection).unwrap();
        connection
    }

    #[test]
    fn reference_ids_accept_numbers_and_strings() {
        assert_eq!(parse_reference_id(&json!(3)), Some(3));
        assert_eq!(parse_reference_id(&json!("12")), Some(12));
        assert_eq!(parse_reference_id(&json!("abc")), None);
        assert_eq!(parse_reference_id(&json!(0)), None);
        assert_eq!(parse_reference_id(&json!(null)), None);
    }

    #[test]
    fn categories_are_listed_with_their_type() {
        let connection = connection();
        let types = get_task_types(&connection).unwrap();
        assert_eq!(types.len(), 3);

        add_category_to_db("Travel", None, types[1].id, &connection).unwrap();

        let populated = get_categories_with_types(&connection).unwrap();
        assert_eq!(populated.len(), 1);
        assert_eq!(populated[0].task_type.name, "Task2");

        let found = find_category("Travel", types[1].id, &connection).unwrap();
        assert!(found.is_some());
        assert!(find_category("Travel", types[0].id, &connection).unwrap().is_none());
    }
}
