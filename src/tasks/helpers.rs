use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use std::collections::HashMap;
use std::convert::TryFrom;

use crate::config::AppConfig;
use crate::internal_error::{InternalError, InternalResult};
use crate::lists::data::{CategoryID, NamedRef, TaskTypeID};
use crate::media::{MediaKind, MediaStore, PendingUpload};
use crate::users::data::UserID;

use super::data::*;

const TASK_SELECT: &str = "SELECT t.rowid, t.user_id, t.title, t.task_type_id, tt.name, t.category_id, c.name,
        t.max_text_boxes, t.show_navigation, t.max_audio_recordings, t.recording_time_limit,
        t.replacement_allowed, t.mastery_level, t.created_at, t.updated_at
    FROM task_items t
    LEFT JOIN task_types tt ON tt.rowid = t.task_type_id
    LEFT JOIN categories c ON c.rowid = t.category_id";

/// Which tasks a content query is restricted to.
#[derive(Debug, Clone, Copy)]
enum Scope {
    Task(TaskID),
    User(UserID),
}

impl Scope {
    fn content_filter(self) -> &'static str {
        match self {
            Scope::Task(_) => "task_id = (?1)",
            Scope::User(_) => "task_id IN (SELECT rowid FROM task_items WHERE user_id = (?1))",
        }
    }

    fn param(self) -> i64 {
        match self {
            Scope::Task(id) | Scope::User(id) => id,
        }
    }
}

pub fn parse_task_id(raw: &str) -> InternalResult<TaskID> {
    match raw.trim().parse::<TaskID>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(InternalError::bad_request("Invalid task ID")),
    }
}

pub fn parse_index(raw: &str) -> InternalResult<usize> {
    raw.trim()
        .parse::<usize>()
        .map_err(|_| InternalError::bad_request("Invalid index"))
}

pub fn get_task_from_row(row: &Row) -> rusqlite::Result<TaskItem> {
    let task_type_id: TaskTypeID = row.get(3)?;
    let task_type_name: Option<String> = row.get(4)?;
    let category_id: Option<CategoryID> = row.get(5)?;
    let category_name: Option<String> = row.get(6)?;
    let mastery_level: i64 = row.get(12)?;

    Ok(TaskItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        task_type: NamedRef {
            id: task_type_id,
            name: task_type_name.unwrap_or_default(),
        },
        category: category_id.map(|id| NamedRef {
            id,
            name: category_name.unwrap_or_default(),
        }),
        text_boxes: vec![],
        max_text_boxes: row.get(7)?,
        grammar_feedback: vec![],
        highlight_notes: vec![],
        image_paths: vec![],
        show_navigation: row.get(8)?,
        audio_paths: vec![],
        max_audio_recordings: row.get(9)?,
        recording_time_limit: row.get(10)?,
        replacement_allowed: row.get(11)?,
        mastery_level: MasteryLevel::try_from(mastery_level).unwrap_or_default(),
        task_notes: vec![],
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

/// Fills in the ordered child lists of `tasks` from the content tables.
fn add_task_contents_from_db(
    tasks: &mut Vec<TaskItem>,
    scope: Scope,
    db_connection: &Connection,
) -> InternalResult<()> {
    let positions: HashMap<TaskID, usize> = tasks
        .iter()
        .enumerate()
        .map(|(position, task)| (task.id, position))
        .collect();

    let mut text_statement = db_connection.prepare(&format!(
        "SELECT task_id, text, created_at, updated_at FROM task_text_boxes WHERE {} ORDER BY task_id, num",
        scope.content_filter()
    ))?;
    let mut rows = text_statement.query(params![scope.param()])?;

    while let Some(row) = rows.next()? {
        let task_id: TaskID = row.get(0)?;
        if let Some(&position) = positions.get(&task_id) {
            tasks[position].text_boxes.push(TextBox {
                text: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            });
        }
    }

    let mut media_statement = db_connection.prepare(&format!(
        "SELECT task_id, kind, path FROM task_media WHERE {} ORDER BY task_id, num",
        scope.content_filter()
    ))?;
    let mut rows = media_statement.query(params![scope.param()])?;

    while let Some(row) = rows.next()? {
        let task_id: TaskID = row.get(0)?;
        let kind: String = row.get(1)?;

        match (positions.get(&task_id), MediaKind::from_key(&kind)) {
            (Some(&position), Some(kind)) => {
                media_paths_mut(&mut tasks[position], kind).push(row.get(2)?);
            }
            (Some(_), None) => tracing::warn!("Task {} has media of unknown kind {}", task_id, kind),
            _ => {}
        }
    }

    let mut notes_statement = db_connection.prepare(&format!(
        "SELECT task_id, kind, content FROM task_notes WHERE {} ORDER BY task_id, num",
        scope.content_filter()
    ))?;
    let mut rows = notes_statement.query(params![scope.param()])?;

    while let Some(row) = rows.next()? {
        let task_id: TaskID = row.get(0)?;
        let kind: String = row.get(1)?;

        match (positions.get(&task_id), NoteKind::from_key(&kind)) {
            (Some(&position), Some(kind)) => {
                tasks[position].notes_mut(kind).push(row.get(2)?);
            }
            (Some(_), None) => tracing::warn!("Task {} has notes of unknown kind {}", task_id, kind),
            _ => {}
        }
    }

    Ok(())
}

/// Looks a task up by id, scoped to its owner. Someone else's task is
/// reported exactly like a missing one.
pub fn get_task_from_db(
    task_id: TaskID,
    user_id: UserID,
    db_connection: &Connection,
) -> InternalResult<TaskItem> {
    let task = db_connection
        .query_row(
            &format!("{} WHERE t.rowid = (?1) AND t.user_id = (?2)", TASK_SELECT),
            params![task_id, user_id],
            get_task_from_row,
        )
        .optional()?;

    let mut tasks = match task {
        Some(task) => vec![task],
        None => return Err(InternalError::not_found("Task not found")),
    };

    add_task_contents_from_db(&mut tasks, Scope::Task(task_id), db_connection)?;

    Ok(tasks.remove(0))
}

pub fn get_tasks_for_user(user_id: UserID, db_connection: &Connection) -> InternalResult<Vec<TaskItem>> {
    let mut statement =
        db_connection.prepare(&format!("{} WHERE t.user_id = (?1) ORDER BY t.rowid", TASK_SELECT))?;

    let mut tasks = vec![];
    for row_result in statement.query_map(params![user_id], get_task_from_row)? {
        tasks.push(row_result?);
    }

    add_task_contents_from_db(&mut tasks, Scope::User(user_id), db_connection)?;

    Ok(tasks)
}

pub fn add_task_to_db(
    user_id: UserID,
    title: &str,
    task_type_id: TaskTypeID,
    category_id: CategoryID,
    defaults: TaskDefaults,
    db_connection: &Connection,
) -> InternalResult<TaskID> {
    let now = Utc::now();

    db_connection.execute(
        "INSERT INTO task_items (user_id, title, task_type_id, category_id, max_text_boxes,
            show_navigation, max_audio_recordings, recording_time_limit, replacement_allowed,
            mastery_level, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8, 0, ?9, ?10)",
        params![
            user_id,
            title,
            task_type_id,
            category_id,
            defaults.max_text_boxes,
            defaults.max_audio_recordings,
            defaults.recording_time_limit,
            defaults.replacement_allowed,
            now,
            now
        ],
    )?;

    Ok(db_connection.last_insert_rowid())
}

pub fn add_task_contents_to_db(task: &TaskItem, db_connection: &Connection) -> InternalResult<()> {
    for (num, text_box) in task.text_boxes.iter().enumerate() {
        db_connection.execute(
            "INSERT INTO task_text_boxes VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                task.id,
                text_box.text,
                text_box.created_at,
                text_box.updated_at,
                num as i64
            ],
        )?;
    }

    for kind in MediaKind::ALL.iter() {
        for (num, path) in media_paths(task, *kind).iter().enumerate() {
            db_connection.execute(
                "INSERT INTO task_media VALUES (?1, ?2, ?3, ?4)",
                params![task.id, kind.as_str(), path, num as i64],
            )?;
        }
    }

    for kind in NoteKind::ALL.iter() {
        for (num, content) in task.notes(*kind).iter().enumerate() {
            db_connection.execute(
                "INSERT INTO task_notes VALUES (?1, ?2, ?3, ?4)",
                params![task.id, kind.as_str(), content, num as i64],
            )?;
        }
    }

    Ok(())
}

pub fn delete_task_contents_from_db(task_id: TaskID, db_connection: &Connection) -> InternalResult<()> {
    db_connection.execute("DELETE FROM task_text_boxes WHERE task_id = (?1)", params![task_id])?;
    db_connection.execute("DELETE FROM task_media WHERE task_id = (?1)", params![task_id])?;
    db_connection.execute("DELETE FROM task_notes WHERE task_id = (?1)", params![task_id])?;

    Ok(())
}

/// Writes the whole task back: scalar columns, then every child list.
pub fn save_task_to_db(task: &TaskItem, db_connection: &mut Connection) -> InternalResult<()> {
    let transaction = db_connection.transaction()?;

    transaction.execute(
        "UPDATE task_items SET title = (?1), show_navigation = (?2), mastery_level = (?3), updated_at = (?4)
         WHERE rowid = (?5) AND user_id = (?6)",
        params![
            task.title,
            task.show_navigation,
            i64::from(task.mastery_level),
            task.updated_at,
            task.id,
            task.user_id
        ],
    )?;
    delete_task_contents_from_db(task.id, &transaction)?;
    add_task_contents_to_db(task, &transaction)?;

    transaction.commit()?;

    Ok(())
}

pub fn delete_task_from_db(task: &TaskItem, db_connection: &mut Connection) -> InternalResult<()> {
    let transaction = db_connection.transaction()?;

    delete_task_contents_from_db(task.id, &transaction)?;
    transaction.execute(
        "DELETE FROM task_items WHERE rowid = (?1) AND user_id = (?2)",
        params![task.id, task.user_id],
    )?;

    transaction.commit()?;

    Ok(())
}

pub fn media_paths(task: &TaskItem, kind: MediaKind) -> &Vec<String> {
    match kind {
        MediaKind::Image => &task.image_paths,
        MediaKind::Audio => &task.audio_paths,
    }
}

pub fn media_paths_mut(task: &mut TaskItem, kind: MediaKind) -> &mut Vec<String> {
    match kind {
        MediaKind::Image => &mut task.image_paths,
        MediaKind::Audio => &mut task.audio_paths,
    }
}

/// How many files of `kind` a task may hold.
pub fn media_limit(task: &TaskItem, kind: MediaKind, config: &AppConfig) -> usize {
    match kind {
        MediaKind::Image => config.max_images,
        MediaKind::Audio => config.max_audios.min(task.max_audio_recordings as usize),
    }
}

pub fn check_media_capacity(
    task: &TaskItem,
    kind: MediaKind,
    incoming: usize,
    limit: usize,
) -> InternalResult<()> {
    let current = media_paths(task, kind).len();

    if incoming > 0 && current + incoming > limit {
        return Err(InternalError::bad_request(format!(
            "Too many {}: {} stored, {} uploaded, at most {} allowed",
            kind.field_name(),
            current,
            incoming,
            limit
        )));
    }

    Ok(())
}

/// Removes the media path at `index` and returns it. Later entries shift
/// down by one.
pub fn remove_media_at(task: &mut TaskItem, kind: MediaKind, index: usize) -> InternalResult<String> {
    let paths = media_paths_mut(task, kind);

    if index >= paths.len() {
        return Err(InternalError::bad_request("Invalid index"));
    }

    Ok(paths.remove(index))
}

pub fn apply_task_update(
    task: &mut TaskItem,
    update: TaskUpdate,
    now: DateTime<Utc>,
) -> InternalResult<()> {
    if let Some(title) = update.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(InternalError::bad_request("Title cannot be empty"));
        }
        task.title = title.to_string();
    }

    if let Some(level) = update.mastery_level {
        task.mastery_level =
            MasteryLevel::try_from(level).map_err(|e| InternalError::bad_request(e.to_string()))?;
    }

    if let Some(show_navigation) = update.show_navigation {
        task.show_navigation = show_navigation;
    }

    if let Some(text_boxes) = update.text_boxes {
        task.text_boxes = text_boxes
            .into_iter()
            .map(|text_box| TextBox {
                text: text_box.text.unwrap_or_default(),
                created_at: text_box.created_at.unwrap_or(now),
                updated_at: Some(now),
            })
            .collect();
    }

    if let Some(task_notes) = update.task_notes {
        task.task_notes = task_notes;
    }

    if let Some(highlight_notes) = update.highlight_notes {
        task.highlight_notes = highlight_notes;
    }

    task.updated_at = now;

    Ok(())
}

/// Builds an update from multipart text fields. List fields arrive as JSON
/// encoded strings; an empty field counts as absent.
pub fn task_update_from_form(
    mut field: impl FnMut(&str) -> Option<String>,
) -> InternalResult<TaskUpdate> {
    fn parse_json_list<T: serde::de::DeserializeOwned>(
        name: &str,
        raw: Option<String>,
    ) -> InternalResult<Option<T>> {
        match raw {
            Some(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| InternalError::bad_request(format!("Invalid {}: {}", name, e))),
            _ => Ok(None),
        }
    }

    let mastery_level = match field("masteryLevel") {
        Some(raw) if !raw.trim().is_empty() => Some(
            raw.trim()
                .parse::<i64>()
                .map_err(|_| InternalError::bad_request("Invalid masteryLevel"))?,
        ),
        _ => None,
    };

    Ok(TaskUpdate {
        title: field("title"),
        mastery_level,
        show_navigation: field("showNavigation").map(|raw| raw.trim() == "true"),
        text_boxes: parse_json_list("textBoxes", field("textBoxes"))?,
        task_notes: parse_json_list("taskNotes", field("taskNotes"))?,
        highlight_notes: parse_json_list("highlightNotes", field("highlightNotes"))?,
    })
}

/// Applies `update`, stores `uploads` and persists the task, all under the
/// caller's lock on the connection. Nothing is written when a check fails,
/// and files stored before a failed save are removed again.
pub fn update_task_in_db(
    task_id: TaskID,
    user_id: UserID,
    update: TaskUpdate,
    uploads: &[PendingUpload],
    media_store: &MediaStore,
    config: &AppConfig,
    db_connection: &mut Connection,
) -> InternalResult<TaskItem> {
    let mut task = get_task_from_db(task_id, user_id, db_connection)?;

    apply_task_update(&mut task, update, Utc::now())?;

    for kind in MediaKind::ALL.iter() {
        let incoming = uploads.iter().filter(|upload| upload.kind == *kind).count();
        check_media_capacity(&task, *kind, incoming, media_limit(&task, *kind, config))?;
    }

    let mut stored = vec![];
    for upload in uploads {
        match media_store.store(upload) {
            Ok(path) => {
                media_paths_mut(&mut task, upload.kind).push(path.clone());
                stored.push(path);
            }
            Err(e) => {
                media_store.discard(&stored);
                return Err(e);
            }
        }
    }

    if let Err(e) = save_task_to_db(&task, db_connection) {
        media_store.discard(&stored);
        return Err(e);
    }

    if !stored.is_empty() {
        tracing::info!("Task {}: stored {} uploaded file(s)", task.id, stored.len());
    }

    Ok(task)
}
