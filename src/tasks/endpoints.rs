use rocket::data::Data;
use rocket::http::{ContentType, Status};
use rocket::serde::json::{self, Json};
use rocket::{delete, get, post, put, State};
use rocket_multipart_form_data::{
    MultipartFormData, MultipartFormDataField, MultipartFormDataOptions, Repetition,
};

use crate::auth::AuthUser;
use crate::config::AppConfig;
use crate::data::DBConnection;
use crate::internal_error::{InternalError, InternalResult};
use crate::lists::helpers::{category_exists, parse_reference_id, task_type_exists};
use crate::media::{MediaKind, MediaStore, PendingUpload};
use crate::users::data::MessageResponse;

use super::data::*;
use super::helpers::*;

const TEXT_FIELDS: [&str; 6] = [
    "title",
    "masteryLevel",
    "showNavigation",
    "textBoxes",
    "taskNotes",
    "highlightNotes",
];
const MAX_TEXT_FIELD_BYTES: u64 = 1024 * 1024;

/// Whole-body limit for a multipart update: a few files plus the text fields.
fn form_data_limit(max_upload_bytes: u64) -> u64 {
    max_upload_bytes
        .saturating_mul(8)
        .saturating_add(MAX_TEXT_FIELD_BYTES)
}

#[get("/")]
pub fn get_tasks(
    user: AuthUser,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<TaskItem>>> {
    let db_connection = db_connection.lock()?;

    Ok(Json(get_tasks_for_user(user.id, &db_connection)?))
}

#[get("/<id>")]
pub fn get_task(
    id: &str,
    user: AuthUser,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<TaskItem>> {
    let task_id = parse_task_id(id)?;
    let db_connection = db_connection.lock()?;

    Ok(Json(get_task_from_db(task_id, user.id, &db_connection)?))
}

#[post("/", format = "json", data = "<request>")]
pub fn create_task(
    user: AuthUser,
    request: Result<Json<NewTaskRequest>, json::Error<'_>>,
    db_connection: &State<DBConnection>,
) -> InternalResult<(Status, Json<TaskItem>)> {
    let request = request?.into_inner();

    let title = request.title.as_deref().map(str::trim).unwrap_or_default();
    let (task_type, category) = match (&request.task_type, &request.category) {
        (Some(task_type), Some(category)) if !title.is_empty() => (task_type, category),
        _ => return Err(InternalError::bad_request("Missing required fields")),
    };

    let task_type_id = parse_reference_id(task_type)
        .ok_or_else(|| InternalError::bad_request("Invalid TaskType ID"))?;
    let category_id = parse_reference_id(category)
        .ok_or_else(|| InternalError::bad_request("Invalid category ID"))?;

    let db_connection = db_connection.lock()?;

    if !task_type_exists(task_type_id, &db_connection)? {
        return Err(InternalError::bad_request("Invalid TaskType ID"));
    }
    if !category_exists(category_id, &db_connection)? {
        return Err(InternalError::bad_request("Invalid category ID"));
    }

    let task_id = add_task_to_db(
        user.id,
        title,
        task_type_id,
        category_id,
        TaskDefaults::default(),
        &db_connection,
    )?;
    tracing::info!("User {} created task {}", user.id, task_id);

    Ok((
        Status::Created,
        Json(get_task_from_db(task_id, user.id, &db_connection)?),
    ))
}

#[put("/<id>", format = "json", data = "<update>")]
pub fn update_task(
    id: &str,
    user: AuthUser,
    update: Result<Json<TaskUpdate>, json::Error<'_>>,
    db_connection: &State<DBConnection>,
    media_store: &State<MediaStore>,
    config: &State<AppConfig>,
) -> InternalResult<Json<TaskItem>> {
    let task_id = parse_task_id(id)?;
    let update = update?.into_inner();
    let mut db_connection = db_connection.lock()?;

    let task = update_task_in_db(
        task_id,
        user.id,
        update,
        &[],
        media_store,
        config,
        &mut db_connection,
    )?;

    Ok(Json(task))
}

/// Same update as the JSON route, plus `images` and `audios` file fields.
#[put("/<id>", format = "multipart/form-data", data = "<data>", rank = 2)]
pub async fn update_task_with_media(
    id: &str,
    user: AuthUser,
    content_type: &ContentType,
    data: Data<'_>,
    db_connection: &State<DBConnection>,
    media_store: &State<MediaStore>,
    config: &State<AppConfig>,
) -> InternalResult<Json<TaskItem>> {
    let task_id = parse_task_id(id)?;

    let mut fields = vec![];
    for kind in MediaKind::ALL.iter() {
        fields.push(
            MultipartFormDataField::file(kind.field_name())
                .size_limit(config.max_upload_bytes)
                .repetition(Repetition::infinite()),
        );
    }
    for name in TEXT_FIELDS.iter() {
        fields.push(MultipartFormDataField::text(*name).size_limit(MAX_TEXT_FIELD_BYTES));
    }

    let mut options = MultipartFormDataOptions::with_multipart_form_data_fields(fields);
    options.max_data_bytes = form_data_limit(config.max_upload_bytes);

    let mut form = MultipartFormData::parse(content_type, data, options).await?;

    // Someone else's task is a 404 whatever the form holds.
    {
        let db_connection = db_connection.lock()?;
        get_task_from_db(task_id, user.id, &db_connection)?;
    }

    let update = task_update_from_form(|name| {
        form.texts
            .remove(name)
            .and_then(|values| values.into_iter().next())
            .map(|field| field.text)
    })?;

    let mut uploads = vec![];
    for kind in MediaKind::ALL.iter() {
        if let Some(files) = form.files.get(kind.field_name()) {
            for file in files {
                uploads.push(PendingUpload::validate(
                    *kind,
                    file.content_type.as_ref(),
                    file.path.clone(),
                )?);
            }
        }
    }

    // `form` owns the temporary files and must outlive the copy below.
    let task = {
        let mut db_connection = db_connection.lock()?;
        update_task_in_db(
            task_id,
            user.id,
            update,
            &uploads,
            media_store,
            config,
            &mut db_connection,
        )?
    };
    drop(form);

    Ok(Json(task))
}

#[delete("/<id>")]
pub fn delete_task(
    id: &str,
    user: AuthUser,
    db_connection: &State<DBConnection>,
    media_store: &State<MediaStore>,
) -> InternalResult<Json<MessageResponse>> {
    let task_id = parse_task_id(id)?;

    let task = {
        let mut db_connection = db_connection.lock()?;
        let task = get_task_from_db(task_id, user.id, &db_connection)?;
        delete_task_from_db(&task, &mut db_connection)?;
        task
    };

    let removed = task
        .image_paths
        .iter()
        .chain(task.audio_paths.iter())
        .filter(|path| media_store.remove(path))
        .count();
    tracing::info!(
        "User {} deleted task {} ({} media file(s) removed)",
        user.id,
        task.id,
        removed
    );

    Ok(Json(MessageResponse::new("Task deleted successfully")))
}

fn delete_media(
    id: &str,
    index: &str,
    kind: MediaKind,
    user: AuthUser,
    db_connection: &DBConnection,
    media_store: &MediaStore,
) -> InternalResult<Vec<String>> {
    let task_id = parse_task_id(id)?;

    let (removed, remaining) = {
        let mut db_connection = db_connection.lock()?;
        let mut task = get_task_from_db(task_id, user.id, &db_connection)?;

        let index = parse_index(index)?;
        let removed = remove_media_at(&mut task, kind, index)?;
        task.updated_at = chrono::Utc::now();
        save_task_to_db(&task, &mut db_connection)?;

        (removed, media_paths(&task, kind).clone())
    };

    if !media_store.remove(&removed) {
        tracing::debug!("No file on disk for {}", removed);
    }
    tracing::info!("User {} removed {} from task {}", user.id, removed, task_id);

    Ok(remaining)
}

#[delete("/<id>/image/<index>")]
pub fn delete_image(
    id: &str,
    index: &str,
    user: AuthUser,
    db_connection: &State<DBConnection>,
    media_store: &State<MediaStore>,
) -> InternalResult<Json<ImagePathsResponse>> {
    let image_paths = delete_media(id, index, MediaKind::Image, user, db_connection, media_store)?;

    Ok(Json(ImagePathsResponse { image_paths }))
}

#[delete("/<id>/audio/<index>")]
pub fn delete_audio(
    id: &str,
    index: &str,
    user: AuthUser,
    db_connection: &State<DBConnection>,
    media_store: &State<MediaStore>,
) -> InternalResult<Json<AudioPathsResponse>> {
    let audio_paths = delete_media(id, index, MediaKind::Audio, user, db_connection, media_store)?;

    Ok(Json(AudioPathsResponse {
        message: String::from("Audio deleted successfully"),
        audio_paths,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_data_limit_saturates() {
        assert_eq!(form_data_limit(10), 80 + MAX_TEXT_FIELD_BYTES);
        assert_eq!(form_data_limit(u64::MAX), u64::MAX);
        assert_eq!(form_data_limit(u64::MAX / 8), u64::MAX);
    }
}
