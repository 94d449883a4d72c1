use rocket::http::Status;
use rocket::serde::json::{self, Json};
use rocket::{get, post, State};

use crate::auth::AuthUser;
use crate::data::DBConnection;
use crate::internal_error::{InternalError, InternalResult};

use super::data::*;
use super::helpers::*;

#[get("/types/all")]
pub fn get_all_task_types(
    _user: AuthUser,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<TaskType>>> {
    let db_connection = db_connection.lock()?;

    Ok(Json(get_task_types(&db_connection)?))
}

#[get("/categories/all")]
pub fn get_all_categories(
    _user: AuthUser,
    db_connection: &State<DBConnection>,
) -> InternalResult<Json<Vec<Category<NamedRef>>>> {
    let db_connection = db_connection.lock()?;

    Ok(Json(get_categories_with_types(&db_connection)?))
}

/// Public listing, task types are left as ids.
#[get("/categories")]
pub fn list_categories(db_connection: &State<DBConnection>) -> InternalResult<Json<Vec<Category>>> {
    let db_connection = db_connection.lock()?;

    Ok(Json(get_categories(&db_connection)?))
}

/// Returns the existing category when one with the same name already sits
/// under the requested task type.
#[post("/categories", format = "json", data = "<request>")]
pub fn create_category(
    user: AuthUser,
    request: Result<Json<NewCategoryRequest>, json::Error<'_>>,
    db_connection: &State<DBConnection>,
) -> InternalResult<(Status, Json<Category>)> {
    let request = request?.into_inner();

    let name = request.name.as_deref().map(str::trim).unwrap_or_default();
    if name.is_empty() || request.task_type.is_none() {
        return Err(InternalError::bad_request("Category name + taskType required"));
    }

    let task_type_id = request
        .task_type
        .as_ref()
        .and_then(parse_reference_id)
        .ok_or_else(|| InternalError::bad_request("Invalid TaskType ID"))?;

    let db_connection = db_connection.lock()?;

    if !task_type_exists(task_type_id, &db_connection)? {
        return Err(InternalError::bad_request("Invalid TaskType ID"));
    }

    if let Some(existing) = find_category(name, task_type_id, &db_connection)? {
        return Ok((Status::Ok, Json(existing)));
    }

    let category = add_category_to_db(
        name,
        request.description.as_deref(),
        task_type_id,
        &db_connection,
    )?;
    tracing::info!(
        "User {} created category {} ({}) under task type {}",
        user.id,
        category.id,
        category.name,
        task_type_id
    );

    Ok((Status::Created, Json(category)))
}
