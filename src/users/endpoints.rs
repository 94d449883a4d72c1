use rocket::http::Status;
use rocket::serde::json::{self, Json};
use rocket::{get, post, State};

use crate::auth::{AuthUser, TokenKeys};
use crate::data::DBConnection;
use crate::internal_error::{InternalError, InternalResult};

use super::data::*;
use super::helpers::*;

#[post("/register", format = "json", data = "<request>")]
pub fn register(
    request: Result<Json<CredentialsRequest>, json::Error<'_>>,
    db_connection: &State<DBConnection>,
) -> InternalResult<(Status, Json<MessageResponse>)> {
    let (username, password) = validate_credentials(request?.into_inner())?;
    let password_hash = hash_password(&password)?;

    let db_connection = db_connection.lock()?;

    if get_user_by_username(&username, &db_connection)?.is_some() {
        return Err(InternalError::bad_request("User already exists"));
    }

    let user_id = add_user_to_db(&username, &password_hash, &db_connection)?;
    tracing::info!("Registered user {} ({})", user_id, username);

    Ok((
        Status::Created,
        Json(MessageResponse::new("User registered successfully")),
    ))
}

#[post("/login", format = "json", data = "<request>")]
pub fn login(
    request: Result<Json<CredentialsRequest>, json::Error<'_>>,
    db_connection: &State<DBConnection>,
    token_keys: &State<TokenKeys>,
) -> InternalResult<Json<LoginResponse>> {
    let (username, password) = request
        .map_err(InternalError::from)
        .and_then(|request| validate_credentials(request.into_inner()))
        .map_err(|_| InternalError::bad_request("Invalid credentials"))?;

    let user = {
        let db_connection = db_connection.lock()?;
        get_user_by_username(&username, &db_connection)?
    };

    match user {
        Some(user) if verify_password(&password, &user.password_hash) => {
            tracing::info!("User {} logged in", user.id);
            Ok(Json(LoginResponse {
                token: token_keys.issue(user.id)?,
            }))
        }
        _ => Err(InternalError::bad_request("Invalid credentials")),
    }
}

#[get("/protected")]
pub fn protected(user: AuthUser) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!(
        "Hello user {}, you have accessed a protected route!",
        user.id
    )))
}
