/// Film catalog endpoints
use crate::{
    attachment_store::file_name_from_disposition,
    auth::{AuthContext, OptionalAuthContext},
    context::AppContext,
    error::{CatalogError, CatalogResult},
    films::{Film, FilmFields, FilmPage, PosterUpload},
};
use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Build film routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/films", get(list_films).post(create_film))
        .route(
            "/films/:id",
            get(get_film).put(edit_film).delete(delete_film),
        )
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
}

/// Film detail with the caller's edit permission
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilmDetail {
    #[serde(flatten)]
    pub film: Film,
    pub can_edit: bool,
}

async fn list_films(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> CatalogResult<Json<FilmPage>> {
    let page = query.page.unwrap_or(1);
    let page = ctx.films.list(page, ctx.config.catalog.page_size).await?;

    Ok(Json(page))
}

async fn get_film(
    State(ctx): State<AppContext>,
    auth: OptionalAuthContext,
    Path(id): Path<String>,
) -> CatalogResult<Json<FilmDetail>> {
    let film = ctx.films.get(parse_film_id(&id)?).await?;
    let can_edit = ctx.films.can_mutate(auth.user_id(), &film);

    Ok(Json(FilmDetail { film, can_edit }))
}

async fn create_film(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    multipart: Multipart,
) -> CatalogResult<impl IntoResponse> {
    let (fields, poster) = read_film_form(multipart).await?;
    let film = ctx.films.create(&auth.user_id, fields, poster).await?;

    Ok((StatusCode::CREATED, Json(film)))
}

async fn edit_film(
    State(ctx): State<AppContext>,
    auth: OptionalAuthContext,
    Path(id): Path<String>,
    multipart: Multipart,
) -> CatalogResult<Json<Film>> {
    let id = parse_film_id(&id)?;
    // Unknown or foreign films are refused before the upload is read
    ctx.films.authorize_edit(auth.user_id(), id).await?;
    let (fields, poster) = read_film_form(multipart).await?;
    let film = ctx.films.edit(auth.user_id(), id, fields, poster).await?;

    Ok(Json(film))
}

async fn delete_film(
    State(ctx): State<AppContext>,
    auth: OptionalAuthContext,
    Path(id): Path<String>,
) -> CatalogResult<StatusCode> {
    ctx.films.delete(auth.user_id(), parse_film_id(&id)?).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Malformed ids cannot name a film
fn parse_film_id(id: &str) -> CatalogResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| CatalogError::NotFound(format!("Film {} not found", id)))
}

/// Read the film form. Unknown parts are ignored so callers cannot set
/// server-owned fields such as the creator or poster path.
async fn read_film_form(
    mut multipart: Multipart,
) -> CatalogResult<(FilmFields, Option<PosterUpload>)> {
    let mut fields = FilmFields::default();
    let mut poster = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| CatalogError::validation("form", e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "poster" => {
                let file_name = field
                    .headers()
                    .get(header::CONTENT_DISPOSITION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(file_name_from_disposition)
                    .or_else(|| field.file_name().map(String::from))
                    .unwrap_or_default();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| CatalogError::validation("poster", e.body_text()))?;

                // Browsers send an empty part when no file was chosen
                if !(file_name.is_empty() && data.is_empty()) {
                    poster = Some(PosterUpload {
                        file_name,
                        data: data.to_vec(),
                    });
                }
            }
            "name" => fields.name = read_text(field, "name").await?,
            "description" => fields.description = Some(read_text(field, "description").await?),
            "year" => fields.year = Some(read_text(field, "year").await?),
            "producer" => fields.producer = Some(read_text(field, "producer").await?),
            other => tracing::debug!("Ignoring unexpected form field {}", other),
        }
    }

    Ok((fields, poster))
}

async fn read_text(field: Field<'_>, name: &str) -> CatalogResult<String> {
    field
        .text()
        .await
        .map_err(|e| CatalogError::validation(name, e.body_text()))
}
