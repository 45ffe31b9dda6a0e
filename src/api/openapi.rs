use super::handlers::{
    auth::{account, refresh, session},
    comments, health, tweets, videos,
};
use utoipa::{
    OpenApi,
    openapi::{Contact, InfoBuilder, License},
};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        account::register,
        session::login,
        refresh::refresh_access_token,
        session::logout,
        account::change_password,
        account::current_user,
        tweets::create_tweet,
        tweets::get_user_tweets,
        tweets::update_tweet,
        tweets::delete_tweet,
        comments::add_comment,
        comments::update_comment,
        comments::delete_comment,
        videos::publish_video,
        videos::get_video,
        videos::update_video,
        videos::delete_video,
        videos::toggle_publish_status,
    ),
    tags(
        (name = "health", description = "Liveness and store health"),
        (name = "users", description = "Accounts and sessions"),
        (name = "tweets", description = "Owned text posts"),
        (name = "comments", description = "Owned comments on videos"),
        (name = "videos", description = "Owned video metadata"),
    )
)]
struct ApiDoc;

/// The `OpenAPI` document, with info taken from Cargo metadata.
#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    let mut info = InfoBuilder::new()
        .title(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .description(optional_str(env!("CARGO_PKG_DESCRIPTION")))
        .build();
    info.contact = cargo_contact();
    info.license = cargo_license();
    doc.info = info;

    doc
}

/// Swagger UI at `/swagger-ui`, serving the document at `/api-docs/openapi.json`.
pub(crate) fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi())
}

fn cargo_contact() -> Option<Contact> {
    // Cargo authors are `;` separated and may include "Name <email>".
    let authors = env!("CARGO_PKG_AUTHORS");
    let primary = authors.split(';').next().map(str::trim)?;
    if primary.is_empty() {
        return None;
    }

    let (name, email) = parse_author(primary);
    if name.is_none() && email.is_none() {
        return None;
    }

    let mut contact = Contact::new();
    contact.name = name.map(str::to_string);
    contact.email = email.map(str::to_string);
    Some(contact)
}

fn cargo_license() -> Option<License> {
    let identifier = optional_str(env!("CARGO_PKG_LICENSE"))?;
    let mut license = License::new(identifier);
    license.identifier = Some(identifier.to_string());
    Some(license)
}

fn optional_str(value: &'static str) -> Option<&'static str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_author(author: &str) -> (Option<&str>, Option<&str>) {
    fn non_empty(value: &str) -> Option<&str> {
        (!value.is_empty()).then_some(value)
    }
    match author.split_once('<') {
        Some((name, email)) => (
            non_empty(name.trim()),
            non_empty(email.trim_end_matches('>').trim()),
        ),
        None => (non_empty(author.trim()), None),
    }
}
