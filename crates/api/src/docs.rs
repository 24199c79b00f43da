//! OpenAPI document and the interactive docs pages.

use std::sync::Arc;

use axum::{
    Json, Router,
    response::{Html, IntoResponse},
    routing::get,
};
use serde_json::Value;
use utoipa::openapi::{
    InfoBuilder, OpenApi, OpenApiBuilder,
    path::{Operation, PathItem, Paths},
    tag::TagBuilder,
};

use crate::registry::RouterRegistration;

pub const OPENAPI_PATH: &str = "/openapi.json";
pub const SWAGGER_PATH: &str = "/docs";
pub const REDOC_PATH: &str = "/redoc";

const SWAGGER_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{{title}} - Swagger UI</title>
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({
      url: "{{openapi_url}}",
      dom_id: "#swagger-ui",
      deepLinking: true,
      persistAuthorization: true,
      presets: [SwaggerUIBundle.presets.apis, SwaggerUIBundle.SwaggerUIStandalonePreset],
      layout: "BaseLayout",
    });
  </script>
</body>
</html>
"##;

const REDOC_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1" />
  <title>{{title}} - ReDoc</title>
</head>
<body>
  <redoc spec-url="{{openapi_url}}"></redoc>
  <script src="https://cdn.jsdelivr.net/npm/redoc@2/bundles/redoc.standalone.js"></script>
</body>
</html>
"#;

/// Document-level metadata shown in the docs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiInfo {
    pub title: String,
    pub description: String,
    pub version: String,
}

/// Merges every registration's document into one, with each path moved
/// under the registration's prefix and each operation tagged with the
/// registration's tags.
pub fn build_openapi<S>(info: &ApiInfo, registrations: &[RouterRegistration<S>]) -> OpenApi {
    let mut description = None;
    if !info.description.is_empty() {
        description = Some(info.description.clone());
    }

    let mut doc = OpenApiBuilder::new()
        .info(
            InfoBuilder::new()
                .title(info.title.clone())
                .version(info.version.clone())
                .description(description)
                .build(),
        )
        .paths(Paths::new())
        .build();

    let mut tags = Vec::new();
    for registration in registrations {
        for tag in &registration.tags {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }

        let Some(app_doc) = registration.openapi.clone() else {
            continue;
        };
        let tag_list: Vec<String> = registration.tags.iter().cloned().collect();
        doc.merge(nest_under(app_doc, &registration.prefix, &tag_list));
    }

    if !tags.is_empty() {
        doc.tags = Some(
            tags.into_iter()
                .map(|name| TagBuilder::new().name(name).build())
                .collect(),
        );
    }

    doc
}

fn nest_under(mut doc: OpenApi, prefix: &str, tags: &[String]) -> OpenApi {
    let paths = std::mem::take(&mut doc.paths.paths);
    for (path, mut item) in paths {
        if !tags.is_empty() {
            for operation in operations_mut(&mut item) {
                operation.tags = Some(tags.to_vec());
            }
        }

        let full = match path.as_str() {
            "" | "/" => prefix.to_string(),
            _ => format!("{prefix}{path}"),
        };
        doc.paths.paths.insert(full, item);
    }
    // App documents describe their routes, not the service.
    doc.tags = None;
    doc
}

fn operations_mut(item: &mut PathItem) -> impl Iterator<Item = &mut Operation> {
    [
        item.get.as_mut(),
        item.put.as_mut(),
        item.post.as_mut(),
        item.delete.as_mut(),
        item.options.as_mut(),
        item.head.as_mut(),
        item.patch.as_mut(),
        item.trace.as_mut(),
    ]
    .into_iter()
    .flatten()
}

/// `/openapi.json`, `/docs` and `/redoc`.
pub fn router<S>(spec: Value, title: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let spec = Arc::new(spec);
    let swagger = render(SWAGGER_TEMPLATE, title);
    let redoc = render(REDOC_TEMPLATE, title);

    Router::new()
        .route(
            OPENAPI_PATH,
            get(move || {
                let spec = Arc::clone(&spec);
                async move { Json(spec.as_ref().clone()).into_response() }
            }),
        )
        .route(SWAGGER_PATH, get(move || async move { Html(swagger) }))
        .route(REDOC_PATH, get(move || async move { Html(redoc) }))
}

fn render(template: &str, title: &str) -> String {
    template
        .replace("{{title}}", &html_escape(title))
        .replace("{{openapi_url}}", OPENAPI_PATH)
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use axum::routing::post;
    use utoipa::openapi::path::{HttpMethod, OperationBuilder, PathsBuilder};

    use super::*;

    fn info() -> ApiInfo {
        ApiInfo {
            title: "Launchpad".to_string(),
            description: "Starter API".to_string(),
            version: "1.2.3".to_string(),
        }
    }

    fn app_doc(path: &str) -> OpenApi {
        let operation = OperationBuilder::new().operation_id(Some("op")).build();
        OpenApiBuilder::new()
            .paths(
                PathsBuilder::new()
                    .path(path, PathItem::new(HttpMethod::Post, operation))
                    .build(),
            )
            .build()
    }

    fn registration(name: &str, path: &str) -> RouterRegistration<()> {
        RouterRegistration::new(
            name,
            format!("/api/{name}"),
            Router::new().route(path, post(|| async {})),
        )
        .with_tag(name)
        .with_openapi(app_doc(path))
    }

    #[test]
    fn paths_are_prefixed_and_tagged() {
        let doc = build_openapi(
            &info(),
            &[registration("users", "/token"), registration("files", "/")],
        );

        assert_eq!(doc.info.title, "Launchpad");
        assert_eq!(doc.info.version, "1.2.3");

        let token = doc.paths.paths.get("/api/users/token").unwrap();
        assert_eq!(
            token.post.as_ref().unwrap().tags,
            Some(vec!["users".to_string()])
        );
        assert!(doc.paths.paths.contains_key("/api/files"));

        let tags: Vec<_> = doc.tags.unwrap().into_iter().map(|t| t.name).collect();
        assert_eq!(tags, ["users", "files"]);
    }

    #[test]
    fn registrations_without_documents_still_contribute_tags() {
        let bare = RouterRegistration::new("health", "/api/health", Router::<()>::new())
            .with_tag("health");
        let doc = build_openapi(&info(), &[bare]);

        assert!(doc.paths.paths.is_empty());
        assert_eq!(doc.tags.unwrap()[0].name, "health");
    }

    #[test]
    fn templates_point_at_the_document() {
        let page = render(SWAGGER_TEMPLATE, "A <b> API");
        assert!(page.contains("url: \"/openapi.json\""));
        assert!(page.contains("dom_id: \"#swagger-ui\""));
        assert!(page.trim_end().ends_with("</html>"));
        assert!(page.contains("<title>A &lt;b&gt; API - Swagger UI</title>"));
        assert!(render(REDOC_TEMPLATE, "x").contains("spec-url=\"/openapi.json\""));
    }
}
