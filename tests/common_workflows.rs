//! Integration tests for common Trellis workflows.
//!
//! A small publishing API: users, articles written by users, teams with
//! nested members, and a self-referencing node resource.

use serde_json::json;
use trellis::prelude::*;
use trellis_testing::*;

#[derive(Clone, Debug)]
struct User {
    id: u32,
    name: String,
}

#[derive(Clone, Debug)]
struct Article {
    id: u32,
    title: String,
    author_id: u32,
}

#[derive(Clone, Debug)]
struct Team {
    id: u32,
    name: String,
}

#[derive(Clone, Debug)]
struct Member {
    id: u32,
    team_id: u32,
    role: String,
}

#[derive(Clone, Debug)]
struct Node {
    id: u32,
}

struct Fixture {
    app: TestApp,
    users: MemoryStore<User>,
    articles: MemoryStore<Article>,
}

fn owner_or_authenticated(obj: Option<&Object>, principal: &Principal) -> bool {
    match obj.and_then(|o| downcast::<Article>(o).ok()) {
        Some(article) => principal.id() == Some(article.author_id.to_string().as_str()),
        None => !principal.is_anonymous(),
    }
}

fn user_resource(users: &MemoryStore<User>) -> Resource {
    Resource::new("user")
        .with_field(FieldDescriptor::new("id", |u: &User| u.id))
        .with_field(FieldDescriptor::new("name", |u: &User| u.name.clone()))
        .with_object_key(|u: &User| u.id)
        .with_title(|u: &User| u.name.clone())
        .with_lookup(users.lookup())
        .with_default_get()
}

fn article_resource(articles: &MemoryStore<Article>, users: &MemoryStore<User>) -> Resource {
    let author_store = users.clone();
    let create_store = articles.clone();
    let update_store = articles.clone();

    Resource::new("article")
        .with_field(FieldDescriptor::new("id", |a: &Article| a.id))
        .with_field(FieldDescriptor::new("title", |a: &Article| a.title.clone()))
        .with_field(FieldDescriptor::related("author", "user", move |a: &Article| {
            author_store.get(&a.author_id.to_string()).map(object)
        }))
        .with_object_key(|a: &Article| a.id)
        .with_vendor("example")
        .with_cache(CachePolicy::AutoEtag)
        .with_permissions(
            PermissionFn::new()
                .modify(owner_or_authenticated)
                .delete(owner_or_authenticated),
        )
        .with_lookup(articles.lookup())
        .with_query(articles.query())
        .with_default_get()
        .with_default_list()
        .with_create(move |ctx: HandlerContext| {
            let store = create_store.clone();
            async move {
                let title = ctx.require_field("title")?.as_str().unwrap_or_default().to_string();
                let author_id = ctx
                    .principal
                    .id()
                    .and_then(|id| id.parse::<u32>().ok())
                    .ok_or(Error::AuthenticationRequired)?;
                let article = Article {
                    id: 42,
                    title,
                    author_id,
                };
                store.insert(article.clone());
                Ok(HandlerOutput::Created(object(article)))
            }
        })
        .with_update(move |ctx: HandlerContext| {
            let store = update_store.clone();
            async move {
                let mut article = ctx.item_as::<Article>()?.clone();
                article.title = ctx.require_field("title")?.as_str().unwrap_or_default().to_string();
                store.upsert(article.clone());
                Ok(HandlerOutput::Item(object(article)))
            }
        })
        .with_default_delete(articles.remover())
}

fn team_resource() -> Resource {
    let teams = MemoryStore::new(|t: &Team| t.id.to_string()).with_items([
        Team {
            id: 1,
            name: "core".to_string(),
        },
        Team {
            id: 2,
            name: "docs".to_string(),
        },
    ]);
    let members = MemoryStore::new(|m: &Member| m.id.to_string()).with_items([
        Member {
            id: 10,
            team_id: 1,
            role: "lead".to_string(),
        },
        Member {
            id: 11,
            team_id: 1,
            role: "reviewer".to_string(),
        },
    ]);
    let lookup_members = members.clone();

    let member = Resource::new("member")
        .with_field(FieldDescriptor::new("id", |m: &Member| m.id))
        .with_field(FieldDescriptor::new("role", |m: &Member| m.role.clone()))
        .with_object_key(|m: &Member| m.id)
        .with_lookup(move |ctx: LookupContext| {
            let members = lookup_members.clone();
            async move {
                let team = ctx.parent::<Team>()?;
                Ok(members
                    .get(&ctx.key)
                    .filter(|m| m.team_id == team.id)
                    .map(object))
            }
        })
        .with_query(move |ctx: QueryContext| {
            let members = members.clone();
            async move {
                let team_id = ctx.parent::<Team>()?.id;
                let objects = members
                    .items()
                    .into_iter()
                    .filter(|m| m.team_id == team_id)
                    .map(object)
                    .collect();
                Ok(Box::new(VecCollection::new(objects)) as Box<dyn Collection>)
            }
        })
        .with_default_get()
        .with_default_list();

    Resource::new("team")
        .with_field(FieldDescriptor::new("name", |t: &Team| t.name.clone()))
        .with_object_key(|t: &Team| t.id)
        .with_lookup(teams.lookup())
        .with_default_get()
        .with_child(member)
}

fn node_resource() -> Resource {
    Resource::new("node")
        .with_field(FieldDescriptor::new("id", |n: &Node| n.id))
        .with_field(FieldDescriptor::related("parent", "node", |n: &Node| {
            Some(object(n.clone()))
        }))
        .with_object_key(|n: &Node| n.id)
        .with_lookup(|ctx: LookupContext| async move {
            Ok(ctx.key.parse::<u32>().ok().map(|id| object(Node { id })))
        })
        .with_default_get()
}

fn fixture() -> Fixture {
    let users = MemoryStore::new(|u: &User| u.id.to_string()).with_items([
        User {
            id: 1,
            name: "ada".to_string(),
        },
        User {
            id: 2,
            name: "grace".to_string(),
        },
    ]);
    let articles = MemoryStore::new(|a: &Article| a.id.to_string()).with_items((1..=25).map(
        |id| Article {
            id,
            title: format!("article {}", id),
            author_id: if id % 2 == 0 { 2 } else { 1 },
        },
    ));

    let app = TestAppBuilder::new()
        .with_resource(user_resource(&users))
        .with_resource(article_resource(&articles, &users))
        .with_resource(team_resource())
        .with_resource(node_resource())
        .build();

    Fixture {
        app,
        users,
        articles,
    }
}

// =============================================================================
// Item and list retrieval
// =============================================================================

#[tokio::test]
async fn test_get_item_envelope() {
    let f = fixture();
    let response = f.app.client().get("/articles/3/").await;

    assert_status(&response, 200);
    assert_stat(&response, "ok");
    assert_header(&response, "Content-Type", "application/vnd.example.article+json");
    assert_header(&response, "Vary", "Accept");
    assert_json_pointer(&response, "/article/title", &json!("article 3"));
    assert_json_pointer(&response, "/article/links/self/href", &json!("/articles/3/"));
    assert_json_pointer(&response, "/article/author/href", &json!("/users/1/"));
    assert_json_pointer(&response, "/article/author/title", &json!("ada"));
}

#[tokio::test]
async fn test_unknown_item_is_not_found() {
    let f = fixture();
    let response = f.app.client().get("/articles/999/").await;
    assert_failure(&response, 404, 100);

    let response = f.app.client().get("/nothing-here/").await;
    assert_failure(&response, 404, 100);
}

#[tokio::test]
async fn test_pagination_window() {
    let f = fixture();
    let client = f.app.client();
    let response = client
        .send(
            client
                .request(HttpMethod::GET, "/articles/")
                .query("start", "20")
                .query("max-results", "10"),
        )
        .await;

    assert_status(&response, 200);
    assert_header(&response, "Content-Type", "application/vnd.example.articles+json");
    assert_header(
        &response,
        "Item-Content-Type",
        "application/vnd.example.article+json",
    );

    let body = response.body_json().unwrap();
    assert_eq!(body["total_results"], 25);
    let articles = body["articles"].as_array().unwrap();
    assert_eq!(articles.len(), 5);
    assert_eq!(articles[0]["id"], 21);
    assert_eq!(
        body["links"]["prev"]["href"],
        "/articles/?start=10&max-results=10"
    );
    assert!(body["links"].get("next").is_none());
}

#[tokio::test]
async fn test_default_page_and_next_link() {
    let f = fixture();
    let client = f.app.client();
    let response = client
        .send(client.request(HttpMethod::GET, "/articles/").query("max-results", "10"))
        .await;

    let body = response.body_json().unwrap();
    assert_eq!(body["articles"].as_array().unwrap().len(), 10);
    assert_eq!(
        body["links"]["next"]["href"],
        "/articles/?start=10&max-results=10"
    );
    assert!(body["links"].get("prev").is_none());
    assert_eq!(f.articles.method_call_count("query"), 1);
}

// =============================================================================
// Mutation and permissions
// =============================================================================

#[tokio::test]
async fn test_create_returns_location() {
    let f = fixture();
    let client = f.app.client_as(Principal::user("2", "grace"));
    let response = client.post("/articles/", &[("title", "Fresh")]).await;

    assert_status(&response, 201);
    assert_header(&response, "Location", "/articles/42/");
    assert_json_pointer(&response, "/article/title", &json!("Fresh"));
    assert_json_pointer(&response, "/article/author/href", &json!("/users/2/"));
    assert_eq!(f.articles.len(), 26);
}

#[tokio::test]
async fn test_create_requires_fields() {
    let f = fixture();
    let client = f.app.client_as(Principal::user("2", "grace"));
    let response = client.post("/articles/", &[("title", "")]).await;
    assert_failure(&response, 400, 106);
    assert_eq!(f.articles.len(), 25);
}

#[tokio::test]
async fn test_anonymous_is_unauthorized_and_stranger_is_forbidden() {
    let f = fixture();

    let anonymous = f.app.client().put("/articles/1/", &[("title", "x")]).await;
    assert_failure(&anonymous, 401, 103);

    let stranger = f
        .app
        .client_as(Principal::user("2", "grace"))
        .put("/articles/1/", &[("title", "x")])
        .await;
    assert_failure(&stranger, 403, 101);

    let owner = f
        .app
        .client_as(Principal::user("1", "ada"))
        .put("/articles/1/", &[("title", "edited")])
        .await;
    assert_status(&owner, 200);
    assert_json_pointer(&owner, "/article/title", &json!("edited"));
    assert_eq!(f.articles.get("1").map(|a| a.title), Some("edited".to_string()));
}

#[tokio::test]
async fn test_mutation_links_follow_permissions() {
    let f = fixture();

    let anonymous = f.app.client().get("/articles/1/").await;
    let body = anonymous.body_json().unwrap();
    assert!(body["article"]["links"].get("update").is_none());
    assert!(body["article"]["links"].get("delete").is_none());

    let owner = f.app.client_as(Principal::user("1", "ada")).get("/articles/1/").await;
    assert_json_pointer(&owner, "/article/links/update/method", &json!("PUT"));
    assert_json_pointer(&owner, "/article/links/delete/href", &json!("/articles/1/"));
}

#[tokio::test]
async fn test_method_override_delete() {
    let f = fixture();
    let client = f.app.client_as(Principal::user("1", "ada"));
    let response = client.post("/articles/3/", &[("_method", "DELETE")]).await;

    assert_status(&response, 204);
    assert!(f.articles.get("3").is_none());
    assert!(f.articles.was_called("remove"));

    let response = client.get("/articles/3/").await;
    assert_failure(&response, 404, 100);
}

#[tokio::test]
async fn test_unsupported_method_lists_allowed() {
    let f = fixture();
    let client = f.app.client_as(Principal::user("1", "ada"));

    let response = client.delete("/articles/").await;
    assert_failure(&response, 405, 200);
    assert_header(&response, "Allow", "GET, HEAD, POST");

    let response = client.put("/users/1/", &[("name", "x")]).await;
    assert_status(&response, 405);
    assert_header(&response, "Allow", "GET, HEAD");
}

// =============================================================================
// Negotiation
// =============================================================================

#[tokio::test]
async fn test_vendor_and_generic_types() {
    let f = fixture();
    let client = f.app.client();

    let vendor = client
        .send(
            client
                .request(HttpMethod::GET, "/articles/1/")
                .accept("application/vnd.example.article+json"),
        )
        .await;
    assert_header(&vendor, "Content-Type", "application/vnd.example.article+json");

    // A generic selection is answered with the vendor type of the same format.
    let generic = client
        .send(
            client
                .request(HttpMethod::GET, "/articles/1/")
                .accept("application/json"),
        )
        .await;
    assert_header(&generic, "Content-Type", "application/vnd.example.article+json");

    let plain = client
        .send(
            client
                .request(HttpMethod::GET, "/users/1/")
                .accept("application/json"),
        )
        .await;
    assert_status(&plain, 200);
    assert_header(&plain, "Content-Type", "application/json");

    let xml = client
        .send(
            client
                .request(HttpMethod::GET, "/articles/1/")
                .accept("application/xml"),
        )
        .await;
    assert_content_type(&xml, "application/vnd.example.article+xml");
    assert!(xml.body_string().unwrap().starts_with("<?xml"));
    assert_body_contains(&xml, "<title>article 1</title>");
}

#[tokio::test]
async fn test_unacceptable_type() {
    let f = fixture();
    let client = f.app.client();
    let response = client
        .send(client.request(HttpMethod::GET, "/articles/1/").accept("image/png"))
        .await;
    assert_failure(&response, 406, 201);
}

// =============================================================================
// Conditional requests
// =============================================================================

#[tokio::test]
async fn test_etag_revalidation() {
    let f = fixture();
    let client = f.app.client();

    let first = client.get("/articles/5/").await;
    let etag = first.header("ETag").unwrap().to_string();

    let cached = client
        .send(
            client
                .request(HttpMethod::GET, "/articles/5/")
                .header("If-None-Match", &etag),
        )
        .await;
    assert_status(&cached, 304);
    assert!(cached.response().body.is_empty());
    assert_header(&cached, "ETag", &etag);

    f.app
        .client_as(Principal::user("1", "ada"))
        .put("/articles/5/", &[("title", "changed")])
        .await;

    let stale = client
        .send(
            client
                .request(HttpMethod::GET, "/articles/5/")
                .header("If-None-Match", &etag),
        )
        .await;
    assert_status(&stale, 200);
    assert_ne!(stale.header("ETag"), Some(etag.as_str()));
}

#[tokio::test]
async fn test_head_has_headers_without_body() {
    let f = fixture();
    let response = f.app.client().head("/articles/2/").await;
    assert_status(&response, 200);
    assert!(response.response().body.is_empty());
    assert!(response.header("ETag").is_some());
}

// =============================================================================
// Nesting and expansion
// =============================================================================

#[tokio::test]
async fn test_nested_members() {
    let f = fixture();
    let client = f.app.client();

    let list = client.get("/teams/1/members/").await;
    assert_status(&list, 200);
    let body = list.body_json().unwrap();
    assert_eq!(body["total_results"], 2);
    assert_eq!(
        body["members"][0]["links"]["self"]["href"],
        "/teams/1/members/10/"
    );

    let team = client.get("/teams/1/").await;
    assert_json_pointer(&team, "/team/links/members/href", &json!("/teams/1/members/"));

    let wrong_team = client.get("/teams/2/members/10/").await;
    assert_failure(&wrong_team, 404, 100);
}

#[tokio::test]
async fn test_expand_related_object() {
    let f = fixture();
    let client = f.app.client();
    let response = client
        .send(
            client
                .request(HttpMethod::GET, "/articles/2/")
                .query("expand", "author"),
        )
        .await;

    assert_json_pointer(&response, "/article/author/name", &json!("grace"));
    assert_json_pointer(&response, "/article/author/links/self/href", &json!("/users/2/"));
    assert_eq!(f.users.len(), 2);
}

#[tokio::test]
async fn test_self_reference_expansion_terminates() {
    let f = fixture();
    let client = f.app.client();
    let response = client
        .send(
            client
                .request(HttpMethod::GET, "/nodes/7/")
                .query("expand", "parent.parent.parent"),
        )
        .await;

    assert_status(&response, 200);
    assert_json_pointer(&response, "/node/parent/href", &json!("/nodes/7/"));
}

#[tokio::test]
async fn test_only_fields_and_links() {
    let f = fixture();
    let client = f.app.client();
    let response = client
        .send(
            client
                .request(HttpMethod::GET, "/articles/4/")
                .query("only-fields", "title")
                .query("only-links", ""),
        )
        .await;

    assert_json_pointer(&response, "/article", &json!({"title": "article 4"}));
}

// =============================================================================
// Root and tree construction
// =============================================================================

#[tokio::test]
async fn test_root_lists_uri_templates() {
    let f = fixture();
    let response = f.app.client().get("/").await;

    assert_status(&response, 200);
    assert_json_pointer(&response, "/uri_templates/article", &json!("/articles/{article_id}/"));
    assert_json_pointer(&response, "/uri_templates/articles", &json!("/articles/"));
    assert_json_pointer(
        &response,
        "/uri_templates/member",
        &json!("/teams/{team_id}/members/{member_id}/"),
    );
    assert_json_pointer(&response, "/links/articles/href", &json!("/articles/"));
}

#[test]
fn test_duplicate_sibling_is_rejected() {
    let result = ResourceTree::build(
        Resource::root("root")
            .with_child(Resource::new("article"))
            .with_child(Resource::new("article")),
    );
    assert!(matches!(result, Err(BuildError::DuplicateSibling { .. })));
}

#[test]
fn test_unknown_related_resource_is_rejected() {
    let result = ResourceTree::build(Resource::root("root").with_child(
        Resource::new("article").with_field(FieldDescriptor::related(
            "author",
            "writer",
            |_: &Article| None,
        )),
    ));
    assert!(matches!(
        result,
        Err(BuildError::UnknownRelatedResource { .. })
    ));
}
