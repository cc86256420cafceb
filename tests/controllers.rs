use bytes::Bytes;
use proteus::metadata::{SourceKind, TypeDescriptor};
use proteus::{
    controller, BadInput, BindError, Exchange, FileBytes, HttpEntity, Request, Response, Router,
    Server, ServerConfig, Verb,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename = "user")]
struct User {
    id: i64,
}

struct Users;

#[controller(path = "/users")]
impl Users {
    #[get]
    #[path("/{id}")]
    pub async fn get_user(&self, #[path_param] id: i64) -> User {
        User { id }
    }

    #[get]
    pub fn list(&self, #[query_param] limit: i32) -> Vec<User> {
        (1..=i64::from(limit)).map(|id| User { id }).collect()
    }

    #[post]
    pub fn create(&self, user: User) -> User {
        user
    }

    #[put]
    #[path("/{id}")]
    pub fn replace(&self, #[path_param] id: i64, user: Option<User>) -> Result<User, BadInput> {
        match user {
            Some(user) if user.id == id => Ok(user),
            Some(_) => Err(BadInput::new("id mismatch")),
            None => Ok(User { id }),
        }
    }

    #[post]
    #[path("/raw")]
    pub fn raw(&self, body: Bytes) -> usize {
        body.len()
    }

    #[post]
    #[path("/upload")]
    pub async fn upload(
        &self,
        document: FileBytes,
        #[form_file("attachment")] location: Option<PathBuf>,
    ) -> Vec<u8> {
        let mut out = document.to_vec();
        if location.map_or(false, |p| p.exists()) {
            out.extend_from_slice(b"+attachment");
        }
        out
    }

    #[get]
    #[path("/trace")]
    pub fn trace(
        &self,
        #[header_param] x_request_id: String,
        #[query_param(name = "v", default = "false")] verbose: bool,
    ) -> Vec<u8> {
        format!("{}:{}", x_request_id, verbose).into_bytes()
    }

    #[delete]
    #[path("/{id}")]
    pub fn remove(&self, #[path_param] id: i64, exchange: &mut Exchange) -> Result<(), anyhow::Error> {
        if id == 0 {
            exchange.respond(Response::empty_404())?;
        }
        Ok(())
    }

    #[get]
    #[path("/boom")]
    pub fn boom(&self) -> Result<User, anyhow::Error> {
        Err(anyhow::anyhow!("database password is hunter2"))
    }

    pub fn helper(&self) -> usize {
        0
    }
}

struct Pings;

#[controller(path = "/")]
impl Pings {
    #[get]
    #[path("/ping")]
    pub fn ping(&self) -> &'static str {
        "pong"
    }

    #[get]
    #[path("/ping")]
    pub fn ping_again(&self) -> &'static str {
        "pong"
    }
}

struct Ambiguous;

#[controller(path = "/ambiguous")]
impl Ambiguous {
    #[get]
    #[post]
    pub fn both(&self) {}
}

struct Pathless;

#[controller]
impl Pathless {
    #[get]
    pub fn index(&self) {}
}

fn router() -> Router {
    router_with(ServerConfig::default())
}

fn router_with(config: ServerConfig) -> Router {
    let mut server = Server::new(config);
    server.mount(Arc::new(Users)).unwrap();
    server.into_router().unwrap()
}

async fn text(mut response: Response) -> String {
    response.data(1 << 20).into_text().await.unwrap()
}

fn json_post(uri: &str, body: &'static str) -> Request {
    Request::post(uri)
        .unwrap()
        .with_header("content-type", "application/json")
        .unwrap()
        .with_body(body)
}

#[tokio::test]
async fn get_by_path_param() {
    let response = router().handle(Request::get("/users/42").unwrap()).await.unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(
        response.header(http::header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    assert_eq!(text(response).await, r#"{"id":42}"#);
}

#[tokio::test]
async fn malformed_query_param() {
    let response = router()
        .handle(Request::get("/users?limit=abc").unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
    assert!(text(response).await.contains("limit"));

    let response = router()
        .handle(Request::get("/users?limit=2").unwrap())
        .await
        .unwrap();
    assert_eq!(text(response).await, r#"[{"id":1},{"id":2}]"#);
}

#[tokio::test]
async fn post_json_body() {
    let response = router()
        .handle(json_post("/users", r#"{"id":7}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(text(response).await, r#"{"id":7}"#);
}

#[tokio::test]
async fn post_invalid_json() {
    let response = router().handle(json_post("/users", "{")).await.unwrap();
    assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "Invalid JSON");
}

#[tokio::test]
async fn post_xml_body() {
    let request = Request::post("/users")
        .unwrap()
        .with_header("content-type", "application/xml")
        .unwrap()
        .with_body("<user><id>9</id></user>");
    let response = router().handle(request).await.unwrap();
    assert_eq!(text(response).await, r#"{"id":9}"#);
}

#[tokio::test]
async fn unmatched_route() {
    let response = router()
        .handle(Request::get("/does/not/exist").unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::NOT_FOUND);
    assert_eq!(
        response.header(http::header::CONTENT_TYPE).unwrap(),
        "text/plain"
    );
    assert_eq!(text(response).await, "Page Not Found!!");
}

#[test]
fn duplicate_routes_fail_bootstrap() {
    let mut server = Server::new(ServerConfig::default());
    let error = server.mount(Arc::new(Pings)).unwrap_err();
    assert_eq!(
        error,
        BindError::RouteCollision {
            verb: http::Method::GET,
            path: "/ping".into()
        }
    );
}

#[test]
fn malformed_controllers_fail_bootstrap() {
    let mut server = Server::new(ServerConfig::default());
    assert!(matches!(
        server.mount(Arc::new(Ambiguous)),
        Err(BindError::AmbiguousVerb { method: "both", .. })
    ));
    assert!(matches!(
        server.mount(Arc::new(Pathless)),
        Err(BindError::MissingClassPath {
            controller: "Pathless"
        })
    ));
}

#[test]
fn one_registration_per_route_method() {
    let mut server = Server::new(ServerConfig::default());
    server.mount(Arc::new(Users)).unwrap();
    let routes = server.routes();
    assert_eq!(routes.len(), 9);
    assert!(routes.iter().all(|r| r.controller == "Users"));
    assert!(!routes.iter().any(|r| r.method == "helper"));

    let get_user = routes.iter().find(|r| r.method == "get_user").unwrap();
    assert_eq!(get_user.verb, Verb::Get);
    assert_eq!(get_user.path, "/users/{id}");
    assert_eq!(get_user.parameters.len(), 1);
    assert_eq!(get_user.parameters[0].source, SourceKind::Path);
    assert_eq!(get_user.parameters[0].target, TypeDescriptor::Int64);

    let list = routes.iter().find(|r| r.method == "list").unwrap();
    assert_eq!(list.path, "/users");

    let trace = routes.iter().find(|r| r.method == "trace").unwrap();
    assert_eq!(trace.parameters[0].name, "x-request-id");
    assert_eq!(trace.parameters[1].name, "v");
    assert_eq!(trace.parameters[1].default, Some("false"));

    let create = routes.iter().find(|r| r.method == "create").unwrap();
    assert_eq!(create.parameters[0].source, SourceKind::Body);
    assert_eq!(create.parameters[0].target, TypeDescriptor::UserDefined("User"));
}

#[tokio::test]
async fn body_extractor_sees_whole_body() {
    let (mut sender, body) = hyper::Body::channel();
    let chunks: Vec<&'static [u8]> = vec![b"hello ", b"streamed ", b"world"];
    let length: usize = chunks.iter().map(|c| c.len()).sum();

    let request = Request::post("/users/raw")
        .unwrap()
        .with_header("content-length", length.to_string())
        .unwrap()
        .with_body(body);
    let feeder = tokio::spawn(async move {
        for chunk in chunks {
            sender.send_data(Bytes::from_static(chunk)).await.unwrap();
        }
    });

    let response = router().handle(request).await.unwrap();
    feeder.await.unwrap();
    assert_eq!(text(response).await, length.to_string());
}

#[tokio::test]
async fn oversized_body() {
    let config = ServerConfig {
        max_request_size: 4,
        ..ServerConfig::default()
    };
    let response = router_with(config)
        .handle(json_post("/users", r#"{"id":7}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn optional_bodies() {
    let response = router()
        .handle(Request::put("/users/5").unwrap())
        .await
        .unwrap();
    assert_eq!(text(response).await, r#"{"id":5}"#);

    let response = router().handle(json_post_to_put("{")).await.unwrap();
    assert_eq!(text(response).await, r#"{"id":5}"#);

    let strict = ServerConfig {
        strict_optional_bodies: true,
        ..ServerConfig::default()
    };
    let response = router_with(strict)
        .handle(json_post_to_put("{"))
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "Invalid JSON");
}

fn json_post_to_put(body: &'static str) -> Request {
    Request::put("/users/5")
        .unwrap()
        .with_header("content-type", "application/json")
        .unwrap()
        .with_body(body)
}

#[tokio::test]
async fn controller_errors() {
    let request = Request::put("/users/5")
        .unwrap()
        .with_header("content-type", "application/json")
        .unwrap()
        .with_body(r#"{"id":6}"#);
    let response = router().handle(request).await.unwrap();
    assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
    assert_eq!(text(response).await, "id mismatch");

    let response = router()
        .handle(Request::get("/users/boom").unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!text(response).await.contains("hunter2"));
}

#[tokio::test]
async fn headers_and_defaults() {
    let request = Request::get("/users/trace")
        .unwrap()
        .with_header("x-request-id", "abc")
        .unwrap();
    let response = router().handle(request).await.unwrap();
    assert_eq!(text(response).await, "abc:false");

    let request = Request::get("/users/trace?v=TRUE")
        .unwrap()
        .with_header("x-request-id", "abc")
        .unwrap();
    let response = router().handle(request).await.unwrap();
    assert_eq!(text(response).await, "abc:true");

    let response = router()
        .handle(Request::get("/users/trace").unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
    assert!(text(response).await.contains("x-request-id"));
}

#[tokio::test]
async fn response_sink_wins() {
    let response = router()
        .handle(Request::delete("/users/0").unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::NOT_FOUND);

    let response = router()
        .handle(Request::delete("/users/1").unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(text(response).await, "");
}

#[tokio::test]
async fn multipart_upload() {
    let body = concat!(
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"title\"\r\n",
        "\r\n",
        "notes\r\n",
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"document\"; filename=\"a.txt\"\r\n",
        "Content-Type: text/plain\r\n",
        "\r\n",
        "file contents\r\n",
        "--XBOUNDARY\r\n",
        "Content-Disposition: form-data; name=\"attachment\"; filename=\"b.bin\"\r\n",
        "\r\n",
        "xyz\r\n",
        "--XBOUNDARY--\r\n",
    );
    let request = Request::post("/users/upload")
        .unwrap()
        .with_header("content-type", "multipart/form-data; boundary=XBOUNDARY")
        .unwrap()
        .with_body(body);
    let response = router().handle(request).await.unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    assert!(response.content_type().is_none());
    assert_eq!(text(response).await, "file contents+attachment");

    let request = Request::post("/users/upload")
        .unwrap()
        .with_header("content-type", "multipart/form-data; boundary=XBOUNDARY")
        .unwrap()
        .with_body(concat!(
            "--XBOUNDARY\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n",
            "\r\n",
            "notes\r\n",
            "--XBOUNDARY--\r\n",
        ));
    let response = router().handle(request).await.unwrap();
    assert_eq!(response.status(), http::StatusCode::BAD_REQUEST);
    assert!(text(response).await.contains("document"));
}

#[tokio::test]
async fn aborted_upload_sends_nothing() {
    let (mut sender, body) = hyper::Body::channel();
    let request = Request::post("/users")
        .unwrap()
        .with_header("content-type", "application/json")
        .unwrap()
        .with_body(body);
    tokio::spawn(async move {
        sender.send_data(Bytes::from_static(b"{\"id\":")).await.unwrap();
        sender.abort();
    });

    assert!(router().handle(request).await.is_err());
}

struct Accounts;

#[controller(path = "/accounts")]
impl Accounts {
    #[get]
    #[path("/me")]
    pub fn me(&self) -> Vec<u8> {
        b"me".to_vec()
    }

    #[get]
    #[path("/{id}")]
    pub fn by_id(&self, #[path_param] id: i64) -> i64 {
        id
    }

    #[get]
    #[path("/named/{name}")]
    pub fn named(&self, #[path_param] name: String) -> Vec<u8> {
        name.into_bytes()
    }

    #[get]
    #[path("/since")]
    pub fn since(&self, #[query_param] at: chrono::DateTime<chrono::Utc>) -> Vec<u8> {
        at.to_rfc3339().into_bytes()
    }
}

struct Pages;

#[controller(path = "/pages")]
impl Pages {
    #[get]
    pub fn list(&self, #[query_param(default = "twenty")] limit: i32) -> i32 {
        limit
    }
}

fn accounts() -> Router {
    let mut server = Server::new(ServerConfig::default());
    server.mount(Arc::new(Accounts)).unwrap();
    server.into_router().unwrap()
}

#[tokio::test]
async fn literal_route_declared_first_wins() {
    let response = accounts()
        .handle(Request::get("/accounts/me").unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(text(response).await, "me");

    let response = accounts()
        .handle(Request::get("/accounts/12").unwrap())
        .await
        .unwrap();
    assert_eq!(text(response).await, "12");
}

#[tokio::test]
async fn path_params_are_percent_decoded() {
    let response = accounts()
        .handle(Request::get("/accounts/named/ada%20lovelace").unwrap())
        .await
        .unwrap();
    assert_eq!(text(response).await, "ada lovelace");
}

#[tokio::test]
async fn zoned_dates_without_seconds() {
    let response = accounts()
        .handle(Request::get("/accounts/since?at=2011-12-03T10:15Z").unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(text(response).await, "2011-12-03T10:15:00+00:00");

    let response = accounts()
        .handle(
            Request::get("/accounts/since?at=2011-12-03T10:15:30%2B01:00%5BEurope/Paris%5D")
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(text(response).await, "2011-12-03T09:15:30+00:00");
}

#[test]
fn unconvertible_default_fails_bootstrap() {
    let mut server = Server::new(ServerConfig::default());
    assert_eq!(
        server.mount(Arc::new(Pages)).unwrap_err(),
        BindError::InvalidDefault {
            controller: "Pages",
            method: "list",
            parameter: "limit",
            default: "twenty",
            target: TypeDescriptor::Int32,
        }
    );
    assert!(server.routes().is_empty());
}
