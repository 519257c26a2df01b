//! A small pet store with three media types on the same resources.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example pets
//!
//! Try:
//!   curl http://localhost:3000/api/pets
//!   curl http://localhost:3000/api/pets/1 -H 'accept: application/pet+json'
//!   curl http://localhost:3000/api/pets/1 -H 'accept: application/old-pet+json'
//!   curl -X POST http://localhost:3000/api/pets \
//!        -H 'content-type: application/pet+json' \
//!        -H 'authorization: alice' \
//!        -d '{"firstName":"Honey","lastName":"Bee"}'

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use http::StatusCode;
use mediaroute::{
    AdapterConfig, BoxFuture, Formatter, HttpError, HttpResponse, Principal, Request, RouteBuilder,
    RouteParams, RouterAdapter, SecurityContext, SecurityContextProvider, Server,
};
use serde_json::{Value, json};

type Store = Arc<Mutex<BTreeMap<u64, Value>>>;

/// Treats the `authorization` header as a user name. Demo only.
struct HeaderAuth;

impl SecurityContextProvider for HeaderAuth {
    fn security_context<'a>(
        &'a self,
        req: &'a Request,
    ) -> BoxFuture<'a, Result<Arc<dyn SecurityContext>, HttpError>> {
        let context: Arc<dyn SecurityContext> = match req.header("authorization") {
            Some(user) => Arc::new(Principal(user.to_owned())),
            None => Arc::new(mediaroute::Anonymous),
        };
        Box::pin(async move { Ok(context) })
    }
}

#[tokio::main]
async fn main() -> Result<(), mediaroute::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store: Store = Arc::new(Mutex::new(BTreeMap::from([
        (1, json!({ "id": 1, "firstName": "Rex", "lastName": "Dog" })),
    ])));

    // The internal model keeps first and last name apart; `old-pet` clients
    // only know a single `name`.
    let pet = Formatter::new("application/pet+json")
        .from_request(|body, _| Ok(json!({ "firstName": body["firstName"], "lastName": body["lastName"] })))
        .for_response(|model, _| Ok(model));
    let old_pet = Formatter::new("application/old-pet+json")
        .for_response(|model, _| {
            let name = format!(
                "{} {}",
                model["firstName"].as_str().unwrap_or_default(),
                model["lastName"].as_str().unwrap_or_default(),
            );
            Ok(json!({ "id": model["id"], "name": name.trim() }))
        });
    let pets = Formatter::new("application/pets+json")
        .for_response(|model, _| Ok(json!({ "items": model })));

    let routes = vec![
        RouteBuilder::new()
            .path("/pets")
            .allow_anonymous()
            .media_type(pets)
            .media_type(Formatter::new("application/json").for_response(|m, _| Ok(m)))
            .get(list(Arc::clone(&store)))
            .build()?,
        RouteBuilder::new()
            .path("/pets/:petId")
            .allow_anonymous()
            .media_type(pet.clone())
            .media_type(old_pet)
            .media_type(Formatter::new("application/json").for_response(|m, _| Ok(m)))
            .get(fetch(Arc::clone(&store)))
            .build()?,
        RouteBuilder::new()
            .path("/pets")
            .media_type(pet)
            .post(create(Arc::clone(&store)))
            .build()?,
    ];

    let router = RouterAdapter::new(AdapterConfig::from_env()?.with_base_path("/api"))
        .security_context_provider(HeaderAuth)
        .adapt(&routes)?;

    Server::bind(([0, 0, 0, 0], 3000).into()).serve(router).await
}

// GET /api/pets
fn list(store: Store) -> impl Fn(RouteParams) -> BoxFuture<'static, Result<Value, HttpError>> {
    move |_| {
        let store = Arc::clone(&store);
        Box::pin(async move {
            let pets = store.lock().map_err(|_| HttpError::unknown("store poisoned"))?;
            Ok(Value::Array(pets.values().cloned().collect()))
        })
    }
}

// GET /api/pets/:petId → 404 when the id is unknown
fn fetch(store: Store) -> impl Fn(RouteParams) -> BoxFuture<'static, Result<Value, HttpError>> {
    move |params| {
        let store = Arc::clone(&store);
        Box::pin(async move {
            let id: u64 = params.param("petId")
                .and_then(|id| id.parse().ok())
                .ok_or_else(|| HttpError::bad_request("petId must be a number"))?;
            let pets = store.lock().map_err(|_| HttpError::unknown("store poisoned"))?;
            pets.get(&id)
                .cloned()
                .ok_or_else(|| HttpError::new(StatusCode::NOT_FOUND, format!("no pet {id}")))
        })
    }
}

// POST /api/pets → 201 with a location header, nothing to format
fn create(store: Store) -> impl Fn(RouteParams) -> BoxFuture<'static, Result<HttpResponse, HttpError>> {
    move |params| {
        let store = Arc::clone(&store);
        Box::pin(async move {
            let mut model = params.into_model()
                .ok_or_else(|| HttpError::bad_request("a pet is required"))?;
            let mut pets = store.lock().map_err(|_| HttpError::unknown("store poisoned"))?;
            let id = pets.keys().next_back().map_or(1, |last| last + 1);
            model["id"] = id.into();
            pets.insert(id, model);
            Ok(HttpResponse::builder()
                .status(StatusCode::CREATED)
                .header("location", &format!("/api/pets/{id}"))
                .no_body())
        })
    }
}
