use clap::Parser;
use proteus::{controller, BadInput, Exchange, FileBytes, Response, Server, ServerConfig, Verb};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Parser)]
#[command(name = "users")]
#[command(about = "A small user directory served by proteus", long_about = None)]
struct Cli {
    /// A TOML server configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured listen address.
    #[arg(short, long)]
    address: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename = "user")]
struct User {
    id: i64,
    #[serde(default)]
    name: String,
}

#[derive(Default)]
struct Users {
    store: Mutex<BTreeMap<i64, User>>,
}

#[controller(path = "/users")]
impl Users {
    #[get]
    pub fn list(
        &self,
        #[query_param(default = "20")] limit: i32,
        #[query_param] name: Option<String>,
    ) -> Vec<User> {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store
            .values()
            .filter(|user| name.as_ref().map_or(true, |n| &user.name == n))
            .take(limit.max(0) as usize)
            .cloned()
            .collect()
    }

    #[get]
    #[path("/{id:int}")]
    pub async fn get_user(&self, #[path_param] id: i64) -> Result<User, BadInput> {
        let store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store
            .get(&id)
            .cloned()
            .ok_or_else(|| BadInput::new(format!("no user with id {}", id)))
    }

    #[post]
    pub fn create(&self, user: User) -> User {
        log::info!("creating user {}", user.id);
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        store.insert(user.id, user.clone());
        user
    }

    #[delete]
    #[path("/{id:int}")]
    pub fn remove(&self, #[path_param] id: i64, exchange: &mut Exchange) -> Result<(), anyhow::Error> {
        let mut store = self.store.lock().unwrap_or_else(|e| e.into_inner());
        if store.remove(&id).is_none() {
            exchange.respond(Response::empty_404())?;
        }
        Ok(())
    }

    #[post]
    #[path("/{id:int}/avatar")]
    pub async fn avatar(&self, #[path_param] id: i64, avatar: FileBytes) -> String {
        format!("user {}: received {} bytes", id, avatar.len())
    }

    #[get]
    #[path("/whoami")]
    pub fn whoami(&self, #[header_param] user_agent: Option<String>) -> Vec<u8> {
        user_agent.unwrap_or_default().into_bytes()
    }
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(address) = cli.address {
        config.address = address;
    }

    let runtime = config.runtime()?;
    let mut server = Server::new(config);
    server.with(proteus::middleware::TraceMiddleware::new());
    server.route(
        Verb::Get,
        "/",
        proteus::endpoints::simple(|| Response::text("hello, world")),
    )?;
    server.mount(Arc::new(Users::default()))?;

    let terminate = server.termination_signal();
    runtime.block_on(async move {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("ctrl-c received, shutting down");
                let _ = terminate.send(true);
            }
        });
        server.listen().await
    })?;

    Ok(())
}
