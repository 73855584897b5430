use std::{collections::BTreeMap, fmt, future::Future, sync::Arc};

use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;

use crate::vector_db::VectorDatabase;

pub mod gateway;
pub mod handlers;

pub use gateway::router;

pub type CommandFuture = BoxFuture<'static, anyhow::Result<Value>>;

// thread safe handler: normalized body in, JSON out
pub type CommandFn = Arc<dyn Fn(Value) -> CommandFuture + Send + Sync>;

/// The complete set of commands reachable through `POST /v/{command}`.
///
/// Name => Function. Nothing outside this table can be invoked, and
/// [`CommandRegistry::names`] is what callers see when they ask for an
/// unknown command.
#[derive(Clone, Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandFn>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a command, replacing any previous handler with the same name.
    pub fn register<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.commands.insert(
            name.to_string(),
            Arc::new(move |body| handler(body).boxed()),
        );
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<CommandFn> {
        self.commands.get(name).cloned()
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn bind<F, Fut>(
    db: &Arc<dyn VectorDatabase>,
    command: F,
) -> impl Fn(Value) -> Fut + Send + Sync + 'static
where
    F: Fn(Arc<dyn VectorDatabase>, Value) -> Fut + Send + Sync + 'static,
{
    let db = Arc::clone(db);
    move |body| command(Arc::clone(&db), body)
}

/// Commands exposed for a vector database.
pub fn vector_commands(db: Arc<dyn VectorDatabase>) -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.register("index-stats", bind(&db, handlers::index_stats));
    registry.register("namespace-stats", bind(&db, handlers::namespace_stats));
    registry.register("delete-namespace", bind(&db, handlers::delete_namespace));
    registry.register("upsert-vectors", bind(&db, handlers::upsert_vectors));
    registry.register("delete-vectors", bind(&db, handlers::delete_vectors));
    registry.register("query", bind(&db, handlers::query));
    registry
}
