use crate::client::Connector;
use crate::config::EngineConfig;
use crate::error::OrmResult;
use crate::registry::{Record, Registry};
use crate::session::Session;
use crate::value::FieldMap;
use std::sync::Arc;

/// Shared entry point: a connector, the record metadata cache and the engine settings.
///
/// `Engine` is `Send + Sync`; open one [`Session`] per caller.
pub struct Engine {
    connector: Arc<dyn Connector>,
    registry: Registry,
    config: EngineConfig,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(connector: impl Connector + 'static) -> Self {
        Self::with_config(connector, EngineConfig::default())
    }

    pub fn with_config(connector: impl Connector + 'static, config: EngineConfig) -> Self {
        Self::from_shared(Arc::new(connector), config)
    }

    /// Build an engine over a connector that is shared elsewhere.
    pub fn from_shared(connector: Arc<dyn Connector>, config: EngineConfig) -> Self {
        Self {
            connector,
            registry: Registry::new(),
            config,
        }
    }

    pub fn connector(&self) -> &dyn Connector {
        self.connector.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Open a fresh session.
    pub fn session(&self) -> Session<'_> {
        Session::new(self)
    }

    // Shortcut builders: each opens a fresh session with one clause already set.

    pub fn table(&self, name: &str) -> Session<'_> {
        let mut session = self.session();
        session.table(name);
        session
    }

    pub fn prepare(&self, sql: &str) -> Session<'_> {
        let mut session = self.session();
        session.prepare(sql);
        session
    }

    pub fn fields(&self, list: &str) -> Session<'_> {
        let mut session = self.session();
        session.fields(list);
        session
    }

    pub fn where_(&self, conditions: impl Into<FieldMap>) -> Session<'_> {
        let mut session = self.session();
        session.where_(conditions);
        session
    }

    pub fn or_where(&self, conditions: impl Into<FieldMap>) -> Session<'_> {
        let mut session = self.session();
        session.or_where(conditions);
        session
    }

    pub fn join(&self, fragment: &str) -> Session<'_> {
        let mut session = self.session();
        session.join(fragment);
        session
    }

    pub fn order(&self, expr: &str) -> Session<'_> {
        let mut session = self.session();
        session.order(expr);
        session
    }

    pub fn group(&self, expr: &str) -> Session<'_> {
        let mut session = self.session();
        session.group(expr);
        session
    }

    pub fn limit(&self, count: usize) -> Session<'_> {
        let mut session = self.session();
        session.limit(count);
        session
    }

    pub fn page(&self, page: usize, size: usize) -> Session<'_> {
        let mut session = self.session();
        session.page(page, size);
        session
    }

    /// Fetch one row with no filter.
    pub fn find<T: Record>(&self) -> OrmResult<Option<T>> {
        self.session().find()
    }

    /// Fetch every row of the record's table.
    pub fn select<T: Record>(&self) -> OrmResult<Vec<T>> {
        self.session().select()
    }
}
