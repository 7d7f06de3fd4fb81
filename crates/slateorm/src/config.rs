use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Configuration for [`Engine`](crate::Engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Echo every statement and its arguments at `INFO` before execution.
    pub show_sql: bool,
    /// Turn an empty multi-row result into `Some(vec![])` instead of leaving the
    /// destination untouched.
    pub empty_select_as_empty_vec: bool,
    /// Truncate echoed SQL (in bytes). `None` means no truncation.
    pub max_logged_sql: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            show_sql: false,
            empty_select_as_empty_vec: false,
            max_logged_sql: Some(200),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Echo SQL at `INFO`.
    pub fn show_sql(mut self, enabled: bool) -> Self {
        self.show_sql = enabled;
        self
    }

    /// Set the empty multi-row result policy.
    pub fn empty_select_as_empty_vec(mut self, enabled: bool) -> Self {
        self.empty_select_as_empty_vec = enabled;
        self
    }

    /// Set maximum SQL length to echo.
    pub fn max_logged_sql(mut self, len: usize) -> Self {
        self.max_logged_sql = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_logged_sql = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_logged_sql {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }

    /// Emit the statement about to run: always at `DEBUG`, at `INFO` when `show_sql` is on.
    pub(crate) fn log_sql(&self, sql: &str, args: &[Value]) {
        let sql = self.truncate_sql(sql);
        if self.show_sql {
            tracing::info!(
                target: "slateorm::sql",
                param_count = args.len(),
                args = ?args,
                sql = %sql
            );
        } else {
            tracing::debug!(target: "slateorm::sql", param_count = args.len(), sql = %sql);
        }
    }
}

fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    struct Logged {
        level: Level,
        target: String,
        fields: HashMap<String, String>,
    }

    struct FieldRecorder<'a>(&'a mut HashMap<String, String>);

    impl Visit for FieldRecorder<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{value:?}"));
        }
    }

    #[derive(Clone, Default)]
    struct RecordingLayer {
        events: Arc<Mutex<Vec<Logged>>>,
    }

    impl<S: Subscriber> Layer<S> for RecordingLayer {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = HashMap::new();
            event.record(&mut FieldRecorder(&mut fields));
            self.events.lock().unwrap().push(Logged {
                level: *event.metadata().level(),
                target: event.metadata().target().to_string(),
                fields,
            });
        }
    }

    fn capture(f: impl FnOnce()) -> Vec<Logged> {
        let layer = RecordingLayer::default();
        let events = Arc::clone(&layer.events);
        tracing::subscriber::with_default(tracing_subscriber::registry().with(layer), f);
        std::mem::take(&mut *events.lock().unwrap())
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .show_sql(true)
            .empty_select_as_empty_vec(true)
            .max_logged_sql(10);
        assert!(config.show_sql);
        assert!(config.empty_select_as_empty_vec);
        assert_eq!(config.max_logged_sql, Some(10));
        assert_eq!(config.no_truncate().max_logged_sql, None);
    }

    #[test]
    fn test_truncate_sql() {
        let config = EngineConfig::new().max_logged_sql(10);
        assert_eq!(config.truncate_sql("SELECT * FROM users"), "SELECT * F...");
        assert_eq!(config.truncate_sql("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let config = EngineConfig::new().max_logged_sql(8);
        assert_eq!(config.truncate_sql("SELECT 'é'"), "SELECT '...");
    }

    #[test]
    fn test_show_sql_echoes_statement_at_info() {
        let events = capture(|| {
            EngineConfig::new()
                .show_sql(true)
                .log_sql("SELECT * FROM bill WHERE  (`id` = ?)", &[Value::Int(7)]);
            EngineConfig::new().log_sql("SELECT 1", &[]);
        });

        assert_eq!(events.len(), 2);
        let echoed = &events[0];
        assert_eq!(echoed.level, Level::INFO);
        assert_eq!(echoed.target, "slateorm::sql");
        assert_eq!(echoed.fields["sql"], "SELECT * FROM bill WHERE  (`id` = ?)");
        assert_eq!(echoed.fields["args"], "[Int(7)]");
        assert_eq!(echoed.fields["param_count"], "1");

        let quiet = &events[1];
        assert_eq!(quiet.level, Level::DEBUG);
        assert_eq!(quiet.fields["sql"], "SELECT 1");
        assert!(!quiet.fields.contains_key("args"));
    }

    #[test]
    fn test_echo_truncates_long_sql() {
        let events = capture(|| {
            EngineConfig::new()
                .show_sql(true)
                .max_logged_sql(6)
                .log_sql("SELECT name FROM member", &[]);
        });
        assert_eq!(events[0].fields["sql"], "SELECT...");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig = serde_json::from_str(r#"{"show_sql": true}"#).unwrap();
        assert!(config.show_sql);
        assert!(!config.empty_select_as_empty_vec);
        assert_eq!(config.max_logged_sql, Some(200));
    }
}
