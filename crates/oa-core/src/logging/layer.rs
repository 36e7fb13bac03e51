//! JSONL tracing layer.
//!
//! One JSON object per event on stderr, stdout stays reserved for command
//! payloads. Context keys (run id, stage, process definition, flow node,
//! command) are lifted to the top level whether they were recorded on the
//! event itself or on an enclosing span; the event's own value wins, then the
//! innermost span. Everything else lands under `fields`.

use std::io::{self, Write};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use super::events::Level;

/// Keys promoted to the top level of every record.
const CONTEXT_KEYS: [&str; 5] = [
    "run_id",
    "command",
    "stage",
    "process_definition_key",
    "flow_node_id",
];

/// Collected field values of an event or span.
#[derive(Debug, Default)]
struct FieldCollector {
    fields: Map<String, Value>,
    message: Option<String>,
}

impl FieldCollector {
    fn put(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }

    /// Remove and return the non-empty context values.
    fn take_context(&mut self) -> Map<String, Value> {
        let mut context = Map::new();
        for key in CONTEXT_KEYS {
            match self.fields.remove(key) {
                Some(Value::String(s)) if s.is_empty() => {}
                Some(v) => {
                    context.insert(key.to_string(), v);
                }
                None => {}
            }
        }
        context
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        self.put(field, Value::String(value.to_string()));
    }

    // `%value` fields arrive here as Display output.
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.put(field, Value::String(format!("{:?}", value)));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        if let Some(n) = serde_json::Number::from_f64(value) {
            self.put(field, Value::Number(n));
        }
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, Value::Bool(value));
    }
}

/// Context values recorded on a span, stored in its extensions.
#[derive(Debug, Clone, Default)]
struct SpanContext(Map<String, Value>);

/// JSONL tracing layer, stderr by default.
pub struct JsonlLayer<W = io::Stderr> {
    writer: Mutex<W>,
}

impl JsonlLayer<io::Stderr> {
    pub fn stderr() -> Self {
        JsonlLayer::new(io::stderr())
    }
}

impl<W: Write> JsonlLayer<W> {
    pub fn new(writer: W) -> Self {
        JsonlLayer {
            writer: Mutex::new(writer),
        }
    }
}

impl<S, W> Layer<S> for JsonlLayer<W>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: Write + 'static,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut collector = FieldCollector::default();
        attrs.record(&mut collector);
        if let Some(span) = ctx.span(id) {
            span.extensions_mut()
                .insert(SpanContext(collector.take_context()));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut collector = FieldCollector::default();
        event.record(&mut collector);
        let mut context = collector.take_context();

        if let Some(scope) = ctx.event_scope(event) {
            for span in scope {
                if let Some(SpanContext(span_ctx)) = span.extensions().get::<SpanContext>() {
                    for (key, value) in span_ctx {
                        context.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                }
            }
        }

        let level: Level = (*event.metadata().level()).into();
        let mut record = Map::new();
        record.insert("ts".to_string(), Value::String(Utc::now().to_rfc3339()));
        record.insert("level".to_string(), serde_json::json!(level));
        record.insert(
            "event".to_string(),
            Value::String(event.metadata().target().to_string()),
        );
        for key in CONTEXT_KEYS {
            if let Some(v) = context.remove(key) {
                record.insert(key.to_string(), v);
            }
        }
        if let Some(msg) = collector.message {
            record.insert("message".to_string(), Value::String(msg));
        }
        if !collector.fields.is_empty() {
            record.insert("fields".to_string(), Value::Object(collector.fields));
        }

        let line = Value::Object(record).to_string();
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{}", line);
        }
    }
}
