//! Sink bindings: where parameter updates and error events go.

mod console;
mod mqtt;

pub use console::ConsoleSink;
pub use mqtt::MqttSink;
