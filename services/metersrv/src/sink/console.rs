//! Console sink for single-shot and interactive invocations.

use async_trait::async_trait;
use tracing::error;

use ce102m::{ParamKind, Result, Sink};

/// Prints `KEY value` lines instead of publishing.
#[derive(Debug, Default)]
pub struct ConsoleSink;

#[async_trait]
impl Sink for ConsoleSink {
    async fn declare_schema(&mut self, _schema: &[(&'static str, ParamKind)]) -> Result<()> {
        // Nothing to declare on a terminal.
        Ok(())
    }

    async fn publish(&mut self, key: &str, value: &str) -> Result<()> {
        println!("{key} {value}");
        Ok(())
    }

    async fn report_error(&mut self, message: &str) -> Result<()> {
        error!("{message}");
        Ok(())
    }
}
