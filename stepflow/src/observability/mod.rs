//! Observability utilities.
//!
//! The crate logs through `tracing` and never installs a subscriber itself.
//! Applications call [`init_tracing`] once, or install their own.
//! Generation decisions are logged at `info` inside a `generate` span
//! carrying the step, session and extra; disk scans at `debug`; partial
//! and ambiguous artifact matches at `warn`.

use tracing::Subscriber;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Installs the global tracing subscriber.
///
/// Honours `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. With `json`,
/// events are written as one JSON object per line.
///
/// # Errors
///
/// Returns an error if a global subscriber has already been set.
pub fn init_tracing(json: bool) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer(json, std::io::stdout))
        .try_init()
}

fn fmt_layer<S, W>(json: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'span> LookupSpan<'span> + 'static,
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(writer);
    if json {
        layer
            .json()
            .with_current_span(true)
            .with_span_events(FmtSpan::CLOSE)
            .boxed()
    } else {
        layer.with_target(true).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use tracing::{debug, info, info_span};

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Runs `emit` under a scoped subscriber and returns what it wrote.
    fn capture(json: bool, emit: impl FnOnce()) -> String {
        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::registry()
            .with(EnvFilter::new(DEFAULT_FILTER))
            .with(fmt_layer(json, move || writer.clone()));
        tracing::subscriber::with_default(subscriber, emit);
        let bytes = buffer.0.lock();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    #[test]
    fn test_plain_output_filters_below_default_level() {
        let output = capture(false, || {
            debug!("scanning directory");
            info!(step = "P.a", "computing");
        });

        assert!(output.contains("computing"));
        assert!(output.contains("P.a"));
        assert!(output.contains("stepflow::observability"));
        assert!(!output.contains("scanning directory"));
    }

    #[test]
    fn test_json_output_carries_current_span() {
        let output = capture(true, || {
            let span = info_span!("generate", step = "P.a");
            let _entered = span.enter();
            info!("computing");
        });

        let first = output.lines().next().unwrap_or_default();
        let event: serde_json::Value = serde_json::from_str(first).unwrap();
        assert_eq!(event["fields"]["message"], "computing");
        assert_eq!(event["span"]["name"], "generate");
        assert_eq!(event["span"]["step"], "P.a");
    }
}
