pub mod config;
pub mod detect;
pub mod eval;
pub mod geo;
pub mod method;
pub mod nmea;
pub mod source;
pub mod state;
pub mod stats;
pub mod tle;
pub mod water;

#[cfg(test)]
#[ctor::ctor]
fn setup_test_logging() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .with_ansi(true)
        .init();
}
