// Copyright 2025 jonefeewang@gmail.com
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use dotenv::dotenv;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use super::config::LogConfig;
use crate::utils::Identity;
use crate::{AppError, AppResult};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Maps the `-v` count of the command line to a default filter directive.
pub fn verbosity_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Stdout-only subscriber for tests; calling it twice is fine.
pub fn setup_local_tracing() -> AppResult<()> {
    dotenv().ok();
    let timer = ChronoLocal::new(TIME_FORMAT.to_string());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(timer)
        .with_target(true)
        .with_thread_names(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_test_writer();
    // already installed by another test
    let _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter("debug"))
        .try_init();
    Ok(())
}

/// Installs the global subscriber: a daily rolling file
/// `<dir>/<file_prefix>_<identity>.log` and, if configured, stdout.
///
/// The returned guard flushes the file writer on drop, keep it alive for the
/// lifetime of the process.
pub fn setup_tracing(
    log_config: &LogConfig,
    identity: &Identity,
    verbose: u8,
) -> AppResult<WorkerGuard> {
    let file_name = format!("{}_{}.log", log_config.file_prefix, identity);
    let file_appender = tracing_appender::rolling::daily(&log_config.dir, file_name);
    let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);

    let timer = ChronoLocal::new(TIME_FORMAT.to_string());
    let filter = env_filter(verbosity_directive(verbose));

    let result = if log_config.console {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_timer(timer)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(non_blocking.and(std::io::stdout));
        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .try_init()
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_timer(timer)
            .with_target(true)
            .with_thread_names(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(non_blocking);
        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(filter)
            .try_init()
    };
    result.map_err(|e| AppError::IllegalStateError(format!("tracing already set up: {}", e)))?;

    Ok(worker_guard)
}
