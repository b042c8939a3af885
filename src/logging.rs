use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use log::{LevelFilter, Log, Metadata, Record};

/// Forwards every record to the pretty console logger,
/// and appends a plain copy to the log file.
struct TeeLogger {
    console: Box<dyn Log>,
    file: Option<Mutex<File>>,
}

impl Log for TeeLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        self.console.log(record);

        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            // a failed log write has nowhere else to go
            let _ = writeln!(
                file,
                "[{:<5} {}] {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(file) = &self.file {
            let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
            let _ = file.flush();
        }
    }
}

/// Installs the global logger.
///
/// Console filtering follows `RUST_LOG` and defaults to `info`.
/// When `log_file` is given, the file is truncated and receives the same records.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut builder = pretty_env_logger::formatted_builder();
    match std::env::var("RUST_LOG") {
        Ok(filters) => builder.parse_filters(&filters),
        Err(_) => builder.filter_level(LevelFilter::Info),
    };
    let console = builder.build();
    let max_level = console.filter();

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)?;
            Some(Mutex::new(file))
        }
        None => None,
    };

    log::set_boxed_logger(Box::new(TeeLogger {
        console: Box::new(console),
        file,
    }))?;
    log::set_max_level(max_level);

    Ok(())
}
