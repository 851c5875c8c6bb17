use std::fs;
use std::path::Path;

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Handle;

const CONSOLE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} {h({l:<5})} [{t}] {f}:{L} - {m}{n}";

/// Installs the log4rs backend. The returned handle must be kept alive by the
/// caller for as long as logging should be reconfigurable. The file is read
/// once; `refresh_rate` is not honoured.
pub fn init_logging(path: &str) -> Result<Handle, anyhow::Error> {
    let config = if Path::new(path).exists() {
        if !Path::new("logs").exists() {
            fs::create_dir("logs")?;
        }
        log4rs::config::load_config_file(path, Default::default())
            .map_err(|e| anyhow::anyhow!("Could not load logging config {}: {}", path, e))?
    } else {
        console_config()?
    };

    let handle = log4rs::init_config(config)
        .map_err(|e| anyhow::anyhow!("Could not initialize logging: {}", e))?;

    Ok(handle)
}

pub fn console_config() -> Result<Config, anyhow::Error> {
    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)))
        .build(Root::builder().appender("stdout").build(LevelFilter::Trace))
        .map_err(|e| anyhow::anyhow!("Invalid console logging config: {}", e))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_config_logs_everything() {
        let config = console_config().unwrap();

        assert_eq!(config.root().level(), LevelFilter::Trace);
        assert_eq!(config.appenders().len(), 1);
    }

    #[test]
    fn test_bundled_config_loads_without_refresh() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/log4rs.yaml");

        let config = log4rs::config::load_config_file(path, Default::default()).unwrap();

        assert_eq!(config.root().level(), LevelFilter::Info);
        assert_eq!(config.appenders().len(), 2);
        assert!(!fs::read_to_string(path).unwrap().contains("refresh_rate"));
    }
}
