use std::path::Path;

use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::console::Target;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::filter::threshold::ThresholdFilter;

use crate::config::Error;

const CONSOLE_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S.%3f)} {level} [osg-configure] {m}{n}";

const FILE_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%S.%3f)} {level} {M} {m}{n}";

/// Log to stderr at the given verbosity and, if given, to `log_file` at debug
///
/// Standard output stays free for the results of listing verbs.
pub fn initialise(verbosity_level: u8, log_file: Option<&Path>) -> Result<(), Error> {
    let level = match verbosity_level {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();

    let mut builder = Config::builder().appender(
        Appender::builder()
            .filter(Box::new(ThresholdFilter::new(level)))
            .build("stderr", Box::new(stderr)),
    );
    let mut root = Root::builder().appender("stderr");
    let mut root_level = level;

    if let Some(path) = log_file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
            .build(path)
            .map_err(|e| Error::io(path.display().to_string(), e))?;
        builder = builder.appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("file", Box::new(file)),
        );
        root = root.appender("file");
        root_level = root_level.max(LevelFilter::Debug);
    }

    let config = builder
        .build(root.build(root_level))
        .map_err(|e| Error::Application(format!("Could not configure logging: {e}")))?;
    log4rs::init_config(config)
        .map_err(|e| Error::Application(format!("Could not apply log config: {e}")))?;
    Ok(())
}
