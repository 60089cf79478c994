use log::{LevelFilter, SetLoggerError};
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};

pub mod color;
pub mod constants;
pub mod encrypt;
pub mod names;
pub mod string_operations;
pub mod telnet;
pub mod utf8;

pub fn initialize_logger(
    log_level: LevelFilter,
    file_path: Option<&str>,
) -> Result<(), SetLoggerError> {
    // Build a stderr logger - always for now.
    let stderr = ConsoleAppender::builder().target(Target::Stderr).build();

    let mut config_builder = Config::builder();
    let mut root_builder = Root::builder();

    if let Some(path) = file_path {
        let logfile = FileAppender::builder()
            // Pattern: https://docs.rs/log4rs/*/log4rs/encode/pattern/index.html
            .encoder(Box::new(PatternEncoder::new(
                "{d(%Y-%m-%d %H:%M:%S)} {l} - {m}\n",
            )))
            .build(path)
            .unwrap();

        config_builder =
            config_builder.appender(Appender::builder().build("logfile", Box::new(logfile)));
        root_builder = root_builder.appender("logfile");
    }

    let config = config_builder
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(log_level)))
                .build("stderr", Box::new(stderr)),
        )
        .build(root_builder.appender("stderr").build(log_level))
        .unwrap();

    // Use this to change log levels at runtime.
    // This means you can change the default log level to trace
    // if you are trying to debug an issue and need more logs on then turn it off
    // once you are done.
    let _handle = log4rs::init_config(config)?;

    Ok(())
}
