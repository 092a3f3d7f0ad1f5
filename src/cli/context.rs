use std::fs;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use time::{UtcOffset, macros::format_description};
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{AppConfig, ConfigError, LoggingConfig, LoggingProfile, load_config};

/// 初始化 tracing，兼顾 JSON 与文本输出模式。
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let mut filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    // 精简模式下压低逐扩展的 trace 输出；显式写在 level 中的目标不受影响。
    if matches!(config.profile, LoggingProfile::Lean) {
        const QUIET_TARGETS: &[(&str, &str)] = &[
            ("orchestrator::dispatch", "info"),
            ("extensions::fixed", "info"),
            ("monitoring::dispatch", "warn"),
        ];
        for (module, level) in QUIET_TARGETS {
            if !config.level.contains(module) {
                if let Ok(directive) = format!("{module}={level}").parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }
    }

    if matches!(config.profile, LoggingProfile::Verbose) {
        const VERBOSE_TARGETS: &[(&str, &str)] = &[
            ("orchestrator::dispatch", "trace"),
            ("orchestrator::fee", "debug"),
            ("orchestrator::registry", "debug"),
            ("orchestrator::access", "debug"),
            ("monitoring::dispatch", "info"),
            ("monitoring::admin", "info"),
        ];
        for (module, level) in VERBOSE_TARGETS {
            if let Ok(directive) = format!("{module}={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
    let offset = UtcOffset::from_hms(config.timezone_offset_hours, 0, 0).map_err(|err| {
        anyhow!(
            "invalid logging timezone offset {}: {err}",
            config.timezone_offset_hours
        )
    })?;
    let offset_timer = OffsetTime::new(offset, time_format);

    let base = fmt()
        .with_timer(offset_timer)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);

    if config.json {
        base.json()
            .with_current_span(false)
            .with_span_list(false)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    } else {
        base.compact()
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    }
    Ok(())
}

/// 加载主配置；用于 `hookmux --config` 的入口。
pub fn load_configuration(path: Option<PathBuf>) -> Result<AppConfig, ConfigError> {
    load_config(path)
}

pub fn init_configs(args: crate::cli::args::InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    fs::create_dir_all(&output_dir)?;

    let templates: [(&str, &str); 1] = [(
        "hookmux.toml",
        include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/hookmux.toml")),
    )];

    for (filename, contents) in templates {
        let target_path = output_dir.join(filename);
        if target_path.exists() && !args.force {
            println!(
                "跳过 {}（文件已存在，如需覆盖请加 --force）",
                target_path.display()
            );
            continue;
        }

        fs::write(&target_path, contents)?;
        println!("已写入 {}", target_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::args::InitCmd;
    use crate::config::launch::build_orchestrator;

    #[test]
    fn bundled_template_bootstraps() {
        let dir = tempfile::tempdir().expect("temp dir");
        init_configs(InitCmd {
            output: Some(dir.path().to_path_buf()),
            force: false,
        })
        .expect("write template");

        let config = load_configuration(Some(dir.path().join("hookmux.toml"))).expect("load");
        let orchestrator = build_orchestrator(&config).expect("bootstrap template");
        assert_eq!(orchestrator.venues().len(), 2);
    }

    #[test]
    fn init_keeps_existing_file_without_force() {
        let dir = tempfile::tempdir().expect("temp dir");
        let target = dir.path().join("hookmux.toml");
        fs::write(&target, "# local edits\n").expect("seed file");

        init_configs(InitCmd {
            output: Some(dir.path().to_path_buf()),
            force: false,
        })
        .expect("init");
        assert_eq!(fs::read_to_string(&target).unwrap(), "# local edits\n");

        init_configs(InitCmd {
            output: Some(dir.path().to_path_buf()),
            force: true,
        })
        .expect("init --force");
        assert!(fs::read_to_string(&target).unwrap().contains("[orchestrator]"));
    }
}
