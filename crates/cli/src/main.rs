use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use file_renamer_core::{
    app_paths, load_config_from, parse_extension_list, save_config_to, spawn_job,
    validate_options, AppConfig, AppPaths, ExecutionResult, FailedEntry, JobOutput, PlanOptions,
    RenameEngine, RenameJob, RestoreError, RestoreResult,
};
use log::{debug, info, LevelFilter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "file-renamer")]
#[command(version)]
#[command(about = "拡張子・正規表現・メタデータでファイル名を一括変更します (バックアップ付きで取り消し可能)")]
struct Cli {
    /// ログ出力を増やします (-v=INFO, -vv=DEBUG, -vvv=TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// 設定・リネームログの保存先 (既定: OS標準の設定ディレクトリ)
    #[arg(long, env = "FILE_RENAMER_STATE_DIR", global = true)]
    state_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// リネーム計画を表示し、--apply 指定時に実行します
    Rename(RenameArgs),
    /// 直前のリネームを元に戻します
    Restore(RestoreArgs),
    /// 異常終了したプロセスが残したロックを解除します
    Unlock,
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    /// 既定値で設定ファイルを作成します
    Init,
}

#[derive(Debug, Args)]
struct RenameArgs {
    #[arg(long)]
    dir: PathBuf,
    /// 対象拡張子 (カンマ区切り, 例: ".jpg,.png")。空なら全ファイル
    #[arg(long)]
    ext: Option<String>,
    /// 新しい拡張子 (例: ".jpg")
    #[arg(long)]
    new_ext: Option<String>,
    /// ファイル名から取り除く正規表現
    #[arg(long)]
    pattern: Option<String>,
    /// 撮影日時やアーティスト/タイトルから名前を付けます
    #[arg(long, default_value_t = false)]
    metadata: bool,
    /// 設定で有効にしたメタデータ命名をこの実行だけ無効にします
    #[arg(long, default_value_t = false, conflicts_with = "metadata")]
    no_metadata: bool,
    #[arg(long, default_value_t = false)]
    apply: bool,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Args)]
struct RestoreArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let paths = match cli.state_dir {
        Some(dir) => AppPaths::in_dir(dir),
        None => app_paths()?,
    };

    match cli.command {
        Commands::Rename(args) => cmd_rename(&paths, args),
        Commands::Restore(args) => cmd_restore(&paths, args),
        Commands::Unlock => cmd_unlock(&paths),
        Commands::Config(config) => match config.action {
            ConfigAction::Show => cmd_config_show(&paths),
            ConfigAction::Init => cmd_config_init(&paths),
        },
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

/// Command-line values win over the config file defaults.
fn plan_options(args: &RenameArgs, config: AppConfig) -> Result<PlanOptions> {
    let extensions = args.ext.clone().unwrap_or(config.default_extensions);
    let use_metadata = if args.no_metadata {
        false
    } else {
        args.metadata || config.use_metadata_default
    };
    Ok(PlanOptions {
        target_directory: args.dir.clone(),
        old_extensions: parse_extension_list(&extensions)?,
        new_extension: args.new_ext.clone().unwrap_or(config.default_new_extension),
        regex_pattern: args.pattern.clone().or(config.default_pattern),
        use_metadata,
    })
}

fn cmd_rename(paths: &AppPaths, args: RenameArgs) -> Result<ExitCode> {
    let options = plan_options(&args, load_config_from(paths)?)?;
    validate_options(&options)?;

    let job = if args.apply {
        RenameJob::Rename(options)
    } else {
        RenameJob::Preview(options)
    };
    let engine = Arc::new(RenameEngine::new(paths));
    let handle = spawn_job(engine, job, |result| {
        debug!("リネーム処理の完了通知 (成功: {})", result.is_ok());
    })?;
    info!("リネーム処理をバックグラウンドで開始しました");

    let JobOutput::Execution(result) = handle.wait()? else {
        bail!("リネーム処理から想定外の結果が返りました");
    };

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => print_execution(&result),
    }

    if result.preview {
        eprintln!("dry-runモード: 実ファイルは変更していません。適用するには --apply を指定してください。");
    } else {
        if result.overwritten_log_entries > 0 {
            eprintln!(
                "警告: 取り消されていない前回の履歴 {}件 を上書きしました",
                result.overwritten_log_entries
            );
        }
        eprintln!(
            "適用完了: 成功 {}件, 失敗 {}件, 変更なし {}件, 中断 {}件",
            result.succeeded.len(),
            result.failed.len(),
            result.unchanged,
            result.cancelled
        );
    }

    Ok(exit_code(result.has_failures()))
}

fn cmd_restore(paths: &AppPaths, args: RestoreArgs) -> Result<ExitCode> {
    let engine = Arc::new(RenameEngine::new(paths));
    let outcome = spawn_job(engine, RenameJob::Restore, |_| {})?.wait();

    let result = match outcome {
        Ok(JobOutput::Restore(result)) => result,
        Ok(JobOutput::Execution(_)) => bail!("取り消し処理から想定外の結果が返りました"),
        Err(err) => match err.downcast_ref::<RestoreError>() {
            Some(restore_err) if restore_err.is_no_log() => {
                eprintln!("{restore_err}");
                return Ok(ExitCode::FAILURE);
            }
            _ => return Err(err),
        },
    };

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => print_restore(&result),
    }
    eprintln!(
        "取り消し完了: {}件 (失敗 {}件, 履歴に残した件数 {}件)",
        result.restored.len(),
        result.failed.len(),
        result.retained_log_entries
    );

    Ok(exit_code(result.has_failures()))
}

fn cmd_unlock(paths: &AppPaths) -> Result<ExitCode> {
    let engine = RenameEngine::new(paths);
    if engine.store().unlock()? {
        println!("ロックを解除しました: {}", engine.store().lock_path().display());
    } else {
        println!("ロックはかかっていません");
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_show(paths: &AppPaths) -> Result<ExitCode> {
    let config = load_config_from(paths)?;
    println!("設定ファイル: {}", paths.config_path.display());
    println!("リネームログ: {}", paths.log_path.display());
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(ExitCode::SUCCESS)
}

fn cmd_config_init(paths: &AppPaths) -> Result<ExitCode> {
    if paths.config_path.exists() {
        bail!(
            "設定ファイルは既に存在します: {}",
            paths.config_path.display()
        );
    }
    save_config_to(paths, &AppConfig::default())?;
    println!("設定ファイルを作成しました: {}", paths.config_path.display());
    Ok(ExitCode::SUCCESS)
}

fn print_execution(result: &ExecutionResult) {
    println!("元ファイル -> 新ファイル");
    for entry in &result.succeeded {
        println!(
            "{} -> {}",
            entry.source_path.display(),
            entry.destination_path.display()
        );
    }
    print_failures(&result.failed);
}

fn print_restore(result: &RestoreResult) {
    println!("新ファイル -> 元ファイル");
    for entry in &result.restored {
        println!(
            "{} -> {}",
            entry.destination_path.display(),
            entry.source_path.display()
        );
    }
    print_failures(&result.failed);
}

fn print_failures(failed: &[FailedEntry]) {
    if failed.is_empty() {
        return;
    }
    println!("\n失敗:");
    for failure in failed {
        println!(
            "{} -> {} ({})",
            failure.entry.source_path.display(),
            failure.entry.destination_path.display(),
            failure.reason
        );
    }
}

fn exit_code(has_failures: bool) -> ExitCode {
    if has_failures {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rename_args(extra: &[&str]) -> RenameArgs {
        let mut argv = vec!["file-renamer", "rename", "--dir", "/tmp/files"];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).expect("parse").command {
            Commands::Rename(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    fn metadata_on_by_default() -> AppConfig {
        AppConfig {
            use_metadata_default: true,
            ..AppConfig::default()
        }
    }

    #[test]
    fn no_metadata_flag_overrides_config_default() {
        let options = plan_options(&rename_args(&["--no-metadata"]), metadata_on_by_default())
            .expect("options");
        assert!(!options.use_metadata);

        let options = plan_options(&rename_args(&[]), metadata_on_by_default()).expect("options");
        assert!(options.use_metadata);
    }

    #[test]
    fn metadata_flag_enables_it_without_config() {
        let options =
            plan_options(&rename_args(&["--metadata"]), AppConfig::default()).expect("options");
        assert!(options.use_metadata);
    }

    #[test]
    fn metadata_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "file-renamer",
            "rename",
            "--dir",
            "/tmp/files",
            "--metadata",
            "--no-metadata",
        ]);
        assert!(parsed.is_err());
    }
}
