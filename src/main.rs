use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use savepatch::{
    load_from_path, BackupPolicy, DirectiveSet, FilePatch, LineOutcome, ModifyReport,
    OperatorPrompt, Patcher, RestoreOutcome, SourceFallback, BACKUP_SUFFIX,
};
use similar::{ChangeTag, TextDiff};
use std::env;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Directive file looked up in the base directory when no path is given.
const DEFAULT_DIRECTIVE_FILE: &str = "savepatch.json";

#[derive(Parser)]
#[command(name = "savepatch")]
#[command(about = "Declarative numeric patcher for text save-state files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply directive groups to matching save files
    Apply {
        /// Path to the directive file (default: savepatch.json in the base directory)
        #[arg(short = 'f', long)]
        directives: Option<PathBuf>,

        /// Base directory (auto-resolved if not specified)
        #[arg(short, long)]
        base_dir: Option<PathBuf>,

        /// Backup naming policy for this run
        #[arg(long, value_enum)]
        backup_policy: Option<PolicyArg>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,
    },

    /// Restore every save file from its .backup snapshot
    Restore {
        /// Base directory (auto-resolved if not specified)
        #[arg(short, long)]
        base_dir: Option<PathBuf>,

        /// Save directory to scan for backups (default: the base directory)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Report matching files and pending changes without applying
    Status {
        /// Path to the directive file (default: savepatch.json in the base directory)
        #[arg(short = 'f', long)]
        directives: Option<PathBuf>,

        /// Base directory (auto-resolved if not specified)
        #[arg(short, long)]
        base_dir: Option<PathBuf>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum PolicyArg {
    /// Accumulate .backup, .backup1, .backup2, ...
    Versioned,
    /// Keep only the most recent snapshot in .backup
    SingleSlot,
}

impl PolicyArg {
    fn to_policy(self) -> BackupPolicy {
        match self {
            PolicyArg::Versioned => BackupPolicy::UniqueVersioned,
            PolicyArg::SingleSlot => BackupPolicy::SingleSlot,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Apply {
            directives,
            base_dir,
            backup_policy,
            dry_run,
            diff,
        } => cmd_apply(directives, base_dir, backup_policy, dry_run, diff),

        Commands::Restore { base_dir, dir, yes } => cmd_restore(base_dir, dir, yes),

        Commands::Status {
            directives,
            base_dir,
        } => cmd_status(directives, base_dir),
    }
}

/// Resolve the base directory once at startup; everything downstream takes
/// it as an explicit value.
///
/// Priority order:
/// 1. Explicit --base-dir flag
/// 2. SAVEPATCH_DIR environment variable
/// 3. The executable's own directory (packaged runs sit next to the saves)
/// 4. Current working directory
fn resolve_base_dir(cli_base: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = cli_base {
        return path
            .canonicalize()
            .with_context(|| format!("invalid base directory: {}", path.display()));
    }

    if let Ok(env_path) = env::var("SAVEPATCH_DIR") {
        let path = PathBuf::from(&env_path);
        if path.exists() {
            return Ok(path.canonicalize()?);
        }
        eprintln!(
            "{}",
            format!("Warning: SAVEPATCH_DIR is set but path doesn't exist: {env_path}").yellow()
        );
    }

    if let Ok(exe) = env::current_exe() {
        if let Some(dir) = exe.parent() {
            return Ok(dir.to_path_buf());
        }
    }

    env::current_dir().context("failed to resolve current directory")
}

/// Console implementation of the operator prompt.
struct ConsolePrompt;

impl ConsolePrompt {
    fn read_line(&self) -> String {
        print!("> ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(_) => line.trim().to_string(),
            Err(_) => String::new(),
        }
    }
}

impl OperatorPrompt for ConsolePrompt {
    fn select_directive_source(&mut self) -> SourceFallback {
        println!("Press 1 to select a directive file, 3 to restore backups, anything else to exit.");
        match self.read_line().as_str() {
            "1" => {
                println!("Directive file path:");
                let path = PathBuf::from(self.read_line());
                if path.is_file() {
                    SourceFallback::Selected(path)
                } else {
                    eprintln!("{}", "No valid file selected".red());
                    SourceFallback::Cancelled
                }
            }
            "3" => SourceFallback::RestoreMode,
            _ => SourceFallback::Cancelled,
        }
    }

    fn confirm_restore(&mut self, backups: &[String]) -> String {
        println!("Found {} backup file(s):", backups.len());
        for name in backups {
            println!("  - {name}{BACKUP_SUFFIX}");
        }
        println!("\nRestore all of them? (type yes to confirm)");
        self.read_line()
    }
}

/// Prompt used with --yes: answers the gate without asking.
struct AssumeYes;

impl OperatorPrompt for AssumeYes {
    fn select_directive_source(&mut self) -> SourceFallback {
        SourceFallback::Cancelled
    }

    fn confirm_restore(&mut self, _backups: &[String]) -> String {
        "yes".to_string()
    }
}

/// Load the directive set, falling back to the operator prompt when the
/// default file is absent. Returns `None` when the operator chose restore
/// mode instead.
fn load_directives(
    explicit: Option<PathBuf>,
    base_dir: &Path,
    interactive: bool,
) -> Result<Option<DirectiveSet>> {
    let (path, explicit_path) = match explicit {
        Some(path) => (path, true),
        None => (base_dir.join(DEFAULT_DIRECTIVE_FILE), false),
    };

    match load_from_path(&path) {
        Ok(set) => Ok(Some(set)),
        Err(e) if e.is_source_missing() && !explicit_path && interactive => {
            println!("\nDirective file not found: {}", path.display());
            match ConsolePrompt.select_directive_source() {
                SourceFallback::Selected(selected) => {
                    let set = load_from_path(&selected)
                        .with_context(|| format!("failed to load {}", selected.display()))?;
                    println!("Selected: {}", selected.display());
                    Ok(Some(set))
                }
                SourceFallback::RestoreMode => Ok(None),
                SourceFallback::Cancelled => {
                    anyhow::bail!("no directive source selected")
                }
            }
        }
        Err(e) => Err(e).with_context(|| format!("failed to load {}", path.display())),
    }
}

fn cmd_apply(
    directives: Option<PathBuf>,
    base_dir: Option<PathBuf>,
    backup_policy: Option<PolicyArg>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    println!("Base directory: {}", base_dir.display());

    let Some(set) = load_directives(directives, &base_dir, !dry_run)? else {
        // Operator chose recovery instead of patching.
        return cmd_restore(Some(base_dir), None, false);
    };

    let save_dir = set.resolve_save_dir(&base_dir);
    let policy = backup_policy
        .map(PolicyArg::to_policy)
        .or_else(|| set.settings.backup_policy.map(|c| c.to_policy()))
        .unwrap_or_default();

    println!("Save directory: {}", save_dir.display());
    println!("Directive groups: {}", set.groups.len());
    println!();

    let patcher = Patcher::new(&save_dir, policy);
    let report = if dry_run {
        println!("{}", "[DRY RUN - no files will be modified]".cyan());
        patcher.check(&set)
    } else {
        patcher.apply(&set)
    };

    render_modify_report(&report, dry_run, show_diff);

    let summary = report.summary();
    println!("{}", "Summary:".bold());
    println!(
        "  {} group(s) processed, {} without matches",
        summary.groups, summary.groups_unmatched
    );
    println!("  {} file(s) matched", summary.files_matched);
    println!(
        "  {} {}",
        format!("{} file(s)", summary.files_changed).green(),
        if dry_run { "would change" } else { "rewritten" }
    );
    println!(
        "  {} line(s) rewritten, {} skipped",
        summary.lines_rewritten, summary.lines_skipped
    );
    println!("  {} failed", format!("{}", summary.files_failed).red());

    if report.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}

fn render_modify_report(report: &ModifyReport, dry_run: bool, show_diff: bool) {
    for group in &report.groups {
        println!("{}", format!("Group {}:", group.base_name).bold());

        let files = match &group.files {
            Err(e) => {
                eprintln!("  {} {}", "✗".red(), e);
                continue;
            }
            Ok(files) => files,
        };

        if files.is_empty() {
            println!("  {} no {}_* save files found", "⊘".cyan(), group.base_name);
            continue;
        }

        for file in files {
            match &file.result {
                Err(e) => {
                    eprintln!("  {} {}: {}", "✗".red(), file.file, e);
                }
                Ok(patch) => {
                    render_file_patch(patch, dry_run);
                    if show_diff && patch.changed {
                        display_diff(&patch.file, &patch.old_content, &patch.new_content);
                    }
                }
            }
        }
        println!();
    }
}

fn render_file_patch(patch: &FilePatch, dry_run: bool) {
    let rewritten = patch.lines.iter().filter(|l| l.rewritten()).count();
    let glyph = if patch.changed {
        "✓".green()
    } else {
        "⊙".yellow()
    };
    let verb = if dry_run { "would rewrite" } else { "rewritten" };
    print!("  {} {}: {} line(s) {}", glyph, patch.file, rewritten, verb);
    if let Some(name) = patch.backup.as_deref().and_then(Path::file_name) {
        print!(" [backup: {}]", name.to_string_lossy());
    }
    println!();

    for line in &patch.lines {
        match &line.outcome {
            LineOutcome::Rewritten { old, new } => {
                println!("      line {}: {} -> {}", line.line, old, new);
            }
            LineOutcome::NoNumericToken => {
                println!(
                    "      {}",
                    format!("line {}: no numeric token, unchanged", line.line).yellow()
                );
            }
            LineOutcome::OutOfRange { line_count } => {
                println!(
                    "      {}",
                    format!(
                        "line {}: out of range ({} line(s) total)",
                        line.line, line_count
                    )
                    .yellow()
                );
            }
        }
    }
}

/// Show unified diff between original and rewritten content.
fn display_diff(file: &str, original: &str, modified: &str) {
    println!("\n{}", format!("--- {file} (original)").dimmed());
    println!("{}", format!("+++ {file} (patched)").dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{change}").red(),
            ChangeTag::Insert => format!("+{change}").green(),
            ChangeTag::Equal => format!(" {change}").normal(),
        };
        print!("{sign}");
    }
}

fn cmd_restore(base_dir: Option<PathBuf>, dir: Option<PathBuf>, yes: bool) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    let save_dir = dir.unwrap_or_else(|| base_dir.clone());

    println!("Restore mode");
    println!("Save directory: {}", save_dir.display());
    println!();

    // Restoration reads the single .backup slot, whatever policy wrote it.
    let patcher = Patcher::new(&save_dir, BackupPolicy::SingleSlot);
    let report = if yes {
        patcher.restore_all(&mut AssumeYes)?
    } else {
        patcher.restore_all(&mut ConsolePrompt)?
    };

    if report.backups.is_empty() {
        println!("No backup files found");
        return Ok(());
    }

    if !report.confirmed {
        println!("Restore cancelled, nothing touched");
        return Ok(());
    }

    for (name, result) in &report.results {
        match result {
            Ok(RestoreOutcome::Restored) => println!("  {} {}: restored", "✓".green(), name),
            Ok(RestoreOutcome::BackupMissing) => {
                println!("  {} {}: backup missing, skipped", "⊙".yellow(), name)
            }
            Err(e) => eprintln!("  {} {}: {}", "✗".red(), name, e),
        }
    }

    println!();
    println!(
        "{}",
        format!(
            "Restored {}/{} file(s)",
            report.restored(),
            report.results.len()
        )
        .bold()
    );

    if report.failed() > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_status(directives: Option<PathBuf>, base_dir: Option<PathBuf>) -> Result<()> {
    let base_dir = resolve_base_dir(base_dir)?;
    println!("Base directory: {}", base_dir.display());

    let set = load_directives(directives, &base_dir, false)?
        .expect("non-interactive load always returns a set");

    let save_dir = set.resolve_save_dir(&base_dir);
    println!("Save directory: {}", save_dir.display());
    println!();

    let patcher = Patcher::new(&save_dir, BackupPolicy::UniqueVersioned);
    let report = patcher.check(&set);
    render_modify_report(&report, true, false);

    let backups = savepatch::discover_backups(&save_dir).unwrap_or_default();
    println!("{} backup file(s) present", backups.len());

    let summary = report.summary();
    println!(
        "{} of {} matched file(s) would change",
        summary.files_changed, summary.files_matched
    );

    Ok(())
}
