//! machpack - Inspect, validate and rebuild Mach-O, fat and archive files.
//!
//! Print container layouts, check every slice and member of many files in
//! parallel, rebuild archive tables of contents, and split or join fat files.

use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use machpack::writer::OutputContent;
use machpack::{
    read_tree, validate_file, ArchFlag, Container, Detector, FileKind, Ofile, OutputFile, TocStatus,
    ValidationConfig, Verdict, WriteOptions, Writer,
};

/// Inspect, validate and rebuild Mach-O, fat and archive files.
#[derive(Parser, Debug)]
#[command(name = "machpack")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the slices and members of each file
    Info {
        /// Files to describe
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Validate every slice, member and object of each file
    Check {
        /// Files to validate
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Reject misaligned object members instead of warning
        #[arg(long)]
        strict_alignment: bool,

        /// Accept fat files as archive members
        #[arg(long)]
        fat_in_archives: bool,

        /// Number of parallel jobs (default: number of CPUs)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Print the table of contents of an archive
    Toc {
        /// Archive, or fat file of archives
        file: PathBuf,

        /// Architecture to use (e.g., "arm64", "x86_64", "armv7s")
        #[arg(short, long)]
        arch: Option<String>,
    },

    /// Rebuild the table of contents of each archive
    Ranlib {
        /// Archives to rebuild (in place unless --output is given)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output path (only with a single input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep the table of contents in link order
        #[arg(long)]
        no_sort: bool,

        /// Include common symbols in the table of contents
        #[arg(short, long)]
        commons: bool,

        /// Always write a 64-bit table of contents
        #[arg(long)]
        force_64: bool,

        /// Fail when a symbol is defined by more than one member
        #[arg(long)]
        strict_duplicates: bool,
    },

    /// Extract one architecture from a fat file
    Thin {
        /// Fat input file
        file: PathBuf,

        /// Architecture to keep
        #[arg(short, long)]
        arch: String,

        /// Output path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Combine thin files into one fat file
    Create {
        /// Input files, one per architecture
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output path
        #[arg(short, long)]
        output: PathBuf,

        /// Use a 64-bit fat header
        #[arg(long)]
        fat64: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info { files } => cmd_info(files),
        Commands::Check {
            files,
            strict_alignment,
            fat_in_archives,
            jobs,
        } => {
            let config = ValidationConfig {
                require_pointer_alignment: strict_alignment,
                permit_fat_objects_in_archives: fat_in_archives,
                ..Default::default()
            };
            cmd_check(files, config, jobs)
        }
        Commands::Toc { file, arch } => cmd_toc(file, arch),
        Commands::Ranlib {
            files,
            output,
            no_sort,
            commons,
            force_64,
            strict_duplicates,
        } => {
            let config = ValidationConfig {
                include_tentative_defs_in_toc: commons,
                force_64bit_toc: force_64,
                ..Default::default()
            };
            let options = WriteOptions {
                sort_toc: !no_sort,
                strict_duplicates,
                toc_time: toc_time(),
                ..Default::default()
            };
            cmd_ranlib(files, output, config, options)
        }
        Commands::Thin { file, arch, output } => cmd_thin(file, arch, output),
        Commands::Create { inputs, output, fat64 } => cmd_create(inputs, output, fat64),
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Time stamped on rebuilt tables of contents; zero when `ZERO_AR_DATE` is
/// set so builds are reproducible.
fn toc_time() -> u64 {
    if std::env::var_os("ZERO_AR_DATE").is_some() {
        return 0;
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Permission bits of `path`, so rewritten files keep them.
#[cfg(unix)]
fn file_mode(path: &Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.permissions().mode() & 0o7777)
        .unwrap_or(WriteOptions::default().file_mode)
}

#[cfg(not(unix))]
fn file_mode(_path: &Path) -> u32 {
    WriteOptions::default().file_mode
}

/// Runs `f` for every input, reporting failures and carrying on.
fn for_each_file<F>(files: &[PathBuf], mut f: F) -> Result<()>
where
    F: FnMut(&Path) -> Result<()>,
{
    let mut failed = 0usize;
    for path in files {
        if let Err(e) = f(path) {
            error!("{}: {:#}", path.display(), e);
            failed += 1;
        }
    }
    if failed > 0 {
        bail!("{} of {} files failed", failed, files.len());
    }
    Ok(())
}

fn cmd_info(files: Vec<PathBuf>) -> Result<()> {
    for_each_file(&files, |path| {
        let detector = Detector::default();
        let container = Container::open(path, &detector)
            .with_context(|| format!("Failed to open: {}", path.display()))?;
        println!("{}: {} ({})", container.name(), container.kind(), format_size(container.len() as u64));

        let mut ofile = Ofile::new(&container, detector)?;
        if let Some(table) = ofile.fat() {
            println!(
                "  {} architecture(s){}",
                table.len(),
                if table.is_64 { ", 64-bit fat header" } else { "" }
            );
            let mut next = ofile.first_arch();
            loop {
                match next {
                    Ok(Some(view)) => {
                        if let Some(slice) = view.slice {
                            println!(
                                "  {:<10} offset {:>10}  size {:>10}  align 2^{:<2}  {}",
                                slice.arch_name(),
                                slice.offset,
                                slice.size,
                                slice.align,
                                view.kind
                            );
                        }
                        if view.kind == FileKind::Archive {
                            print_members(&mut ofile)?;
                        }
                    }
                    Ok(None) => break,
                    Err(e) if e.is_recoverable() => warn!("{}", e),
                    Err(e) => return Err(e.into()),
                }
                next = ofile.next_arch();
            }
        } else {
            if let Some(arch) = ofile.slice().arch_name() {
                println!("  architecture {arch}");
            }
            if container.kind() == FileKind::Archive {
                print_members(&mut ofile)?;
            }
        }
        drop(ofile);
        container.unmap();
        Ok(())
    })
}

fn print_members(ofile: &mut Ofile<'_>) -> Result<()> {
    let mut next = ofile.first_member();
    loop {
        match next {
            Ok(Some(view)) => println!(
                "    {:>10} {:>10}  {:<14} {}",
                view.member.header_offset,
                view.member.content_size,
                view.kind.to_string(),
                view.name()
            ),
            Ok(None) => return Ok(()),
            Err(e) if e.is_recoverable() => warn!("{}", e),
            Err(e) => return Err(e.into()),
        }
        next = ofile.next_member();
    }
}

fn cmd_check(files: Vec<PathBuf>, config: ValidationConfig, jobs: Option<usize>) -> Result<()> {
    let start = Instant::now();

    // Configure thread pool
    if let Some(n) = jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .ok();
    }

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let results: Vec<_> = files
        .par_iter()
        .map(|path| {
            let report = validate_file(path, config);
            progress.inc(1);
            (path, report)
        })
        .collect();
    progress.finish_and_clear();

    let mut bad = 0usize;
    let mut unreadable = 0usize;
    for (path, result) in results {
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                error!("{}: {}", path.display(), e);
                unreadable += 1;
                continue;
            }
        };
        for entity in &report.entities {
            match &entity.verdict {
                Verdict::Good => info!("{}: ok ({})", entity.location, entity.kind),
                Verdict::Bad(e) => {
                    println!("{e}");
                    bad += 1;
                }
                Verdict::NotApplicable => debug!("{}: not checked ({})", entity.location, entity.kind),
            }
        }
    }

    info!(
        "Checked {} files in {:.2}s",
        files.len(),
        start.elapsed().as_secs_f64()
    );
    if bad > 0 || unreadable > 0 {
        bail!("{} malformed entities, {} unreadable files", bad, unreadable);
    }
    Ok(())
}

fn cmd_toc(file: PathBuf, arch: Option<String>) -> Result<()> {
    let flag = arch.as_deref().map(ArchFlag::parse).transpose()?;
    let detector = Detector::default();
    let container = Container::open(&file, &detector)
        .with_context(|| format!("Failed to open: {}", file.display()))?;
    let mut ofile = Ofile::select(&container, detector, flag.as_ref(), None)?;

    if flag.is_none() && ofile.fat().is_some() {
        let mut next = ofile.first_arch()?;
        while next.is_some() {
            print_toc(&ofile)?;
            next = ofile.next_arch()?;
        }
    } else {
        print_toc(&ofile)?;
    }
    Ok(())
}

fn print_toc(ofile: &Ofile<'_>) -> Result<()> {
    let location = ofile.location();
    let Some(archive) = ofile.archive() else {
        bail!("{} is not an archive", location);
    };
    match archive.toc() {
        TocStatus::Absent => println!("{location}: no table of contents"),
        TocStatus::Unusable(reason) => println!("{location}: table of contents is unusable ({reason})"),
        TocStatus::Usable(toc) => {
            let name = archive.toc_member().map_or("", |m| m.name.as_str());
            println!("{location}: {name} ({} entries)", toc.entries.len());
            for entry in &toc.entries {
                let member = entry
                    .member
                    .and_then(|i| archive.member(i))
                    .map_or("?", |m| m.name.as_str());
                println!("  {:<40} {} (offset {})", entry.name, member, entry.member_offset);
            }
        }
    }
    Ok(())
}

fn cmd_ranlib(
    files: Vec<PathBuf>,
    output: Option<PathBuf>,
    config: ValidationConfig,
    options: WriteOptions,
) -> Result<()> {
    if output.is_some() && files.len() != 1 {
        bail!("--output requires exactly one input file");
    }
    let detector = Detector::new(config);

    for_each_file(&files, |path| {
        let tree = read_tree(path, detector)?;
        let has_archive = tree
            .archs
            .iter()
            .any(|arch| matches!(arch.content, OutputContent::Archive(_)));
        if !has_archive {
            bail!("not an archive (or fat file of archives)");
        }

        let target = output.as_deref().unwrap_or(path);
        let options = WriteOptions {
            file_mode: file_mode(path),
            ..options
        };
        let advisories = Writer::new(detector, options).write(&tree, target)?;
        info!(
            "Rebuilt {} ({} advisories)",
            target.display(),
            advisories.len()
        );
        Ok(())
    })
}

fn cmd_thin(file: PathBuf, arch: String, output: PathBuf) -> Result<()> {
    let flag = ArchFlag::parse(&arch)?;
    let detector = Detector::default();
    let tree = read_tree(&file, detector).with_context(|| format!("Failed to read: {}", file.display()))?;
    if !tree.fat {
        bail!("input file ({}) must be a fat file", file.display());
    }

    let thin = tree.thin(&flag)?;
    let options = WriteOptions {
        file_mode: file_mode(&file),
        ..Default::default()
    };
    Writer::new(detector, options).write(&thin, &output)?;
    info!("Wrote {} slice to {}", flag, output.display());
    Ok(())
}

fn cmd_create(inputs: Vec<PathBuf>, output: PathBuf, fat64: bool) -> Result<()> {
    let detector = Detector::default();
    let mut trees: Vec<OutputFile> = Vec::with_capacity(inputs.len());
    for path in &inputs {
        let tree = read_tree(path, detector).with_context(|| format!("Failed to read: {}", path.display()))?;
        trees.push(tree);
    }

    let name = output.display().to_string();
    let mut fat = OutputFile::join(name, trees)?;
    fat.fat_64 |= fat64;

    let options = WriteOptions {
        file_mode: file_mode(&inputs[0]),
        ..Default::default()
    };
    Writer::new(detector, options).write(&fat, &output)?;
    info!(
        "Wrote {} architectures to {}",
        fat.archs.len(),
        output.display()
    );
    Ok(())
}

fn format_size(size: u64) -> String {
    if size >= 1024 * 1024 * 1024 {
        format!("{:.1}G", size as f64 / 1024.0 / 1024.0 / 1024.0)
    } else if size >= 1024 * 1024 {
        format!("{:.1}M", size as f64 / 1024.0 / 1024.0)
    } else if size >= 1024 {
        format!("{:.1}K", size as f64 / 1024.0)
    } else {
        format!("{}B", size)
    }
}
