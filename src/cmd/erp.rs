use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use argh::FromArgs;
use regex::RegexBuilder;

use erptool::{
    format::erp::ErpFile,
    util::file::{map_file, write_file},
    Error,
};

#[derive(FromArgs, PartialEq, Debug)]
/// process ERP archives
#[argh(subcommand, name = "erp")]
pub struct Args {
    #[argh(subcommand)]
    command: SubCommand,
}

#[derive(FromArgs, PartialEq, Debug)]
#[argh(subcommand)]
enum SubCommand {
    List(ListArgs),
    New(NewArgs),
    Copy(CopyArgs),
    Remove(RemoveArgs),
    Rename(RenameArgs),
    StripMips(StripMipsArgs),
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// list the entries of an archive
#[argh(subcommand, name = "list")]
pub struct ListArgs {
    #[argh(positional)]
    /// input file
    input: PathBuf,
    #[argh(option, short = 'f')]
    /// only list entries matching this case-insensitive pattern
    filter: Option<String>,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// create an empty archive
#[argh(subcommand, name = "new")]
pub struct NewArgs {
    #[argh(positional)]
    /// output file
    output: PathBuf,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// copy an entry from one archive into another
#[argh(subcommand, name = "copy")]
pub struct CopyArgs {
    #[argh(positional)]
    /// source archive
    input: PathBuf,
    #[argh(positional)]
    /// destination archive (created if missing)
    output: PathBuf,
    #[argh(positional)]
    /// name of the entry to copy
    name: String,
    #[argh(option)]
    /// new name for the copied entry
    rename: Option<String>,
    #[argh(switch)]
    /// drop the existing extension when renaming
    strip_ext: bool,
    #[argh(switch)]
    /// remove the highest mip level before copying
    strip_mips: bool,
    #[argh(switch)]
    /// replace an existing entry of the same name
    overwrite: bool,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// remove an entry from an archive
#[argh(subcommand, name = "remove")]
pub struct RemoveArgs {
    #[argh(positional)]
    /// archive file
    input: PathBuf,
    #[argh(positional)]
    /// name of the entry to remove
    name: String,
    #[argh(option, short = 'o')]
    /// write the result here instead of editing in place
    output: Option<PathBuf>,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// rename an entry, keeping its extension unless told otherwise
#[argh(subcommand, name = "rename")]
pub struct RenameArgs {
    #[argh(positional)]
    /// archive file
    input: PathBuf,
    #[argh(positional)]
    /// name of the entry to rename
    name: String,
    #[argh(positional)]
    /// new name/path for the entry
    new_name: String,
    #[argh(switch)]
    /// drop the existing extension instead of keeping it
    strip_ext: bool,
    #[argh(option, short = 'o')]
    /// write the result here instead of editing in place
    output: Option<PathBuf>,
}

#[derive(FromArgs, PartialEq, Eq, Debug)]
/// remove the highest mip level of a surface entry
#[argh(subcommand, name = "strip-mips")]
pub struct StripMipsArgs {
    #[argh(positional)]
    /// archive file
    input: PathBuf,
    #[argh(positional)]
    /// name of the surface entry
    name: String,
    #[argh(option, short = 'o')]
    /// write the result here instead of editing in place
    output: Option<PathBuf>,
}

pub fn run(args: Args) -> Result<()> {
    match args.command {
        SubCommand::List(c_args) => list(c_args),
        SubCommand::New(c_args) => new(c_args),
        SubCommand::Copy(c_args) => copy(c_args),
        SubCommand::Remove(c_args) => remove(c_args),
        SubCommand::Rename(c_args) => rename(c_args),
        SubCommand::StripMips(c_args) => strip_mips(c_args),
    }
}

fn load(path: &Path) -> Result<ErpFile> {
    let data = map_file(path)?;
    let file = ErpFile::read(&data)
        .with_context(|| format!("Failed to load archive '{}'", path.display()))?;
    log::debug!("Loaded '{}': {} entries", path.display(), file.entries.len());
    Ok(file)
}

fn save(file: &ErpFile, path: &Path) -> Result<()> {
    write_file(path, &file.to_bytes()?)?;
    log::info!(
        "Wrote '{}' ({} entries, {} sub-records)",
        path.display(),
        file.entries.len(),
        file.sub_record_total()
    );
    Ok(())
}

fn list(args: ListArgs) -> Result<()> {
    let file = load(&args.input)?;
    let filter = args
        .filter
        .as_deref()
        .map(|pattern| RegexBuilder::new(pattern).case_insensitive(true).build())
        .transpose()
        .context("Invalid filter pattern")?;
    let mut shown = 0usize;
    for (index, entry) in file.entries.iter().enumerate() {
        let name = entry.display_name();
        if let Some(filter) = &filter {
            if !filter.is_match(&name) {
                continue;
            }
        }
        shown += 1;
        let tag = entry.type_tag.to_string();
        println!("{:>4}  {:<16} {:>3}  {}", index + 1, tag, entry.sub_records.len(), name);
    }
    log::info!("{} of {} entries shown", shown, file.entries.len());
    Ok(())
}

fn new(args: NewArgs) -> Result<()> { save(&ErpFile::default(), &args.output) }

fn copy(args: CopyArgs) -> Result<()> {
    let source = load(&args.input)?;
    let mut dest = if args.output.exists() {
        load(&args.output)?
    } else {
        log::info!("Creating new archive '{}'", args.output.display());
        ErpFile::default()
    };
    let entry =
        source.entry(&args.name).ok_or_else(|| Error::NotFound(args.name.clone()))?;
    let mut entry = match &args.rename {
        Some(new_name) => entry.renamed(new_name, args.strip_ext)?,
        None => entry.clone(),
    };
    if args.strip_mips {
        entry.remove_mip()?;
    }
    let name = entry.display_name().into_owned();
    dest.add_entry(entry, args.overwrite)?;
    log::info!("Added '{name}'");
    save(&dest, &args.output)
}

fn remove(args: RemoveArgs) -> Result<()> {
    let mut file = load(&args.input)?;
    let entry = file.remove_entry(&args.name)?;
    log::info!("Removed '{}'", entry.display_name());
    save(&file, args.output.as_deref().unwrap_or(&args.input))
}

fn rename(args: RenameArgs) -> Result<()> {
    let mut file = load(&args.input)?;
    file.rename_entry(&args.name, &args.new_name, args.strip_ext)?;
    save(&file, args.output.as_deref().unwrap_or(&args.input))
}

fn strip_mips(args: StripMipsArgs) -> Result<()> {
    let mut file = load(&args.input)?;
    let entry =
        file.entry_mut(&args.name).ok_or_else(|| Error::NotFound(args.name.clone()))?;
    entry.remove_mip()?;
    save(&file, args.output.as_deref().unwrap_or(&args.input))
}
