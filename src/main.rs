mod config;
mod exec;
mod ics;
mod rules;

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, Local, NaiveDate};
use clap::Parser;
use config::Config;
use exec::Step;
use std::io::Write;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "calpage", disable_help_flag = true)]
#[command(about = "Render a yearly HTML calendar page from a plain-text event file")]
struct Cli {
    /// Year to render (defaults to the current year)
    year: Option<String>,

    /// Open the birthday reference file
    #[arg(short = 'b')]
    birthdays: bool,

    /// Change into the calendar directory
    #[arg(short = 'd')]
    directory: bool,

    /// Open the event file for editing
    #[arg(short = 'e')]
    edit: bool,

    /// Export the event file to iCalendar, optionally from a minimum date
    #[arg(short = 'i', value_name = "DATE")]
    ics: Option<Option<String>>,

    /// Print event lines matching a pattern (all lines when omitted)
    #[arg(short = 'l', value_name = "PATTERN")]
    list: Option<Option<String>>,

    /// Historical editor launcher (disabled)
    #[arg(short = 'm')]
    launcher: bool,

    /// Open the genealogy birthday file
    #[arg(short = 't')]
    genealogy: bool,

    /// Print usage
    #[arg(short = 'h', short_alias = '?')]
    usage: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let now = Local::now();

    if cli.usage || cli.year.as_deref() == Some("help") {
        usage();
        std::process::exit(1);
    }

    let cfg = config::load_config()?;

    // One action per invocation, first match wins
    if cli.birthdays {
        return cmd_open(&cfg, cfg.birthday_path()).await;
    }
    if cli.directory {
        return cmd_enter_dir(&cfg);
    }
    if cli.edit {
        return cmd_open(&cfg, cfg.event_path()).await;
    }
    if let Some(ref min_date) = cli.ics {
        return cmd_export(&cfg, now, min_date.as_deref());
    }
    if let Some(ref pattern) = cli.list {
        return cmd_search(&cfg, pattern.as_deref());
    }
    if cli.launcher {
        println!("The -m editor launcher is disabled.");
        return Ok(());
    }
    if cli.genealogy {
        return cmd_open(&cfg, cfg.genealogy_path()).await;
    }

    let today = now.date_naive();
    let year = match cli.year {
        None => today.year(),
        Some(ref arg) => match parse_year(arg) {
            Some(year) => year,
            None => {
                usage();
                std::process::exit(1);
            }
        },
    };

    cmd_render(&cfg, today, year).await
}

fn usage() {
    println!("Usage: calpage [YYYY|-b|-d|-e|-i [DATE]|-l [PATTERN]|-m|-t|-h|-?|help]");
    println!();
    println!("  (none)        render the calendar page for the current year");
    println!("  YYYY          render the calendar page for the given year");
    println!("  -b            open the birthday reference file");
    println!("  -d            change into the calendar directory");
    println!("  -e            open the event file for editing");
    println!("  -i [DATE]     export the event file to iCalendar, starting at DATE");
    println!("  -l [PATTERN]  print event lines matching PATTERN");
    println!("  -m            historical editor launcher (disabled)");
    println!("  -t            open the genealogy birthday file");
    println!("  -h, -?, help  print this usage");
}

/// Accept exactly four digits as a render year.
fn parse_year(arg: &str) -> Option<i32> {
    if arg.len() == 4 && arg.bytes().all(|b| b.is_ascii_digit()) {
        arg.parse().ok()
    } else {
        None
    }
}

/// Render the calendar page for `year` and publish it.
async fn cmd_render(cfg: &Config, today: NaiveDate, year: i32) -> Result<()> {
    let base = cfg.base_dir();
    let sed = exec::resolve(&cfg.commands.sed)?;

    // Normalize the event file's date tokens for the renderer
    let normalized = Step::new("normalize", &sed)
        .arg("-f")
        .arg(cfg.rules_path())
        .arg(cfg.event_path())
        .capture()
        .await?;
    let mut events = tempfile::NamedTempFile::new().context("Failed to create event temp file")?;
    events
        .write_all(&normalized)
        .and_then(|_| events.flush())
        .context("Failed to write normalized events")?;

    // Render the year
    let pcal = exec::resolve(&cfg.commands.pcal)?;
    let html = Step::new("render", pcal)
        .arg("-H")
        .arg("-f")
        .arg(events.path())
        .arg(year.to_string())
        .capture()
        .await?;

    let out_dir = cfg.output_dir();
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;
    let page = out_dir.join(format!("{}.html", year));
    std::fs::write(&page, html)
        .with_context(|| format!("Failed to write {}", page.display()))?;

    // Decorate the page with the per-run rule set
    let script = rules::write_script(&rules::page_rules(today))?;
    Step::new("decorate", &sed)
        .arg("-i")
        .arg("-f")
        .arg(script.path())
        .arg(&page)
        .run()
        .await?;

    println!("{}", page.display());

    let open = exec::resolve(&cfg.commands.open)?;
    Step::new("open", open).arg(&page).run().await?;

    // Publish the calendar directory
    let git = exec::resolve(&cfg.commands.git)?;
    Step::new("stage", &git)
        .current_dir(&base)
        .args(["add", "-A"])
        .run()
        .await?;
    Step::new("commit", &git)
        .current_dir(&base)
        .args(["commit", "-m"])
        .arg(&cfg.commit_message)
        .benign_failure()
        .run()
        .await?;
    Step::new("push", &git)
        .current_dir(&base)
        .arg("push")
        .run()
        .await?;

    Ok(())
}

/// Open a file with the configured opener.
async fn cmd_open(cfg: &Config, path: PathBuf) -> Result<()> {
    let open = exec::resolve(&cfg.commands.open)?;
    Step::new("open", open).arg(path).run().await
}

/// Change into the calendar directory.
///
/// Historical behavior, kept as is: only this process's working directory
/// changes; the caller's shell is untouched.
fn cmd_enter_dir(cfg: &Config) -> Result<()> {
    let base = cfg.base_dir();
    std::env::set_current_dir(&base)
        .with_context(|| format!("Failed to change into {}", base.display()))
}

/// Print event-file lines matching `pattern` (all lines when omitted).
fn cmd_search(cfg: &Config, pattern: Option<&str>) -> Result<()> {
    let path = cfg.event_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read event file at {}", path.display()))?;

    let re = regex::Regex::new(pattern.unwrap_or(""))
        .with_context(|| format!("Invalid pattern {:?}", pattern.unwrap_or("")))?;

    for line in contents.lines() {
        if re.is_match(line) {
            println!("{}", line);
        }
    }

    Ok(())
}

/// Export the event file to an iCalendar document.
fn cmd_export(cfg: &Config, now: DateTime<Local>, min_date: Option<&str>) -> Result<()> {
    let tz: chrono_tz::Tz = cfg
        .timezone
        .parse()
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Unknown timezone {:?} in config.toml", cfg.timezone))?;

    let min_date = match min_date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("Invalid minimum date {:?}, expected YYYY-MM-DD", s))?,
        None => now.with_timezone(&tz).date_naive(),
    };

    let path = cfg.event_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read event file at {}", path.display()))?;

    let parsed = ics::parse::parse_lines(&contents);
    let events = ics::generate::filter_from(ics::generate::group_events(parsed, tz), min_date);
    let document = ics::generate::to_ics(&events, &cfg.calendar_name, tz, &cfg.owner);

    let out = cfg.ics_path();
    std::fs::write(&out, document)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!("Wrote {} ({} events)", out.display(), events.len());

    Ok(())
}
