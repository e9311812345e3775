use clap::{App, AppSettings, Arg, SubCommand};
use std::io::{self, Write};
use std::process::Command;
use std::time::Duration;

use bookmark_sync::platform::{OAuthProvider, OAuthSignIn};
use bookmark_sync::{
    Admission, Bookmark, BookmarkForm, Config, Confirm, Dashboard, DeleteOutcome, Platform,
    SessionGatekeeper, Snapshot, Stats,
};
use chrono::Utc;
use tracing_subscriber::EnvFilter;

/// How long a one-shot command waits for the list to catch up with its change.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .setting(AppSettings::ArgRequiredElseHelp)
        .arg(
            Arg::with_name("database")
                .help("Overrides the default database location")
                .long("database")
                .global(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .help("Logs sync activity to stderr")
                .long("verbose")
                .short("v")
                .global(true),
        )
        .subcommand(
            SubCommand::with_name("login")
                .about("Sign in with an OAuth provider")
                .arg(
                    Arg::with_name("provider")
                        .help("OAuth provider to sign in with")
                        .long("provider")
                        .takes_value(true)
                        .possible_values(&["google", "github"])
                        .default_value("google"),
                )
                .arg(
                    Arg::with_name("email")
                        .help("Account to sign in as")
                        .long("email")
                        .takes_value(true)
                        .required(true),
                ),
        )
        .subcommand(SubCommand::with_name("logout").about("Sign out on this device"))
        .subcommand(SubCommand::with_name("whoami").about("Show the signed-in account"))
        .subcommand(
            SubCommand::with_name("add")
                .about("Add a new bookmark\n\nBy default, you'll be prompted for a title")
                .arg(
                    Arg::with_name("url")
                        .help("The destination URL to bookmark")
                        .required(true),
                )
                .arg(
                    Arg::with_name("title")
                        .help("The title of the bookmark")
                        .long("title")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("list")
                .about("List your bookmarks, most recent first")
                .arg(
                    Arg::with_name("json")
                        .help("Prints the list as JSON")
                        .long("json"),
                )
                .arg(
                    Arg::with_name("no-pretty")
                        .help("Turns off padding for pretty output")
                        .long("no-pretty"),
                ),
        )
        .subcommand(
            SubCommand::with_name("delete")
                .about("Delete a bookmark")
                .arg(
                    Arg::with_name("id")
                        .help("The ID of the bookmark to remove")
                        .required(true),
                )
                .arg(
                    Arg::with_name("yes")
                        .help("Skips the confirmation prompt")
                        .long("yes")
                        .short("y"),
                ),
        )
        .subcommand(
            SubCommand::with_name("open")
                .about("Open a bookmark in your browser")
                .arg(
                    Arg::with_name("id")
                        .help("The ID of the bookmark to open")
                        .required(true),
                ),
        )
        .subcommand(SubCommand::with_name("stats").about("Show bookmark counts"))
        .subcommand(
            SubCommand::with_name("watch")
                .about("Keep the list on screen and update it as bookmarks change"),
        )
        .get_matches();

    init_logging(matches.is_present("verbose"));

    let config = Config::load(matches.value_of("database"))?;
    let platform = Platform::open(&config)?;

    if let Some(matches) = matches.subcommand_matches("login") {
        let provider: OAuthProvider = matches.value_of("provider").unwrap_or("google").parse()?;
        let login_hint = matches.value_of("email").unwrap_or_default().to_string();
        platform
            .auth
            .sign_in_with_oauth(OAuthSignIn {
                provider,
                login_hint,
            })
            .await?;
        let user = platform.auth.get_user().await?;
        println!("Signed in as {} ({})", user.email, user.provider);
        return Ok(());
    }
    if matches.subcommand_matches("logout").is_some() {
        platform.auth.sign_out().await?;
        println!("Signed out");
        return Ok(());
    }

    let gatekeeper = SessionGatekeeper::new(platform.auth.clone(), platform.markers.clone());
    let session = match gatekeeper.admit().await? {
        Admission::Login => {
            eprintln!(
                "Not signed in. Run `{} login --email <address>` first.",
                env!("CARGO_PKG_NAME")
            );
            return Ok(());
        }
        Admission::Admitted {
            session,
            show_welcome,
        } => {
            if show_welcome {
                println!("Welcome, {}! Your bookmarks sync live.", session.user.email);
            }
            session
        }
    };

    if matches.subcommand_matches("whoami").is_some() {
        println!(
            "{}\t{}\t{}",
            session.user.id, session.user.email, session.user.provider
        );
        return Ok(());
    }

    let dashboard = Dashboard::mount(&platform, session.user, &config.sync).await;

    if let Some(matches) = matches.subcommand_matches("add") {
        let url = matches.value_of("url").unwrap_or_default();
        let title = match matches.value_of("title") {
            Some(title) => title.to_string(),
            None => prompt("Title?\t")?,
        };
        let mut form = BookmarkForm::new(title, url);
        let created = dashboard.issuer().create(&mut form).await?;
        settle(&dashboard, |s| s.contains(&created.id)).await;
        println!("Added {}\t{}", created.id, created.title);
    } else if let Some(matches) = matches.subcommand_matches("list") {
        let snapshot = loaded(&dashboard).await?;
        if matches.is_present("json") {
            println!("{}", serde_json::to_string_pretty(&snapshot.bookmarks)?);
        } else {
            print_bookmarks(&snapshot.bookmarks, !matches.is_present("no-pretty"));
        }
    } else if let Some(matches) = matches.subcommand_matches("delete") {
        let id = matches.value_of("id").unwrap_or_default();
        let outcome = if matches.is_present("yes") {
            dashboard.issuer().delete(id, &|_: &str| true).await?
        } else {
            dashboard.issuer().delete(id, &StdinConfirm).await?
        };
        match outcome {
            DeleteOutcome::Deleted => {
                settle(&dashboard, |s| s.is_loaded() && !s.contains(id)).await;
                println!("Deleted {}", id);
            }
            DeleteOutcome::Declined => println!("Kept {}", id),
        }
    } else if let Some(matches) = matches.subcommand_matches("open") {
        let id = matches.value_of("id").unwrap_or_default();
        let snapshot = loaded(&dashboard).await?;
        match snapshot.bookmarks.iter().find(|b| b.id == id) {
            Some(bookmark) => open_in_browser(&bookmark.url)?,
            None => eprintln!("No bookmark with ID {}", id),
        }
    } else if matches.subcommand_matches("stats").is_some() {
        let stats = dashboard.stats().await?;
        print_stats(&stats);
    } else if matches.subcommand_matches("watch").is_some() {
        watch(&dashboard).await?;
    }

    dashboard.unmount();
    Ok(())
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn prompt(label: &str) -> io::Result<String> {
    let mut input = String::new();
    io::stdout().write_all(label.as_bytes())?;
    io::stdout().flush()?;
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, question: &str) -> bool {
        match prompt(&format!("{} [y/N] ", question)) {
            Ok(answer) => matches!(answer.to_lowercase().as_str(), "y" | "yes"),
            Err(_) => false,
        }
    }
}

/// Refreshes now and returns the first loaded snapshot.
async fn loaded(dashboard: &Dashboard) -> bookmark_sync::Result<Snapshot> {
    dashboard.reconciler().refresh().await?;
    Ok(settle(dashboard, Snapshot::is_loaded).await)
}

async fn settle(dashboard: &Dashboard, predicate: impl FnMut(&Snapshot) -> bool) -> Snapshot {
    match tokio::time::timeout(SETTLE_TIMEOUT, dashboard.view().wait_for(predicate)).await {
        Ok(snapshot) => snapshot,
        Err(_) => {
            tracing::warn!("list did not refresh in time, showing last known state");
            dashboard.view().current()
        }
    }
}

async fn watch(dashboard: &Dashboard) -> Result<(), Box<dyn std::error::Error>> {
    if dashboard.channel_status().is_none() {
        eprintln!("Live updates unavailable; the list only refreshes after local changes.");
    }
    let mut rx = dashboard.view().subscribe();
    let current = rx.borrow_and_update().clone();
    if current.is_loaded() {
        print_bookmarks(&current.bookmarks, true);
    }
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();
                println!();
                print_bookmarks(&snapshot.bookmarks, true);
                print_stats(&Stats::tally(&snapshot.bookmarks, Utc::now().naive_utc()));
            }
            signal = &mut interrupted => {
                signal?;
                break;
            }
        }
    }
    Ok(())
}

fn print_bookmarks(bookmarks: &[Bookmark], pretty: bool) {
    let mut longest_title = 0;
    let mut longest_url = 0;
    if pretty {
        for bookmark in bookmarks {
            longest_title = longest_title.max(bookmark.title.len());
            longest_url = longest_url.max(bookmark.url.len());
        }
    }
    for bookmark in bookmarks {
        println!(
            "{}\t{: <longest_title$}\t{: <longest_url$}\t{}",
            bookmark.id,
            bookmark.title,
            bookmark.url,
            bookmark.created_at.format("%Y-%m-%d %H:%M"),
            longest_title = longest_title,
            longest_url = longest_url
        )
    }
}

fn print_stats(stats: &Stats) {
    println!(
        "Total: {}\tThis week: {}\tLast 24h: {}",
        stats.total, stats.last_week, stats.last_day
    );
}

fn open_in_browser(url: &str) -> io::Result<()> {
    if cfg!(target_os = "windows") {
        Command::new("cmd").args(["/C", "start", url]).output()?;
    } else if cfg!(target_os = "macos") {
        Command::new("open").arg(url).output()?;
    } else if cfg!(target_os = "linux") {
        Command::new("xdg-open").arg(url).output()?;
    } else {
        eprintln!("Could not open bookmark, not implemented for your OS.")
    }
    Ok(())
}
