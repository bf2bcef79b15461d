use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cyberlab::client::ProgressClient;
use cyberlab::config::{Config, WRITE_TIMEOUT};
use cyberlab::console::{Response, Submission};
use cyberlab::labs::{self, REGISTRY};
use cyberlab::missions::Transition;
use cyberlab::models::{Identity, LoginInput, SignupInput};
use cyberlab::progress::{LocalCache, ProgressStore};
use cyberlab::session::{LabSession, StepUpdate};
use cyberlab::{api, db};

#[derive(Parser)]
#[command(name = "cyberlab")]
#[command(about = "Simulated hacking labs with a guided mission for every console")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the progress service
    Serve {
        /// Port for HTTP API
        #[arg(short, long, default_value = "5000")]
        port: u16,

        /// SQLite database path (defaults to the data directory)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Open the console for a lab (id or slug, e.g. `2` or `lab02`)
    Play { lab: String },
    /// List labs with lock state and progress
    Labs,
    /// Show the top scores on the progress service
    Leaderboard,
    /// Create an account on the progress service and sign in
    Signup {
        username: String,
        #[arg(long)]
        student_id: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Sign in to the progress service
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Sign out and forget local progress
    Logout,
    /// Erase local progress for one lab
    Reset { lab: String },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "cyberlab=info,tower_http=info".into()),
    );

    // stdout is the console transcript, so logs always go to stderr
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = Config::from_env();

    match cli.command {
        Commands::Serve { port, db } => serve(&config, port, db).await?,
        Commands::Play { lab } => {
            let store = open_store(&config)?;
            store.reload().await;
            play(store, resolve_lab(&lab)?).await?;
        }
        Commands::Labs => {
            let store = open_store(&config)?;
            store.reload().await;
            list_labs(&store);
        }
        Commands::Leaderboard => {
            let client = ProgressClient::new(&config.service_url);
            for entry in client.leaderboard().await? {
                println!(
                    "{:>3}. {:<20} {:>5} pts  {} labs",
                    entry.rank, entry.username, entry.total_score, entry.labs_completed
                );
            }
        }
        Commands::Signup {
            username,
            student_id,
            email,
            password,
        } => {
            let store = open_store(&config)?;
            let client = ProgressClient::new(&config.service_url);
            let auth = client
                .signup(&SignupInput {
                    username,
                    student_id,
                    email,
                    password,
                })
                .await?;
            store.set_identity(Some(Identity::from(&auth))).await;
            println!("Welcome, {}! You are signed in.", auth.user.username);
        }
        Commands::Login { username, password } => {
            let store = open_store(&config)?;
            let client = ProgressClient::new(&config.service_url);
            let auth = client.login(&LoginInput { username, password }).await?;
            store.set_identity(Some(Identity::from(&auth))).await;
            println!(
                "Signed in as {} ({} pts).",
                auth.user.username, auth.user.total_score
            );
        }
        Commands::Logout => {
            let store = open_store(&config)?;
            store.set_identity(None).await;
            println!("Signed out. Local progress cleared.");
        }
        Commands::Reset { lab } => {
            let lab = resolve_lab(&lab)?;
            open_store(&config)?.reset_lab(lab);
            println!("Progress for lab {} erased.", lab);
        }
    }

    Ok(())
}

async fn serve(config: &Config, port: u16, db_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match db_path {
        Some(path) => path,
        None => config.service_db_path()?,
    };
    tracing::info!("Opening service database at {}", path.display());

    let db = db::Database::open(path)?;
    db.migrate()?;

    let app = api::create_router(db, api::SecurityConfig::from_config(config));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("Progress service listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn open_store(config: &Config) -> anyhow::Result<ProgressStore> {
    let cache = LocalCache::open(config.local_cache_path()?)?;
    Ok(ProgressStore::new(
        cache,
        ProgressClient::new(&config.service_url),
    ))
}

fn resolve_lab(arg: &str) -> anyhow::Result<u32> {
    let meta = match arg.parse::<u32>() {
        Ok(id) => labs::meta(id),
        Err(_) => labs::by_slug(&arg.to_lowercase()),
    };
    meta.map(|m| m.id)
        .with_context(|| format!("No lab called '{}'. Try `cyberlab labs`.", arg))
}

fn list_labs(store: &ProgressStore) {
    match store.identity() {
        Some(identity) => println!("Signed in as {}\n", identity.username),
        None => println!("Not signed in (only lab 1 is open)\n"),
    }
    for meta in &REGISTRY {
        let lock = if store.is_unlocked(meta.id) { " " } else { "x" };
        let done = store.lab_progress(meta.id).completed_steps.len();
        println!(
            "[{}] {} {:<45} {:<12} {:>3} pts  {}/{}",
            lock,
            meta.slug,
            meta.subtitle,
            meta.difficulty.as_str(),
            meta.points,
            done,
            meta.total_steps
        );
    }
    println!("\nScore: {}", store.total_score());
}

// ============================================================
// Interactive console
// ============================================================

const META_HELP: &str = "\
:search <q>     query the search engine
:guess <answer> answer a profile question
:capture        open the flag link
:steps          show the mission
:hint           hint for the current step
:note           toggle the explanation for the last output
:complete <s>   autocomplete a partial command
:prev / :next   recall earlier input
:reset          erase progress for this lab
:quit           leave";

async fn play(store: ProgressStore, lab_id: u32) -> anyhow::Result<()> {
    let mut session = LabSession::open(lab_id, store)?;
    let mut pending: Vec<JoinHandle<()>> = Vec::new();

    println!("{} :: {}", session.meta().title, session.meta().subtitle);
    println!("Type `help` for commands, `:help` for console controls.\n");
    print_current_step(&session);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", session.prompt());
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();

        let update = if let Some(meta) = line.strip_prefix(':') {
            let (name, rest) = meta.split_once(' ').unwrap_or((meta, ""));
            match name {
                "quit" | "q" | "exit" => break,
                "help" => {
                    println!("{}", META_HELP);
                    None
                }
                "search" => match session.search(rest) {
                    Some(result) => {
                        print_response(&result.response);
                        if result.flag_revealed {
                            println!("\n>> A link to the flag appeared. Use :capture to open it.");
                        }
                        Some(result.update)
                    }
                    None if !session.has_search() => {
                        println!("This lab has no search page.");
                        None
                    }
                    None => None,
                },
                "guess" => match session.profile().copied() {
                    Some(profile) => {
                        println!("{} :: {}", profile.name, profile.headline);
                        Some(session.answer_profile(rest))
                    }
                    None => {
                        println!("This lab has no profile to investigate.");
                        None
                    }
                },
                "capture" => match session.capture_flag() {
                    Some((flag, update)) => {
                        println!("{}", flag);
                        Some(update)
                    }
                    None => {
                        println!("No flag link found yet.");
                        None
                    }
                },
                "steps" => {
                    print_steps(&session);
                    None
                }
                "hint" => {
                    match session.current_step() {
                        Some(step) => println!("Hint: {}", step.hint),
                        None => println!("Every step is complete."),
                    }
                    None
                }
                "note" => {
                    print_last_note(&mut session);
                    None
                }
                "complete" => {
                    match session.interpreter().accept_suggestion(rest) {
                        Some(full) => println!("{}", full),
                        None => println!("No completion for '{}'.", rest),
                    }
                    None
                }
                "prev" => {
                    println!("{}", session.interpreter_mut().history_back());
                    None
                }
                "next" => {
                    println!("{}", session.interpreter_mut().history_forward());
                    None
                }
                "reset" => {
                    session.reset_progress();
                    println!("Progress for this lab erased.");
                    print_current_step(&session);
                    None
                }
                other => {
                    println!("Unknown console control ':{}'. Try :help.", other);
                    None
                }
            }
        } else {
            let result = session.run_command(line);
            match &result.submission {
                Submission::Displayed(response) => print_response(response),
                Submission::Cleared => print!("\x1b[2J\x1b[H"),
                Submission::Ignored => {}
            }
            Some(result.update)
        };

        if let Some(update) = update {
            report(&session, update, &mut pending);
        }
    }

    flush_pending(pending).await;
    Ok(())
}

fn report(session: &LabSession, update: StepUpdate, pending: &mut Vec<JoinHandle<()>>) {
    if let Some(handle) = update.sync {
        pending.push(handle);
    }
    match update.transition {
        Transition::Unchanged => {}
        Transition::StepCompleted { step } => {
            println!("\n[+] Step {} complete", step);
            print_current_step(session);
        }
        Transition::LabCompleted { step, .. } => {
            println!("\n[+] Step {} complete", step);
            println!(
                "\n*** {} cleared! +{} pts ***\n",
                session.meta().title,
                session.meta().points
            );
        }
    }
}

/// Give in-flight syncs up to one write timeout to land.
async fn flush_pending(pending: Vec<JoinHandle<()>>) {
    let deadline = tokio::time::Instant::now() + WRITE_TIMEOUT;
    for handle in pending {
        if tokio::time::timeout_at(deadline, handle).await.is_err() {
            tracing::debug!("gave up waiting for progress sync");
            break;
        }
    }
}

fn print_response(response: &Response) {
    let prefix = if response.is_error { "! " } else { "" };
    for line in &response.lines {
        println!("{}{}", prefix, line);
    }
}

fn print_last_note(session: &mut LabSession) {
    let Some(index) = session.interpreter().entries().len().checked_sub(1) else {
        println!("Nothing to explain yet.");
        return;
    };
    match session.interpreter_mut().toggle_note(index) {
        Some(true) => {
            if let Some(note) = &session.interpreter().entries()[index].response.note {
                println!("{}", note.en);
                if let Some(ar) = &note.ar {
                    println!("{}", ar);
                }
            }
        }
        Some(false) => println!("(explanation hidden)"),
        None => println!("No explanation for that output."),
    }
}

fn print_current_step(session: &LabSession) {
    match session.current_step() {
        Some(step) => println!(
            "Mission {}/{}: {} :: {}",
            step.id,
            session.tracker().total(),
            step.title,
            step.objective
        ),
        None => println!("Mission complete."),
    }
}

fn print_steps(session: &LabSession) {
    for step in session.tracker().steps() {
        let mark = if session.tracker().is_completed(step.id) {
            "x"
        } else {
            " "
        };
        println!(
            "[{}] {:>2}. {:<40} ({})",
            mark,
            step.id,
            step.title,
            step.listens_to.as_str()
        );
    }
    println!(
        "{}/{} complete",
        session.completed_count(),
        session.tracker().total()
    );
}
