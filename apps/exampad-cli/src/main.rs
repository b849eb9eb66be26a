//! Exampad CLI
//!
//! Command line surface over the exam pipeline. Students list, fetch,
//! flatten, and submit exams; teachers upload exams and browse
//! submissions. Every command is a single best-effort relay call — a
//! failed operation exits nonzero and can simply be re-run.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use exampad_compose::{flatten_file, PageKind, DEFAULT_RASTER_SCALE};
use exampad_overlay::Overlay;
use exampad_relay::{RelayClient, RelayConfig};
use exampad_store::ExamStore;
use exampad_types::{Role, UserSession};
use exampad_workflow::{SubmissionState, SubmissionWorkflow};

#[derive(Parser, Debug)]
#[command(name = "exampad-cli")]
#[command(about = "Exam relay client: fetch, flatten, and submit annotated exam PDFs")]
struct Args {
    /// Relay server base URL
    #[arg(long, env = "EXAMPAD_RELAY_URL", default_value = "http://127.0.0.1:8000")]
    relay_url: String,

    /// Root directory of the local exam store
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Display name used to derive the submission filename
    #[arg(long, default_value = "")]
    name: String,

    /// Act as teacher instead of student
    #[arg(long)]
    teacher: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check whether the relay is reachable
    Ping,
    /// List known classes
    Classes,
    /// List known subjects of a class
    Subjects { class: String },
    /// List exams offered to a class/subject
    List { class: String, subject: String },
    /// Download an exam into the local store
    Fetch {
        class: String,
        subject: String,
        filename: String,
    },
    /// Publish a new exam PDF (teacher)
    Upload {
        class: String,
        subject: String,
        path: PathBuf,
    },
    /// List submissions handed in for a test (teacher)
    Submissions {
        class: String,
        subject: String,
        test_base: String,
    },
    /// Download one submission copy (teacher)
    FetchSubmission {
        class: String,
        subject: String,
        test_base: String,
        filename: String,
    },
    /// Append a utility page to a stored exam
    AppendPage {
        class: String,
        subject: String,
        filename: String,
        #[arg(value_enum, default_value_t = PageKindArg::Blank)]
        kind: PageKindArg,
    },
    /// Flatten the saved overlay into a stored exam
    Flatten {
        class: String,
        subject: String,
        filename: String,
        #[arg(long, default_value_t = DEFAULT_RASTER_SCALE)]
        scale: f64,
    },
    /// Flatten and hand in an exam
    Submit {
        class: String,
        subject: String,
        filename: String,
        #[arg(long, default_value_t = DEFAULT_RASTER_SCALE)]
        scale: f64,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PageKindArg {
    Blank,
    Lined,
    Grid,
}

impl From<PageKindArg> for PageKind {
    fn from(kind: PageKindArg) -> Self {
        match kind {
            PageKindArg::Blank => PageKind::Blank,
            PageKindArg::Lined => PageKind::Lined,
            PageKindArg::Grid => PageKind::Grid,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let role = if args.teacher {
        Role::Teacher
    } else {
        Role::Student
    };
    let session = UserSession {
        display_name: args.name.clone(),
        role,
    };
    let store = ExamStore::new(&args.data_dir);
    let config = RelayConfig::from_base_url(&args.relay_url)
        .with_context(|| format!("invalid relay URL '{}'", args.relay_url))?;
    let relay = RelayClient::new(config);

    match args.command {
        Command::Ping => {
            if relay.ping().await {
                println!("relay is alive");
            } else {
                bail!("relay is not reachable");
            }
        }
        Command::Classes => {
            for class in relay.list_classes(role).await {
                println!("{}", class);
            }
        }
        Command::Subjects { class } => {
            for subject in relay.list_subjects(&class, role).await {
                println!("{}", subject);
            }
        }
        Command::List { class, subject } => {
            let exams = relay.list_exams(&class, &subject).await;
            if exams.is_empty() {
                println!("no exams available");
            }
            for exam in exams {
                let submitted = if store.is_submitted(&class, &subject, &exam.filename) {
                    "  [submitted]"
                } else {
                    ""
                };
                println!("{}{}", exam.filename, submitted);
            }
        }
        Command::Fetch {
            class,
            subject,
            filename,
        } => match relay.fetch_exam(&store, &class, &subject, &filename).await {
            Some(path) => println!("fetched {}", path.display()),
            None => bail!("fetching '{}' failed", filename),
        },
        Command::Upload {
            class,
            subject,
            path,
        } => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading '{}'", path.display()))?;
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .context("upload path has no usable file name")?;
            if !relay.upload_exam(&class, &subject, filename, bytes).await {
                bail!("uploading '{}' failed", filename);
            }
            println!("uploaded {}", filename);
        }
        Command::Submissions {
            class,
            subject,
            test_base,
        } => {
            for row in relay.list_submissions(&class, &subject, &test_base).await {
                println!("{}", row.filename);
            }
        }
        Command::FetchSubmission {
            class,
            subject,
            test_base,
            filename,
        } => {
            match relay
                .fetch_submission(&store, &class, &subject, &test_base, &filename)
                .await
            {
                Some(path) => println!("fetched {}", path.display()),
                None => bail!("fetching submission '{}' failed", filename),
            }
        }
        Command::AppendPage {
            class,
            subject,
            filename,
            kind,
        } => {
            let path = store.exam_path(&class, &subject, &filename);
            exampad_compose::append_page_file(&path, kind.into())?;
            println!("appended {:?} page to {}", kind, path.display());
        }
        Command::Flatten {
            class,
            subject,
            filename,
            scale,
        } => {
            let overlay = store
                .load_overlay(&class, &subject, &filename)?
                .unwrap_or_else(Overlay::new);
            let path = store.exam_path(&class, &subject, &filename);
            flatten_file(&path, &overlay, scale)?;
            println!("flattened {}", path.display());
        }
        Command::Submit {
            class,
            subject,
            filename,
            scale,
        } => {
            let mut workflow = SubmissionWorkflow::new();
            let state = workflow
                .submit(&session, &store, &relay, &class, &subject, &filename, scale)
                .await;
            match state {
                SubmissionState::Submitted => println!("submitted {}", filename),
                other => bail!("submission ended in {:?}", other),
            }
        }
    }

    Ok(())
}
