//! certverify CLI - certificate authenticity verification.
//!
//! Registers institutes, issuers and verifiers, records issued originals,
//! and checks uploaded documents against them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use certverify_core::scoring::AnalysisResult;
use certverify_core::types::{IssuerDocuments, VerifierDocuments};
use certverify_core::{
    AnalysisView, DocumentStatus, IssueRequest, VerificationEngine, VerificationReport,
    Verdict, VerifyConfig, VerifyError, VerifyRequest,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Data directory used when neither `--data-dir` nor the environment sets one.
const DEFAULT_DATA_DIR: &str = ".certverify";

/// certverify - certificate authenticity verification.
///
/// Originals are registered by their issuer under the institute's secret.
/// A verifier's upload is authentic when its keyed hash matches a
/// registered original; otherwise image quality and text heuristics
/// score how suspicious it looks.
#[derive(Parser)]
#[command(name = "certverify")]
#[command(version = VERSION)]
#[command(about = "Certificate authenticity verification")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text, global = true)]
    format: Format,

    /// Directory holding documents and identities
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Hashing secret for uploads that name no institute
    #[arg(long, global = true)]
    fallback_secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage institutes
    #[command(subcommand)]
    Institute(InstituteCommand),

    /// Manage issuers
    #[command(subcommand)]
    Issuer(IssuerCommand),

    /// Manage verifiers
    #[command(subcommand)]
    Verifier(VerifierCommand),

    /// Register an original on behalf of its issuer
    Issue {
        /// Issuer id
        #[arg(long)]
        issuer: String,
        #[command(flatten)]
        file: FileArgs,
    },

    /// Verify an uploaded document
    Verify {
        /// Verifier id
        #[arg(long)]
        verifier: String,
        /// Institute whose secret keys the hash
        #[arg(long)]
        institute: Option<String>,
        /// Document type label
        #[arg(long)]
        document_type: Option<String>,
        #[command(flatten)]
        file: FileArgs,
    },

    /// Re-score a stored document
    Reverify {
        /// Document id
        #[arg(long)]
        document: String,
        /// Verifier id
        #[arg(long)]
        verifier: String,
    },

    /// Show the stored analysis of a document
    Show {
        /// Document id
        #[arg(long)]
        document: String,
    },

    /// List documents by verifier or issuer
    List {
        /// Verifier id
        #[arg(long, conflicts_with = "issuer", required_unless_present = "issuer")]
        verifier: Option<String>,
        /// Issuer id
        #[arg(long)]
        issuer: Option<String>,
    },

    /// Score a file with the heuristics only; nothing is stored
    Analyze {
        /// Path or URL of the document
        #[arg(long)]
        file: String,
        /// Use this text instead of running OCR
        #[arg(long)]
        text: Option<String>,
    },
}

#[derive(Subcommand)]
enum InstituteCommand {
    /// Register an institute
    Add {
        #[arg(long)]
        name: String,
        /// Kind of institution (school, university, ...)
        #[arg(long, default_value = "university")]
        kind: String,
        /// Hashing secret for this institute's documents
        #[arg(long)]
        secret: Option<String>,
    },
}

#[derive(Subcommand)]
enum IssuerCommand {
    /// Register an issuer
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        /// Owning institute id
        #[arg(long)]
        institute: String,
    },
}

#[derive(Subcommand)]
enum VerifierCommand {
    /// Register a verifier
    Add {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        organization: String,
    },
}

#[derive(Args)]
struct FileArgs {
    /// Path or URL of the document
    #[arg(long)]
    file: String,
    /// File name used for type checks (defaults to the last path segment)
    #[arg(long)]
    name: Option<String>,
}

impl FileArgs {
    fn filename(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            let trimmed = self.file.split(['?', '#']).next().unwrap_or(&self.file);
            Path::new(trimmed)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

fn status_color(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::Verified => "\x1b[32m",
        DocumentStatus::PendingReview | DocumentStatus::Pending => "\x1b[33m",
        DocumentStatus::Suspicious => "\x1b[31m",
    }
}

fn verdict_color(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Authentic | Verdict::LikelyAuthentic => "\x1b[32m",
        Verdict::RequiresReview => "\x1b[33m",
        Verdict::HighlySuspicious | Verdict::Error => "\x1b[31m",
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => println!("{}", serde_json::json!({ "error": e.to_string() })),
    }
}

fn print_report(report: &VerificationReport) {
    println!("\nVERIFICATION RESULT");
    println!("===================\n");
    println!("Document:        {}", report.document_id);
    println!("Hash check:      {}", report.verification_state);
    if let Some(hash) = &report.hash {
        println!("Hash:            {}...", &hash[..hash.len().min(16)]);
    }
    if let Some(issuer) = &report.existing_issuer {
        println!("Issued by:       {}", issuer);
    }
    println!("Suspicion score: {:.2}", report.suspicion_score);
    if let Some(combined) = report.combined_score {
        println!("Heuristic score: {:.2}", combined);
    }
    println!(
        "Verdict:         {}{}\x1b[0m",
        verdict_color(report.verdict),
        report.verdict
    );
    println!(
        "Status:          {}{}\x1b[0m",
        status_color(report.status),
        report.status
    );
    println!("\nExplanation:");
    for line in &report.explanation {
        println!("  - {}", line);
    }
    if !report.ocr_preview.is_empty() {
        println!("\nExtracted text:\n  {}", report.ocr_preview);
    }
}

fn print_analysis(result: &AnalysisResult) {
    println!("\nHEURISTIC ANALYSIS");
    println!("==================\n");
    println!("Quality score:  {:.2}", result.quality_score());
    println!("Text score:     {:.2}", result.text_score());
    println!("Combined score: {:.2}", result.combined_score());
    println!(
        "Verdict:        {}{}\x1b[0m",
        verdict_color(result.verdict()),
        result.verdict()
    );
    println!("\nExplanation:");
    for line in result.explanation() {
        println!("  - {}", line);
    }
}

fn print_view(view: &AnalysisView) {
    println!("\nDOCUMENT {}", view.document_id);
    println!("==========={}\n", "=".repeat(view.document_id.len()));
    println!("File:            {}", view.filename);
    println!("Source:          {}", view.source);
    println!("Hash:            {}", view.hash);
    println!("Hash check:      {}", view.verification_state);
    println!(
        "Status:          {}{}\x1b[0m",
        status_color(view.status),
        view.status
    );
    println!("Suspicion score: {:.2}", view.suspicion_score);
    println!("Examined by:     {} identities", view.verified_by);
    if let Some(issuer) = &view.existing_issuer {
        println!("Issued by:       {}", issuer);
    }
    println!("\nExplanation:");
    for line in &view.explanation {
        println!("  - {}", line);
    }
}

fn print_verifier_listing(listing: &VerifierDocuments) {
    println!(
        "\nDocuments examined by {} ({})\n",
        listing.verifier_name, listing.verifier_id
    );
    let s = listing.status_summary;
    println!(
        "verified: {}  pending_review: {}  suspicious: {}\n",
        s.verified, s.pending_review, s.suspicious
    );
    for doc in &listing.documents {
        println!(
            "  {}  {}{:<14}\x1b[0m  {:.2}  {}",
            doc.document_id,
            status_color(doc.status),
            doc.status.as_str(),
            doc.suspicion_score,
            doc.filename
        );
    }
}

fn print_issuer_listing(listing: &IssuerDocuments) {
    println!(
        "\nOriginals registered by {} ({})\n",
        listing.issuer_name, listing.issuer_id
    );
    for doc in &listing.documents {
        println!("  {}  {}", doc.document_id, doc.filename);
    }
}

fn build_config(cli: &Cli) -> Result<VerifyConfig, VerifyError> {
    let mut config = VerifyConfig::from_env()?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if config.data_dir.is_none() {
        config.data_dir = Some(PathBuf::from(DEFAULT_DATA_DIR));
    }
    if let Some(secret) = &cli.fallback_secret {
        config.fallback_secret = Some(secret.clone());
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), VerifyError> {
    let json = cli.format == Format::Json;
    let engine = VerificationEngine::with_config(build_config(&cli)?)?;

    match cli.command {
        Commands::Institute(InstituteCommand::Add { name, kind, secret }) => {
            let institute = engine
                .registry()
                .add_institute(&name, &kind, secret.as_deref())?;
            let profile = institute.profile();
            if json {
                print_json(&profile);
            } else {
                println!("Institute registered: {} ({})", profile.id, profile.name);
                if !profile.has_secret {
                    println!("\x1b[33mNo secret set: its originals cannot be registered.\x1b[0m");
                }
            }
        },
        Commands::Issuer(IssuerCommand::Add {
            name,
            email,
            institute,
        }) => {
            let issuer = engine.registry().add_issuer(&name, &email, &institute)?;
            if json {
                print_json(&issuer);
            } else {
                println!("Issuer registered: {} ({})", issuer.id, issuer.name);
            }
        },
        Commands::Verifier(VerifierCommand::Add { name, organization }) => {
            let verifier = engine.registry().add_verifier(&name, &organization)?;
            if json {
                print_json(&verifier);
            } else {
                println!("Verifier registered: {} ({})", verifier.id, verifier.name);
            }
        },
        Commands::Issue { issuer, file } => {
            let record = engine
                .register_issued(&IssueRequest {
                    issuer_id: issuer,
                    filename: file.filename(),
                    source: file.file,
                    metadata: BTreeMap::new(),
                })
                .await?;
            if json {
                print_json(&record);
            } else {
                println!("Original registered: {}", record.id);
                if let Some(hash) = &record.hash {
                    println!("Hash: {}...", &hash[..hash.len().min(16)]);
                }
            }
        },
        Commands::Verify {
            verifier,
            institute,
            document_type,
            file,
        } => {
            let report = engine
                .verify_upload(&VerifyRequest {
                    verifier_id: verifier,
                    filename: file.filename(),
                    source: file.file,
                    institute_id: institute,
                    document_type,
                    metadata: BTreeMap::new(),
                })
                .await?;
            if json {
                print_json(&report);
            } else {
                print_report(&report);
            }
        },
        Commands::Reverify { document, verifier } => {
            let report = engine.reverify(&document, &verifier).await?;
            if json {
                print_json(&report);
            } else {
                println!(
                    "Document {} re-scored: {:.2}",
                    report.document_id, report.new_suspicion_score
                );
            }
        },
        Commands::Show { document } => {
            let view = engine.analysis(&document)?;
            if json {
                print_json(&view);
            } else {
                print_view(&view);
            }
        },
        Commands::List { verifier, issuer } => match (verifier, issuer) {
            (Some(verifier), _) => {
                let listing = engine.documents_for_verifier(&verifier)?;
                if json {
                    print_json(&listing);
                } else {
                    print_verifier_listing(&listing);
                }
            },
            (None, Some(issuer)) => {
                let listing = engine.documents_for_issuer(&issuer)?;
                if json {
                    print_json(&listing);
                } else {
                    print_issuer_listing(&listing);
                }
            },
            (None, None) => {},
        },
        Commands::Analyze { file, text } => {
            let result = engine.analyze_source(&file, text.as_deref()).await?;
            if json {
                print_json(&result);
            } else {
                print_analysis(&result);
            }
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_output = cli.format == Format::Json;

    // Initialize logging (suppress for JSON output)
    if json_output {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::ERROR)
            .with_target(false)
            .init();
    } else if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_target(false)
            .init();
    }

    if let Err(e) = run(cli).await {
        if json_output {
            print_json(&serde_json::json!({
                "error": e.to_string(),
                "fatal": e.is_fatal(),
            }));
        } else {
            eprintln!("\x1b[31mError:\x1b[0m {}", e);
        }
        std::process::exit(if e.is_client_error() { 2 } else { 1 });
    }
}
