use anyhow::Context;
use casebook_client::ExpertApiClient;
use casebook_core::{
    catalog::{self, CaseQuery},
    config::{api_timeout_from_env_value, domains_from_env_value},
    constants::DEFAULT_EXPERT_API_URL,
    model::ComplexityLevel,
    repository::{CaseFilter, CaseRepository, ExpertIdentity, SchoolCaseRepository},
    review, CoreConfig, RejectableRegion, RejectionForm,
};
use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "casebook")]
#[command(about = "Clinical casebook CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the expert agent answers
    Health,
    /// Browse and manage clinical cases
    #[command(subcommand)]
    Cases(CaseCommands),
    /// Manage school cases
    #[command(subcommand)]
    SchoolCases(SchoolCaseCommands),
    /// Approve a case
    Approve {
        case_id: String,
        #[command(flatten)]
        expert: ExpertArgs,
        /// Optional comment sent with the approval
        #[arg(long)]
        comment: Option<String>,
    },
    /// Reject a case, naming the parts that need rework
    Reject {
        case_id: String,
        #[command(flatten)]
        expert: ExpertArgs,
        /// Why the case is rejected
        #[arg(long)]
        reason: String,
        /// Rejected part (repeatable): patient, diagnostic, exam_requests, prescriptions,
        /// consultation_reason, medical_folder
        #[arg(long = "region", value_parser = RejectableRegion::from_str)]
        regions: Vec<RejectableRegion>,
    },
}

#[derive(Args)]
struct ExpertArgs {
    /// Reviewing expert id
    #[arg(long)]
    expert_id: String,
    /// Reviewing expert's domain
    #[arg(long)]
    expert_domaine: String,
}

impl From<ExpertArgs> for ExpertIdentity {
    fn from(args: ExpertArgs) -> Self {
        ExpertIdentity {
            expert_id: args.expert_id,
            expert_domaine: args.expert_domaine,
        }
    }
}

#[derive(Args, Default)]
struct CaseFilterArgs {
    /// Exact pathology
    #[arg(long)]
    pathologie: Option<String>,
    /// Complexity level: debutant, intermediaire, avance
    #[arg(long, value_parser = ComplexityLevel::from_str)]
    niveau: Option<ComplexityLevel>,
    /// Case-insensitive text in the pathology or consultation reason
    #[arg(long)]
    search: Option<String>,
    /// Exact domain
    #[arg(long)]
    domaine: Option<String>,
}

#[derive(Subcommand)]
enum CaseCommands {
    /// List cases
    List {
        #[command(flatten)]
        filter: CaseFilterArgs,
    },
    /// Print one case as JSON
    Show { id: String },
    /// Delete a case
    Delete { id: String },
    /// Write cases as a JSON array to a file, or to stdout with `-`
    Export {
        output: PathBuf,
        #[command(flatten)]
        filter: CaseFilterArgs,
    },
    /// Pathologies and levels in use
    Pathologies,
}

#[derive(Subcommand)]
enum SchoolCaseCommands {
    /// List school cases
    List {
        /// Only the school cases of this teacher
        #[arg(long)]
        professeur_id: Option<i64>,
    },
    /// Activate or deactivate a school case
    Toggle { id: String },
    /// Delete a school case
    Delete { id: String },
    /// Cases available as school-case templates
    Available,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("casebook=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("Use 'casebook --help' for commands");
        return Ok(());
    };

    let client = ExpertApiClient::new(Arc::new(load_config()?))?;

    match command {
        Commands::Health => {
            if client.health().await? {
                println!("Expert agent at {} is up", client.base_url());
            } else {
                anyhow::bail!("Expert agent at {} is not healthy", client.base_url());
            }
        }
        Commands::Cases(cmd) => run_case_command(&client, cmd).await?,
        Commands::SchoolCases(cmd) => run_school_case_command(&client, cmd).await?,
        Commands::Approve {
            case_id,
            expert,
            comment,
        } => {
            review::approve(&client, &case_id, &expert.into(), comment.as_deref()).await?;
            println!("Approved case {}", case_id);
        }
        Commands::Reject {
            case_id,
            expert,
            reason,
            regions,
        } => {
            let mut form = RejectionForm::new();
            form.set_reason(reason);
            for region in regions {
                if !form.is_selected(region) {
                    form.toggle(region);
                }
            }
            form.submit_to(&client, &case_id, &expert.into()).await?;
            println!("Rejected case {}", case_id);
        }
    }

    Ok(())
}

/// Build the configuration from `CASEBOOK_*` environment variables.
fn load_config() -> anyhow::Result<CoreConfig> {
    let url = std::env::var("CASEBOOK_EXPERT_API_URL")
        .unwrap_or_else(|_| DEFAULT_EXPERT_API_URL.into());
    let timeout = api_timeout_from_env_value(std::env::var("CASEBOOK_API_TIMEOUT_MS").ok())?;
    let domains = domains_from_env_value(std::env::var("CASEBOOK_DOMAINS").ok());
    Ok(CoreConfig::new(url, timeout, domains)?)
}

async fn fetch_cases(
    client: &ExpertApiClient,
    args: CaseFilterArgs,
) -> anyhow::Result<Vec<casebook_core::ClinicalCase>> {
    let filter = CaseFilter {
        pathologie: args.pathologie,
        niveau: args.niveau,
    };
    let query = CaseQuery {
        search: args.search.unwrap_or_default(),
        domaine: args.domaine,
        niveau: None,
    };
    let cases = CaseRepository::list(client, &filter).await?;
    Ok(query.apply(&cases).into_iter().cloned().collect())
}

async fn run_case_command(client: &ExpertApiClient, cmd: CaseCommands) -> anyhow::Result<()> {
    match cmd {
        CaseCommands::List { filter } => {
            let cases = fetch_cases(client, filter).await?;
            if cases.is_empty() {
                println!("No cases found.");
            }
            let today = chrono::Local::now().date_naive();
            for case in cases {
                let age = case
                    .patient
                    .age_in_years(today)
                    .map(|a| format!("{a} ans"))
                    .unwrap_or_else(|| "âge inconnu".into());
                println!(
                    "ID: {}, Patient: {} {} ({}), Pathologie: {}, Niveau: {}",
                    case.id,
                    case.patient.first_name,
                    case.patient.last_name,
                    age,
                    case.pathology().unwrap_or("-"),
                    case.level().map_or("-", ComplexityLevel::label),
                );
            }
        }
        CaseCommands::Show { id } => {
            let case = CaseRepository::get(client, &id)
                .await?
                .with_context(|| format!("case {id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&case)?);
        }
        CaseCommands::Delete { id } => {
            CaseRepository::delete(client, &id).await?;
            println!("Deleted case {}", id);
        }
        CaseCommands::Export { output, filter } => {
            let cases = fetch_cases(client, filter).await?;
            if output.as_os_str() == "-" {
                catalog::export_json(&cases, io::stdout().lock())?;
                println!();
            } else {
                let file = File::create(&output)
                    .with_context(|| format!("cannot create {}", output.display()))?;
                catalog::export_json(&cases, BufWriter::new(file))?;
                eprintln!("Exported {} cases to {}", cases.len(), output.display());
            }
        }
        CaseCommands::Pathologies => {
            let cases = CaseRepository::list(client, &CaseFilter::default()).await?;
            println!("Pathologies:");
            for pathology in catalog::available_pathologies(&cases) {
                println!("  {}", pathology);
            }
            println!("Niveaux:");
            for level in catalog::available_levels(&cases) {
                println!("  {} ({})", level.as_str(), level.label());
            }
        }
    }
    Ok(())
}

async fn run_school_case_command(
    client: &ExpertApiClient,
    cmd: SchoolCaseCommands,
) -> anyhow::Result<()> {
    match cmd {
        SchoolCaseCommands::List { professeur_id } => {
            let school_cases = SchoolCaseRepository::list(client, professeur_id).await?;
            if school_cases.is_empty() {
                println!("No school cases found.");
            }
            for sc in school_cases {
                println!(
                    "ID: {}, Titre: {}, Classe: {} ({}), Durée: {} min, Actif: {}",
                    sc.id,
                    sc.titre,
                    sc.classe_nom,
                    sc.ecole_nom,
                    sc.temps_limite_minutes,
                    if sc.actif { "oui" } else { "non" },
                );
            }
        }
        SchoolCaseCommands::Toggle { id } => {
            let toggled = client.toggle_active(&id).await?;
            println!(
                "{} {}",
                if toggled.actif { "Cas activé:" } else { "Cas désactivé:" },
                toggled.id
            );
        }
        SchoolCaseCommands::Delete { id } => {
            SchoolCaseRepository::delete(client, &id).await?;
            println!("Deleted school case {}", id);
        }
        SchoolCaseCommands::Available => {
            for case in client.available_cases().await? {
                println!(
                    "ID: {}, Motif: {}, Pathologie: {}",
                    case.id,
                    case.consultation_reason,
                    case.pathology().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}
