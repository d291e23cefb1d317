use anyhow::Context;
use clap::{Parser, Subcommand};
use intake_core::{
    DocumentUpload, FormWorkflow, LogNavigator, ProvisioningService, RegistrationForm,
    SubmissionError, UserForm,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "intake")]
#[command(about = "Patient intake CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit the patient form (creates the user, or finds the existing one by email)
    CreateUser {
        /// Full name
        name: String,
        /// Email address
        email: String,
        /// Phone number, e.g. +254712345678
        phone: String,
    },
    /// Look up a user by id
    GetUser {
        /// User id
        user_id: String,
    },
    /// Print the registration form pre-filled for a user, as JSON
    Prefill {
        /// User id
        user_id: String,
    },
    /// Submit the registration form for a user
    Register {
        /// User id
        user_id: String,
        /// Registration form as a JSON file (camelCase field names)
        form: PathBuf,
        /// Identification document to upload (image or PDF)
        #[arg(long)]
        document: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("intake=warn".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("Use 'intake --help' for commands");
        return Ok(());
    };

    let service = intake_appwrite::provisioning_from_lookup(|key| std::env::var(key).ok())?;

    match command {
        Commands::CreateUser { name, email, phone } => {
            let form = UserForm { name, email, phone };
            let handle = workflow(&service)
                .submit_user_form(&form)
                .await
                .map_err(report)?;
            println!("User ID: {}", handle.user.id);
            println!("Next: {}", handle.next_path);
        }
        Commands::GetUser { user_id } => match service.get_user(&user_id).await? {
            Some(user) => println!(
                "ID: {}, Name: {}, Email: {}, Phone: {}",
                user.id, user.name, user.email, user.phone
            ),
            None => anyhow::bail!("no user with id {user_id}"),
        },
        Commands::Prefill { user_id } => {
            let user = service
                .get_user(&user_id)
                .await?
                .with_context(|| format!("no user with id {user_id}"))?;
            let form = RegistrationForm::prefilled(&user);
            println!("{}", serde_json::to_string_pretty(&form)?);
        }
        Commands::Register {
            user_id,
            form,
            document,
        } => {
            let mut form = read_form(&form)?;
            if let Some(path) = document {
                form.identification_document = Some(read_document(&path)?);
            }

            let handle = workflow(&service)
                .submit_registration_form(&user_id, form)
                .await
                .map_err(report)?;
            println!("Patient record ID: {}", handle.record.id);
            if let Some(url) = &handle.record.fields.identification_document_url {
                println!("Identification document: {url}");
            }
            println!("Next: {}", handle.next_path);
        }
    }

    Ok(())
}

fn workflow(service: &ProvisioningService) -> FormWorkflow<LogNavigator> {
    FormWorkflow::new(service.clone(), LogNavigator)
}

/// Print field errors one per line before giving up.
fn report(e: SubmissionError) -> anyhow::Error {
    if let SubmissionError::Invalid(errors) = &e {
        for error in errors.errors() {
            eprintln!("  {}: {}", error.field, error.reason);
        }
    }
    e.into()
}

fn read_form(path: &Path) -> anyhow::Result<RegistrationForm> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
}

fn read_document(path: &Path) -> anyhow::Result<DocumentUpload> {
    let content =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(DocumentUpload {
        file_name: path.to_string_lossy().into_owned(),
        content,
    })
}
