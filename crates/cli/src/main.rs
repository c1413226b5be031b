use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use itriage_core::constants::DEFAULT_DATA_DIR;
use itriage_core::validation::{parse_vital_signs, require_non_empty};
use itriage_core::{
    CoreConfig, Patient, PatientFilter, PatientIdentity, Role, TriageError, TriageResult,
    TriageService,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "itriage")]
#[command(about = "iTriage emergency room triage CLI")]
struct Cli {
    /// Username to log in with
    #[arg(long, env = "ITRIAGE_USERNAME", global = true)]
    username: Option<String>,
    /// Password to log in with
    #[arg(long, env = "ITRIAGE_PASSWORD", global = true, hide_env_values = true)]
    password: Option<String>,
    /// Directory holding the registry and credentials files
    #[arg(long, env = "ITRIAGE_DATA_DIR", global = true, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the credentials file with the default users if it is missing
    InitCredentials,
    /// Register a new nurse or physician
    Register {
        /// nurse or physician
        role: Role,
        username: String,
        password: String,
        /// Must match ITRIAGE_ADMIN_PASSWORD
        #[arg(long)]
        admin_password: String,
    },
    /// Check credentials and print the role
    Login,
    /// Admit a patient
    Admit {
        name: String,
        /// Date of birth (YYYY-MM-DD)
        birth_date: String,
        health_card_number: String,
        /// Arrival time (YYYY-MM-DD HH:MM, UTC); defaults to now
        #[arg(long)]
        arrival: Option<String>,
    },
    /// Edit a patient's identity fields
    Edit {
        health_card_number: String,
        #[arg(long)]
        name: Option<String>,
        /// Date of birth (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<String>,
        #[arg(long)]
        new_health_card_number: Option<String>,
        /// Arrival time (YYYY-MM-DD HH:MM, UTC)
        #[arg(long)]
        arrival: Option<String>,
    },
    /// Show a patient with their full history
    Show { health_card_number: String },
    /// List patients
    List {
        /// urgency, arrival or all
        #[arg(long, default_value = "urgency")]
        filter: String,
    },
    /// Record vital signs
    Vitals {
        health_card_number: String,
        temperature: String,
        systolic_bp: String,
        diastolic_bp: String,
        heart_rate: String,
    },
    /// Record symptoms
    Symptoms {
        health_card_number: String,
        symptoms: String,
    },
    /// Add a prescription
    Prescribe {
        health_card_number: String,
        medication: String,
        instructions: String,
    },
    /// Record that a doctor has seen the patient
    Seen { health_card_number: String },
    /// Remove a patient
    Remove { health_card_number: String },
}

impl Commands {
    fn mutates_registry(&self) -> bool {
        matches!(
            self,
            Commands::Admit { .. }
                | Commands::Edit { .. }
                | Commands::Vitals { .. }
                | Commands::Symptoms { .. }
                | Commands::Prescribe { .. }
                | Commands::Seen { .. }
                | Commands::Remove { .. }
        )
    }
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "itriage_core=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<TriageError>().and_then(TriageError::field) {
                Some(field) => eprintln!("Error [{field}]: {e}"),
                None => eprintln!("Error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        println!("Use 'itriage --help' for commands");
        return Ok(());
    };

    let admin_password = std::env::var("ITRIAGE_ADMIN_PASSWORD").ok();
    let cfg = Arc::new(CoreConfig::with_data_dir(cli.data_dir, admin_password)?);
    tracing::debug!(
        data_dir = %cfg.data_dir().display(),
        registration = cfg.admin_password().is_some(),
        "resolved configuration"
    );
    let service = TriageService::new(cfg);

    service.load_credentials()?;

    match command {
        Commands::InitCredentials => {
            println!(
                "Credentials file ready at {}",
                service.config().credentials_path().display()
            );
            return Ok(());
        }
        Commands::Register {
            role,
            username,
            password,
            admin_password,
        } => {
            service.register(&admin_password, role, &username, &password)?;
            println!("Registered {role} {username}");
            return Ok(());
        }
        _ => {}
    }

    let role = login(&service, cli.username.as_deref(), cli.password.as_deref())?;
    if matches!(command, Commands::Login) {
        println!("Logged in as {role}");
        return Ok(());
    }

    service.load_registry()?;
    let save = command.mutates_registry();

    match command {
        Commands::Admit {
            name,
            birth_date,
            health_card_number,
            arrival,
        } => {
            let patient = service.admit_patient(
                &name,
                parse_birth_date(&birth_date)?,
                &health_card_number,
                parse_arrival(arrival.as_deref())?,
            )?;
            println!("Admitted {patient}");
        }
        Commands::Edit {
            health_card_number,
            name,
            birth_date,
            new_health_card_number,
            arrival,
        } => {
            let current = service.get_patient(&health_card_number)?.identity();
            let identity = PatientIdentity {
                name: name.unwrap_or(current.name),
                birth_date: match birth_date {
                    Some(raw) => parse_birth_date(&raw)?,
                    None => current.birth_date,
                },
                health_card_number: new_health_card_number.unwrap_or(current.health_card_number),
                arrival_time: match arrival {
                    Some(raw) => parse_arrival(Some(&raw))?,
                    None => current.arrival_time,
                },
            };
            let patient = service.update_patient(&health_card_number, identity)?;
            println!("Updated {patient}");
        }
        Commands::Show { health_card_number } => {
            print_patient_details(&service.get_patient(&health_card_number)?);
        }
        Commands::List { filter } => {
            let filter: PatientFilter = filter.parse()?;
            let patients = service.list_patients(filter)?;
            if patients.is_empty() {
                println!("No patients found.");
            }
            for patient in patients {
                println!(
                    "{} | urgency {} ({}) | {}",
                    patient.health_card_number(),
                    patient.urgency(),
                    patient.status(),
                    patient.name()
                );
            }
        }
        Commands::Vitals {
            health_card_number,
            temperature,
            systolic_bp,
            diastolic_bp,
            heart_rate,
        } => {
            let vitals = parse_vital_signs(&temperature, &systolic_bp, &diastolic_bp, &heart_rate)?;
            let trend = service.record_vital_signs(&health_card_number, vitals)?;
            println!("Recorded {vitals}; patient is {trend}");
        }
        Commands::Symptoms {
            health_card_number,
            symptoms,
        } => {
            let at = service.record_symptoms(&health_card_number, &symptoms)?;
            println!("Recorded symptoms at {}", format_instant(at));
        }
        Commands::Prescribe {
            health_card_number,
            medication,
            instructions,
        } => {
            let at = service.add_prescription(&health_card_number, &medication, &instructions)?;
            println!("Added prescription at {}", format_instant(at));
        }
        Commands::Seen { health_card_number } => {
            let at = service.mark_seen_by_doctor(&health_card_number)?;
            println!("Recorded doctor visit at {}", format_instant(at));
        }
        Commands::Remove { health_card_number } => {
            if service.remove_patient(&health_card_number)? {
                println!("Removed patient {health_card_number}");
            } else {
                println!("No patient with health card number {health_card_number}");
            }
        }
        Commands::InitCredentials | Commands::Register { .. } | Commands::Login => {}
    }

    if save {
        service.save_registry()?;
    }
    Ok(())
}

fn login(
    service: &TriageService,
    username: Option<&str>,
    password: Option<&str>,
) -> TriageResult<Role> {
    let username = username.ok_or_else(|| {
        TriageError::invalid("username", "is required (--username or ITRIAGE_USERNAME)")
    })?;
    service.login(username, password.unwrap_or_default())
}

fn parse_birth_date(raw: &str) -> TriageResult<NaiveDate> {
    let raw = require_non_empty("birth_date", raw)?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        TriageError::invalid("birth_date", format!("'{raw}' is not a YYYY-MM-DD date"))
    })
}

/// Accepts RFC 3339 or a minute-precision local form read as UTC.
fn parse_arrival(raw: Option<&str>) -> TriageResult<DateTime<Utc>> {
    let Some(raw) = raw else {
        return Ok(Utc::now());
    };
    let raw = require_non_empty("arrival_time", raw)?;

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| {
            TriageError::invalid(
                "arrival_time",
                format!("'{raw}' is not a YYYY-MM-DD HH:MM time"),
            )
        })
}

fn format_instant(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn print_patient_details(patient: &Patient) {
    println!("{patient}");
    println!("  Age:     {}", patient.age());
    println!("  Urgency: {} ({})", patient.urgency(), patient.status());

    match patient.last_seen_by_doctor() {
        Some(at) => println!("  Last seen by doctor: {}", format_instant(at)),
        None => println!("  Not yet seen by a doctor"),
    }

    if !patient.vital_signs().is_empty() {
        println!("  Vital signs:");
        for (at, vitals) in patient.vital_signs().iter().rev() {
            println!("    {}  {vitals}", format_instant(*at));
        }
    }
    if !patient.symptoms().is_empty() {
        println!("  Symptoms:");
        for (at, symptoms) in patient.symptoms().iter().rev() {
            println!("    {}  {symptoms}", format_instant(*at));
        }
    }
    if !patient.prescriptions().is_empty() {
        println!("  Prescriptions:");
        for (at, prescription) in patient.prescriptions().iter().rev() {
            println!(
                "    {}  {}: {}",
                format_instant(*at),
                prescription.medication,
                prescription.instructions
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_arrival_forms() {
        let expected = Utc.with_ymd_and_hms(2014, 3, 1, 9, 30, 0).unwrap();
        assert_eq!(parse_arrival(Some("2014-03-01 09:30")).unwrap(), expected);
        assert_eq!(parse_arrival(Some("2014-03-01T09:30")).unwrap(), expected);
        assert_eq!(parse_arrival(Some("2014-03-01T09:30:00Z")).unwrap(), expected);

        let err = parse_arrival(Some("yesterday")).expect_err("not a time");
        assert_eq!(err.field(), Some("arrival_time"));
    }

    #[test]
    fn missing_arrival_defaults_to_now() {
        let before = Utc::now();
        let arrival = parse_arrival(None).unwrap();
        assert!(arrival >= before);
    }

    #[test]
    fn birth_date_errors_name_the_field() {
        assert_eq!(
            parse_birth_date("1984-02-29").unwrap(),
            NaiveDate::from_ymd_opt(1984, 2, 29).unwrap()
        );
        assert_eq!(
            parse_birth_date("29/02/1984").unwrap_err().field(),
            Some("birth_date")
        );
    }

    #[test]
    fn login_requires_a_username() {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let cfg = CoreConfig::with_data_dir(temp_dir.path().to_path_buf(), None).unwrap();
        let service = TriageService::new(Arc::new(cfg));
        service.load_credentials().unwrap();

        let err = login(&service, None, Some("nurse")).expect_err("no username");
        assert_eq!(err.field(), Some("username"));
        assert_eq!(login(&service, Some("nurse"), Some("nurse")).unwrap(), Role::Nurse);
    }
}
