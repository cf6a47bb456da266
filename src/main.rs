use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use regex::Regex;
use serde_json::Value;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use fieldrule::persist::SqliteConnector;
use fieldrule::{
    compile, ArrayKind, CompileContext, ConnectionParams, EnumType, StoreChecker, Validator,
};

#[derive(Parser)]
#[command(name = "fieldrule", version, about = "Compile and apply field rule strings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the schema metadata a rule string compiles to
    Describe {
        rules: String,
        #[command(flatten)]
        context: ContextArgs,
    },
    /// Validate a JSON value against a rule string
    Check {
        rules: String,
        /// The value, as JSON
        value: String,
        #[command(flatten)]
        context: ContextArgs,
        /// Extra connection settings file for unique/exist rules
        #[arg(long)]
        config: Option<PathBuf>,
        /// Name used for the value in violation messages
        #[arg(long, default_value = "value")]
        name: String,
    },
}

#[derive(Args)]
struct ContextArgs {
    #[arg(long)]
    pattern: Option<String>,
    #[arg(long, default_value = "Enum")]
    enum_name: String,
    /// Comma separated allowed values for `enum`
    #[arg(long, value_delimiter = ',')]
    enum_values: Option<Vec<String>>,
    /// `string` or `number`
    #[arg(long)]
    array_kind: Option<String>,
    /// Record kind looked up by `unique` and `exist`
    #[arg(long)]
    entity: Option<String>,
    /// Example value, as JSON
    #[arg(long)]
    example: Option<String>,
}

impl ContextArgs {
    fn into_context(self) -> Result<CompileContext, String> {
        let mut context = CompileContext::new();
        if let Some(pattern) = self.pattern {
            context = context.with_pattern(Regex::new(&pattern).map_err(|e| e.to_string())?);
        }
        if let Some(values) = self.enum_values {
            context = context.with_enum(EnumType::new(self.enum_name, values));
        }
        if let Some(kind) = self.array_kind {
            let kind = ArrayKind::from_arg(&kind)
                .ok_or_else(|| format!("unsupported array kind '{kind}'"))?;
            context = context.with_array_kind(kind);
        }
        if let Some(entity) = self.entity {
            context = context.with_entity(entity);
        }
        if let Some(example) = self.example {
            context = context.with_example(parse_json(&example));
        }
        Ok(context)
    }
}

// plain text that is not JSON is taken as a string
fn parse_json(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    match run(Cli::parse()).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<bool, String> {
    match cli.command {
        Command::Describe { rules, context } => {
            let context = context.into_context()?;
            let field = compile(&rules, &context).map_err(|e| e.to_string())?;
            let rendered =
                serde_json::to_string_pretty(&field.metadata()).map_err(|e| e.to_string())?;
            println!("{rendered}");
            Ok(true)
        }
        Command::Check { rules, value, context, config, name } => {
            let context = context.into_context()?;
            let field = compile(&rules, &context).map_err(|e| e.to_string())?;
            // the store is only contacted if a unique/exist check actually runs
            let validator = match ConnectionParams::load_from(config.as_deref()) {
                Ok(params) => {
                    Validator::with_store(Arc::new(StoreChecker::new(Arc::new(SqliteConnector), params)))
                }
                // a settings file named on the command line has to load
                Err(e) if config.is_some() => return Err(e.to_string()),
                Err(e) => {
                    warn!(error = %e, "no record store settings, unique/exist checks will fail");
                    Validator::new()
                }
            };
            let report = validator
                .validate_field(&name, &field, Some(parse_json(&value)))
                .await
                .map_err(|e| e.to_string())?;
            let rendered =
                serde_json::to_string_pretty(&report.violations).map_err(|e| e.to_string())?;
            println!("{rendered}");
            Ok(report.is_valid())
        }
    }
}
