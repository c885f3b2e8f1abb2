use crate::server;
use clap::{Args, Parser, Subcommand};
use house_service::auth::TokenIssuer;
use house_service::config::AppConfig;
use house_service::error::AppError;
use house_service::housing::{PgHouseRepository, UserId, UserType, DUMMY_USER_ID, MIGRATOR};
use house_service::telemetry;
use tracing::info;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(
    name = "house-service",
    about = "Run and operate the house listing service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Apply the embedded database migrations and exit
    Migrate,
    /// Print a signed token for the given role
    Token(TokenArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Keep all data in process memory instead of Postgres
    #[arg(long)]
    pub(crate) in_memory: bool,
}

#[derive(Args, Debug)]
struct TokenArgs {
    /// Role embedded in the token: user or moderator
    #[arg(long, value_parser = parse_user_type)]
    user_type: UserType,
    /// Identity embedded in the token; defaults to the dummy login id
    #[arg(long)]
    user_id: Option<Uuid>,
}

fn parse_user_type(raw: &str) -> Result<UserType, String> {
    UserType::parse_known(raw).map_err(|err| err.to_string())
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Migrate => migrate().await,
        Command::Token(args) => print_token(args),
    }
}

async fn migrate() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let url = config.database.require_url()?;
    let repository = PgHouseRepository::connect(url, &config.database).await?;
    MIGRATOR.run(repository.pool()).await?;

    info!("migrations applied");
    Ok(())
}

fn print_token(args: TokenArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let tokens = TokenIssuer::new(config.auth.jwt_secret.as_bytes());
    let user_id = args.user_id.map(UserId).unwrap_or(DUMMY_USER_ID);

    println!("{}", tokens.issue(args.user_type, user_id)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default_command() {
        let cli = Cli::try_parse_from(["house-service"]).expect("parses without args");
        assert!(cli.command.is_none());
    }

    #[test]
    fn serve_accepts_overrides() {
        let cli = Cli::try_parse_from([
            "house-service",
            "serve",
            "--host",
            "0.0.0.0",
            "--port",
            "9000",
            "--in-memory",
        ])
        .expect("serve args parse");
        match cli.command {
            Some(Command::Serve(args)) => {
                assert_eq!(args.host.as_deref(), Some("0.0.0.0"));
                assert_eq!(args.port, Some(9000));
                assert!(args.in_memory);
            }
            other => panic!("expected serve command, got {other:?}"),
        }
    }

    #[test]
    fn token_command_rejects_unknown_roles() {
        let result = Cli::try_parse_from(["house-service", "token", "--user-type", "admin"]);
        assert!(result.is_err());
    }

    #[test]
    fn token_command_parses_role_and_id() {
        let cli = Cli::try_parse_from([
            "house-service",
            "token",
            "--user-type",
            "moderator",
            "--user-id",
            "123e4567-e89b-12d3-a456-426614174000",
        ])
        .expect("token args parse");
        match cli.command {
            Some(Command::Token(args)) => {
                assert_eq!(args.user_type, UserType::Moderator);
                assert_eq!(args.user_id.map(UserId), Some(DUMMY_USER_ID));
            }
            other => panic!("expected token command, got {other:?}"),
        }
    }
}
