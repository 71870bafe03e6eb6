use super::*;
use clap::CommandFactory;
use serial_test::serial;

#[test]
fn verify_cli_args() {
    // Validates the entire command tree: short flag conflicts,
    // duplicate args, and other clap definition errors.
    Cli::command().debug_assert();
}

#[test]
#[serial]
fn test_global_args_after_subcommand() {
    std::env::remove_var("TIDEMARK_TENANT");
    let cli = Cli::try_parse_from(["tm", "status", "--check", "-t", "acme", "-d", ":memory:"]).unwrap();
    assert_eq!(cli.global.tenant.as_deref(), Some("acme"));
    assert_eq!(cli.global.database.as_deref(), Some(":memory:"));
    match cli.command {
        Commands::Status(args) => {
            assert!(args.check);
            assert_eq!(args.output, OutputFormat::Table);
        }
        other => panic!("expected status, got {other:?}"),
    }
}

#[test]
#[serial]
fn test_tenant_from_environment() {
    std::env::set_var("TIDEMARK_TENANT", "from-env");
    let cli = Cli::try_parse_from(["tm", "apply"]).unwrap();
    assert_eq!(cli.global.tenant.as_deref(), Some("from-env"));

    let cli = Cli::try_parse_from(["tm", "apply", "--tenant", "from-flag"]).unwrap();
    assert_eq!(cli.global.tenant.as_deref(), Some("from-flag"));
    std::env::remove_var("TIDEMARK_TENANT");
}

#[test]
fn test_split_requires_file() {
    assert!(Cli::try_parse_from(["tm", "split"]).is_err());
    let cli = Cli::try_parse_from(["tm", "split", "001-init.sql"]).unwrap();
    assert!(matches!(cli.command, Commands::Split(ref a) if a.file == PathBuf::from("001-init.sql")));
}

#[test]
fn test_json_output() {
    let cli = Cli::try_parse_from(["tm", "history", "-o", "json"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::History(HistoryArgs {
            output: OutputFormat::Json
        })
    ));
}
