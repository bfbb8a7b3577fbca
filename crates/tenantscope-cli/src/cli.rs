//! Command-line interface definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tenantscope - Microsoft 365 tenant dashboards and reports from the terminal.
#[derive(Parser, Debug)]
#[command(name = "tenantscope")]
#[command(
    author,
    version,
    about,
    long_about = r#"tenantscope signs in to a Microsoft 365 tenant, loads dashboard sections
from Microsoft Graph into a local cache and renders them as tables, CSV
exports or PowerShell remediation scripts.

Examples:
    tenantscope login
    tenantscope refresh --section users --section licenses
    tenantscope show users --filter inactive:60
    tenantscope export licenses -o licenses.csv
    tenantscope script block-sign-in --filter disabled -o block.ps1
"#
)]
pub struct Cli {
    /// Directory (tenant) id or verified domain; overrides the config file.
    #[arg(long, global = true, env = "TENANTSCOPE_TENANT_ID", value_name = "TENANT")]
    pub tenant: Option<String>,

    /// Also write logs to a daily file in the cache directory.
    #[arg(long, global = true)]
    pub log_file: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with the device code flow, or store an app secret.
    Login {
        /// Store a client secret in the OS keychain for unattended use instead
        /// of signing in interactively.
        #[arg(long, value_name = "SECRET")]
        client_secret: Option<String>,
    },

    /// Remove the stored session.
    Logout {
        /// Also delete the stored client secret.
        #[arg(long)]
        forget_secret: bool,
    },

    /// Show sign-in state, configuration and cache ages.
    Status,

    /// Load sections from Graph into the cache.
    Refresh {
        /// Section to refresh (repeatable). All sections when omitted.
        #[arg(short, long = "section", value_name = "SECTION")]
        sections: Vec<String>,

        /// Refresh even when the cached copy is still fresh.
        #[arg(short, long)]
        force: bool,
    },

    /// Render a cached section as a table.
    Show {
        section: String,

        /// User filter: all, enabled, disabled, members, guests, unlicensed,
        /// inactive or inactive:<days>. Applies to the users section.
        #[arg(long, value_name = "FILTER")]
        filter: Option<String>,

        /// Only rows containing this text (case-insensitive).
        #[arg(short, long, value_name = "TEXT")]
        search: Option<String>,

        /// Maximum number of rows to print.
        #[arg(short = 'n', long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Print the text summary of every cached section.
    Summary,

    /// Export a cached section as CSV.
    Export {
        section: String,

        /// Output file.
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// User filter, as for `show`.
        #[arg(long, value_name = "FILTER")]
        filter: Option<String>,
    },

    /// Generate a PowerShell remediation script for selected users.
    Script {
        /// block-sign-in, revoke-sessions, require-password-change,
        /// enable-archive or remove-licenses.
        action: String,

        /// User principal name (repeatable).
        #[arg(short, long = "user", value_name = "UPN")]
        users: Vec<String>,

        /// Select users from the cached users section with a filter.
        #[arg(long, value_name = "FILTER", conflicts_with = "users")]
        filter: Option<String>,

        /// Output file.
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Remove cached sections.
    Clear {
        /// Section to remove (repeatable). Everything when omitted.
        #[arg(short, long = "section", value_name = "SECTION")]
        sections: Vec<String>,
    },

    /// Show recently viewed sections.
    History,

    /// Send a message to the support team.
    Contact {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        #[arg(long, default_value = "tenantscope support request")]
        subject: String,

        #[arg(long)]
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_refresh() {
        let cli = Cli::parse_from(["tenantscope", "refresh", "-s", "users", "--section", "licenses", "--force"]);
        match cli.command {
            Commands::Refresh { sections, force } => {
                assert_eq!(sections, vec!["users", "licenses"]);
                assert!(force);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_script_users_and_filter_conflict() {
        let result = Cli::try_parse_from([
            "tenantscope", "script", "block-sign-in", "--user", "a@contoso.com", "--filter", "guests", "-o", "x.ps1",
        ]);
        assert!(result.is_err());
    }
}
