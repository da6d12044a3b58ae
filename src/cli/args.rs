// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use paas_router::config::ConfigOverrides;

#[derive(Parser, Debug)]
#[command(name = "paas-router")]
#[command(author, version, about = "Resolve PaaS clusters into Kubernetes API clients")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Admin service address without scheme (overrides PAAS_ADMIN_URL)
    #[arg(long, global = true, value_name = "HOST[:PORT]")]
    pub admin_url: Option<String>,

    /// Directory with one kubeconfig per cluster id (overrides KUBE_CONFIG_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub kube_config_dir: Option<PathBuf>,

    /// Timeout in seconds for fetching the cluster list
    #[arg(long, global = true, value_name = "SECS")]
    pub refresh_timeout: Option<u64>,

    /// Timeout in seconds for the API server version probe
    #[arg(long, global = true, value_name = "SECS")]
    pub probe_timeout: Option<u64>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub output: OutputFormat,

    /// Omit column headers in output
    #[arg(long, global = true)]
    pub no_headers: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch and list all clusters known to the admin service
    Clusters,

    /// List the clusters a spec selects and the request parameter it yields
    Select {
        /// Comma-separated ids and glob patterns, or "_all".
        /// Examples: c1, "c1,c2", "bj-*"
        #[arg(default_value = "_all")]
        spec: String,
    },

    /// Build a client for one or more clusters and probe the API server
    Resolve {
        /// Cluster ids or patterns, same syntax as `select`
        spec: String,

        /// Build a client even when the registry has no record for the id
        #[arg(long)]
        permissive: bool,
    },

    /// Show the effective configuration
    Config {
        /// Persist the effective configuration to ~/.paas-router/config.json
        #[arg(long)]
        save: bool,
    },
}

#[derive(ValueEnum, Clone, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
    Yaml,
}

impl Args {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            admin_service_address: self.admin_url.clone(),
            credential_base_dir: self.kube_config_dir.clone(),
            refresh_timeout_secs: self.refresh_timeout,
            probe_timeout_secs: self.probe_timeout,
            allow_unregistered: matches!(
                self.command,
                Command::Resolve {
                    permissive: true,
                    ..
                }
            ),
        }
    }
}
