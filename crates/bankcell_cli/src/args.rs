use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bankcell")]
#[command(about = "Hierarchical cell store with references and plugins", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding bank files, config.json and out/
    #[arg(long, global = true, default_value = "files")]
    pub root: PathBuf,

    /// Plugin discovery directory
    #[arg(long, global = true, default_value = "plugins")]
    pub plugins: PathBuf,

    /// trace|debug|info|warn|error (defaults by build mode)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a bank in its stored form, creating it if absent
    Show {
        /// Bank name, e.g. x00001 or x00001.txt
        bank: String,
    },

    /// Print a bank with every reference expanded
    Resolve { bank: String },

    /// Write <bank>.resolved.txt and <bank>.json under out/
    Export { bank: String },

    /// Set one value and save the bank
    Set {
        bank: String,
        register: String,
        address: String,
        value: String,
    },

    /// Delete one value and save the bank
    #[command(alias = "rm")]
    Delete {
        bank: String,
        register: String,
        address: String,
    },

    /// Merge the cells of another bank file into a bank and save it
    Merge { bank: String, file: PathBuf },

    /// Load every bank file under the root and list them
    #[command(alias = "ls")]
    List,

    /// List discovered plugins
    Plugins,

    /// Run a plugin against one cell
    Run {
        plugin: String,
        bank: String,
        register: String,
        address: String,
        /// Empty, a JSON file path, inline JSON, or text
        #[arg(default_value = "")]
        stdin: String,
    },

    /// Print the core version
    Version,
}
