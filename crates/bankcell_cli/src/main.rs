//! Command-line front end over `bankcell_core`.

use bankcell_core::{
    default_log_level, init_logging, BankId, CellKey, Config, FileBankRepository, OpenOutcome,
    Paths, PluginKernel, PluginRunRequest, WorkspaceService,
};
use clap::Parser;
use log::error;
use std::error::Error;
use std::process::ExitCode;

mod args;
use args::{Cli, Commands};

type CliResult = Result<(), Box<dyn Error>>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli module=cli status=error error={err}");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> CliResult {
    if let Commands::Version = cli.command {
        println!("bankcell {}", bankcell_core::core_version());
        return Ok(());
    }

    let paths = Paths::from_roots(cli.root, cli.plugins);
    paths.ensure()?;
    let config = Config::load_or_init(&paths.config_file)?;
    let log_dir = std::path::absolute(&paths.log_dir)?;
    let level = cli.log_level.as_deref().unwrap_or(default_log_level());
    init_logging(level, &log_dir)?;

    let mut service = WorkspaceService::with_files(config, paths);
    match cli.command {
        Commands::Show { bank } => {
            let id = open(&mut service, &bank)?;
            print!("{}", service.bank_text(id).unwrap_or_default());
        }
        Commands::Resolve { bank } => {
            let id = open(&mut service, &bank)?;
            print!("{}", service.resolved_bank_text(id)?);
        }
        Commands::Export { bank } => {
            let id = open(&mut service, &bank)?;
            println!("{}", service.write_resolved_export(id)?.display());
            println!("{}", service.write_json_export(id)?.display());
        }
        Commands::Set {
            bank,
            register,
            address,
            value,
        } => {
            let id = open(&mut service, &bank)?;
            let register = service.config().parse_id(&register)?;
            let address = service.config().parse_id(&address)?;
            service.insert_value(id, register, address, value)?;
            println!("Saved {}", service.save_bank(id)?.display());
        }
        Commands::Delete {
            bank,
            register,
            address,
        } => {
            let id = open(&mut service, &bank)?;
            let register = service.config().parse_id(&register)?;
            let address = service.config().parse_id(&address)?;
            if service.delete_value(id, register, address)?.is_none() {
                let config = service.config();
                return Err(format!(
                    "No value at r{} a{}",
                    config.render_register(register),
                    config.render_address(address)
                )
                .into());
            }
            println!("Saved {}", service.save_bank(id)?.display());
        }
        Commands::Merge { bank, file } => {
            let id = open(&mut service, &bank)?;
            let merged = service.merge_file(id, &file)?;
            println!("Merged {merged} cells");
            println!("Saved {}", service.save_bank(id)?.display());
        }
        Commands::List => {
            let loaded = service.preload_all()?;
            if loaded == 0 {
                println!("(no banks)");
            }
            let config = service.config();
            for bank in service.workspace().banks() {
                println!(
                    "{}\t({})\t{} cells",
                    config.render_bank(bank.id),
                    bank.title,
                    bank.cell_count()
                );
            }
        }
        Commands::Plugins => {
            let kernel = PluginKernel::discover(&service.paths().plugins_dir);
            if kernel.plugins().is_empty() {
                println!("(no plugins)");
            }
            for plugin in kernel.plugins() {
                println!("{}\t{}", plugin.name, plugin.dir.display());
            }
        }
        Commands::Run {
            plugin,
            bank,
            register,
            address,
            stdin,
        } => {
            let bank = service.parse_bank_name(&bank)?;
            let register = service.config().parse_id(&register)?;
            let address = service.config().parse_id(&address)?;
            let kernel = PluginKernel::discover(&service.paths().plugins_dir);
            let request =
                PluginRunRequest::new(plugin, CellKey::new(bank, register, address), stdin);
            let output = kernel.run(&mut service, &request)?;
            print!("{}", output.report);
            println!("{}", output.output_json);
        }
        Commands::Version => {}
    }
    Ok(())
}

/// Opens (or creates) a bank, reporting creation on stderr.
fn open(
    service: &mut WorkspaceService<FileBankRepository>,
    name: &str,
) -> Result<BankId, Box<dyn Error>> {
    let outcome = service.open_bank(name)?;
    if !matches!(outcome, OpenOutcome::Opened { .. }) {
        eprintln!("{outcome}");
    }
    Ok(outcome.id())
}
