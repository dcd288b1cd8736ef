use std::path::PathBuf;
use std::process;

use addrscope_core::pdb::locate::{candidate_paths, read_codeview, store_key};
use addrscope_core::pdb::{locate_debug_database, DebugDatabaseIndex};
use addrscope_core::process::{is_64bit_binary, modules_of_process};
use addrscope_core::{CommandOverrides, ModuleInfo, Resolver, ToolchainDescriptor, ToolchainKind};
use addrscope_utils::config::parse_u64;
use addrscope_utils::{
    debug, info, init_logging, init_logging_to_dir, init_logging_with_level, LogFormat, LogLevel, LoggingGuard,
    ModuleConfig, ResolverConfig, ToolchainName,
};
use clap::{Parser, Subcommand};

/// Resolve captured instruction addresses into module, function, file and line.
#[derive(Parser, Debug)]
#[command(name = "addrscope")]
#[command(version)]
#[command(about = "Resolve captured instruction addresses into module, function, file and line", long_about = None)]
struct Cli
{
    /// Write logs to <DIR>/YYYY-MM-DD-addrscope.log instead of stderr
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace); defaults to RUST_LOG or info
    #[arg(long, global = true, value_parser = parse_level)]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Resolve absolute addresses against the modules listed in a config file
    Resolve
    {
        /// TOML file listing modules and their toolchains
        #[arg(short, long)]
        config: PathBuf,
        /// Addresses to resolve (hex with 0x prefix, or decimal)
        #[arg(required = true, value_parser = parse_u64)]
        addresses: Vec<u64>,
        /// Also print each address's symbol identifier
        #[arg(long, default_value_t = false)]
        ids: bool,
    },
    /// Load a PDB and print its tables, or resolve RVAs against it
    Dump
    {
        /// Path to the .pdb file
        pdb: PathBuf,
        /// RVAs to resolve
        #[arg(short, long = "address", value_parser = parse_u64)]
        addresses: Vec<u64>,
        /// Print every function symbol
        #[arg(long, default_value_t = false)]
        functions: bool,
    },
    /// Find the debug database for a module
    Locate
    {
        /// Path to the executable or DLL
        module: PathBuf,
        /// Symbol path to search (defaults to _NT_SYMBOL_PATH)
        #[arg(long)]
        symbol_store: Option<String>,
        /// Print every candidate location, not just the first match
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    /// List the file-backed modules mapped into a running process (Linux)
    Modules
    {
        /// Process ID to inspect
        pid: u32,
        /// Toolchain assigned to every listed module
        #[arg(long, default_value = "gnu")]
        toolchain: ToolchainKind,
    },
    /// Report whether a binary is 32-bit or 64-bit
    Bitness
    {
        /// Path to the executable or object file
        path: PathBuf,
    },
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match setup_logging(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn parse_level(value: &str) -> Result<LogLevel, String>
{
    value.parse()
}

fn setup_logging(cli: &Cli) -> Result<LoggingGuard, addrscope_utils::LoggingError>
{
    match (&cli.log_dir, cli.log_level) {
        (Some(dir), level) => init_logging_to_dir(dir, level),
        (None, Some(level)) => init_logging_with_level(level, LogFormat::Pretty),
        (None, None) => init_logging(),
    }
}

fn run_command(command: Commands) -> Result<(), Box<dyn std::error::Error>>
{
    match command {
        Commands::Resolve { config, addresses, ids } => {
            let config = ResolverConfig::from_file(&config)?;
            let resolver = build_resolver(&config)?;
            info!("Resolving {} addresses over {} modules", addresses.len(), config.modules.len());

            for address in addresses {
                let frame = resolver.frame(address);
                if ids {
                    println!("{address:#018x} [{:#018x}] {frame}", resolver.address_id(address));
                } else {
                    println!("{address:#018x} {frame}");
                }
            }
            Ok(())
        }
        Commands::Dump { pdb, addresses, functions } => {
            let index = DebugDatabaseIndex::load(&pdb)?;
            let identity = index.identity();
            println!("{}", pdb.display());
            println!("  GUID/age:  {}", store_key(&identity.guid, identity.age));
            println!("  Machine:   {:?}", identity.machine);
            println!("  Functions: {}", index.functions().len());
            println!("  Lines:     {}", index.lines().len());
            println!("  Files:     {}", index.filenames().len());

            if functions {
                for function in index.functions() {
                    let size = function.size.map_or_else(|| "?".to_string(), |size| format!("{size:#x}"));
                    println!("{:#010x} {size:>8} {}", function.rva, function.name);
                }
            }

            for address in addresses {
                match u32::try_from(address) {
                    Ok(rva) => println!("{rva:#010x} {}", index.symbol_by_address(rva)),
                    Err(_) => println!("{address:#x} is not a 32-bit RVA"),
                }
            }
            Ok(())
        }
        Commands::Locate {
            module,
            symbol_store,
            all,
        } => {
            if let Some(codeview) = read_codeview(&module) {
                println!("CodeView: {} ({})", codeview.path.display(), codeview.store_key());
            }
            if all {
                for candidate in candidate_paths(&module, symbol_store.as_deref()) {
                    let marker = if candidate.is_file() { "found" } else { "-" };
                    println!("{marker:>5} {}", candidate.display());
                }
            }
            match locate_debug_database(&module, symbol_store.as_deref()) {
                Some(path) => {
                    println!("{}", path.display());
                    Ok(())
                }
                None => Err(format!("no debug database found for {}", module.display()).into()),
            }
        }
        Commands::Modules { pid, toolchain } => {
            let modules = modules_of_process(pid, &ToolchainDescriptor::new(toolchain))?;
            debug!("Process {pid} has {} file-backed modules", modules.len());
            for module in modules {
                println!("{:#018x} {:#10x} {}", module.base, module.size, module.path.display());
            }
            Ok(())
        }
        Commands::Bitness { path } => {
            let bits = if is_64bit_binary(&path)? { 64 } else { 32 };
            println!("{}: {bits}-bit", path.display());
            Ok(())
        }
    }
}

fn build_resolver(config: &ResolverConfig) -> addrscope_core::Result<Resolver>
{
    let mut builder = Resolver::builder().modules(config.modules.iter().map(module_info));
    if let Some(store) = &config.symbol_store {
        builder = builder.symbol_store(store.clone());
    }
    if let Some(len) = config.max_command_len {
        builder = builder.max_command_len(len);
    }
    builder.build()
}

fn module_info(config: &ModuleConfig) -> ModuleInfo
{
    let toolchain = &config.toolchain;
    let kind = match toolchain.kind {
        ToolchainName::Native => ToolchainKind::Native,
        ToolchainName::Gnu => ToolchainKind::Gnu,
        ToolchainName::Console => ToolchainKind::Console,
        ToolchainName::Unknown => ToolchainKind::Unknown,
    };

    let mut descriptor = ToolchainDescriptor::new(kind).with_overrides(CommandOverrides {
        symbolize: toolchain.symbolize.clone(),
        symbol_map: toolchain.symbol_map.clone(),
        demangle: toolchain.demangle.clone(),
    });
    if let Some(root) = &toolchain.root {
        descriptor = descriptor.with_root(root.clone());
    }
    if let Some(prefix) = &toolchain.prefix {
        descriptor = descriptor.with_prefix(prefix.clone());
    }

    ModuleInfo::new(config.base, config.size, config.path.clone(), descriptor)
}
