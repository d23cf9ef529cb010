//! shieldrule: CLI tool for inspecting rule lists and resolving domains.

use clap::{Parser, Subcommand};
use shieldrule::{
    merge_rule_sets, FormatHint, MergeOptions, ParseOutcome, ParserOptions, ParserRegistry,
    RuleSet, RuleSetHandle, WildcardMode,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "shieldrule")]
#[command(version = "0.1.0")]
#[command(about = "Parse DNS allow/block rule lists and resolve domains against them", long_about = None)]
struct Cli {
    /// Parser options as a JSON file (camelCase keys, missing keys default)
    #[arg(long, global = true)]
    options: Option<PathBuf>,

    /// Fail on the first invalid rule
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a rule list and print its metadata and statistics
    Check {
        /// Rule list file
        input: PathBuf,

        /// Format identifier; chosen from the extension or content otherwise
        #[arg(short, long)]
        format: Option<String>,

        /// Print every diagnostic
        #[arg(short, long)]
        verbose: bool,
    },

    /// Resolve domains against one or more rule lists
    Lookup {
        /// Rule list files, merged in order
        #[arg(short, long, required = true)]
        rules: Vec<PathBuf>,

        /// Domains to resolve
        #[arg(required = true)]
        domains: Vec<String>,

        /// Let `*.base` also cover `base`
        #[arg(long)]
        include_root: bool,

        /// Print every matching rule, strongest first
        #[arg(short, long)]
        verbose: bool,
    },

    /// Write a rule list as a normalized JSON document
    Export {
        /// Rule list file
        input: PathBuf,

        /// Output JSON file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Format identifier; chosen from the extension or content otherwise
        #[arg(short, long)]
        format: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = load_options(cli.options.as_deref(), cli.strict).and_then(|options| {
        match cli.command {
            Commands::Check {
                input,
                format,
                verbose,
            } => check(&input, format.as_deref(), &options, verbose),
            Commands::Lookup {
                rules,
                domains,
                include_root,
                verbose,
            } => lookup(&rules, &domains, include_root, &options, verbose),
            Commands::Export {
                input,
                output,
                format,
            } => export(&input, output.as_deref(), format.as_deref(), &options),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_options(
    path: Option<&Path>,
    strict: bool,
) -> Result<ParserOptions, Box<dyn std::error::Error>> {
    let mut options = match path {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => ParserOptions::default(),
    };
    if strict {
        options.strict_mode = true;
    }
    Ok(options)
}

fn parse_input(
    registry: &ParserRegistry,
    input: &Path,
    format: Option<&str>,
    options: &ParserOptions,
) -> shieldrule::Result<ParseOutcome> {
    match format {
        Some(format) => {
            let data = fs::read(input)?;
            registry.parse(&data, FormatHint::Format(format), options)
        }
        None => registry.parse_file(input, options),
    }
}

fn check(
    input: &Path,
    format: Option<&str>,
    options: &ParserOptions,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ParserRegistry::with_builtin();
    let outcome = parse_input(&registry, input, format, options)?;
    let rules = &outcome.rule_set;
    let meta = rules.metadata();

    println!("File:        {}", input.display());
    if let Some(name) = &meta.name {
        println!("Name:        {}", name);
    }
    if let Some(version) = &meta.version {
        println!("Version:     {}", version);
    }
    if let Some(author) = &meta.author {
        println!("Author:      {}", author);
    }
    if let Some(source) = &meta.source_url {
        println!("Source:      {}", source);
    }
    println!("Statistics:  {}", rules.statistics());
    println!("Skipped:     {}", outcome.skipped);
    println!("Duplicates:  {}", outcome.duplicates);
    if !outcome.is_complete() {
        println!("Stopped at max rule count {}", options.max_rule_count);
    }

    if verbose {
        for diagnostic in &outcome.diagnostics {
            match diagnostic.line {
                Some(line) => println!("  line {}: {}", line, diagnostic.message),
                None => println!("  {}", diagnostic.message),
            }
        }
    } else if !outcome.diagnostics.is_empty() {
        println!("Diagnostics: {} (use --verbose to list)", outcome.diagnostics.len());
    }

    Ok(())
}

fn lookup(
    files: &[PathBuf],
    domains: &[String],
    include_root: bool,
    options: &ParserOptions,
    verbose: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ParserRegistry::with_builtin();
    let mut sets = Vec::with_capacity(files.len());
    for file in files {
        let outcome = registry.parse_file(file, options)?;
        log::info!("Loaded {} rules from {:?}", outcome.rule_set.rule_count(), file);
        sets.push(outcome.into_rule_set());
    }

    let mode = if include_root {
        WildcardMode::IncludeRoot
    } else {
        WildcardMode::SubdomainsOnly
    };
    let merged: RuleSet =
        merge_rule_sets(&sets, MergeOptions::KEEP_DUPLICATES).with_wildcard_mode(mode);
    let handle = RuleSetHandle::new(merged);
    let active = handle.current();

    for domain in domains {
        let decision = handle.decide(domain);
        match active.rule_for_domain(domain) {
            Some(rule) => println!(
                "{} {} ({} {}, priority {}{})",
                domain,
                decision,
                rule.action,
                rule.domain,
                rule.priority,
                rule.source
                    .as_deref()
                    .map(|s| format!(", from {}", s))
                    .unwrap_or_default()
            ),
            None => println!("{} {}", domain, decision),
        }
        if verbose {
            for rule in active.lookup_by_precedence(domain) {
                println!("    {} {} priority {}", rule.action, rule.domain, rule.priority);
            }
        }
    }

    Ok(())
}

fn export(
    input: &Path,
    output: Option<&Path>,
    format: Option<&str>,
    options: &ParserOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = ParserRegistry::with_builtin();
    let outcome = parse_input(&registry, input, format, options)?;
    let json = outcome.rule_set.to_json();

    match output {
        Some(path) => {
            fs::write(path, json)?;
            println!(
                "Wrote {} rules to {}",
                outcome.rule_set.rule_count(),
                path.display()
            );
        }
        None => println!("{}", json),
    }
    Ok(())
}
