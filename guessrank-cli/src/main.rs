use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use log::info;

use guessrank_core::model::store::build_catalog;
use guessrank_core::model::{Catalog, CheckpointDir, ClassId, Decomposer, LevelIndex, RankEstimator};
use guessrank_core::model::checkpoint::CheckpointBuilder;
use guessrank_core::{Config, GuessError};

/// Guess numbers of passwords under a discretized Markov model
#[derive(Parser, Debug)]
#[command(name = "guessrank")]
#[command(about = "Build probability-ranked checkpoints and rank passwords against them", long_about = None)]
#[command(version)]
struct Args {
	/// JSON configuration file (defaults apply to missing fields)
	#[arg(short, long, global = true)]
	config: Option<PathBuf>,

	/// Directory holding the level tables
	#[arg(long, global = true)]
	levels_dir: Option<PathBuf>,

	/// Directory holding the checkpoints
	#[arg(long, global = true)]
	checkpoints_dir: Option<PathBuf>,

	/// Sampling interval of the checkpoints
	#[arg(long, global = true)]
	interval: Option<u64>,

	/// Discover catalogued classes from the checkpoint files instead of the configured coverage
	#[arg(long, global = true)]
	discover: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Rank a password (prompts for it when omitted)
	Rank {
		password: Option<String>,
	},
	/// Build checkpoints for one class, or for the whole catalog
	Build {
		#[arg(long, requires = "level")]
		length: Option<usize>,
		#[arg(long, requires = "length")]
		level: Option<u32>,
	},
	/// Print the canonical components and class of a password
	Decompose {
		password: String,
	},
}

impl Args {
	fn config(&self) -> Result<Config, GuessError> {
		let mut config = match &self.config {
			Some(path) => Config::from_file(path)?,
			None => Config::default(),
		};
		if let Some(dir) = &self.levels_dir {
			config.levels_dir = dir.clone();
		}
		if let Some(dir) = &self.checkpoints_dir {
			config.checkpoints_dir = dir.clone();
		}
		if let Some(interval) = self.interval {
			config.sample_interval = interval;
		}
		config.validate()?;
		Ok(config)
	}

	fn catalog(&self, config: &Config) -> Result<Catalog, GuessError> {
		if self.discover {
			Catalog::discover(config.checkpoint_root())
		} else {
			Ok(Catalog::from_coverage(&config.coverage))
		}
	}
}

fn prompt_password() -> io::Result<String> {
	print!("Input password to guess -> ");
	io::stdout().flush()?;
	let mut line = String::new();
	io::stdin().lock().read_line(&mut line)?;
	Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let args = Args::parse();
	let config = args.config()?;
	let index = LevelIndex::load(&config)?;
	info!("Parameters of model: k={}, smoothing={}", config.order, config.smoothing);

	match &args.command {
		Command::Rank { password } => {
			let password = match password {
				Some(p) => p.clone(),
				None => prompt_password()?,
			};
			let catalog = args.catalog(&config)?;
			let dir = CheckpointDir::new(config.checkpoint_root());
			let estimator = RankEstimator::new(&config, &index, &catalog, &dir)?;
			println!("Guess number: {}", estimator.estimate(&password)?);
		}
		Command::Build { length: Some(length), level: Some(level) } => {
			let class = ClassId::new(*length, *level);
			let checkpoint = CheckpointBuilder::new(&index, config.sample_interval)?.build(class)?;
			CheckpointDir::new(config.checkpoint_root()).save(class, &checkpoint)?;
			println!("Checkpointing finished! Total passwords in {class}: {}", checkpoint.total());
		}
		Command::Build { .. } => {
			let catalog = Catalog::from_coverage(&config.coverage);
			let dir = CheckpointDir::new(config.checkpoint_root());
			let totals = build_catalog(Arc::new(index), &catalog, config.sample_interval, &dir, config.level_factor)?;
			let sum: u64 = totals.iter().map(|(_, total)| total).sum();
			println!("Checkpointed {} classes, {sum} passwords in total", totals.len());
		}
		Command::Decompose { password } => {
			let key = Decomposer::new(&index).decompose(password)?;
			for component in key.components() {
				println!("level {:>2}  rank {:>3}  token {}", component.level, component.rank, component.token_code);
			}
			let class = key.class();
			println!("Password length: {}; Total level: {}", class.length, class.total_level);
		}
	}

	Ok(())
}
