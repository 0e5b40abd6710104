// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hexar developer CLI.
//!
//! Replays block files through a fresh engine, validates the resulting
//! state and dumps JSON exports. Blocks live in a JSON file holding
//! either one block envelope or an array of them, in chain order.

use std::fs;
use std::io::{self, Write as _};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing::info;

use hexar_core::{DiskMap, Engine, Params};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Chain parameter set to run with.
    #[clap(long, value_enum, default_value_t = ChainArg::Regtest)]
    chain: ChainArg,

    /// Map radius of the procedural disk map.
    #[clap(long, default_value_t = 64)]
    map_radius: u32,

    /// Region tiling size of the procedural disk map.
    #[clap(long, default_value_t = 8)]
    region_size: i32,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ChainArg {
    Main,
    Test,
    Regtest,
}

impl ChainArg {
    fn params(self) -> Params {
        match self {
            ChainArg::Main => Params::mainnet(),
            ChainArg::Test => Params::testnet(),
            ChainArg::Regtest => Params::regtest(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay blocks and dump the resulting state.
    Run {
        /// Block file (one envelope or an array of envelopes).
        blocks: PathBuf,
        /// What to print after the replay.
        #[clap(long, value_enum, default_value_t = Dump::Full)]
        dump: Dump,
        /// Run the full validator after every file.
        #[clap(long)]
        validate: bool,
    },
    /// Feed mempool moves into the pending projection and print it.
    Pending {
        /// Block file replayed first to build the confirmed state.
        #[clap(long)]
        blocks: Option<PathBuf>,
        /// Moves file: an array of `{name, move}` objects.
        moves: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Dump {
    Full,
    Bootstrap,
    None,
}

fn load_json(path: &PathBuf) -> Result<Value> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn replay(engine: &mut Engine<DiskMap>, path: &PathBuf) -> Result<()> {
    let data = load_json(path)?;
    let blocks: Vec<Value> = match data {
        Value::Array(list) => list,
        single => vec![single],
    };
    for block in &blocks {
        let height = engine
            .process_block_json(block)
            .with_context(|| format!("processing block from {}", path.display()))?;
        info!(height, "block processed");
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    out.write_all(b"\n")?;
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let map = DiskMap::new(args.map_radius, args.region_size);
    let mut engine = Engine::new(args.chain.params(), map);

    match args.command {
        Command::Run {
            blocks,
            dump,
            validate,
        } => {
            replay(&mut engine, &blocks)?;
            if validate {
                if let Err(e) = engine.validate() {
                    bail!("state validation failed: {e}");
                }
                info!("state validated");
            }
            match dump {
                Dump::Full => print_json(&engine.full_state())?,
                Dump::Bootstrap => print_json(&engine.bootstrap_data())?,
                Dump::None => {}
            }
        }
        Command::Pending { blocks, moves } => {
            if let Some(blocks) = blocks {
                replay(&mut engine, &blocks)?;
            }
            let data = load_json(&moves)?;
            let Some(entries) = data.as_array() else {
                bail!("moves file must be a JSON array");
            };
            for entry in entries {
                let (Some(name), Some(mv)) = (
                    entry.get("name").and_then(Value::as_str),
                    entry.get("move"),
                ) else {
                    bail!("move entry must carry name and move");
                };
                engine.add_pending_move(name, mv);
            }
            print_json(&engine.pending_json())?;
        }
    }
    Ok(())
}
