// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use chainlock::commands::plan::PlanCommand;
use chainlock::commands::stress::{StressCommand, StressOptions};
use chainlock::config::new_config;
use chainlock::error::{Result, format_error_chain, get_exit_code};
use chainlock::logging;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chainlock")]
#[command(author, version, about = "Deadlock-free multi-object lock coordinator", long_about = None)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the order in which locks would be acquired for a set of objects
    Plan {
        /// Objects as [account:|ledger:]id, where id is an integer, text, or "_" for none
        objects: Vec<String>,
    },

    /// Run overlapping lock sets from many threads and check mutual exclusion
    Stress {
        /// Number of worker threads
        #[arg(long, default_value_t = 8)]
        threads: usize,

        /// Number of shared objects
        #[arg(long, default_value_t = 16)]
        objects: usize,

        /// Acquisitions per thread
        #[arg(long, default_value_t = 200)]
        rounds: usize,

        /// Objects locked together per acquisition
        #[arg(long, default_value_t = 3)]
        set_size: usize,

        /// Give objects whose ids share this remainder the same identity
        #[arg(long, value_name = "N")]
        tie_modulo: Option<u64>,

        /// Give every object a distinct identity
        #[arg(long, conflicts_with = "tie_modulo")]
        no_ties: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    logging::setup_logger(cli.verbose);

    let config = match new_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", format_error_chain(&e));
            std::process::exit(get_exit_code(&e));
        }
    };

    let result: Result<()> = (|| match cli.command {
        Commands::Plan { objects } => {
            let command = PlanCommand::new(&config)?;
            command.execute(&objects)
        }
        Commands::Stress {
            threads,
            objects,
            rounds,
            set_size,
            tie_modulo,
            no_ties,
        } => {
            let defaults = StressOptions::default();
            let options = StressOptions {
                threads,
                objects,
                rounds,
                set_size,
                tie_modulo: if no_ties {
                    None
                } else {
                    tie_modulo.or(defaults.tie_modulo)
                },
            };
            let command = StressCommand::new(&config)?;
            command.execute(&options)
        }
    })();

    if let Err(e) = result {
        eprintln!("{}", format_error_chain(&e));
        std::process::exit(get_exit_code(&e));
    }
}
