// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the Frechet project (directional derivatives as nested closures).

//! Frechet command-line driver: parse a function, differentiate it, print the
//! IR or the emitted closures, and optionally evaluate the result.

use std::fs;
use std::process;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use serde::Serialize;

use frechet::diagnostics::render;
use frechet::exec::{self, Value};
use frechet::pipeline::{compile_source, PipelineOptions, PipelineProducts};

#[derive(Parser, Debug)]
#[command(
    name = "frechetc",
    version,
    about = "Differentiate a function and emit it as nested closures"
)]
struct Cli {
    /// File containing a function such as `fn f(x) = x * sin(x)`.
    #[arg(value_name = "FILE", conflicts_with = "expr")]
    input: Option<String>,
    /// Function source given inline instead of a file.
    #[arg(long, value_name = "SRC")]
    expr: Option<String>,
    /// Number of times to differentiate.
    #[arg(long, default_value_t = 0)]
    order: usize,
    /// Parameter to differentiate with respect to (defaults to the first).
    #[arg(long, value_name = "NAME")]
    wrt: Option<String>,
    /// Print the IR of the final program.
    #[arg(long)]
    emit_ir: bool,
    /// Print the emitted nested closures.
    #[arg(long)]
    emit_code: bool,
    /// JSON array with one value per parameter, e.g. `[2.0, [1, 2, 3]]`.
    #[arg(long, value_name = "JSON")]
    at: Option<String>,
    /// JSON value of a tangent direction; repeat once per order.
    #[arg(long, value_name = "JSON")]
    along: Vec<String>,
    /// Only check that the pipeline succeeds.
    #[arg(long)]
    verify_only: bool,
}

#[derive(Serialize)]
struct Report {
    function: String,
    order: usize,
    value: serde_json::Value,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let source = match (&cli.input, &cli.expr) {
        (_, Some(src)) => src.clone(),
        (Some(path), None) => match fs::read_to_string(path) {
            Ok(src) => src,
            Err(err) => {
                eprintln!("failed to read {path}: {err}");
                process::exit(1);
            }
        },
        (None, None) => {
            eprintln!("error[cli]: expected an input file or --expr");
            process::exit(1);
        }
    };

    let opts = PipelineOptions {
        order: cli.order,
        wrt: cli.wrt.clone(),
    };

    let products = match compile_source(&source, &opts) {
        Ok(products) => products,
        Err(err) => {
            for diag in err.diagnostics(&source) {
                eprintln!("{}", render(&source, &diag));
            }
            process::exit(1);
        }
    };

    if cli.verify_only {
        return;
    }

    if cli.emit_ir {
        println!("{}", products.program());
    }
    if cli.emit_code || (!cli.emit_ir && cli.at.is_none()) {
        print!("{}", products.code);
    }

    if let Some(at) = &cli.at {
        match evaluate(&products, at, &cli.along) {
            Ok(report) => println!("{report}"),
            Err(err) => {
                eprintln!("error[eval]: {err:#}");
                process::exit(1);
            }
        }
    }
}

fn evaluate(products: &PipelineProducts, at: &str, along: &[String]) -> anyhow::Result<String> {
    let args = parse_json_values(at).context("invalid --at")?;
    let tangents = along
        .iter()
        .map(|raw| -> anyhow::Result<Value> {
            let json: serde_json::Value = serde_json::from_str(raw)?;
            Ok(Value::from_json(&json)?)
        })
        .collect::<anyhow::Result<Vec<Value>>>()
        .context("invalid --along")?;

    let order = products.code.order();
    if tangents.len() != order {
        bail!("expected {order} --along value(s), got {}", tangents.len());
    }

    let value = exec::evaluate_along(&products.code, &args, &tangents)?;
    let report = Report {
        function: products.function.name.clone(),
        order,
        value: value.to_json()?,
    };
    Ok(serde_json::to_string(&report)?)
}

fn parse_json_values(raw: &str) -> anyhow::Result<Vec<Value>> {
    let json: serde_json::Value = serde_json::from_str(raw)?;
    let items = json
        .as_array()
        .ok_or_else(|| anyhow!("expected a JSON array with one entry per parameter"))?;
    items
        .iter()
        .map(|item| Value::from_json(item).map_err(anyhow::Error::from))
        .collect()
}
