// netplan — expand a network configuration and print the resulting graph
//
//   netplan net.json              node list and optimizer descriptors
//   netplan net.json --assemble   also instantiate the network on the host
//   netplan net.json --verbose    debug-level logging
//
// Any configuration error is printed and the process exits with status 1.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueHint};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use kestrel::nn::{plan_node_shapes, GraphBuilder, NetPlan, Network};
use kestrel::{CpuBackend, CpuDevice, Initializer};

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Expand a kestrel network configuration into its node graph"
)]
struct Cli {
    /// Network configuration (JSON)
    #[arg(value_hint = ValueHint::FilePath)]
    config: PathBuf,

    /// Allocate node buffers and instantiate every layer on the host
    #[arg(long)]
    assemble: bool,

    /// Seed for parameter initialization when assembling
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    Registry::default().with(filter).with(fmt_layer).init();
}

fn print_plan(plan: &NetPlan) -> kestrel::Result<()> {
    let shapes = plan_node_shapes(plan)?;
    println!("nodes: {}", plan.num_nodes());
    for layer in &plan.layers {
        println!("  {layer}\t{}", shapes[layer.dst]);
    }
    println!("optimizers: {} (weight, bias)", plan.num_optims());
    for (w, b) in plan.weight_optims.iter().zip(&plan.bias_optims) {
        println!("  w {w}");
        println!("  b {b}");
    }
    println!(
        "devices {}..={} ({}), replicas {}, evals/device {}, rounds {}..{} of {}",
        plan.min_device,
        plan.max_device,
        plan.num_device,
        plan.num_nnets,
        plan.num_evals,
        plan.stt_round,
        plan.end_round,
        plan.max_round
    );
    Ok(())
}

fn run(cli: &Cli) -> kestrel::Result<()> {
    let config = kestrel::config::load_json(&cli.config)?;
    let plan = GraphBuilder::new(&config).build()?;
    print_plan(&plan)?;

    if cli.assemble {
        let device = CpuDevice::new(plan.min_device);
        let mut net = Network::<CpuBackend>::assemble(&plan, &device)?;
        net.init_params(&mut Initializer::seeded(cli.seed))?;
        println!("parameters: {}", net.num_parameters());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("netplan: {e}");
            ExitCode::FAILURE
        }
    }
}
