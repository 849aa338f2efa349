// Licensed under the Apache-2.0 license

use std::io::{stdout, BufWriter, Write};

use anyhow::{anyhow, bail, Context};
use clap::{arg, value_parser, ArgMatches};
use hsm_drivers::{Aes, PollBudget, Trng};
use hsm_hw_model::{parse_phys_addr, HwModel, ModelEmulated, ModelFpga, Output};
use hsm_kat::Aes256Kat;
use hsm_verify::{
    run_selftest, run_stream, signal, CancelToken, HealthPolicy, OutputMode, StreamConfig,
};

const MAP_HINT: &str =
    "run as root, make sure the bitstream is programmed and the base address matches the FPGA address map";

fn cli() -> clap::Command<'static> {
    clap::Command::new("hsm-verify")
        .about("Exercise the FPGA AES-256 accelerator and HSM/TRNG peripheral")
        .arg(arg!(--emulated "Talk to in-process emulated peripherals instead of /dev/mem"))
        .arg(
            arg!(--"aes-base" [ADDR] "AES accelerator base address (overrides HSM_AES_BASE)")
                .value_parser(parse_phys_addr),
        )
        .arg(
            arg!(--"trng-base" [ADDR] "HSM/TRNG base address (overrides HSM_TRNG_BASE)")
                .value_parser(parse_phys_addr),
        )
        .arg(
            arg!(--"poll-budget" [ATTEMPTS] "Maximum status polls per handshake")
                .value_parser(value_parser!(u32)),
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            clap::Command::new("aes-kat").about("Run the AES-256 known-answer vectors"),
        )
        .subcommand(
            clap::Command::new("trng-stream")
                .about("Stream TRNG samples to stdout until interrupted")
                .arg(arg!(--binary "Write raw little-endian words instead of hex lines"))
                .arg(
                    arg!(-n --count [SAMPLES] "Stop after this many samples")
                        .value_parser(value_parser!(u64)),
                )
                .arg(
                    arg!(--"health-every" [SAMPLES] "Check the health monitor every N samples")
                        .value_parser(value_parser!(u64)),
                )
                .arg(arg!(--"abort-on-health-fail" "Stop the stream when a health check fails")),
        )
        .subcommand(
            clap::Command::new("selftest")
                .about("Scratch register, oscillator, health and frozen-output checks")
                .arg(
                    arg!(--repeats [SAMPLES] "Extra samples compared by the frozen-output check")
                        .value_parser(value_parser!(u32))
                        .default_value("8"),
                ),
        )
}

fn main() {
    match main_impl() {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Fatal error: {e:#}");
            std::process::exit(1);
        }
    }
}

fn main_impl() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let output = Output::stderr();

    if matches.is_present("emulated") {
        run(ModelEmulated::new(), &matches, &output)
    } else {
        let mut model = ModelFpga::from_env()?;
        if let Some(addr) = matches.get_one::<u64>("aes-base") {
            model.aes_base = *addr;
        }
        if let Some(addr) = matches.get_one::<u64>("trng-base") {
            model.hsm_base = *addr;
        }
        run(model, &matches, &output)
    }
}

fn budgets(matches: &ArgMatches) -> (PollBudget, PollBudget) {
    let mut aes = PollBudget::aes_default();
    let mut trng = PollBudget::trng_default();
    if let Some(attempts) = matches.get_one::<u32>("poll-budget") {
        aes.max_attempts = *attempts;
        trng.max_attempts = *attempts;
    }
    (aes, trng)
}

fn run<H: HwModel>(mut model: H, matches: &ArgMatches, output: &Output) -> anyhow::Result<()> {
    let (aes_budget, trng_budget) = budgets(matches);
    output.log(format_args!("hsm-verify: using {} peripherals", model.name()));

    match matches.subcommand() {
        Some(("aes-kat", _)) => {
            let window = model
                .open_aes()
                .map_err(|e| anyhow!(e))
                .context(MAP_HINT)?;
            let mut aes = Aes::new(window, aes_budget, output.clone());
            let summary = Aes256Kat::new(output.clone()).execute(&mut aes);

            let mut stdout = stdout().lock();
            for (name, outcome) in &summary.results {
                writeln!(stdout, "[{outcome}] {name}")?;
            }
            writeln!(
                stdout,
                "{}/{} vectors passed",
                summary.passed(),
                summary.results.len()
            )?;
            summary.result().context("AES known-answer test failed")?;
        }
        Some(("trng-stream", sub_matches)) => {
            signal::install_stop_handlers().context("installing SIGINT/SIGTERM handlers")?;
            let cancel = CancelToken::with_signals();
            let config = StreamConfig {
                mode: if sub_matches.is_present("binary") {
                    OutputMode::Binary
                } else {
                    OutputMode::Hex
                },
                limit: sub_matches.get_one::<u64>("count").copied(),
                health_every: sub_matches.get_one::<u64>("health-every").copied(),
                health_policy: if sub_matches.is_present("abort-on-health-fail") {
                    HealthPolicy::Abort
                } else {
                    HealthPolicy::Warn
                },
            };

            let window = model
                .open_hsm()
                .map_err(|e| anyhow!(e))
                .context(MAP_HINT)?;
            let mut trng = Trng::new(window, trng_budget, output.clone());
            let mut out = BufWriter::new(stdout().lock());
            let result = run_stream(&mut trng, &config, &cancel, &mut out);
            trng.shutdown();

            let summary = result.context("TRNG stream failed")?;
            summary.result().context("TRNG stream aborted")?;
        }
        Some(("selftest", sub_matches)) => {
            let repeats = sub_matches.get_one::<u32>("repeats").copied().unwrap_or(8);
            let window = model
                .open_hsm()
                .map_err(|e| anyhow!(e))
                .context(MAP_HINT)?;
            let mut trng = Trng::new(window, trng_budget, output.clone());
            let report = run_selftest(&mut trng, repeats);
            trng.shutdown();

            println!("{report}");
            if !report.passed() {
                bail!("HSM self-test failed");
            }
        }
        _ => unreachable!("clap requires a subcommand"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_stream_options() {
        let matches = cli()
            .try_get_matches_from([
                "hsm-verify",
                "--emulated",
                "--poll-budget",
                "500",
                "trng-stream",
                "--binary",
                "-n",
                "10",
                "--health-every",
                "4",
                "--abort-on-health-fail",
            ])
            .unwrap();
        assert!(matches.is_present("emulated"));
        let (aes, trng) = budgets(&matches);
        assert_eq!(aes.max_attempts, 500);
        assert_eq!(trng.max_attempts, 500);
        assert!(aes.delay.is_some());

        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "trng-stream");
        assert!(sub.is_present("binary"));
        assert_eq!(sub.get_one::<u64>("count"), Some(&10));
        assert_eq!(sub.get_one::<u64>("health-every"), Some(&4));
    }

    #[test]
    fn test_cli_parses_base_addresses() {
        let matches = cli()
            .try_get_matches_from(["hsm-verify", "--aes-base", "0x43c00000", "aes-kat"])
            .unwrap();
        assert_eq!(matches.get_one::<u64>("aes-base"), Some(&0x43c0_0000));
        assert_eq!(matches.get_one::<u64>("trng-base"), None);

        assert!(cli()
            .try_get_matches_from(["hsm-verify", "--aes-base", "nope", "aes-kat"])
            .is_err());
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(cli().try_get_matches_from(["hsm-verify"]).is_err());
    }

    #[test]
    fn test_emulated_kat_passes() {
        let matches = cli()
            .try_get_matches_from(["hsm-verify", "--poll-budget", "1000", "aes-kat"])
            .unwrap();
        run(ModelEmulated::new(), &matches, &Output::sink()).unwrap();
    }
}
