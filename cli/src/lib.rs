use clap::Parser;
use color_eyre::{eyre::format_err, Help, SectionExt};
use owo_colors::OwoColorize;
use richards::{bench, Config, Counts, Report, Verdict};
use std::io::{self, Write};

pub use color_eyre::eyre::Result;

pub mod term;
pub mod trace;

#[derive(Debug, Parser)]
#[command(
    name = "richards",
    version,
    about = "runs the six-task dispatcher pipeline and checks its counters"
)]
pub struct Options {
    /// How many times the idle task runs before it holds itself for good.
    ///
    /// Reference counters are only known for the default count.
    #[clap(long, env = "RICHARDS_COUNT", default_value_t = Config::REFERENCE_COUNT)]
    pub count: u32,

    /// How many independent repetitions to run.
    #[clap(
        short = 'n',
        long,
        default_value_t = 1,
        value_parser = clap::value_parser!(u64).range(1..),
    )]
    pub iterations: u64,

    /// Print each repetition's task activation trace.
    #[clap(long)]
    pub trace: bool,

    #[clap(flatten)]
    pub output: term::OutputOptions,
}

impl Options {
    pub fn config(&self) -> Config {
        let config = Config::with_count(self.count);
        if self.trace {
            config.traced()
        } else {
            config
        }
    }

    /// Runs every repetition, printing the results of each, and fails if any
    /// repetition was incorrect or if the repetitions disagree.
    pub fn run(&self) -> Result<()> {
        let stdout = io::stdout();
        self.run_to(&mut stdout.lock())
    }

    /// Like [`Options::run`], but writes the report to `out`.
    pub fn run_to(&self, out: &mut impl Write) -> Result<()> {
        let config = self.config();

        writeln!(out, "Bench mark starting")?;
        let mut reports = Vec::new();
        for iteration in 1..=self.iterations {
            writeln!(out, "Starting")?;
            let report = {
                let _span = tracing::debug_span!("iteration", iteration).entered();
                bench::run(&config)
                    .map_err(|error| format_err!(error))
                    .note("the pipeline could not be constructed")?
            };
            self.print_report(out, &report)?;
            tracing::info!(
                qpkt = report.counts.qpkt,
                hold = report.counts.hold,
                "finished run {iteration}/{}",
                self.iterations
            );
            reports.push(report);
        }

        check(&reports)
    }

    fn print_report(&self, out: &mut impl Write, report: &Report) -> Result<()> {
        if let Some(trace) = report.trace.as_ref() {
            write!(out, "{trace}")?;
        }
        writeln!(out, "\nfinished")?;
        writeln!(out, "{}", format_counts(report.counts))?;

        let (word, correct) = match report.verdict() {
            Verdict::Correct => ("correct", true),
            Verdict::Incorrect => ("incorrect", false),
            Verdict::Unchecked => ("unchecked", true),
        };
        writeln!(
            out,
            "These results are {}",
            word.style(self.output.verdict_style(correct))
        )?;
        writeln!(out, "end of run")?;
        Ok(())
    }
}

fn check(reports: &[Report]) -> Result<()> {
    let Some(first) = reports.first() else {
        return Ok(());
    };

    if let Some((iteration, report)) = reports
        .iter()
        .enumerate()
        .find(|(_, report)| report.counts != first.counts)
    {
        return Err(format_err!(
            "repetition {} disagreed with the first repetition",
            iteration + 1
        ))
        .section(format_counts(first.counts).header("First:"))
        .section(format_counts(report.counts).header("Repetition:"))
        .note("every repetition starts from an identical setup, so this should never happen");
    }

    if first.verdict() == Verdict::Incorrect {
        return Err(format_err!("these results are incorrect"))
            .section(format_counts(first.counts).header("Actual:"))
            .section(format_counts(Counts::REFERENCE).header("Expected:"));
    }

    Ok(())
}

fn format_counts(counts: Counts) -> String {
    format!("qpkt count = {}  holdcount = {}", counts.qpkt, counts.hold)
}
