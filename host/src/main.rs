//! Command line front end for the 271 eligibility parser.
//!
//! Reads one 271 file, prints a human-readable summary of every assembled
//! record, and can additionally emit the records as JSON lines.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::process;

use tracing::error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use edi271_eligibility::{
    emit, parse_with, EligibilityResponse, OutputAdapter, ParseOptions, ValidationMode,
};

struct Args {
    input: String,
    json_path: Option<String>,
    mode: ValidationMode,
}

fn print_usage(program: &str) {
    eprintln!("Usage: {program} [OPTIONS] <file.271>");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --permissive     downgrade envelope count mismatches to warnings");
    eprintln!("  --json <path>    also write records as JSON lines ('-' for stdout)");
    eprintln!("  -h, --help       show this help");
}

fn parse_args() -> Result<Args, String> {
    let mut argv = std::env::args();
    let program = argv.next().unwrap_or_else(|| "edi271-parse".to_string());

    let mut input: Option<String> = None;
    let mut json_path: Option<String> = None;
    let mut mode = ValidationMode::Strict;

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "-h" | "--help" => {
                print_usage(&program);
                process::exit(0);
            }
            "--permissive" => mode = ValidationMode::Permissive,
            "--json" => {
                json_path = Some(
                    argv.next()
                        .ok_or_else(|| "--json requires a path".to_string())?,
                );
            }
            other if other.starts_with('-') => {
                return Err(format!("unknown option: {other}"));
            }
            other => {
                if input.is_some() {
                    return Err("more than one input file given".to_string());
                }
                input = Some(other.to_string());
            }
        }
    }

    let input = input.ok_or_else(|| {
        print_usage(&program);
        "no input file given".to_string()
    })?;

    Ok(Args {
        input,
        json_path,
        mode,
    })
}

/// Writes one JSON object per record, newline delimited.
struct JsonLines<W: Write> {
    writer: W,
}

impl<W: Write> OutputAdapter for JsonLines<W> {
    type Error = serde_json::Error;

    fn write_record(&mut self, record: &EligibilityResponse) -> Result<(), Self::Error> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n").map_err(serde_json::Error::io)
    }

    fn finish(&mut self) -> Result<(), Self::Error> {
        self.writer.flush().map_err(serde_json::Error::io)
    }
}

fn print_record(index: usize, record: &EligibilityResponse) {
    println!(
        "=== Record {} (transaction {}) ===",
        index + 1,
        record.transaction_id
    );
    println!("  Response date:      {}", record.response_date);
    println!("  Payer:              {}", record.payer_name);
    println!(
        "  Provider:           {} (NPI {})",
        record.provider_name, record.provider_npi
    );
    println!(
        "  Member:             {} ({})",
        record.subscriber_name, record.member_id
    );
    println!("  Group number:       {}", record.group_number);
    println!("  Employer:           {}", record.employer);
    println!("  Address:            {}", record.address);
    println!("  Date of birth:      {}", record.date_of_birth);
    println!("  Gender:             {}", record.gender);
    println!("  Status:             {}", record.status);
    println!("  Plan:               {}", record.plan_name);
    println!("  Deductible:         {}", record.individual_deductible);
    println!("  Deductible met:     {}", record.individual_deductible_met);
    println!("  Preventive copay:   {}", record.preventative_care_copay);
    println!("  Mental health:      {}", record.mental_health_covered);
    println!("  Benefit entries:    {}", record.benefits.len());
    for diagnostic in &record.diagnostics {
        println!("  ! {:?}: {}", diagnostic.kind, diagnostic.note);
    }
}

fn write_json(path: &str, records: &[EligibilityResponse]) -> Result<(), serde_json::Error> {
    if path == "-" {
        let stdout = io::stdout();
        let mut adapter = JsonLines {
            writer: stdout.lock(),
        };
        emit(records, &mut adapter)
    } else {
        let file = fs::File::create(path).map_err(serde_json::Error::io)?;
        let mut adapter = JsonLines {
            writer: BufWriter::new(file),
        };
        emit(records, &mut adapter)
    }
}

fn run(args: &Args) -> Result<bool, Box<dyn std::error::Error>> {
    let input = fs::read_to_string(&args.input)?;
    let options = ParseOptions { mode: args.mode };
    let outcome = parse_with(&input, &options)?;

    for warning in &outcome.envelope_warnings {
        eprintln!("envelope warning: {warning}");
    }

    for (index, record) in outcome.records.iter().enumerate() {
        print_record(index, record);
    }
    println!(
        "{} record(s), {} failed transaction(s), {} envelope warning(s)",
        outcome.records.len(),
        outcome.failures.len(),
        outcome.envelope_warnings.len(),
    );

    for failure in &outcome.failures {
        eprintln!("failed: {failure}");
    }

    if let Some(path) = &args.json_path {
        write_json(path, &outcome.records)?;
    }

    Ok(outcome.failures.is_empty())
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("error: {message}");
            process::exit(2);
        }
    };

    match run(&args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(err) => {
            error!(input = %args.input, %err, "parse failed");
            process::exit(1);
        }
    }
}
